pub mod depth;
pub mod replay;
pub mod simulated;

pub use replay::ReplayTracker;
pub use simulated::SimulatedTracker;

use crate::config::{SensorConfig, SensorSource};
use crate::types::{DepthImage, Joint, UserId, Vec3};

/// Focal length (px) used for real-world to projective conversion.
pub const DEPTH_FOCAL_LENGTH: f32 = 525.0;

/// User lifecycle notifications raised by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    New(UserId),
    Lost(UserId),
    Visible(UserId),
}

/// 关节位置及其置信度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointReading {
    pub position: Vec3,
    pub confidence: f32,
}

impl JointReading {
    pub fn new(position: Vec3, confidence: f32) -> Self {
        Self {
            position,
            confidence,
        }
    }
}

/// Seam to the depth sensor's user segmentation and skeleton estimation.
pub trait SkeletonTracker: Send {
    /// Advances one frame. `Ok(false)` once the source has nothing left.
    fn update(&mut self) -> Result<bool, SensorError>;

    /// Drains lifecycle events raised since the last call.
    fn poll_events(&mut self) -> Vec<UserEvent>;

    fn users(&self) -> Vec<UserId>;

    fn is_tracking_skeleton(&self, user: UserId) -> bool;

    fn start_tracking_skeleton(&mut self, user: UserId);

    fn joint_position(&self, user: UserId, joint: Joint) -> Option<JointReading>;

    fn depth_image(&self) -> &DepthImage;
}

/// 传感器错误类型
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Recording line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Recording contains no frames")]
    EmptyRecording,
    #[error("Missing replay path")]
    MissingReplayPath,
}

/// Projects a real-world point onto the depth image plane.
pub fn project_to_image(point: Vec3, width: u32, height: u32) -> Option<(f32, f32)> {
    if point.z <= 0.0 {
        return None;
    }
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let u = cx + DEPTH_FOCAL_LENGTH * point.x / point.z;
    let v = cy - DEPTH_FOCAL_LENGTH * point.y / point.z;
    Some((u, v))
}

pub fn build_tracker(config: &SensorConfig) -> Result<Box<dyn SkeletonTracker>, SensorError> {
    match config.source {
        SensorSource::Simulated => Ok(Box::new(SimulatedTracker::from_config(config))),
        SensorSource::Replay => {
            let path = config
                .replay_path
                .as_ref()
                .ok_or(SensorError::MissingReplayPath)?;
            let tracker = ReplayTracker::open(path, config.width, config.height, config.replay_loop)?;
            Ok(Box::new(tracker))
        }
    }
}
