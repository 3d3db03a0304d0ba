use std::sync::Arc;

use log::{debug, info, trace};

use super::{Dispatcher, ImageThrottle, PublishJob, PublishStats};
use crate::config::{PublishConfig, TrackingConfig};
use crate::sensor::{SkeletonTracker, UserEvent};
use crate::types::{Joint, JointPositions, StateMessage};

/// What happened to the users seen in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub users: usize,
    pub published: usize,
    pub untracked: usize,
    pub below_threshold: usize,
    pub incomplete: usize,
    pub image_published: bool,
}

/// Per-frame joint publication for every confidently tracked user.
pub struct FramePublisher {
    confidence_threshold: f32,
    reference_joint: Joint,
    image_throttle: Option<ImageThrottle>,
    dispatcher: Dispatcher,
}

impl FramePublisher {
    pub fn new(
        tracking: &TrackingConfig,
        publish: &PublishConfig,
        dispatcher: Dispatcher,
        started_ms: i64,
    ) -> Self {
        let image_throttle = publish
            .image_enabled
            .then(|| ImageThrottle::new(publish.image_interval_ms, started_ms));
        Self {
            confidence_threshold: tracking.confidence_threshold,
            reference_joint: tracking.reference_joint,
            image_throttle,
            dispatcher,
        }
    }

    /// 处理用户事件: 新用户开始骨架跟踪
    pub fn handle_events(&self, tracker: &mut dyn SkeletonTracker) {
        for event in tracker.poll_events() {
            match event {
                UserEvent::New(user) => {
                    info!("New user detected - userId: {}", user);
                    tracker.start_tracking_skeleton(user);
                }
                UserEvent::Lost(user) => info!("User lost - userId: {}", user),
                UserEvent::Visible(user) => trace!("User visible - userId: {}", user),
            }
        }
    }

    pub fn on_frame(&mut self, tracker: &dyn SkeletonTracker, now_ms: i64) -> FrameReport {
        let mut report = FrameReport::default();

        for user in tracker.users() {
            report.users += 1;
            if !tracker.is_tracking_skeleton(user) {
                report.untracked += 1;
                continue;
            }

            let Some(reference) = tracker.joint_position(user, self.reference_joint) else {
                report.incomplete += 1;
                continue;
            };
            if reference.confidence <= self.confidence_threshold {
                report.below_threshold += 1;
                continue;
            }

            let points = JointPositions::try_from_fn(|joint| {
                tracker.joint_position(user, joint).map(|reading| reading.position)
            });
            match points {
                Some(points) => {
                    let message = StateMessage::new(now_ms, user, points);
                    self.dispatcher.dispatch(PublishJob::State(message));
                    report.published += 1;
                }
                None => {
                    debug!("User {} is missing joints this frame, skipped", user);
                    report.incomplete += 1;
                }
            }
        }

        if report.published > 0 {
            if let Some(throttle) = self.image_throttle.as_mut() {
                if throttle.try_acquire(now_ms) {
                    debug!("Depth image due, last sent reset to {}", throttle.last_sent_ms());
                    self.dispatcher.dispatch(PublishJob::Image {
                        timestamp: now_ms,
                        image: tracker.depth_image().clone(),
                    });
                    report.image_published = true;
                }
            }
        }

        report
    }

    pub fn stats(&self) -> &Arc<PublishStats> {
        self.dispatcher.stats()
    }

    pub fn shutdown(self) {
        self.dispatcher.shutdown();
    }
}
