use std::f32::consts::PI;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::depth::render_depth;
use super::{JointReading, SensorError, SkeletonTracker, UserEvent};
use crate::config::SensorConfig;
use crate::types::{blank_depth_image, DepthImage, Joint, JointPositions, UserId, Vec3};

/// Frames between a tracking request and the skeleton becoming available.
pub const CALIBRATION_FRAMES: u64 = 15;

const DANCE_HZ: f32 = 0.5;
const STAGE_DEPTH_MM: f32 = 2200.0;
const USER_SPACING_MM: f32 = 700.0;
const JITTER_MM: f32 = 3.0;
const LOW_CONFIDENCE_RATE: f64 = 0.05;

struct SimUser {
    id: UserId,
    phase: f32,
    origin: Vec3,
    tracking_since: Option<u64>,
    pose: JointPositions,
    confidence: f32,
}

/// Seeded synthetic dancer standing in for the depth sensor.
pub struct SimulatedTracker {
    rng: StdRng,
    frame: u64,
    fps: f32,
    user_count: u32,
    users: Vec<SimUser>,
    events: Vec<UserEvent>,
    depth: DepthImage,
}

impl SimulatedTracker {
    pub fn new(user_count: u32, fps: u32, width: u32, height: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            frame: 0,
            fps: fps.max(1) as f32,
            user_count,
            users: Vec::new(),
            events: Vec::new(),
            depth: blank_depth_image(width, height),
        }
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        Self::new(
            config.simulated_users,
            config.fps,
            config.width,
            config.height,
            config.seed,
        )
    }

    fn spawn_users(&mut self) {
        let spread = (self.user_count.saturating_sub(1)) as f32 * USER_SPACING_MM;
        for i in 0..self.user_count {
            let id = i + 1;
            let origin = Vec3::new(i as f32 * USER_SPACING_MM - spread / 2.0, 0.0, STAGE_DEPTH_MM);
            self.users.push(SimUser {
                id,
                phase: i as f32 * PI / 3.0,
                origin,
                tracking_since: None,
                pose: JointPositions::default(),
                confidence: 0.0,
            });
            debug!("Simulated user {} entered at x={:.0}mm", id, origin.x);
            self.events.push(UserEvent::New(id));
        }
    }

    fn user(&self, id: UserId) -> Option<&SimUser> {
        self.users.iter().find(|u| u.id == id)
    }
}

/// 基础站姿, 相对躯干 (毫米)
fn base_offset(joint: Joint) -> Vec3 {
    match joint {
        Joint::Head => Vec3::new(0.0, 450.0, 0.0),
        Joint::Neck => Vec3::new(0.0, 300.0, 0.0),
        Joint::LeftShoulder => Vec3::new(-180.0, 280.0, 0.0),
        Joint::LeftElbow => Vec3::new(-300.0, 40.0, 0.0),
        Joint::LeftHand => Vec3::new(-330.0, -200.0, 0.0),
        Joint::RightShoulder => Vec3::new(180.0, 280.0, 0.0),
        Joint::RightElbow => Vec3::new(300.0, 40.0, 0.0),
        Joint::RightHand => Vec3::new(330.0, -200.0, 0.0),
        Joint::Torso => Vec3::new(0.0, 0.0, 0.0),
        Joint::LeftHip => Vec3::new(-100.0, -200.0, 0.0),
        Joint::LeftKnee => Vec3::new(-110.0, -600.0, 0.0),
        Joint::LeftFoot => Vec3::new(-120.0, -950.0, 0.0),
        Joint::RightHip => Vec3::new(100.0, -200.0, 0.0),
        Joint::RightKnee => Vec3::new(110.0, -600.0, 0.0),
        Joint::RightFoot => Vec3::new(120.0, -950.0, 0.0),
    }
}

fn dance_offset(joint: Joint, beat: f32) -> Vec3 {
    let sway = Vec3::new(60.0 * (beat / 2.0).sin(), 0.0, 0.0);
    let local = match joint {
        Joint::LeftHand => Vec3::new(0.0, 250.0 * beat.sin(), 0.0),
        Joint::RightHand => Vec3::new(0.0, -250.0 * beat.sin(), 0.0),
        Joint::LeftElbow => Vec3::new(0.0, 120.0 * beat.sin(), 0.0),
        Joint::RightElbow => Vec3::new(0.0, -120.0 * beat.sin(), 0.0),
        Joint::LeftKnee => Vec3::new(0.0, 0.0, -80.0 * beat.cos()),
        Joint::RightKnee => Vec3::new(0.0, 0.0, 80.0 * beat.cos()),
        _ => Vec3::default(),
    };
    sway + local
}

impl SkeletonTracker for SimulatedTracker {
    fn update(&mut self) -> Result<bool, SensorError> {
        self.frame += 1;
        if self.frame == 1 {
            self.spawn_users();
        } else {
            self.events
                .extend(self.users.iter().map(|u| UserEvent::Visible(u.id)));
        }

        let t = self.frame as f32 / self.fps;
        for user in &mut self.users {
            let beat = 2.0 * PI * DANCE_HZ * t + user.phase;
            for joint in Joint::ALL {
                let jitter = Vec3::new(
                    self.rng.random_range(-JITTER_MM..JITTER_MM),
                    self.rng.random_range(-JITTER_MM..JITTER_MM),
                    self.rng.random_range(-JITTER_MM..JITTER_MM),
                );
                let position = user.origin + base_offset(joint) + dance_offset(joint, beat) + jitter;
                user.pose.set(joint, position);
            }
            user.confidence = if self.rng.random_bool(LOW_CONFIDENCE_RATE) {
                self.rng.random_range(0.0..0.5)
            } else {
                self.rng.random_range(0.7..=1.0)
            };
        }

        render_depth(&mut self.depth, self.users.iter().map(|u| &u.pose));
        Ok(true)
    }

    fn poll_events(&mut self) -> Vec<UserEvent> {
        std::mem::take(&mut self.events)
    }

    fn users(&self) -> Vec<UserId> {
        self.users.iter().map(|u| u.id).collect()
    }

    fn is_tracking_skeleton(&self, user: UserId) -> bool {
        self.user(user)
            .and_then(|u| u.tracking_since)
            .is_some_and(|since| self.frame >= since + CALIBRATION_FRAMES)
    }

    fn start_tracking_skeleton(&mut self, user: UserId) {
        let frame = self.frame;
        if let Some(u) = self.users.iter_mut().find(|u| u.id == user) {
            u.tracking_since.get_or_insert(frame);
        }
    }

    fn joint_position(&self, user: UserId, joint: Joint) -> Option<JointReading> {
        let u = self.user(user)?;
        Some(JointReading::new(u.pose.get(joint), u.confidence))
    }

    fn depth_image(&self) -> &DepthImage {
        &self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::depth::BACKGROUND_DEPTH_MM;

    fn tracker(users: u32) -> SimulatedTracker {
        SimulatedTracker::new(users, 30, 320, 240, Some(7))
    }

    #[test]
    fn users_appear_on_first_frame() {
        let mut sim = tracker(2);
        assert!(sim.users().is_empty());
        assert!(sim.update().unwrap());
        assert_eq!(sim.poll_events(), vec![UserEvent::New(1), UserEvent::New(2)]);
        assert_eq!(sim.users(), vec![1, 2]);
        assert!(sim.poll_events().is_empty());

        sim.update().unwrap();
        assert_eq!(
            sim.poll_events(),
            vec![UserEvent::Visible(1), UserEvent::Visible(2)]
        );
    }

    #[test]
    fn skeleton_tracked_only_after_request_and_calibration() {
        let mut sim = tracker(1);
        sim.update().unwrap();
        assert!(!sim.is_tracking_skeleton(1));

        for _ in 0..CALIBRATION_FRAMES {
            sim.update().unwrap();
        }
        assert!(!sim.is_tracking_skeleton(1));

        sim.start_tracking_skeleton(1);
        for _ in 0..CALIBRATION_FRAMES - 1 {
            sim.update().unwrap();
        }
        assert!(!sim.is_tracking_skeleton(1));
        sim.update().unwrap();
        assert!(sim.is_tracking_skeleton(1));
        assert!(!sim.is_tracking_skeleton(99));
    }

    #[test]
    fn joints_are_distinct_and_in_front_of_sensor() {
        let mut sim = tracker(1);
        sim.update().unwrap();
        let head = sim.joint_position(1, Joint::Head).unwrap().position;
        let foot = sim.joint_position(1, Joint::LeftFoot).unwrap().position;
        assert!(head.y > foot.y + 1000.0);
        for joint in Joint::ALL {
            let reading = sim.joint_position(1, joint).unwrap();
            assert!(reading.position.z > 1500.0);
            assert!((0.0..=1.0).contains(&reading.confidence));
        }
        assert!(sim.joint_position(2, Joint::Head).is_none());
    }

    #[test]
    fn same_seed_gives_same_motion() {
        let mut a = tracker(1);
        let mut b = tracker(1);
        for _ in 0..5 {
            a.update().unwrap();
            b.update().unwrap();
        }
        assert_eq!(
            a.joint_position(1, Joint::RightHand),
            b.joint_position(1, Joint::RightHand)
        );
    }

    #[test]
    fn depth_image_shows_dancer() {
        let mut sim = tracker(1);
        sim.update().unwrap();
        let image = sim.depth_image();
        assert_eq!(image.dimensions(), (320, 240));
        assert!(image.pixels().any(|p| p.0[0] < BACKGROUND_DEPTH_MM));
        assert!(image.pixels().any(|p| p.0[0] == BACKGROUND_DEPTH_MM));
    }
}
