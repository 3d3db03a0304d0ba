use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::info;
use serde::Deserialize;

use super::depth::render_depth;
use super::{JointReading, SensorError, SkeletonTracker, UserEvent};
use crate::types::{blank_depth_image, DepthImage, Joint, JointPositions, UserId, Vec3};

/// One line of a JSON-lines session recording.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedFrame {
    #[serde(default)]
    pub users: Vec<RecordedUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedUser {
    pub id: UserId,
    #[serde(default = "default_tracking")]
    pub tracking: bool,
    #[serde(default)]
    pub joints: HashMap<Joint, RecordedJoint>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecordedJoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_tracking() -> bool {
    true
}

fn default_confidence() -> f32 {
    1.0
}

/// Plays back a recorded session frame by frame.
pub struct ReplayTracker {
    frames: Vec<RecordedFrame>,
    cursor: usize,
    current: Option<usize>,
    looping: bool,
    present: BTreeSet<UserId>,
    requested: HashSet<UserId>,
    events: Vec<UserEvent>,
    depth: DepthImage,
}

impl ReplayTracker {
    pub fn open<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        looping: bool,
    ) -> Result<Self, SensorError> {
        let file = File::open(path.as_ref())?;
        let tracker = Self::from_reader(BufReader::new(file), width, height, looping)?;
        info!(
            "Loaded {} recorded frames from {}",
            tracker.frames.len(),
            path.as_ref().display()
        );
        Ok(tracker)
    }

    pub fn from_reader<R: BufRead>(
        reader: R,
        width: u32,
        height: u32,
        looping: bool,
    ) -> Result<Self, SensorError> {
        let mut frames = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame = serde_json::from_str::<RecordedFrame>(&line).map_err(|source| {
                SensorError::Parse {
                    line: index + 1,
                    source,
                }
            })?;
            frames.push(frame);
        }

        if frames.is_empty() {
            return Err(SensorError::EmptyRecording);
        }

        Ok(Self {
            frames,
            cursor: 0,
            current: None,
            looping,
            present: BTreeSet::new(),
            requested: HashSet::new(),
            events: Vec::new(),
            depth: blank_depth_image(width, height),
        })
    }

    fn current_user(&self, id: UserId) -> Option<&RecordedUser> {
        let frame = &self.frames[self.current?];
        frame.users.iter().find(|u| u.id == id)
    }

    fn skeleton(user: &RecordedUser) -> Option<JointPositions> {
        JointPositions::try_from_fn(|joint| {
            user.joints
                .get(&joint)
                .map(|j| Vec3::new(j.x, j.y, j.z))
        })
    }
}

impl SkeletonTracker for ReplayTracker {
    fn update(&mut self) -> Result<bool, SensorError> {
        if self.cursor >= self.frames.len() {
            if !self.looping {
                return Ok(false);
            }
            self.cursor = 0;
        }

        let frame = &self.frames[self.cursor];
        let ids: BTreeSet<UserId> = frame.users.iter().map(|u| u.id).collect();

        for id in self.present.difference(&ids) {
            self.events.push(UserEvent::Lost(*id));
            self.requested.remove(id);
        }
        for id in &ids {
            if self.present.contains(id) {
                self.events.push(UserEvent::Visible(*id));
            } else {
                self.events.push(UserEvent::New(*id));
            }
        }

        let skeletons: Vec<JointPositions> = frame.users.iter().filter_map(Self::skeleton).collect();
        render_depth(&mut self.depth, skeletons.iter());

        self.present = ids;
        self.current = Some(self.cursor);
        self.cursor += 1;
        Ok(true)
    }

    fn poll_events(&mut self) -> Vec<UserEvent> {
        std::mem::take(&mut self.events)
    }

    fn users(&self) -> Vec<UserId> {
        self.present.iter().copied().collect()
    }

    fn is_tracking_skeleton(&self, user: UserId) -> bool {
        self.requested.contains(&user) && self.current_user(user).is_some_and(|u| u.tracking)
    }

    fn start_tracking_skeleton(&mut self, user: UserId) {
        self.requested.insert(user);
    }

    fn joint_position(&self, user: UserId, joint: Joint) -> Option<JointReading> {
        let recorded = self.current_user(user)?.joints.get(&joint)?;
        Some(JointReading::new(
            Vec3::new(recorded.x, recorded.y, recorded.z),
            recorded.confidence,
        ))
    }

    fn depth_image(&self) -> &DepthImage {
        &self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::depth::BACKGROUND_DEPTH_MM;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn user_line(id: UserId, tracking: bool, confidence: f32) -> String {
        let joints: Vec<String> = Joint::ALL
            .iter()
            .enumerate()
            .map(|(i, joint)| {
                format!(
                    "\"{}\": {{\"x\": {}, \"y\": {}, \"z\": 2000, \"confidence\": {}}}",
                    joint.name(),
                    i * 10,
                    i * 20,
                    confidence
                )
            })
            .collect();
        format!(
            "{{\"id\": {}, \"tracking\": {}, \"joints\": {{{}}}}}",
            id,
            tracking,
            joints.join(", ")
        )
    }

    fn recording(lines: &[String]) -> Cursor<String> {
        Cursor::new(lines.join("\n"))
    }

    #[test]
    fn lifecycle_events_follow_user_presence() {
        let lines = vec![
            format!("{{\"users\": [{}]}}", user_line(1, true, 0.9)),
            format!(
                "{{\"users\": [{}, {}]}}",
                user_line(1, true, 0.9),
                user_line(2, false, 0.9)
            ),
            format!("{{\"users\": [{}]}}", user_line(2, true, 0.9)),
        ];
        let mut replay = ReplayTracker::from_reader(recording(&lines), 64, 48, false).unwrap();

        assert!(replay.update().unwrap());
        assert_eq!(replay.poll_events(), vec![UserEvent::New(1)]);

        assert!(replay.update().unwrap());
        assert_eq!(
            replay.poll_events(),
            vec![UserEvent::Visible(1), UserEvent::New(2)]
        );
        assert_eq!(replay.users(), vec![1, 2]);

        assert!(replay.update().unwrap());
        assert_eq!(
            replay.poll_events(),
            vec![UserEvent::Lost(1), UserEvent::Visible(2)]
        );

        assert!(!replay.update().unwrap());
    }

    #[test]
    fn tracking_requires_request_and_recorded_state() {
        let lines = vec![format!(
            "{{\"users\": [{}, {}]}}",
            user_line(1, true, 0.8),
            user_line(2, false, 0.8)
        )];
        let mut replay = ReplayTracker::from_reader(recording(&lines), 64, 48, false).unwrap();
        replay.update().unwrap();

        assert!(!replay.is_tracking_skeleton(1));
        replay.start_tracking_skeleton(1);
        replay.start_tracking_skeleton(2);
        assert!(replay.is_tracking_skeleton(1));
        assert!(!replay.is_tracking_skeleton(2));
    }

    #[test]
    fn joint_readings_come_from_recording() {
        let lines = vec![format!("{{\"users\": [{}]}}", user_line(4, true, 0.75))];
        let mut replay = ReplayTracker::from_reader(recording(&lines), 64, 48, false).unwrap();
        replay.update().unwrap();

        let elbow = replay.joint_position(4, Joint::LeftElbow).unwrap();
        assert_eq!(elbow.position, Vec3::new(30.0, 60.0, 2000.0));
        assert_eq!(elbow.confidence, 0.75);
        assert!(replay.joint_position(5, Joint::Head).is_none());
    }

    #[test]
    fn looping_replay_restarts_without_new_events() {
        let lines = vec![format!("{{\"users\": [{}]}}", user_line(1, true, 0.9))];
        let mut replay = ReplayTracker::from_reader(recording(&lines), 64, 48, true).unwrap();

        assert!(replay.update().unwrap());
        assert_eq!(replay.poll_events(), vec![UserEvent::New(1)]);
        assert!(replay.update().unwrap());
        assert_eq!(replay.poll_events(), vec![UserEvent::Visible(1)]);
    }

    /// Left joints at `x = -420`, right joints at `x = 420`.
    fn spread_line(y: &str, z: &str) -> String {
        let joints: Vec<String> = Joint::ALL
            .iter()
            .map(|joint| {
                let x = if joint.name().starts_with("left") { -420 } else { 420 };
                format!(
                    "\"{}\": {{\"x\": {}, \"y\": {}, \"z\": {}}}",
                    joint.name(),
                    x,
                    y,
                    z
                )
            })
            .collect();
        format!("{{\"users\": [{{\"id\": 1, \"joints\": {{{}}}}}]}}", joints.join(", "))
    }

    #[test]
    fn extreme_recorded_coordinates_render_promptly() {
        // 贴近传感器的关节, 以及溢出 f32 的坐标
        let lines = vec![spread_line("0", "20"), spread_line("1e39", "2000")];
        let mut replay = ReplayTracker::from_reader(recording(&lines), 640, 480, false).unwrap();

        let started = Instant::now();
        assert!(replay.update().unwrap());
        assert!(replay.update().unwrap());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(replay
            .depth_image()
            .pixels()
            .all(|p| p.0[0] == BACKGROUND_DEPTH_MM));
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let lines = vec!["{\"users\": []}".to_string(), "{not json".to_string()];
        match ReplayTracker::from_reader(recording(&lines), 64, 48, false) {
            Err(SensorError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn empty_recording_is_rejected() {
        let result = ReplayTracker::from_reader(Cursor::new(String::from("\n\n")), 64, 48, false);
        assert!(matches!(result, Err(SensorError::EmptyRecording)));
    }
}
