use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info};

use crate::publish::{FramePublisher, FrameReport};
use crate::sensor::{SensorError, SkeletonTracker};
use crate::utils::now_millis;

/// Totals accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub peak_users: usize,
    pub states: u64,
    pub images: u64,
    pub untracked: u64,
    pub below_threshold: u64,
    pub incomplete: u64,
}

impl RunSummary {
    fn add(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.peak_users = self.peak_users.max(report.users);
        self.untracked += report.untracked as u64;
        self.states += report.published as u64;
        self.images += u64::from(report.image_published);
        self.below_threshold += report.below_threshold as u64;
        self.incomplete += report.incomplete as u64;
    }
}

/// 帧循环: 每帧更新传感器, 处理用户事件, 发布关节数据
pub struct FrameLoop {
    tracker: Box<dyn SkeletonTracker>,
    publisher: FramePublisher,
    frame_period: Duration,
    max_frames: Option<u64>,
    status_interval: Duration,
}

impl FrameLoop {
    pub fn new(
        tracker: Box<dyn SkeletonTracker>,
        publisher: FramePublisher,
        fps: u32,
        max_frames: Option<u64>,
        status_interval: Duration,
    ) -> Self {
        Self {
            tracker,
            publisher,
            frame_period: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            max_frames,
            status_interval,
        }
    }

    pub fn run(mut self, shutdown_signal: Arc<AtomicBool>) -> Result<RunSummary, SensorError> {
        let mut summary = RunSummary::default();
        let mut last_status = Instant::now();

        let result = loop {
            if shutdown_signal.load(Ordering::Relaxed) {
                info!("Shutdown requested, leaving frame loop");
                break Ok(());
            }
            if self.max_frames.is_some_and(|max| summary.frames >= max) {
                info!("Reached frame limit ({})", summary.frames);
                break Ok(());
            }

            let frame_start = Instant::now();
            match self.tracker.update() {
                Ok(true) => {}
                Ok(false) => {
                    info!("Sensor stream ended after {} frames", summary.frames);
                    break Ok(());
                }
                Err(e) => {
                    error!("Sensor update failed: {}", e);
                    break Err(e);
                }
            }

            self.publisher.handle_events(&mut *self.tracker);
            let report = self.publisher.on_frame(&*self.tracker, now_millis());
            summary.add(&report);

            if !self.status_interval.is_zero() && last_status.elapsed() >= self.status_interval {
                self.log_status(&summary);
                last_status = Instant::now();
            }

            if let Some(rest) = self.frame_period.checked_sub(frame_start.elapsed()) {
                thread::sleep(rest);
            }
        };

        self.log_status(&summary);
        self.publisher.shutdown();
        result.map(|()| summary)
    }

    fn log_status(&self, summary: &RunSummary) {
        let stats = self.publisher.stats().snapshot();
        info!(
            "frames={} states={} images={} sent={}/{} dropped={} failed={}",
            summary.frames,
            summary.states,
            summary.images,
            stats.states_sent,
            stats.images_sent,
            stats.dropped,
            stats.failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelNames, PublishConfig, PublishMode, TrackingConfig};
    use crate::publish::testing::RecordingSink;
    use crate::publish::{Dispatcher, PayloadEncoder, Publisher};
    use crate::sensor::{ReplayTracker, SimulatedTracker};
    use crate::types::Joint;
    use std::io::Cursor;

    fn frame_publisher(sink: &Arc<RecordingSink>, mode: PublishMode) -> FramePublisher {
        let publish = PublishConfig {
            mode,
            workers: 2,
            ..PublishConfig::default()
        };
        let inner = Publisher::new(
            sink.clone(),
            ChannelNames::default(),
            PayloadEncoder::from_config(&publish),
        );
        let dispatcher = Dispatcher::from_config(inner, &publish).unwrap();
        FramePublisher::new(&TrackingConfig::default(), &publish, dispatcher, now_millis())
    }

    #[test]
    fn simulated_session_publishes_after_calibration() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = SimulatedTracker::new(1, 120, 80, 60, Some(3));
        let frame_loop = FrameLoop::new(
            Box::new(tracker),
            frame_publisher(&sink, PublishMode::Pooled),
            120,
            Some(60),
            Duration::ZERO,
        );

        let summary = frame_loop.run(Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(summary.frames, 60);
        assert!(summary.states > 0);

        // 池在 run 返回前已排空
        let states = sink.on_channel("dancer-state");
        assert_eq!(states.len() as u64, summary.states);
        let value: serde_json::Value = serde_json::from_str(&states[0]).unwrap();
        assert_eq!(value["points"].as_object().unwrap().len(), Joint::COUNT);
    }

    #[test]
    fn replay_session_stops_when_recording_ends() {
        let line = {
            let joints: Vec<String> = Joint::ALL
                .iter()
                .map(|j| format!("\"{}\": {{\"x\": 1, \"y\": 2, \"z\": 1800, \"confidence\": 0.9}}", j.name()))
                .collect();
            format!("{{\"users\": [{{\"id\": 1, \"joints\": {{{}}}}}]}}", joints.join(", "))
        };
        let recording = Cursor::new(vec![line.clone(), line.clone(), line].join("\n"));
        let tracker = ReplayTracker::from_reader(recording, 32, 24, false).unwrap();

        let sink = Arc::new(RecordingSink::default());
        let frame_loop = FrameLoop::new(
            Box::new(tracker),
            frame_publisher(&sink, PublishMode::Inline),
            120,
            None,
            Duration::ZERO,
        );

        let summary = frame_loop.run(Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.states, 3);
        assert_eq!(sink.on_channel("dancer-state").len(), 3);
    }

    #[test]
    fn shutdown_flag_stops_before_first_frame() {
        let sink = Arc::new(RecordingSink::default());
        let frame_loop = FrameLoop::new(
            Box::new(SimulatedTracker::new(1, 30, 16, 12, Some(1))),
            frame_publisher(&sink, PublishMode::Inline),
            30,
            None,
            Duration::ZERO,
        );
        let summary = frame_loop.run(Arc::new(AtomicBool::new(true))).unwrap();
        assert_eq!(summary, RunSummary::default());
    }
}
