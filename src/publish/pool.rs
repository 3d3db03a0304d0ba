use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender, TrySendError};
use log::{debug, error, info, warn};

use super::{MessageSink, PayloadEncoder, PublishError, PublishStats};
use crate::config::{ChannelNames, PublishConfig, PublishMode};
use crate::types::{DepthImage, StateMessage};

/// Work item handed from the frame thread to the publishers.
#[derive(Debug, Clone)]
pub enum PublishJob {
    State(StateMessage),
    Image { timestamp: i64, image: DepthImage },
}

/// Encodes a job and writes it to its channel. Failures are logged and counted.
#[derive(Clone)]
pub struct Publisher {
    sink: Arc<dyn MessageSink>,
    channels: ChannelNames,
    encoder: PayloadEncoder,
    stats: Arc<PublishStats>,
}

impl Publisher {
    pub fn new(sink: Arc<dyn MessageSink>, channels: ChannelNames, encoder: PayloadEncoder) -> Self {
        Self {
            sink,
            channels,
            encoder,
            stats: Arc::new(PublishStats::default()),
        }
    }

    pub fn stats(&self) -> &Arc<PublishStats> {
        &self.stats
    }

    pub fn deliver(&self, job: PublishJob) {
        let result = match &job {
            PublishJob::State(message) => self
                .encoder
                .encode_state(message)
                .and_then(|payload| self.sink.publish(&self.channels.state, payload)),
            PublishJob::Image { image, .. } => {
                let payload = self.encoder.encode_image(image);
                self.sink.publish(&self.channels.image, payload)
            }
        };

        match (result, &job) {
            (Ok(()), PublishJob::State(_)) => self.stats.record_state(),
            (Ok(()), PublishJob::Image { timestamp, .. }) => {
                debug!("Depth image published (t={})", timestamp);
                self.stats.record_image();
            }
            (Err(e), _) => {
                let failed = self.stats.record_failure();
                warn!("Publish failed ({} total): {}", failed, e);
            }
        }
    }
}

/// Bounded fire-and-forget worker pool. No ordering between jobs.
pub struct PublishPool {
    sender: Option<Sender<PublishJob>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<PublishStats>,
}

impl PublishPool {
    pub fn start(publisher: Publisher, workers: usize, capacity: usize) -> Result<Self, PublishError> {
        let (sender, receiver) = bounded::<PublishJob>(capacity);
        let stats = Arc::clone(publisher.stats());

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let receiver = receiver.clone();
            let publisher = publisher.clone();
            let handle = thread::Builder::new()
                .name(format!("publish-{}", i))
                .spawn(move || {
                    // 通道关闭且队列清空后退出
                    for job in receiver.iter() {
                        publisher.deliver(job);
                    }
                    debug!("Publish worker {} exiting", i);
                })?;
            handles.push(handle);
        }

        info!("Publish pool started: {} workers, queue capacity {}", workers, capacity);
        Ok(Self {
            sender: Some(sender),
            workers: handles,
            stats,
        })
    }

    /// Never blocks; a full queue drops the job.
    pub fn submit(&self, job: PublishJob) -> Result<(), PublishError> {
        let sender = self.sender.as_ref().ok_or(PublishError::QueueClosed)?;
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.stats.record_drop();
                if dropped == 1 || dropped % 100 == 0 {
                    warn!("Publish queue full, dropped {} jobs so far", dropped);
                }
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(PublishError::QueueClosed),
        }
    }

    pub fn stats(&self) -> &Arc<PublishStats> {
        &self.stats
    }

    /// Closes the queue and waits for workers to drain it.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Publish worker panicked");
            }
        }
        info!("Publish pool drained");
    }
}

impl Drop for PublishPool {
    fn drop(&mut self) {
        self.close();
    }
}

pub enum Dispatcher {
    Inline(Publisher),
    Pooled(PublishPool),
}

impl Dispatcher {
    pub fn from_config(publisher: Publisher, config: &PublishConfig) -> Result<Self, PublishError> {
        match config.mode {
            PublishMode::Inline => Ok(Dispatcher::Inline(publisher)),
            PublishMode::Pooled => Ok(Dispatcher::Pooled(PublishPool::start(
                publisher,
                config.workers,
                config.queue_capacity,
            )?)),
        }
    }

    pub fn dispatch(&self, job: PublishJob) {
        match self {
            Dispatcher::Inline(publisher) => publisher.deliver(job),
            Dispatcher::Pooled(pool) => {
                if let Err(e) = pool.submit(job) {
                    let failed = pool.stats().record_failure();
                    warn!("Dispatch failed ({} total): {}", failed, e);
                }
            }
        }
    }

    pub fn stats(&self) -> &Arc<PublishStats> {
        match self {
            Dispatcher::Inline(publisher) => publisher.stats(),
            Dispatcher::Pooled(pool) => pool.stats(),
        }
    }

    pub fn shutdown(self) {
        if let Dispatcher::Pooled(pool) = self {
            pool.shutdown();
        }
    }
}
