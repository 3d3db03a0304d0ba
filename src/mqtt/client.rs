use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};
use log::{debug, error, info, warn};
use rumqttc::{Client, ConnectionError, Event, LastWill, MqttOptions, Outgoing, Packet, QoS};

use crate::config::BrokerConfig;
use crate::publish::{MessageSink, PublishError};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

/// Publish-only handle onto the broker connection.
#[derive(Clone)]
pub struct MqttSink {
    client: Client,
    qos: QoS,
}

impl MessageSink for MqttSink {
    fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .try_publish(channel, self.qos, false, payload)
            .map_err(|e| PublishError::Broker(e.to_string()))
    }
}

/// 长连接: 启动时建立一次, 退出时断开
pub struct BrokerConnection {
    sink: MqttSink,
    connected: Receiver<()>,
    closing: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl BrokerConnection {
    pub fn sink(&self) -> MqttSink {
        self.sink.clone()
    }

    /// Waits for the first ConnAck from the broker.
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        self.connected.recv_timeout(timeout).is_ok()
    }

    /// Sends DISCONNECT after everything already queued and joins the event-loop thread.
    pub fn close(self) {
        self.closing.store(true, Ordering::Relaxed);
        if let Err(e) = self.sink.client.disconnect() {
            warn!("MQTT disconnect request failed: {}", e);
        }
        if self.handle.join().is_err() {
            error!("MQTT thread panicked");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LoopStep {
    Continue,
    Backoff,
    Stop,
}

/// 事件循环只在断开请求发出后退出, 调用方的关闭信号不影响它
fn next_step(event: &Result<Event, ConnectionError>, closing: bool) -> LoopStep {
    match event {
        Ok(Event::Outgoing(Outgoing::Disconnect)) => LoopStep::Stop,
        Ok(_) => LoopStep::Continue,
        Err(ConnectionError::RequestsDone) => LoopStep::Stop,
        Err(_) if closing => LoopStep::Stop,
        Err(_) => LoopStep::Backoff,
    }
}

fn credentials(config: &BrokerConfig) -> Option<(String, String)> {
    match (&config.username, &config.password) {
        (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
        (None, None) => None,
        (Some(_), None) => {
            warn!("MQTT username is set without a password, connecting anonymously");
            None
        }
        (None, Some(_)) => {
            warn!("MQTT password is set without a username, connecting anonymously");
            None
        }
    }
}

pub fn connect(config: &BrokerConfig, will_topic: &str) -> Result<BrokerConnection, PublishError> {
    let mut mqtt_options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);

    if let Some((user, pass)) = credentials(config) {
        mqtt_options.set_credentials(user, pass);
    }

    let qos = qos_from_level(config.qos);
    mqtt_options
        .set_keep_alive(Duration::from_secs(config.keep_alive_secs))
        .set_last_will(LastWill::new(will_topic, "offline", qos, false));

    let (client, mut connection) = Client::new(mqtt_options, config.request_capacity);
    let (connected_tx, connected_rx) = bounded(1);
    let closing = Arc::new(AtomicBool::new(false));
    let thread_closing = Arc::clone(&closing);
    let endpoint = format!("{}:{}", config.host, config.port);

    let handle = thread::Builder::new()
        .name("mqtt".to_string())
        .spawn(move || {
            for event in connection.iter() {
                if let Ok(Event::Incoming(Packet::ConnAck(ack))) = &event {
                    info!("Connected to broker {} ({:?})", endpoint, ack.code);
                    let _ = connected_tx.try_send(());
                }

                match next_step(&event, thread_closing.load(Ordering::Relaxed)) {
                    LoopStep::Continue => {}
                    LoopStep::Stop => {
                        debug!("MQTT event loop stopping");
                        break;
                    }
                    LoopStep::Backoff => {
                        if let Err(e) = &event {
                            // 下一次轮询时 rumqttc 会自动重连
                            error!("MQTT connection error: {}", e);
                        }
                        thread::sleep(RECONNECT_BACKOFF);
                    }
                }
            }
            info!("MQTT thread finished");
        })?;

    Ok(BrokerConnection {
        sink: MqttSink { client, qos },
        connected: connected_rx,
        closing,
        handle,
    })
}
