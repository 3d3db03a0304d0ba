mod app;
mod config;
mod logger;
mod mqtt;
mod publish;
mod sensor;
mod types;
mod utils;

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use log::{error, info, warn};

use app::FrameLoop;
use config::ConfigManager;
use publish::{Dispatcher, FramePublisher, PayloadEncoder, Publisher};
use utils::{format_timestamp, now_millis};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger::init_logger();
    dotenv().ok(); // 加载 .env 文件

    let mut args = env::args().skip(1);
    let first = args.next();
    if first.as_deref() == Some("--init") {
        let path = args
            .next()
            .unwrap_or_else(|| config::DEFAULT_CONFIG_FILE.to_string());
        ConfigManager::new().save_to_file(&path)?;
        info!("Default configuration written to {}", path);
        return Ok(());
    }

    let mut manager = ConfigManager::discover(first)?;
    match manager.config_path() {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file, using defaults"),
    }
    manager.get_config_mut().apply_env_overrides()?;
    let config = manager.get_config().clone();
    config.validate()?;

    let started_ms = now_millis();
    info!("DancerCast starting at {}", format_timestamp(started_ms));

    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let ctrlc_shutdown = Arc::clone(&shutdown_signal);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down");
        ctrlc_shutdown.store(true, Ordering::Relaxed);
    })?;

    let broker = mqtt::connect(&config.broker, &config.channels.state)?;
    if broker.wait_connected(Duration::from_secs(config.broker.connect_timeout_secs)) {
        info!("Broker is reachable at {}:{}", config.broker.host, config.broker.port);
    } else {
        warn!(
            "No ConnAck from {}:{} yet, publishing anyway",
            config.broker.host, config.broker.port
        );
    }

    let tracker = sensor::build_tracker(&config.sensor)?;
    info!(
        "Sensor source {:?} ({}x{} @ {} fps)",
        config.sensor.source, config.sensor.width, config.sensor.height, config.sensor.fps
    );

    let publisher = Publisher::new(
        Arc::new(broker.sink()),
        config.channels.clone(),
        PayloadEncoder::from_config(&config.publish),
    );
    let dispatcher = Dispatcher::from_config(publisher, &config.publish)?;
    let frame_publisher = FramePublisher::new(&config.tracking, &config.publish, dispatcher, started_ms);

    let frame_loop = FrameLoop::new(
        tracker,
        frame_publisher,
        config.sensor.fps,
        config.sensor.max_frames,
        Duration::from_secs(config.app.status_interval_secs),
    );
    // run 返回前已排空发布队列, 之后再断开
    let result = frame_loop.run(Arc::clone(&shutdown_signal));
    broker.close();

    match result {
        Ok(summary) => {
            info!(
                "Finished: {} frames, {} state messages, {} images (peak users {}, untracked {}, low confidence {}, incomplete {})",
                summary.frames,
                summary.states,
                summary.images,
                summary.peak_users,
                summary.untracked,
                summary.below_threshold,
                summary.incomplete
            );
            Ok(())
        }
        Err(e) => {
            error!("Frame loop failed: {}", e);
            Err(e.into())
        }
    }
}
