use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::types::Joint;

/// 应用配置管理模块
/// 集中管理所有配置项，提供默认值和配置验证

/// 图像发布的最小间隔 (毫秒)
pub const MIN_IMAGE_INTERVAL_MS: u64 = 5000;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub channels: ChannelNames,
    pub tracking: TrackingConfig,
    pub publish: PublishConfig,
    pub sensor: SensorConfig,
    pub app: RuntimeConfig,
}

/// MQTT配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: u8,
    pub keep_alive_secs: u64,
    pub request_capacity: usize,
    pub connect_timeout_secs: u64,
}

/// 发布主题
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelNames {
    pub state: String,
    pub image: String,
}

/// 跟踪置信度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub confidence_threshold: f32,
    pub reference_joint: Joint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    Inline,
    Pooled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointEncoding {
    /// `"head": "[ x, y, z ]"`
    VectorString,
    /// `"head": {"x": .., "y": .., "z": ..}`
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageEncoding {
    PixelArray,
    Base64,
}

/// 发布配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub mode: PublishMode,
    pub workers: usize,
    pub queue_capacity: usize,
    pub point_encoding: PointEncoding,
    pub include_user_id: bool,
    pub image_enabled: bool,
    pub image_interval_ms: u64,
    pub image_encoding: ImageEncoding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSource {
    Simulated,
    Replay,
}

/// 传感器数据源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub source: SensorSource,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub max_frames: Option<u64>,
    pub simulated_users: u32,
    pub seed: Option<u64>,
    pub replay_path: Option<String>,
    pub replay_loop: bool,
}

/// 运行时配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub status_interval_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "dancercast-01".to_string(),
            username: None,
            password: None,
            qos: 0,
            keep_alive_secs: 5,
            request_capacity: 64,
            connect_timeout_secs: 3,
        }
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            state: "dancer-state".to_string(),
            image: "dancer-image".to_string(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            reference_joint: Joint::Head,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            mode: PublishMode::Pooled,
            workers: 4,
            queue_capacity: 256,
            point_encoding: PointEncoding::VectorString,
            include_user_id: false,
            image_enabled: false,
            image_interval_ms: MIN_IMAGE_INTERVAL_MS,
            image_encoding: ImageEncoding::PixelArray,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            source: SensorSource::Simulated,
            fps: 30,
            width: 640,
            height: 480,
            max_frames: None,
            simulated_users: 1,
            seed: None,
            replay_path: None,
            replay_loop: false,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            status_interval_secs: 10,
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        std::fs::write(path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// 用环境变量覆盖 broker 配置 (MQTT_HOST / MQTT_PORT / MQTT_USER / MQTT_PASS)
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = env::var("MQTT_HOST") {
            self.broker.host = host;
        }
        if let Ok(port) = env::var("MQTT_PORT") {
            self.broker.port = port
                .parse::<u16>()
                .map_err(|e| ConfigError::ValidationError(format!("Invalid MQTT_PORT: {}", e)))?;
        }
        if let Ok(user) = env::var("MQTT_USER") {
            self.broker.username = Some(user);
        }
        if let Ok(pass) = env::var("MQTT_PASS") {
            self.broker.password = Some(pass);
        }
        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.tracking.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::ValidationError(
                "Confidence threshold must be within [0, 1]".to_string(),
            ));
        }

        if self.publish.image_interval_ms < MIN_IMAGE_INTERVAL_MS {
            return Err(ConfigError::ValidationError(format!(
                "Image interval must be at least {} ms",
                MIN_IMAGE_INTERVAL_MS
            )));
        }

        if self.publish.mode == PublishMode::Pooled
            && (self.publish.workers == 0 || self.publish.queue_capacity == 0)
        {
            return Err(ConfigError::ValidationError(
                "Pooled publishing needs at least one worker and a positive queue capacity"
                    .to_string(),
            ));
        }

        if self.channels.state.is_empty() || self.channels.image.is_empty() {
            return Err(ConfigError::ValidationError("Channel names must not be empty".to_string()));
        }

        if self.broker.qos > 2 {
            return Err(ConfigError::ValidationError("QoS must be 0, 1 or 2".to_string()));
        }

        if self.sensor.fps == 0 || self.sensor.fps > 120 {
            return Err(ConfigError::ValidationError("Sensor fps must be within 1..=120".to_string()));
        }

        if self.sensor.width == 0 || self.sensor.height == 0 {
            return Err(ConfigError::ValidationError("Depth image dimensions must be positive".to_string()));
        }

        if self.sensor.source == SensorSource::Replay && self.sensor.replay_path.is_none() {
            return Err(ConfigError::ValidationError(
                "Replay source requires sensor.replay_path".to_string(),
            ));
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// 配置管理器
pub struct ConfigManager {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            config_path: None,
        }
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let config = AppConfig::load_from_file(&path)?;
        Ok(Self {
            config,
            config_path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// 按命令行参数、默认文件、内置默认值的顺序解析配置
    pub fn discover(arg: Option<String>) -> Result<Self, ConfigError> {
        match arg {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from_file(default_path)
                } else {
                    Ok(Self::new())
                }
            }
        }
    }

    /// 获取当前配置
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn config_path(&self) -> Option<&std::path::Path> {
        self.config_path.as_deref()
    }

    /// 保存配置到指定文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.config.save_to_file(path)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

pub const DEFAULT_CONFIG_FILE: &str = "dancercast.toml";
