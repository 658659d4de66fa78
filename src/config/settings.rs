use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

/// 入站鉴权：客户端以 `Authorization: Bearer <api_key>` 访问网关。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub api_key: String,
}

/// 上游会话凭据与元数据。启动时注入，运行期只读；轮换凭据需重启进程。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub authorization: String,
    pub gtoken: String,
    pub channel_id: String,
    #[serde(default = "default_client_version")]
    pub client_version: String,
}

fn default_base_url() -> String {
    "https://api.popai.pro".to_string()
}

fn default_client_version() -> String {
    "1.3.6".to_string()
}

/// 桥接层节奏与超时参数。默认值即线上行为，调参不改变协议语义。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Pause after each forwarded stream chunk, in milliseconds.
    pub chunk_interval_ms: u64,
    /// Pause after assembling a fan-out response, in milliseconds.
    pub aggregate_pause_ms: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Overall timeout for one non-streaming upstream call.
    pub request_timeout_secs: u64,
    /// Total connection attempts for one streaming request.
    pub max_stream_attempts: u32,
    /// Upper bound on concurrent upstream calls during fan-out.
    pub max_concurrent_calls: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: 35,
            aggregate_pause_ms: 1000,
            connect_timeout_secs: 10,
            read_timeout_secs: 250,
            request_timeout_secs: 30,
            max_stream_attempts: 3,
            max_concurrent_calls: 5,
        }
    }
}

impl BridgeConfig {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }

    pub fn aggregate_pause(&self) -> Duration {
        Duration::from_millis(self.aggregate_pause_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Settings {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = Self::find_config_file()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let config_content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&config_content)?;
        Ok(settings)
    }

    fn find_config_file() -> Result<String, Box<dyn std::error::Error>> {
        let possible_names = ["custom-config.toml", "config.toml"];

        for name in &possible_names {
            if Path::new(name).exists() {
                return Ok(name.to_string());
            }
        }

        Err("Configuration file not found. Please create custom-config.toml or config.toml".into())
    }
}
