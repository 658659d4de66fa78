pub mod settings;

pub use settings::{AuthConfig, BridgeConfig, ServerConfig, Settings, UpstreamConfig};
