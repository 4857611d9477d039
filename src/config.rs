use std::net::SocketAddr;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Service configuration loaded from environment variables.
///
/// Variables use the `EMOTION_` prefix with `__` between nested keys,
/// e.g. `EMOTION_SERVER__PORT=7000` or `EMOTION_AUDIO__INPUT_DIMS=1,40,1`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub image: ImageModelConfig,

    #[serde(default)]
    pub audio: AudioModelConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Where uploads are written before preprocessing
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_mb: default_body_limit_mb(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_body_limit_mb() -> usize {
    5
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb * 1024 * 1024
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageModelConfig {
    #[serde(default = "default_image_model_path")]
    pub model_path: PathBuf,

    /// Fetched into `model_path` at startup when the file is missing
    #[serde(default)]
    pub model_url: Option<String>,

    #[serde(default = "default_input_op")]
    pub input_op: String,

    #[serde(default = "default_output_op")]
    pub output_op: String,
}

impl Default for ImageModelConfig {
    fn default() -> Self {
        Self {
            model_path: default_image_model_path(),
            model_url: None,
            input_op: default_input_op(),
            output_op: default_output_op(),
        }
    }
}

fn default_image_model_path() -> PathBuf {
    PathBuf::from("./model/image_classifier.pb")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioModelConfig {
    #[serde(default = "default_audio_model_path")]
    pub model_path: PathBuf,

    #[serde(default)]
    pub model_url: Option<String>,

    /// JSON artifact holding the fitted label encoder categories
    #[serde(default = "default_encoder_path")]
    pub encoder_path: PathBuf,

    #[serde(default)]
    pub encoder_url: Option<String>,

    #[serde(default = "default_input_op")]
    pub input_op: String,

    #[serde(default = "default_output_op")]
    pub output_op: String,

    /// Tensor shape fed to the audio graph; must hold exactly one MFCC vector
    #[serde(default = "default_audio_input_dims")]
    pub input_dims: Vec<u64>,
}

impl Default for AudioModelConfig {
    fn default() -> Self {
        Self {
            model_path: default_audio_model_path(),
            model_url: None,
            encoder_path: default_encoder_path(),
            encoder_url: None,
            input_op: default_input_op(),
            output_op: default_output_op(),
            input_dims: default_audio_input_dims(),
        }
    }
}

fn default_audio_model_path() -> PathBuf {
    PathBuf::from("./model/audio_classifier.pb")
}

fn default_encoder_path() -> PathBuf {
    PathBuf::from("./model/label_encoder.json")
}

fn default_audio_input_dims() -> Vec<u64> {
    vec![1, crate::preprocess::audio::N_MFCC as u64]
}

fn default_input_op() -> String {
    "x".to_string()
}

fn default_output_op() -> String {
    "Identity".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_chat_base_url")]
    pub base_url: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_chat_model(),
            base_url: default_chat_base_url(),
        }
    }
}

fn default_chat_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_chat_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl AppConfig {
    /// Load configuration from `EMOTION_*` environment variables.
    ///
    /// `GEMINI_API_KEY` is honoured when `EMOTION_CHAT__API_KEY` is unset.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("EMOTION")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("audio.input_dims")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: AppConfig = config.try_deserialize()?;
        if app.chat.api_key.is_none() {
            app.chat.api_key = std::env::var("GEMINI_API_KEY").ok();
        }
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.body_limit_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.image.input_op, "x");
        assert_eq!(config.audio.output_op, "Identity");
        assert_eq!(config.audio.input_dims, vec![1, 40]);
        assert_eq!(config.chat.model, "gemini-1.5-flash");
        assert!(config.chat.api_key.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig::default();
        let addr = server.socket_addr().unwrap();
        assert_eq!(addr.port(), 7000);
    }

    #[test]
    fn test_bad_host_is_an_error() {
        let server = ServerConfig {
            host: "not a host".into(),
            ..ServerConfig::default()
        };
        assert!(server.socket_addr().is_err());
    }
}
