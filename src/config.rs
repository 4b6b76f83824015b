use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::DEFAULT_MAX_CHUNK_SIZE;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Root directory for stored document files.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    /// Maximum upload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/files")
}

fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// Chat model provider: `gemini` or `disabled`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Bound on a single model call; there are no retries.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl AiConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chunk_size == 0 {
        anyhow::bail!("chunking.max_chunk_size must be > 0");
    }

    if config.upload.max_file_size == 0 {
        anyhow::bail!("upload.max_file_size must be > 0");
    }

    if config.ai.is_enabled() && config.ai.model.is_none() {
        anyhow::bail!(
            "ai.model must be specified when provider is '{}'",
            config.ai.provider
        );
    }

    match config.ai.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown AI provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("docchat.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
[db]
path = "./data/docchat.sqlite"

[server]
bind = "127.0.0.1:5000"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(cfg.upload.max_file_size, 10 * 1024 * 1024);
        assert!(!cfg.ai.is_enabled());
    }

    #[test]
    fn gemini_requires_model() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
[db]
path = "./data/docchat.sqlite"

[server]
bind = "127.0.0.1:5000"

[ai]
provider = "gemini"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("ai.model"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
[db]
path = "./data/docchat.sqlite"

[server]
bind = "127.0.0.1:5000"

[ai]
provider = "openai"
model = "gpt-4o-mini"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Unknown AI provider"));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
[db]
path = "./data/docchat.sqlite"

[server]
bind = "127.0.0.1:5000"

[chunking]
max_chunk_size = 0
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
