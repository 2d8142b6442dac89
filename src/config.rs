use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::media::MediaConstraints;
use crate::session::SessionConfig;

/// Config file looked up when none is given (extension resolved by `config`)
pub const DEFAULT_CONFIG_PATH: &str = "config/stream-recorder";

/// Prefix of environment overrides, e.g. `STREAM_RECORDER__SERVICE__HTTP__PORT`
pub const ENV_PREFIX: &str = "STREAM_RECORDER";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub recording: RecordingConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl HttpConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Where the upload server keeps files
    pub uploads_dir: String,
    /// Where the local catalog lives
    pub history_dir: String,
    pub max_upload_bytes: usize,
}

impl StorageConfig {
    pub fn uploads_path(&self) -> PathBuf {
        expand_path(&self.uploads_dir)
    }

    pub fn history_path(&self) -> PathBuf {
        expand_path(&self.history_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    pub device: String,
    pub mime_type: String,
    pub timeslice_ms: u64,
    pub acquire_timeout_ms: u64,
    pub flush_timeout_ms: u64,
}

impl RecordingConfig {
    /// Session settings for a new recording
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            device: self.device.clone(),
            constraints: MediaConstraints {
                mime_type: self.mime_type.clone(),
                timeslice_ms: self.timeslice_ms,
                ..MediaConstraints::default()
            },
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            flush_timeout: Duration::from_millis(self.flush_timeout_ms),
            ..SessionConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Upload finished recordings to `base_url`
    pub enabled: bool,
    pub base_url: String,
}

impl Config {
    /// Layer defaults, the optional file at `path` and the environment
    pub fn load(path: &str) -> Result<Self> {
        let settings = with_defaults(config::Config::builder())?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Built-in defaults only
    pub fn defaults() -> Result<Self> {
        Ok(with_defaults(config::Config::builder())?
            .build()?
            .try_deserialize()?)
    }
}

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

fn with_defaults(builder: Builder) -> Result<Builder> {
    let defaults = MediaConstraints::default();
    Ok(builder
        .set_default("service.name", "stream-recorder")?
        .set_default("service.http.bind", "127.0.0.1")?
        .set_default("service.http.port", 8000)?
        .set_default("storage.uploads_dir", "./uploads")?
        .set_default("storage.history_dir", "~/.stream-recorder/history")?
        .set_default("storage.max_upload_bytes", 100 * 1024 * 1024)?
        .set_default("recording.device", "default")?
        .set_default("recording.mime_type", defaults.mime_type)?
        .set_default("recording.timeslice_ms", defaults.timeslice_ms as i64)?
        .set_default("recording.acquire_timeout_ms", 10_000)?
        .set_default("recording.flush_timeout_ms", 5_000)?
        .set_default("remote.enabled", false)?
        .set_default("remote.base_url", "http://localhost:8000")?)
}

/// Expand `~` and `$VARS`; unknown variables leave the path as written
fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::defaults().unwrap();
        assert_eq!(cfg.service.http.addr(), "127.0.0.1:8000");
        assert_eq!(cfg.storage.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(cfg.recording.timeslice_ms, 1000);
        assert!(!cfg.remote.enabled);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[recording]\ndevice = \"usb-cam\"\ntimeslice_ms = 250\n\n[remote]\nenabled = true"
        )
        .unwrap();

        let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.recording.device, "usb-cam");
        assert_eq!(cfg.recording.timeslice_ms, 250);
        assert!(cfg.remote.enabled);
        assert_eq!(cfg.service.name, "stream-recorder");

        let session = cfg.recording.session_config();
        assert_eq!(session.device, "usb-cam");
        assert_eq!(session.constraints.timeslice_ms, 250);
        assert_eq!(session.flush_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_tilde_expansion() {
        let storage = StorageConfig {
            uploads_dir: "~/uploads".into(),
            history_dir: "/tmp/history".into(),
            max_upload_bytes: 1,
        };
        assert!(!storage.uploads_path().starts_with("~"));
        assert_eq!(storage.history_path(), PathBuf::from("/tmp/history"));
    }
}
