//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server starts with zero configuration
//! on a home network.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use localmighty_shared::constants::{
    APP_NAME, DEFAULT_HTTP_PORT, HUB_SWEEP_INTERVAL_SECS, MAX_UPLOAD_SIZE,
};

/// Sub-directory of `data_dir` holding uploaded hub files.
pub const UPLOADS_DIR_NAME: &str = "hub-uploads";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for HTTP and WebSocket traffic.
    /// Env: `HTTP_ADDR`, or `HOST` / `PORT`
    /// Default: `0.0.0.0:3001`
    pub http_addr: SocketAddr,

    /// Directory holding the database and the upload directory.
    /// Env: `DATA_DIR`
    /// Default: `./data`
    pub data_dir: PathBuf,

    /// Maximum accepted upload, in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    pub max_upload_size: usize,

    /// Period of the expired-file sweep.
    /// Env: `HUB_SWEEP_INTERVAL_SECS`
    pub sweep_interval: Duration,

    /// Whether `phone_connected` and phone-origin sync events require a
    /// paired token on the connection.
    /// Env: `REQUIRE_PHONE_TOKEN` (true/false)
    /// Default: `true`
    pub require_phone_token: bool,

    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Base used for download URLs instead of the request's `Host` header,
    /// e.g. `http://192.168.1.10:3001`.
    /// Env: `PUBLIC_BASE_URL`
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            data_dir: PathBuf::from("./data"),
            max_upload_size: MAX_UPLOAD_SIZE,
            sweep_interval: Duration::from_secs(HUB_SWEEP_INTERVAL_SECS),
            require_phone_token: true,
            instance_name: APP_NAME.to_string(),
            public_base_url: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        } else {
            let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
            let port = match lookup("PORT") {
                Some(port) => port.parse::<u16>().unwrap_or_else(|_| {
                    tracing::warn!(value = %port, "Invalid PORT, using default");
                    DEFAULT_HTTP_PORT
                }),
                None => DEFAULT_HTTP_PORT,
            };
            match format!("{host}:{port}").parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(host = %host, "Invalid HOST, using default"),
            }
        }

        if let Some(dir) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(val) = lookup("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(val) = lookup("HUB_SWEEP_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => config.sweep_interval = Duration::from_secs(n),
                _ => tracing::warn!(value = %val, "Invalid HUB_SWEEP_INTERVAL_SECS, using default"),
            }
        }

        if let Some(val) = lookup("REQUIRE_PHONE_TOKEN") {
            config.require_phone_token = val != "false" && val != "0";
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(url) = lookup("PUBLIC_BASE_URL") {
            let url = url.trim_end_matches('/').to_string();
            if !url.is_empty() {
                config.public_base_url = Some(url);
            }
        }

        config
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOADS_DIR_NAME)
    }
}
