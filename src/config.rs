//! Process-wide configuration, loaded from the environment.

use std::time::Duration;

/// Connection and OMS configuration, overridable per-client.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4222,
            connect_timeout: Duration::from_secs_f64(5.0),
            handshake_timeout: Duration::from_secs_f64(5.0),
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs_f64(1.0),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Build a `Config` from `NATS_HOST`/`NATS_PORT` and friends, falling
    /// back to the documented defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut c = Self::default();
        if let Ok(v) = std::env::var("NATS_HOST") {
            c.host = v;
        }
        if let Ok(v) = std::env::var("NATS_PORT") {
            if let Ok(p) = v.parse() {
                c.port = p;
            }
        }
        if let Ok(v) = std::env::var("NATS_CONNECT_TIMEOUT_SECS") {
            if let Ok(f) = v.parse() {
                c.connect_timeout = Duration::from_secs_f64(f);
            }
        }
        if let Ok(v) = std::env::var("NATS_HANDSHAKE_TIMEOUT_SECS") {
            if let Ok(f) = v.parse() {
                c.handshake_timeout = Duration::from_secs_f64(f);
            }
        }
        if let Ok(v) = std::env::var("NATS_RECONNECT_ATTEMPTS") {
            if let Ok(n) = v.parse() {
                c.reconnect_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("NATS_RECONNECT_DELAY_SECS") {
            if let Ok(f) = v.parse() {
                c.reconnect_delay = Duration::from_secs_f64(f);
            }
        }
        if let Ok(v) = std::env::var("OMS_HEARTBEAT_SECS") {
            if let Ok(n) = v.parse() {
                c.heartbeat_interval = Duration::from_secs(n);
            }
        }
        c
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Initialize `tracing` from `RUST_LOG`, defaulting to `info`.
    pub fn init_logging() {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
