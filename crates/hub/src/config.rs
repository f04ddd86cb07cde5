// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the relay hub.
#[derive(Debug, Clone, clap::Args)]
pub struct HubConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "RELAY_HUB_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "RELAY_HUB_PORT")]
    pub port: u16,

    /// Maximum number of concurrently registered sessions.
    #[arg(long, default_value_t = 10_000, env = "RELAY_HUB_MAX_CONNECTIONS")]
    pub max_connections: usize,

    /// Keepalive ping cadence in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "RELAY_HUB_PING_INTERVAL_MS")]
    pub ping_interval_ms: u64,

    /// Read deadline in milliseconds; reset on every successful keepalive response.
    #[arg(long, default_value_t = 60_000, env = "RELAY_HUB_PONG_WAIT_MS")]
    pub pong_wait_ms: u64,

    /// Write/ping deadline in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "RELAY_HUB_WRITE_TIMEOUT_MS")]
    pub write_timeout_ms: u64,

    /// Advisory read buffer size in bytes (surfaced for operational parity; the
    /// underlying transport sizes its own buffers).
    #[arg(long, default_value_t = 1024, env = "RELAY_HUB_READ_BUFFER_SIZE")]
    pub read_buffer_size: usize,

    /// Advisory write buffer size in bytes.
    #[arg(long, default_value_t = 1024, env = "RELAY_HUB_WRITE_BUFFER_SIZE")]
    pub write_buffer_size: usize,

    /// Capacity of the shared dispatcher work queue.
    #[arg(long, default_value_t = 10_000, env = "RELAY_HUB_WORK_QUEUE_CAPACITY")]
    pub work_queue_capacity: usize,

    /// Number of dispatcher worker coroutines draining the work queue.
    #[arg(long, default_value_t = 4, env = "RELAY_HUB_DISPATCH_WORKERS")]
    pub dispatch_workers: usize,

    /// Per-session outbox capacity.
    #[arg(long, default_value_t = 100, env = "RELAY_HUB_OUTBOX_CAPACITY")]
    pub outbox_capacity: usize,
}

impl HubConfig {
    pub fn ping_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_wait(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pong_wait_ms)
    }

    pub fn write_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            max_connections: 10_000,
            ping_interval_ms: 30_000,
            pong_wait_ms: 60_000,
            write_timeout_ms: 10_000,
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            work_queue_capacity: 10_000,
            dispatch_workers: 4,
            outbox_capacity: 100,
        }
    }
}
