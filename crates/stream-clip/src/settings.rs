//! Settings for `stream-clip`.
//!
//! `StreamSettings` controls the network fetch (timeouts, request headers, read
//! sizes), how much audio must be buffered before playback starts, and how the
//! player maps focus changes onto output volume.

use std::time::Duration;

/// Settings for fetching and playing a streamed clip.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    // ----------------------------
    // Network
    // ----------------------------
    /// Timeout for establishing the TCP connection.
    /// Default: 10 seconds.
    pub connect_timeout: Duration,

    /// Timeout for a single blocking socket read. `None` blocks indefinitely.
    /// A read that times out ends the download like any other read error.
    /// Default: 30 seconds.
    pub read_timeout: Option<Duration>,

    /// Value of the `User-Agent` request header.
    pub user_agent: String,

    /// Size of the buffer used for socket reads and non-chunked bodies.
    /// Default: 16 KiB.
    pub read_buffer_size: usize,

    // ----------------------------
    // Buffering
    // ----------------------------
    /// Bytes required before the first header parse attempt.
    /// Default: 1024.
    pub header_probe_bytes: usize,

    /// If no header has parsed once this many bytes are buffered, the clip fails.
    /// Default: 64 KiB.
    pub max_header_bytes: usize,

    /// Bytes buffered before the clip reports ready and playback may begin.
    /// Default: 64 KiB (~0.75s of 44.1kHz mono 16-bit audio).
    pub ready_threshold_bytes: usize,

    // ----------------------------
    // Output
    // ----------------------------
    /// Samples requested from the clip per pull by `ClipSource`.
    /// Default: 1024.
    pub pull_block_samples: usize,

    /// Silence output while the host application is unfocused.
    /// Default: false.
    pub mute_when_unfocused: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(30)),
            user_agent: concat!("stream-clip/", env!("CARGO_PKG_VERSION")).to_string(),
            read_buffer_size: 16 * 1024,
            header_probe_bytes: 1024,
            max_header_bytes: 64 * 1024,
            ready_threshold_bytes: 64 * 1024,
            pull_block_samples: 1024,
            mute_when_unfocused: false,
        }
    }
}

impl StreamSettings {
    /// Create default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-read socket timeout.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the socket read buffer size.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the number of bytes required before parsing the header.
    pub fn with_header_probe_bytes(mut self, bytes: usize) -> Self {
        self.header_probe_bytes = bytes;
        self
    }

    /// Set the header give-up limit.
    pub fn with_max_header_bytes(mut self, bytes: usize) -> Self {
        self.max_header_bytes = bytes;
        self
    }

    /// Set the readiness threshold.
    pub fn with_ready_threshold_bytes(mut self, bytes: usize) -> Self {
        self.ready_threshold_bytes = bytes;
        self
    }

    /// Set the pull block size in samples.
    pub fn with_pull_block_samples(mut self, samples: usize) -> Self {
        self.pull_block_samples = samples.max(1);
        self
    }

    /// Mute while the host application is unfocused.
    pub fn with_mute_when_unfocused(mut self, mute: bool) -> Self {
        self.mute_when_unfocused = mute;
        self
    }
}
