//! Raw-TCP HTTP fetcher feeding a [`MediaClip`].
//!
//! One fetch runs on one dedicated OS thread and makes a single attempt:
//! connect, send a minimal `GET`, read the response head, then copy the body
//! into the clip until it ends. There is no TLS, no redirect handling and no
//! retry; a failed download is restarted by a fresh play request.
//!
//! Error policy:
//! - anything that prevents the body from starting (resolve, connect, write,
//!   malformed or non-2xx response head) fails the clip;
//! - once the body is flowing, read errors and chunk framing violations end
//!   the download as if the server had finished it.
//!
//! Cancellation is cooperative: the clip's token is checked between reads, so a
//! cancelled fetch exits after its current blocking read returns.

use std::io::{BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};

use tracing::instrument;
use url::{Host, Url};

use crate::chunked::{BodyFraming, BodyReader, ResponseHead};
use crate::clip::MediaClip;
use crate::error::{ClipError, ClipResult};
use crate::settings::StreamSettings;
use crate::types::FetchOutcome;

/// Connection target derived from a track URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTarget {
    /// Host to resolve (IPv6 literals without brackets).
    pub host: String,
    pub port: u16,
    /// Value for the `Host` header.
    pub host_header: String,
    /// Request target: path plus query.
    pub path: String,
}

impl HttpTarget {
    pub fn from_url(url: &Url) -> ClipResult<Self> {
        if url.scheme() != "http" {
            return Err(ClipError::UnsupportedScheme(url.scheme().to_string()));
        }

        let host = match url.host() {
            Some(Host::Domain(d)) => d.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(ClipError::InvalidUrl(format!("{url}: missing host"))),
        };
        let port = url.port().unwrap_or(80);

        // `host_str` keeps the brackets around IPv6 literals.
        let host_str = url.host_str().unwrap_or(&host);
        let host_header = match url.port() {
            Some(p) if p != 80 => format!("{host_str}:{p}"),
            _ => host_str.to_string(),
        };

        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(q) = url.query() {
            path.push('?');
            path.push_str(q);
        }

        Ok(Self {
            host,
            port,
            host_header,
            path,
        })
    }

    /// Build the request bytes.
    pub fn request(&self, user_agent: &str) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
            self.path, self.host_header, user_agent
        )
    }
}

/// Blocking download of one clip.
pub struct Fetcher {
    clip: MediaClip,
    settings: StreamSettings,
}

impl Fetcher {
    pub fn new(clip: MediaClip, settings: StreamSettings) -> Self {
        Self { clip, settings }
    }

    fn connect(&self, target: &HttpTarget) -> ClipResult<TcpStream> {
        let addrs = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| ClipError::from(e).with_context("resolving host"))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.settings.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!("fetch: connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(match last_err {
            Some(e) => ClipError::from(e).with_context("connecting"),
            None => ClipError::msg(format!("{} resolved to no addresses", target.host)),
        })
    }

    /// Connect, send the request and read the response head.
    fn open(&self) -> ClipResult<(BodyReader<BufReader<TcpStream>>, Option<u64>)> {
        let target = HttpTarget::from_url(&self.clip.track().url)?;
        let mut stream = self.connect(&target)?;
        stream.set_read_timeout(self.settings.read_timeout)?;
        stream.set_nodelay(true)?;

        stream
            .write_all(target.request(&self.settings.user_agent).as_bytes())
            .map_err(|e| ClipError::from(e).with_context("sending request"))?;

        let mut reader = BufReader::with_capacity(self.settings.read_buffer_size, stream);
        let head = ResponseHead::read(&mut reader)?;
        if !head.is_success() {
            return Err(ClipError::HttpStatus {
                status: head.status,
                reason: head.reason,
            });
        }

        let framing = head.framing();
        tracing::debug!("fetch: {} {} ({:?})", head.status, head.reason, framing);
        let expected = match framing {
            BodyFraming::Length(len) => Some(len),
            _ => None,
        };
        Ok((BodyReader::new(reader, framing), expected))
    }

    /// Run the download to completion on the current thread.
    #[instrument(skip(self), fields(track = %self.clip.track().id))]
    pub fn run(self) -> FetchOutcome {
        let cancel = self.clip.cancel_token();
        if cancel.is_cancelled() {
            return FetchOutcome::Cancelled { bytes: 0 };
        }

        let (mut body, expected) = match self.open() {
            Ok(opened) => opened,
            Err(_) if cancel.is_cancelled() => return FetchOutcome::Cancelled { bytes: 0 },
            Err(e) => {
                tracing::error!("fetch: {} failed: {}", self.clip.track().url, e);
                let message = e.to_string();
                self.clip.mark_failed(message.clone());
                return FetchOutcome::Failed { message };
            }
        };
        self.clip
            .set_expected_len(expected.and_then(|len| usize::try_from(len).ok()));

        let mut buf = vec![0u8; self.settings.read_buffer_size.max(1)];
        let mut total = 0usize;
        loop {
            if cancel.is_cancelled() {
                tracing::debug!("fetch: cancelled after {} bytes", total);
                return FetchOutcome::Cancelled { bytes: total };
            }

            match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    tracing::trace!("fetch: read {} bytes, total {}", n, total);
                    self.clip.append(&buf[..n]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("fetch: body ended early after {} bytes: {}", total, e);
                    break;
                }
            }

            if let Some(message) = self.clip.failure() {
                tracing::warn!("fetch: clip rejected stream: {}", message);
                return FetchOutcome::Failed { message };
            }
        }

        if let Some(len) = expected {
            if (total as u64) < len {
                tracing::warn!("fetch: body shorter than Content-Length ({} < {})", total, len);
            }
        }

        self.clip.finish_download();
        match self.clip.failure() {
            Some(message) => FetchOutcome::Failed { message },
            None => FetchOutcome::Completed { bytes: total },
        }
    }
}

/// Start downloading `clip` on a dedicated thread.
pub fn spawn_fetch(
    clip: MediaClip,
    settings: StreamSettings,
) -> std::io::Result<JoinHandle<FetchOutcome>> {
    thread::Builder::new()
        .name("stream-clip-fetch".into())
        .spawn(move || Fetcher::new(clip, settings).run())
}
