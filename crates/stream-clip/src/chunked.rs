//! Minimal HTTP/1.1 response parsing: status line, headers and body framing.
//!
//! This is not an HTTP client. It understands exactly what the fetcher needs:
//! - a status line and a header block terminated by an empty line,
//! - `Transfer-Encoding: chunked` bodies (hex size line, data, CRLF, repeated
//!   until a zero-size chunk, then optional trailers),
//! - `Content-Length` bodies,
//! - bodies delimited by the server closing the connection.
//!
//! Body readers implement [`Read`] and report framing violations as
//! `io::ErrorKind::InvalidData` / `UnexpectedEof`; the fetcher decides what
//! such an error means for the download.

use std::io::{self, BufRead, Read};

use crate::error::{ClipError, ClipResult};

/// Upper bound for the whole response head.
const MAX_HEAD_BYTES: u64 = 64 * 1024;

/// Upper bound for a single chunk-size or trailer line.
const MAX_LINE_BYTES: u64 = 4 * 1024;

/// How the response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Chunked,
    Length(u64),
    UntilClose,
}

/// Status line and headers of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

/// Read one line (including its terminator) into `line`, reading at most `limit` bytes.
///
/// Returns the number of bytes read; 0 means EOF.
fn read_line_limited<R: BufRead>(r: &mut R, line: &mut Vec<u8>, limit: u64) -> io::Result<usize> {
    line.clear();
    let n = r.by_ref().take(limit).read_until(b'\n', line)?;
    if n > 0 && line.last() != Some(&b'\n') && n as u64 >= limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "line exceeds length limit",
        ));
    }
    Ok(n)
}

fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

impl ResponseHead {
    /// Read the response head, skipping interim `1xx` responses.
    pub fn read<R: BufRead>(r: &mut R) -> ClipResult<Self> {
        loop {
            let head = Self::read_one(r)?;
            if !(100..200).contains(&head.status) {
                return Ok(head);
            }
            tracing::debug!("http: skipping interim response {}", head.status);
        }
    }

    fn read_one<R: BufRead>(r: &mut R) -> ClipResult<Self> {
        let mut budget = MAX_HEAD_BYTES;
        let mut line = Vec::with_capacity(128);

        let n = read_line_limited(r, &mut line, budget)?;
        if n == 0 {
            return Err(ClipError::MalformedResponse(
                "connection closed before status line".into(),
            ));
        }
        budget = budget.saturating_sub(n as u64);

        let status_line = String::from_utf8_lossy(trim_line(&line)).into_owned();
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(ClipError::MalformedResponse(format!(
                "bad status line: {status_line:?}"
            )));
        }
        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| ClipError::MalformedResponse(format!("bad status code: {status_line:?}")))?;
        let reason = parts.next().unwrap_or_default().to_string();

        let mut headers = Vec::new();
        loop {
            if budget == 0 {
                return Err(ClipError::MalformedResponse("response head too large".into()));
            }
            let n = read_line_limited(r, &mut line, budget)?;
            if n == 0 {
                return Err(ClipError::MalformedResponse(
                    "connection closed inside response head".into(),
                ));
            }
            budget = budget.saturating_sub(n as u64);

            let trimmed = trim_line(&line);
            if trimmed.is_empty() {
                break;
            }
            let text = String::from_utf8_lossy(trimmed);
            match text.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
                None => tracing::warn!("http: ignoring malformed header line {:?}", text),
            }
        }

        Ok(Self {
            status,
            reason,
            headers,
        })
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.parse().ok()
    }

    /// Body framing per RFC 9112: chunked wins over `Content-Length`.
    pub fn framing(&self) -> BodyFraming {
        let chunked = self
            .header("transfer-encoding")
            .and_then(|te| te.rsplit(',').next())
            .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"));
        if chunked {
            BodyFraming::Chunked
        } else if let Some(len) = self.content_length() {
            BodyFraming::Length(len)
        } else {
            BodyFraming::UntilClose
        }
    }
}

/// Decoder for `Transfer-Encoding: chunked` bodies.
///
/// Yields the concatenated chunk payloads; returns `Ok(0)` once the
/// terminating zero-size chunk (and any trailers) have been consumed.
#[derive(Debug)]
pub struct ChunkedDecoder<R> {
    inner: R,
    /// Bytes left in the current chunk.
    remaining: u64,
    /// The CRLF after the current chunk's data is still unread.
    pending_crlf: bool,
    done: bool,
    line: Vec<u8>,
}

impl<R: BufRead> ChunkedDecoder<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            remaining: 0,
            pending_crlf: false,
            done: false,
            line: Vec::with_capacity(32),
        }
    }

    /// Whether the terminating chunk has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn read_line(&mut self) -> io::Result<&[u8]> {
        let n = read_line_limited(&mut self.inner, &mut self.line, MAX_LINE_BYTES)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside chunked body",
            ));
        }
        Ok(trim_line(&self.line))
    }

    fn read_size_line(&mut self) -> io::Result<u64> {
        let line = self.read_line()?;
        let size_field = line.split(|b| *b == b';').next().unwrap_or_default();
        let text = std::str::from_utf8(size_field)
            .map_err(|_| invalid_data("chunk size is not ASCII"))?
            .trim();
        if text.is_empty() {
            return Err(invalid_data("empty chunk size line"));
        }
        u64::from_str_radix(text, 16)
            .map_err(|_| invalid_data(format!("chunk size is not hex: {text:?}")))
    }

    fn expect_crlf(&mut self) -> io::Result<()> {
        if self.read_line()?.is_empty() {
            Ok(())
        } else {
            Err(invalid_data("missing CRLF after chunk data"))
        }
    }

    fn drain_trailers(&mut self) -> io::Result<()> {
        loop {
            let n = read_line_limited(&mut self.inner, &mut self.line, MAX_LINE_BYTES)?;
            // A server that closes right after the last chunk is tolerated.
            if n == 0 || trim_line(&self.line).is_empty() {
                return Ok(());
            }
        }
    }
}

impl<R: BufRead> Read for ChunkedDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }

        if self.remaining == 0 {
            if self.pending_crlf {
                self.expect_crlf()?;
                self.pending_crlf = false;
            }
            let size = self.read_size_line()?;
            tracing::trace!("chunked: next chunk {} bytes", size);
            if size == 0 {
                self.drain_trailers()?;
                self.done = true;
                return Ok(0);
            }
            self.remaining = size;
        }

        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside chunk data",
            ));
        }
        self.remaining -= n as u64;
        if self.remaining == 0 {
            self.pending_crlf = true;
        }
        Ok(n)
    }
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Response body reader selected from [`BodyFraming`].
#[derive(Debug)]
pub enum BodyReader<R> {
    Chunked(ChunkedDecoder<R>),
    Length(io::Take<R>),
    UntilClose(R),
}

impl<R: BufRead> BodyReader<R> {
    pub fn new(inner: R, framing: BodyFraming) -> Self {
        match framing {
            BodyFraming::Chunked => Self::Chunked(ChunkedDecoder::new(inner)),
            BodyFraming::Length(len) => Self::Length(inner.take(len)),
            BodyFraming::UntilClose => Self::UntilClose(inner),
        }
    }
}

impl<R: BufRead> Read for BodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Chunked(d) => d.read(buf),
            Self::Length(t) => t.read(buf),
            Self::UntilClose(r) => r.read(buf),
        }
    }
}
