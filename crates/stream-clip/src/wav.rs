//! RIFF/WAVE header parsing for partially downloaded streams.
//!
//! The parser only looks at the header: it walks `RIFF`/`WAVE`, the `fmt `
//! sub-chunk and any number of auxiliary sub-chunks (`LIST`, `fact`, ...) until
//! it reaches `data`. The offset just past the `data` sub-chunk header is the
//! first PCM byte and is recorded as [`WavHeader::header_size`].
//!
//! Every read is bounds-checked against the input slice, so a header that has
//! not fully arrived yet yields [`WavError::Truncated`] and can simply be
//! retried once more bytes are buffered.

use std::time::Duration;

use crate::error::WavError;
use crate::types::AudioSpec;

/// Size of the canonical 44-byte header (no auxiliary sub-chunks).
pub const MIN_HEADER_LEN: usize = 44;

/// WAVE format tag for integer PCM.
pub const WAVE_FORMAT_PCM: u16 = 1;

/// `data` sizes written by encoders that do not know the final length.
const STREAMING_DATA_SIZES: [u32; 2] = [0, u32::MAX];

/// Parsed RIFF/WAVE header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_id: [u8; 4],
    pub chunk_size: u32,
    pub format: [u8; 4],
    pub fmt_chunk_id: [u8; 4],
    pub fmt_chunk_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_chunk_id: [u8; 4],
    /// Declared size of the PCM payload in bytes.
    pub data_size: u32,
    /// Offset of the first PCM byte.
    pub header_size: usize,
}

/// Bounds-checked little-endian reader over a byte slice.
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WavError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(WavError::Truncated(self.pos))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn tag(&mut self) -> Result<[u8; 4], WavError> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    fn u16(&mut self) -> Result<u16, WavError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, WavError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip(&mut self, n: usize) -> Result<(), WavError> {
        self.take(n).map(|_| ())
    }
}

impl WavHeader {
    /// Parse a header from the beginning of `buf`.
    ///
    /// `buf` may contain PCM data (or nothing) after the header; only the
    /// header bytes are inspected.
    pub fn parse(buf: &[u8]) -> Result<Self, WavError> {
        if buf.len() < MIN_HEADER_LEN {
            return Err(WavError::TooShort(buf.len()));
        }

        let mut r = ByteReader::new(buf);

        let chunk_id = r.tag()?;
        if &chunk_id != b"RIFF" {
            return Err(WavError::NotRiff);
        }
        let chunk_size = r.u32()?;
        let format = r.tag()?;
        if &format != b"WAVE" {
            return Err(WavError::NotWave);
        }

        let fmt_chunk_id = r.tag()?;
        if &fmt_chunk_id != b"fmt " {
            return Err(WavError::MissingFmt(fmt_chunk_id));
        }
        let fmt_chunk_size = r.u32()?;
        if fmt_chunk_size < 16 {
            return Err(WavError::MalformedFmt("sub-chunk shorter than 16 bytes"));
        }

        let audio_format = r.u16()?;
        let channels = r.u16()?;
        let sample_rate = r.u32()?;
        let byte_rate = r.u32()?;
        let block_align = r.u16()?;
        let bits_per_sample = r.u16()?;

        // 18 carries a 2-byte cbSize; larger sizes carry the extensible block.
        r.skip(fmt_chunk_size as usize - 16)?;

        if channels == 0 {
            return Err(WavError::MalformedFmt("zero channels"));
        }
        if sample_rate == 0 {
            return Err(WavError::MalformedFmt("zero sample rate"));
        }
        if block_align == 0 {
            return Err(WavError::MalformedFmt("zero block align"));
        }

        loop {
            let id = r.tag()?;
            let size = r.u32()?;
            if &id == b"data" {
                return Ok(Self {
                    chunk_id,
                    chunk_size,
                    format,
                    fmt_chunk_id,
                    fmt_chunk_size,
                    audio_format,
                    channels,
                    sample_rate,
                    byte_rate,
                    block_align,
                    bits_per_sample,
                    data_chunk_id: id,
                    data_size: size,
                    header_size: r.pos,
                });
            }

            // RIFF sub-chunks are word aligned.
            let padded = (size as usize).saturating_add(size as usize & 1);
            tracing::trace!(
                "wav: skipping sub-chunk {:?} ({} bytes)",
                String::from_utf8_lossy(&id),
                size
            );
            r.skip(padded)?;
        }
    }

    /// Whether the pull callback can convert these samples.
    pub fn is_pcm16(&self) -> bool {
        self.audio_format == WAVE_FORMAT_PCM && self.bits_per_sample == 16
    }

    /// Output spec of this stream.
    pub fn spec(&self) -> AudioSpec {
        AudioSpec {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Whether the `data` size is a placeholder written by a streaming encoder.
    pub fn has_unknown_length(&self) -> bool {
        STREAMING_DATA_SIZES.contains(&self.data_size)
    }

    /// Declared PCM payload length, if known.
    pub fn payload_len(&self) -> Option<usize> {
        (!self.has_unknown_length()).then_some(self.data_size as usize)
    }

    /// Header plus declared payload, i.e. the expected download size.
    pub fn total_len(&self) -> Option<usize> {
        self.payload_len().map(|len| self.header_size + len)
    }

    /// Duration implied by the declared payload length and byte rate.
    pub fn estimated_duration(&self) -> Option<Duration> {
        let len = self.payload_len()?;
        if self.byte_rate == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(len as f64 / self.byte_rate as f64))
    }

    /// Playback position after `bytes` of payload have been consumed.
    pub fn position_of(&self, bytes: usize) -> Duration {
        if self.byte_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(bytes as f64 / self.byte_rate as f64)
    }
}

/// Build a canonical PCM header, optionally preceded by auxiliary sub-chunks.
///
/// Used by tests and fixtures to synthesize streams.
pub fn encode_header(
    spec: AudioSpec,
    bits_per_sample: u16,
    data_size: u32,
    extra_chunks: &[([u8; 4], Vec<u8>)],
) -> Vec<u8> {
    let block_align = spec.channels * (bits_per_sample / 8);
    let byte_rate = spec.sample_rate * block_align as u32;

    let mut body = Vec::with_capacity(64);
    body.extend_from_slice(b"WAVE");
    body.extend_from_slice(b"fmt ");
    body.extend_from_slice(&16u32.to_le_bytes());
    body.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    body.extend_from_slice(&spec.channels.to_le_bytes());
    body.extend_from_slice(&spec.sample_rate.to_le_bytes());
    body.extend_from_slice(&byte_rate.to_le_bytes());
    body.extend_from_slice(&block_align.to_le_bytes());
    body.extend_from_slice(&bits_per_sample.to_le_bytes());
    for (id, payload) in extra_chunks {
        body.extend_from_slice(id);
        body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        body.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            body.push(0);
        }
    }
    body.extend_from_slice(b"data");
    body.extend_from_slice(&data_size.to_le_bytes());

    let riff_size = (body.len() as u32).saturating_add(data_size);
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(&body);
    out
}
