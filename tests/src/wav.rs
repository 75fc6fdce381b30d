use stream_clip::wav::encode_header;
use stream_clip::AudioSpec;

/// Helper for synthesizing WAV payloads.
pub struct WavFixture;

impl WavFixture {
    /// 16-bit PCM sine wave, the same sample on every channel.
    pub fn generate_sine_wav(
        freq_hz: f32,
        duration_secs: f32,
        sample_rate: u32,
        channels: u16,
    ) -> Vec<u8> {
        let frames = (sample_rate as f32 * duration_secs) as usize;
        let samples = (0..frames).flat_map(|i| {
            let t = i as f32 / sample_rate as f32;
            let s = ((2.0 * std::f32::consts::PI * freq_hz * t).sin() * i16::MAX as f32) as i16;
            std::iter::repeat_n(s, channels as usize)
        });
        Self::from_samples(
            AudioSpec {
                sample_rate,
                channels,
            },
            samples,
        )
    }

    /// Mono stream whose sample `k` is `counter_value(k)`.
    ///
    /// Lets a reader verify that every sample arrived once and in order.
    pub fn generate_counter_wav(samples: usize, sample_rate: u32) -> Vec<u8> {
        Self::from_samples(
            AudioSpec {
                sample_rate,
                channels: 1,
            },
            (0..samples).map(Self::counter_value),
        )
    }

    pub fn counter_value(k: usize) -> i16 {
        (k % 30_000) as i16
    }

    /// Mono stream of `samples` copies of `value`.
    pub fn generate_constant_wav(samples: usize, sample_rate: u32, value: i16) -> Vec<u8> {
        Self::from_samples(
            AudioSpec {
                sample_rate,
                channels: 1,
            },
            std::iter::repeat_n(value, samples),
        )
    }

    /// Header (with a `LIST` sub-chunk ahead of `data`) followed by `samples`.
    pub fn from_samples(spec: AudioSpec, samples: impl IntoIterator<Item = i16>) -> Vec<u8> {
        let pcm: Vec<u8> = samples.into_iter().flat_map(i16::to_le_bytes).collect();
        let mut wav = encode_header(
            spec,
            16,
            pcm.len() as u32,
            &[(*b"LIST", b"INFOISFT\x05\x00\x00\x00test\x00".to_vec())],
        );
        wav.extend_from_slice(&pcm);
        wav
    }

    /// Expected pull-callback output for a payload built by this fixture.
    pub fn expected_samples(wav: &[u8], header_size: usize) -> Vec<f32> {
        wav[header_size..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect()
    }

    /// Back-convert a pulled sample to the 16-bit value it came from.
    pub fn to_i16(sample: f32) -> i16 {
        (sample * 32768.0).round() as i16
    }
}

#[cfg(test)]
mod tests {
    use stream_clip::WavHeader;

    use super::*;

    #[test]
    fn sine_wav_parses() {
        let wav = WavFixture::generate_sine_wav(440.0, 0.1, 44100, 2);
        let header = WavHeader::parse(&wav).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.header_size + header.data_size as usize, wav.len());
    }

    #[test]
    fn counter_round_trips_through_f32() {
        for k in [0, 1, 12_345, 29_999, 30_000] {
            let v = WavFixture::counter_value(k);
            assert_eq!(WavFixture::to_i16(v as f32 / 32768.0), v);
        }
    }
}
