//! Concurrency tests for `MediaClip`: one writer appending in irregular pieces
//! while a reader pulls blocks, as the fetch thread and audio driver do.

use std::thread;
use std::time::Duration;

use stream_clip::{MediaClip, SampleSource, StreamSettings, Track};
use stream_clip_tests::WavFixture;

fn counter_clip(settings: &StreamSettings) -> MediaClip {
    MediaClip::new(
        Track::new("counter", "http://127.0.0.1/counter.wav".parse().unwrap()),
        settings,
    )
}

#[test]
fn concurrent_append_and_pull_preserve_every_sample_in_order() {
    const SAMPLES: usize = 200_000;
    const SAMPLE_RATE: u32 = 8000;
    let wav = WavFixture::generate_counter_wav(SAMPLES, SAMPLE_RATE);

    let settings = StreamSettings::default()
        .with_header_probe_bytes(44)
        .with_ready_threshold_bytes(0);
    let clip = counter_clip(&settings);

    let writer = {
        let clip = clip.clone();
        thread::spawn(move || {
            let mut offset = 0;
            let mut step = 1;
            while offset < wav.len() {
                let end = (offset + step).min(wav.len());
                clip.append(&wav[offset..end]);
                offset = end;
                // Odd and even piece sizes, so samples straddle appends.
                step = step % 997 + 13;
                if offset % 5 == 0 {
                    thread::yield_now();
                }
            }
            clip.finish_download();
        })
    };

    let reader = {
        let clip = clip.clone();
        thread::spawn(move || {
            let mut next = 0usize;
            let mut block = [0.0f32; 256];
            loop {
                let n = clip.read_interleaved(&mut block);
                for s in &block[..n] {
                    assert_eq!(
                        WavFixture::to_i16(*s),
                        WavFixture::counter_value(next),
                        "sample {next}"
                    );
                    next += 1;
                }
                assert!(block[n..].iter().all(|s| *s == 0.0), "tail must be silence");
                if n == 0 {
                    if clip.is_exhausted() {
                        return next;
                    }
                    thread::yield_now();
                }
            }
        })
    };

    writer.join().unwrap();
    let read = reader.join().unwrap();
    assert_eq!(read, SAMPLES);
    assert!(clip.failure().is_none());
    assert_eq!(clip.buffered_bytes(), 0);
    assert_eq!(
        clip.position(),
        Duration::from_secs_f64(SAMPLES as f64 / SAMPLE_RATE as f64)
    );
}

#[test]
fn readiness_is_visible_across_threads() {
    let wav = WavFixture::generate_constant_wav(4000, 8000, 7);
    let settings = StreamSettings::default()
        .with_header_probe_bytes(44)
        .with_ready_threshold_bytes(4096);
    let clip = counter_clip(&settings);

    let writer = {
        let clip = clip.clone();
        thread::spawn(move || {
            clip.append(&wav[..100]);
            let early = clip.is_ready();
            clip.append(&wav[100..]);
            early
        })
    };
    let was_ready_early = writer.join().unwrap();

    assert!(!was_ready_early, "100 bytes are below the ready threshold");
    assert!(clip.is_ready());
    assert!(clip.header().is_some());
}
