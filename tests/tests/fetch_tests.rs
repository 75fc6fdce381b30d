//! Fetch integration tests.
//!
//! These drive a real fetch thread against local servers and compare what the
//! clip yields through the pull callback with the payload that was served:
//! - chunked bodies with exact chunk boundaries,
//! - `Content-Length` bodies and hyper's own chunked streaming,
//! - framing violations and early closes, which end the download,
//! - HTTP errors and refused connections, which fail it,
//! - cancellation while the body is still arriving.

use std::time::Duration;

use rstest::rstest;
use stream_clip::{
    spawn_fetch, FetchOutcome, MediaClip, SampleSource, StreamSettings, Track, WavHeader,
};
use stream_clip_tests::{wait_until, ChunkEnd, ChunkPlan, ChunkedServer, ClipServer, WavFixture};
use url::Url;

fn download(url: Url) -> (FetchOutcome, MediaClip) {
    let settings = StreamSettings::default();
    let clip = MediaClip::new(Track::new("t", url), &settings);
    let outcome = spawn_fetch(clip.clone(), settings)
        .unwrap()
        .join()
        .unwrap();
    (outcome, clip)
}

/// Pull everything currently buffered.
fn pull_all(clip: &MediaClip) -> Vec<f32> {
    let mut out = Vec::new();
    let mut block = vec![0.0f32; 4096];
    loop {
        let n = clip.read_interleaved(&mut block);
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&block[..n]);
    }
}

fn ten_second_tone() -> (Vec<u8>, Vec<f32>) {
    let wav = WavFixture::generate_sine_wav(440.0, 10.0, 44100, 1);
    let header = WavHeader::parse(&wav).unwrap();
    let expected = WavFixture::expected_samples(&wav, header.header_size);
    assert_eq!(expected.len(), 441_000);
    (wav, expected)
}

#[rstest]
#[case::single_chunk(0)]
#[case::three_boundaries(3)]
#[case::many_small_chunks(400)]
fn chunked_download_matches_content_length_download(#[case] boundaries: usize) {
    let (wav, expected) = ten_second_tone();

    let plan = ChunkPlan::split(&wav, boundaries);
    assert_eq!(plan.chunk_count(), boundaries + 1);
    let chunked = ChunkedServer::start(plan);
    let plain = ClipServer::start([("tone.wav", wav.clone())]);

    let (outcome, chunked_clip) = download(chunked.url("/tone.wav"));
    assert_eq!(outcome, FetchOutcome::Completed { bytes: wav.len() });
    assert_eq!(chunked.requests(), 1);

    let (outcome, plain_clip) = download(plain.url("/tone.wav"));
    assert_eq!(outcome, FetchOutcome::Completed { bytes: wav.len() });

    assert_eq!(chunked_clip.downloaded_bytes(), plain_clip.downloaded_bytes());
    assert_eq!(chunked_clip.progress(), 1.0);
    assert_eq!(
        chunked_clip.estimated_duration(),
        Some(Duration::from_secs(10))
    );

    let from_chunked = pull_all(&chunked_clip);
    let from_plain = pull_all(&plain_clip);
    assert_eq!(from_chunked.len(), expected.len());
    assert!(from_chunked == expected, "chunked samples differ from source");
    assert!(from_plain == expected, "content-length samples differ from source");
    assert!(chunked_clip.is_exhausted());
}

#[test]
fn streamed_body_without_length_completes() {
    let (wav, expected) = ten_second_tone();
    let server = ClipServer::start([("tone.wav", wav.clone())]);

    let (outcome, clip) = download(server.url("/stream/tone.wav"));
    assert_eq!(outcome, FetchOutcome::Completed { bytes: wav.len() });
    assert!(pull_all(&clip) == expected);
}

#[rstest]
#[case::garbage_size_line(ChunkEnd::Garbage)]
#[case::closed_inside_chunk(ChunkEnd::Close)]
fn broken_framing_ends_download_as_completed(#[case] end: ChunkEnd) {
    let wav = WavFixture::generate_sine_wav(220.0, 0.5, 8000, 2);
    let header = WavHeader::parse(&wav).unwrap();
    let server = ChunkedServer::start(ChunkPlan::sized(&wav, 1000).with_end(end));

    let (outcome, clip) = download(server.url("/tone.wav"));
    assert_eq!(outcome, FetchOutcome::Completed { bytes: wav.len() });
    assert!(clip.is_download_complete());
    assert!(clip.failure().is_none());
    assert!(clip.is_ready());
    assert!(pull_all(&clip) == WavFixture::expected_samples(&wav, header.header_size));
}

#[test]
fn http_error_fails_clip() {
    let server = ClipServer::start([("tone.wav", Vec::new())]);

    let (outcome, clip) = download(server.url("/missing.wav"));
    let FetchOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("404"), "{message}");
    assert_eq!(clip.failure(), Some(message));
    assert!(!clip.is_ready());
    assert!(clip.is_exhausted());
}

#[test]
fn refused_connection_fails_clip() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url: Url = format!("http://127.0.0.1:{port}/gone.wav").parse().unwrap();

    let (outcome, clip) = download(url);
    assert!(matches!(outcome, FetchOutcome::Failed { .. }), "{outcome:?}");
    assert!(clip.failure().is_some());
}

#[test]
fn truncated_header_fails_on_completion() {
    let server = ClipServer::start([("short.wav", b"RIFF\x10\x00\x00\x00WAVEfmt ".to_vec())]);

    let (outcome, clip) = download(server.url("/short.wav"));
    let FetchOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("WAV"), "{message}");
    assert!(clip.header().is_none());
}

#[test]
fn cancel_stops_slow_download() {
    let wav = WavFixture::generate_constant_wav(80_000, 8000, 1000);
    let server = ClipServer::start([("slow.wav", wav.clone())]);

    let settings = StreamSettings::default();
    let clip = MediaClip::new(Track::new("slow", server.url("/slow/slow.wav")), &settings);
    let fetch = spawn_fetch(clip.clone(), settings).unwrap();

    assert!(wait_until(Duration::from_secs(10), || clip.downloaded_bytes() > 0));
    clip.cancel();
    let outcome = fetch.join().unwrap();

    let FetchOutcome::Cancelled { bytes } = outcome else {
        panic!("expected cancellation, got {outcome:?}");
    };
    assert!(bytes < wav.len());
    assert!(!clip.is_download_complete());
    assert!(clip.is_exhausted());
}
