use std::time::Duration;

use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};

use crate::clip::SampleSource;
use crate::output::{AudioOutput, ClipSource};

impl<S: SampleSource> Source for ClipSource<S> {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.spec().channels
    }

    fn sample_rate(&self) -> u32 {
        self.spec().sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// [`AudioOutput`] backed by the default rodio output device.
///
/// Each attached clip gets a fresh `Sink`; dropping the previous sink stops
/// whatever it was playing.
pub struct RodioOutput {
    stream: OutputStream,
    sink: Option<Sink>,
    volume: f32,
}

impl RodioOutput {
    /// Open the default output device.
    pub fn open_default() -> Result<Self, rodio::StreamError> {
        let stream = OutputStreamBuilder::open_default_stream()?;
        Ok(Self {
            stream,
            sink: None,
            volume: 1.0,
        })
    }
}

impl AudioOutput for RodioOutput {
    fn attach(&mut self, source: ClipSource) {
        let spec = source.spec();
        tracing::info!(
            "rodio: attaching clip, sample_rate={}, channels={}",
            spec.sample_rate,
            spec.channels
        );
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(source);
        self.sink = Some(sink);
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.is_paused() && !sink.empty())
    }
}
