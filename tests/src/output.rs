use stream_clip::{AudioOutput, ClipSource};

/// In-memory [`AudioOutput`] that only advances when a test pumps it.
///
/// Records every call, and every sample it pulled while playing.
#[derive(Default)]
pub struct RecordingOutput {
    source: Option<ClipSource>,
    playing: bool,
    drained: bool,
    pub volume: f32,
    pub calls: Vec<&'static str>,
    pub samples: Vec<f32>,
}

impl RecordingOutput {
    /// Pull up to `max` samples if playing. Returns how many were pulled.
    pub fn pump(&mut self, max: usize) -> usize {
        if !self.playing {
            return 0;
        }
        let Some(source) = self.source.as_mut() else {
            return 0;
        };
        let before = self.samples.len();
        for _ in 0..max {
            match source.next() {
                Some(s) => self.samples.push(s),
                None => {
                    self.drained = true;
                    break;
                }
            }
        }
        self.samples.len() - before
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }
}

impl AudioOutput for RecordingOutput {
    fn attach(&mut self, source: ClipSource) {
        self.calls.push("attach");
        self.source = Some(source);
        self.drained = false;
        self.samples.clear();
    }

    fn play(&mut self) {
        self.calls.push("play");
        self.playing = true;
    }

    fn pause(&mut self) {
        self.calls.push("pause");
        self.playing = false;
    }

    fn stop(&mut self) {
        self.calls.push("stop");
        self.playing = false;
        self.source = None;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn is_playing(&self) -> bool {
        self.playing && self.source.is_some() && !self.drained
    }
}
