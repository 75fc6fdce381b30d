//! Playback state machine.
//!
//! [`MediaPlayer`] lives on the host's update thread and is the only code that
//! touches the [`AudioOutput`]. It is driven two ways:
//! - directly, by code already running on the update thread;
//! - through a [`PlayerHandle`] from any other thread, whose requests are queued
//!   and applied by the next [`MediaPlayer::tick`].
//!
//! State transitions all go through one mutex-guarded [`PlaybackInfo`] record
//! shared with the handles, and each transition boundary publishes a
//! [`PlayerEvent`] on a broadcast channel.
//!
//! Lifecycle of one track:
//! ```text
//! play ──► Playing (download running, output detached)
//!            │ clip ready (tick)            ──► output attached, PlaybackBegan
//!            │ pause / resume                ──► Stopped(Pause) / Playing(Resume)
//!            │ output drained (tick)         ──► Stopped(Completed), PlaybackEnded
//!            │ stop / stop_immediate          ──► Stopped(Stop), PlaybackEnded
//!            │ fetch or header failure (tick) ──► Error
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::clip::MediaClip;
use crate::fetch::spawn_fetch;
use crate::output::{AudioOutput, ClipSource};
use crate::queue::{ActionQueue, ActionSender};
use crate::settings::StreamSettings;
use crate::types::{
    FetchOutcome, PlaybackInfo, PlayerEvent, PlayerState, RunReason, StopReason, Track,
};

const EVENT_CAPACITY: usize = 64;

/// State shared between the player and its handles.
#[derive(Default)]
struct Shared {
    info: Mutex<PlaybackInfo>,
    /// Cancellation token of the clip currently downloading, for `stop_immediate`.
    active_cancel: Mutex<Option<CancellationToken>>,
}

/// The clip currently owned by the player.
struct ActiveClip {
    clip: MediaClip,
    fetch: Option<JoinHandle<FetchOutcome>>,
    /// The clip has been handed to the output.
    attached: bool,
    /// `PlaybackEnded` has already been published for this clip.
    ended: bool,
}

/// A replaced or stopped download whose thread has not exited yet.
struct RetiredFetch {
    track: Track,
    handle: JoinHandle<FetchOutcome>,
}

/// Streaming WAV player driving an [`AudioOutput`].
pub struct MediaPlayer<O: AudioOutput> {
    output: O,
    settings: StreamSettings,
    shared: Arc<Shared>,
    events: broadcast::Sender<PlayerEvent>,
    queue: ActionQueue<MediaPlayer<O>>,
    current: Option<ActiveClip>,
    retired: Vec<RetiredFetch>,
    volume: f32,
}

impl<O: AudioOutput> MediaPlayer<O> {
    pub fn new(output: O, settings: StreamSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            output,
            settings,
            shared: Arc::new(Shared::default()),
            events,
            queue: ActionQueue::new(),
            current: None,
            retired: Vec::new(),
            volume: 1.0,
        }
    }

    /// Thread-safe handle whose requests are applied on the next `tick`.
    pub fn handle(&self) -> PlayerHandle<O> {
        PlayerHandle {
            actions: self.queue.sender(),
            shared: self.shared.clone(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Snapshot of the current status.
    pub fn playback_info(&self) -> PlaybackInfo {
        self.shared.info.lock().clone()
    }

    /// The clip currently owned by the player, if any.
    pub fn current_clip(&self) -> Option<&MediaClip> {
        self.current.as_ref().map(|c| &c.clip)
    }

    pub fn download_progress(&self) -> f32 {
        self.current_clip().map_or(0.0, MediaClip::progress)
    }

    pub fn position(&self) -> Duration {
        self.current_clip().map_or(Duration::ZERO, MediaClip::position)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn emit(&self, event: PlayerEvent) {
        tracing::debug!("player event: {:?}", event);
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn transition(&self, f: impl FnOnce(&mut PlaybackInfo)) {
        let mut info = self.shared.info.lock();
        let before = (info.state, info.stop_reason, info.run_reason);
        f(&mut info);
        let after = (info.state, info.stop_reason, info.run_reason);
        if before != after {
            tracing::info!("player: {:?} -> {:?}", before, after);
        }
    }

    fn state(&self) -> PlayerState {
        self.shared.info.lock().state
    }

    /// Cancel and release the current clip. Returns whether playback had begun
    /// and not yet been reported as ended.
    fn release_current(&mut self) -> Option<(Track, bool)> {
        let active = self.current.take()?;
        active.clip.cancel();
        *self.shared.active_cancel.lock() = None;

        if active.attached {
            self.output.stop();
        }
        active.clip.clear();

        let track = active.clip.track().clone();
        if let Some(handle) = active.fetch {
            self.retired.push(RetiredFetch {
                track: track.clone(),
                handle,
            });
        }
        Some((track, active.attached && !active.ended))
    }

    /// Start streaming `track`, replacing anything currently loaded.
    pub fn play(&mut self, track: Track) {
        if let Some((old, attached)) = self.release_current() {
            tracing::debug!("player: replacing {}", old);
            if attached {
                self.emit(PlayerEvent::PlaybackEnded {
                    track: old,
                    reason: StopReason::Stop,
                });
            }
        }

        tracing::info!("player: play {}", track);
        let clip = MediaClip::new(track.clone(), &self.settings);
        let fetch = match spawn_fetch(clip.clone(), self.settings.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("player: could not spawn fetch thread: {}", e);
                self.transition(|info| {
                    info.track = Some(track.clone());
                    info.state = PlayerState::Error;
                });
                self.emit(PlayerEvent::Error {
                    track,
                    message: e.to_string(),
                });
                return;
            }
        };

        *self.shared.active_cancel.lock() = Some(clip.cancel_token());
        self.current = Some(ActiveClip {
            clip,
            fetch: Some(fetch),
            attached: false,
            ended: false,
        });
        self.transition(|info| {
            info.track = Some(track.clone());
            info.state = PlayerState::Playing;
            info.stop_reason = StopReason::None;
            info.run_reason = RunReason::Play;
        });
        self.emit(PlayerEvent::DownloadBegan { track });
    }

    /// Pause playback, keeping the buffered audio and position.
    pub fn pause(&mut self) {
        if self.state() != PlayerState::Playing {
            tracing::debug!("player: pause ignored in state {:?}", self.state());
            return;
        }
        if self.current.as_ref().is_some_and(|c| c.attached) {
            self.output.pause();
        }
        self.transition(|info| {
            info.state = PlayerState::Stopped;
            info.stop_reason = StopReason::Pause;
        });
    }

    /// Resume a paused track.
    pub fn resume(&mut self) {
        if !self.shared.info.lock().is_paused() {
            tracing::debug!("player: resume ignored, not paused");
            return;
        }
        if self.current.as_ref().is_some_and(|c| c.attached) {
            self.output.play();
        }
        self.transition(|info| {
            info.state = PlayerState::Playing;
            info.stop_reason = StopReason::None;
            info.run_reason = RunReason::Resume;
        });
    }

    /// Stop playback, cancel the download and drop buffered audio.
    pub fn stop(&mut self) {
        let Some((track, attached)) = self.release_current() else {
            tracing::debug!("player: stop ignored, nothing loaded");
            return;
        };
        self.transition(|info| {
            info.state = PlayerState::Stopped;
            info.stop_reason = StopReason::Stop;
            info.run_reason = RunReason::None;
        });
        if attached {
            self.emit(PlayerEvent::PlaybackEnded {
                track,
                reason: StopReason::Stop,
            });
        }
    }

    /// Same transition as [`stop`](Self::stop). Through a [`PlayerHandle`] the
    /// download is additionally cancelled from the calling thread before the
    /// transition is queued.
    pub fn stop_immediate(&mut self) {
        self.stop();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.shared.info.lock().muted = muted;
        self.apply_volume();
    }

    /// Record host focus; mutes output while unfocused if configured to.
    pub fn set_app_focused(&mut self, focused: bool) {
        self.shared.info.lock().app_focused = focused;
        self.apply_volume();
    }

    fn effective_volume(&self) -> f32 {
        let info = self.shared.info.lock();
        if info.muted || (!info.app_focused && self.settings.mute_when_unfocused) {
            0.0
        } else {
            self.volume
        }
    }

    fn apply_volume(&mut self) {
        let volume = self.effective_volume();
        self.output.set_volume(volume);
    }

    /// Per-frame update. Never blocks.
    ///
    /// Runs queued handle requests, reports finished downloads, surfaces clip
    /// failures, attaches a ready clip to the output and detects the end of
    /// playback.
    pub fn tick(&mut self) {
        let queue = self.queue.clone();
        queue.drain(self);

        self.reap_retired();
        self.collect_fetch();

        let state = self.state();
        let Some(active) = self.current.as_ref() else {
            return;
        };

        if let Some(message) = active.clip.failure() {
            if state != PlayerState::Error {
                self.fail_current(message);
            }
            return;
        }

        // A clip that drains while paused completes on the first tick after resume.
        if state != PlayerState::Playing {
            return;
        }

        if !active.attached {
            if active.clip.is_ready() {
                self.attach_current();
            }
        } else if !self.output.is_playing() {
            let track = active.clip.track().clone();
            if let Some(active) = self.current.as_mut() {
                active.ended = true;
            }
            self.transition(|info| {
                info.state = PlayerState::Stopped;
                info.stop_reason = StopReason::Completed;
            });
            self.emit(PlayerEvent::PlaybackEnded {
                track,
                reason: StopReason::Completed,
            });
        }
    }

    fn attach_current(&mut self) {
        let Some(active) = self.current.as_mut() else {
            return;
        };
        let Some(source) = ClipSource::new(active.clip.clone(), self.settings.pull_block_samples)
        else {
            return;
        };
        active.attached = true;
        let track = active.clip.track().clone();

        self.output.attach(source);
        self.apply_volume();
        self.output.play();
        self.emit(PlayerEvent::PlaybackBegan { track });
    }

    fn fail_current(&mut self, message: String) {
        let Some(active) = self.current.as_mut() else {
            return;
        };
        tracing::error!("player: {} failed: {}", active.clip.track(), message);
        let track = active.clip.track().clone();
        if active.attached {
            active.attached = false;
            self.output.stop();
        }
        self.transition(|info| {
            info.state = PlayerState::Error;
        });
        self.emit(PlayerEvent::Error { track, message });
    }

    /// Join the current fetch thread once it has exited.
    fn collect_fetch(&mut self) {
        let Some(active) = self.current.as_mut() else {
            return;
        };
        if !active.fetch.as_ref().is_some_and(JoinHandle::is_finished) {
            return;
        }
        let Some(handle) = active.fetch.take() else {
            return;
        };
        let outcome = join_fetch(handle);
        if let FetchOutcome::Failed { message } = &outcome {
            active.clip.mark_failed(message.clone());
        }
        let track = active.clip.track().clone();
        *self.shared.active_cancel.lock() = None;
        self.emit(PlayerEvent::DownloadEnded { track, outcome });
    }

    fn reap_retired(&mut self) {
        let mut i = 0;
        while i < self.retired.len() {
            if self.retired[i].handle.is_finished() {
                let RetiredFetch { track, handle } = self.retired.swap_remove(i);
                let outcome = join_fetch(handle);
                self.emit(PlayerEvent::DownloadEnded { track, outcome });
            } else {
                i += 1;
            }
        }
    }
}

fn join_fetch(handle: JoinHandle<FetchOutcome>) -> FetchOutcome {
    handle.join().unwrap_or_else(|_| FetchOutcome::Failed {
        message: "fetch thread panicked".into(),
    })
}

impl<O: AudioOutput> Drop for MediaPlayer<O> {
    fn drop(&mut self) {
        if let Some(active) = &self.current {
            active.clip.cancel();
        }
    }
}

/// Thread-safe control handle for a [`MediaPlayer`].
///
/// Requests are queued and take effect on the player's next `tick`, in the
/// order they were made. `playback_info` reads the shared snapshot directly.
pub struct PlayerHandle<O: AudioOutput> {
    actions: ActionSender<MediaPlayer<O>>,
    shared: Arc<Shared>,
}

impl<O: AudioOutput> Clone for PlayerHandle<O> {
    fn clone(&self) -> Self {
        Self {
            actions: self.actions.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<O: AudioOutput + 'static> PlayerHandle<O> {
    /// Queue an arbitrary action against the player.
    ///
    /// Returns false if the player has been dropped.
    pub fn execute(&self, action: impl FnOnce(&mut MediaPlayer<O>) + Send + 'static) -> bool {
        self.actions.send(action)
    }

    pub fn play(&self, track: Track) -> bool {
        self.execute(move |p| p.play(track))
    }

    pub fn pause(&self) -> bool {
        self.execute(MediaPlayer::pause)
    }

    pub fn resume(&self) -> bool {
        self.execute(MediaPlayer::resume)
    }

    pub fn stop(&self) -> bool {
        self.execute(MediaPlayer::stop)
    }

    /// Cancel the in-flight download right away, then queue the stop transition.
    pub fn stop_immediate(&self) -> bool {
        if let Some(token) = self.shared.active_cancel.lock().as_ref() {
            token.cancel();
        }
        self.execute(MediaPlayer::stop_immediate)
    }

    pub fn set_volume(&self, volume: f32) -> bool {
        self.execute(move |p| p.set_volume(volume))
    }

    pub fn set_muted(&self, muted: bool) -> bool {
        self.execute(move |p| p.set_muted(muted))
    }

    pub fn set_app_focused(&self, focused: bool) -> bool {
        self.execute(move |p| p.set_app_focused(focused))
    }

    pub fn playback_info(&self) -> PlaybackInfo {
        self.shared.info.lock().clone()
    }
}
