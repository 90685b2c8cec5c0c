//! Headless media element.
//!
//! Simulates the observable behavior of a host video element well enough to
//! drive the synchronizer without a display server: commands mutate a small
//! state block and completion events are published on the shared channel.
//! Tests (and host-less callers) control decode latency explicitly through
//! [`SimElement::set_seek_delay`] and [`SimElement::set_stalled`], and move
//! the decode clock with [`SimElement::advance`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::{Result, VidError};

use super::element::{MediaElement, MediaEvent};

#[derive(Debug)]
struct SimState {
    buffer: Option<Bytes>,
    current_time: f64,
    duration: f64,
    paused: bool,
    ended: bool,
    ready: bool,
    playback_rate: f64,
    seek_delay: Option<Duration>,
    stalled: bool,
    seek_count: u64,
}

/// In-process [`MediaElement`] implementation.
///
/// Cloning yields another handle onto the same element, so a test can keep a
/// control handle while the synchronizer owns its own.
#[derive(Clone)]
pub struct SimElement {
    state: Arc<Mutex<SimState>>,
    events: broadcast::Sender<MediaEvent>,
}

impl SimElement {
    /// Creates an element with nothing loaded and playback paused.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(SimState {
                buffer: None,
                current_time: 0.0,
                duration: 0.0,
                paused: true,
                ended: false,
                ready: false,
                playback_rate: 1.0,
                seek_delay: None,
                stalled: false,
                seek_count: 0,
            })),
            events,
        }
    }

    /// Makes subsequent seeks complete only after `delay`.
    pub fn set_seek_delay(&self, delay: Duration) {
        self.state.lock().seek_delay = Some(delay);
    }

    /// When stalled, seeks are accepted but never complete. Used to exercise
    /// the synchronizer's deadline path.
    pub fn set_stalled(&self, stalled: bool) {
        self.state.lock().stalled = stalled;
    }

    /// Overrides the reported media duration.
    pub fn set_duration(&self, seconds: f64) {
        self.state.lock().duration = seconds;
    }

    /// Number of seeks issued so far.
    pub fn seek_count(&self) -> u64 {
        self.state.lock().seek_count
    }

    /// Advances the decode clock by `seconds` of wall time when playing, and
    /// publishes the resulting time update.
    pub fn advance(&self, seconds: f64) {
        let time = {
            let mut state = self.state.lock();
            if state.paused {
                return;
            }
            state.current_time += seconds * state.playback_rate;
            if state.duration > 0.0 && state.current_time >= state.duration {
                state.current_time = state.duration;
                state.ended = true;
                state.paused = true;
            }
            state.current_time
        };
        let _ = self.events.send(MediaEvent::TimeUpdate(time));
        if self.state.lock().ended {
            let _ = self.events.send(MediaEvent::Ended);
        }
    }

    fn complete_seek(&self, seconds: f64) {
        {
            let mut state = self.state.lock();
            state.current_time = seconds;
            state.ended = false;
        }
        let _ = self.events.send(MediaEvent::Seeked);
    }
}

impl Default for SimElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaElement for SimElement {
    fn load(&self, buffer: Bytes) -> Result<()> {
        if buffer.is_empty() {
            return Err(VidError::Media("empty media buffer".into()));
        }
        {
            let mut state = self.state.lock();
            state.buffer = Some(buffer);
            state.ready = true;
            state.current_time = 0.0;
            state.ended = false;
        }
        let _ = self.events.send(MediaEvent::CanPlay);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn paused(&self) -> bool {
        self.state.lock().paused
    }

    fn ended(&self) -> bool {
        self.state.lock().ended
    }

    fn ready(&self) -> bool {
        self.state.lock().ready
    }

    async fn play(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.buffer.is_none() {
                return Err(VidError::Media("no media loaded".into()));
            }
            if !state.paused {
                return Ok(());
            }
            state.paused = false;
        }
        let _ = self.events.send(MediaEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn seek(&self, seconds: f64) {
        let (stalled, delay) = {
            let mut state = self.state.lock();
            state.seek_count += 1;
            (state.stalled, state.seek_delay)
        };

        if stalled {
            return;
        }

        match delay {
            Some(delay) => {
                let element = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    element.complete_seek(seconds);
                });
            }
            None => self.complete_seek(seconds),
        }
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().playback_rate
    }

    fn set_playback_rate(&self, rate: f64) {
        self.state.lock().playback_rate = rate;
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_marks_ready_and_emits_canplay() {
        let element = SimElement::new();
        let mut rx = element.subscribe();
        assert!(!element.ready());

        element.load(Bytes::from_static(b"mp4")).unwrap();
        assert!(element.ready());
        assert_eq!(rx.recv().await.unwrap(), MediaEvent::CanPlay);
    }

    #[tokio::test]
    async fn immediate_seek_completes_synchronously() {
        let element = SimElement::new();
        element.load(Bytes::from_static(b"mp4")).unwrap();
        let mut rx = element.subscribe();

        element.seek(1.5);
        assert_eq!(element.current_time(), 1.5);
        assert_eq!(element.seek_count(), 1);
        assert_eq!(rx.recv().await.unwrap(), MediaEvent::Seeked);
    }

    #[tokio::test]
    async fn advance_only_moves_while_playing() {
        let element = SimElement::new();
        element.load(Bytes::from_static(b"mp4")).unwrap();

        element.advance(1.0);
        assert_eq!(element.current_time(), 0.0);

        element.play().await.unwrap();
        element.set_playback_rate(2.0);
        element.advance(1.0);
        assert_eq!(element.current_time(), 2.0);
    }

    #[tokio::test]
    async fn advance_past_duration_ends_playback() {
        let element = SimElement::new();
        element.load(Bytes::from_static(b"mp4")).unwrap();
        element.set_duration(1.0);
        element.play().await.unwrap();

        element.advance(5.0);
        assert!(element.ended());
        assert!(element.paused());
        assert_eq!(element.current_time(), 1.0);
    }
}
