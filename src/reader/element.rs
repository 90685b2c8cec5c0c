use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use crate::error::{Result, VidError};

/// Notifications surfaced by a media element.
///
/// These mirror the readiness/seek-completion events of a host video element;
/// they are the only signal the synchronizer relies on.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Enough data is buffered to start or resume decoding.
    CanPlay,
    /// Playback has actually started after a play request.
    Playing,
    /// A previously issued seek has completed.
    Seeked,
    /// Decoded position advanced; carries the new time in seconds.
    TimeUpdate(f64),
    /// Playback reached the end of the buffer.
    Ended,
    /// The decoder failed; carries a host-specific description.
    Error(String),
}

/// Capability set of one native decodable-media element.
///
/// Exactly one synchronizer owns each element. Implementations differ per
/// environment (browser-backed, worker-proxied, headless simulation) and are
/// selected at construction time; the synchronizer only ever talks to this
/// trait.
///
/// Commands are non-blocking; completion is observed by subscribing to the
/// event channel *before* issuing the command and awaiting the matching
/// [`MediaEvent`] under a deadline (see [`await_event`]).
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Feeds the element a complete muxed buffer as its media source.
    fn load(&self, buffer: Bytes) -> Result<()>;

    /// Current decoded position in seconds.
    fn current_time(&self) -> f64;

    /// Media duration in seconds, 0 while unknown.
    fn duration(&self) -> f64;

    /// True while playback is paused.
    fn paused(&self) -> bool;

    /// True once playback ran past the end of the media.
    fn ended(&self) -> bool;

    /// True when enough data is decoded for an immediate seek.
    fn ready(&self) -> bool;

    /// Starts playback. Resolves once the request is accepted; actual
    /// progress is signalled through [`MediaEvent::Playing`].
    async fn play(&self) -> Result<()>;

    /// Pauses playback immediately.
    fn pause(&self);

    /// Requests a seek to `seconds`; completion arrives as
    /// [`MediaEvent::Seeked`].
    fn seek(&self, seconds: f64);

    /// Current playback-rate multiplier.
    fn playback_rate(&self) -> f64;

    /// Adjusts the playback-rate multiplier.
    fn set_playback_rate(&self, rate: f64);

    /// Opens a fresh event subscription.
    fn subscribe(&self) -> broadcast::Receiver<MediaEvent>;
}

/// Awaits the first event matching `accept` within `deadline`.
///
/// The receiver lives in the caller's scope, so the subscription is dropped
/// on every exit path (success, timeout or channel closure), which keeps
/// one-shot waits from leaking or double-firing.
pub async fn await_event<F>(
    rx: &mut broadcast::Receiver<MediaEvent>,
    deadline: Duration,
    mut accept: F,
) -> Result<MediaEvent>
where
    F: FnMut(&MediaEvent) -> bool,
{
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if accept(&event) => return Ok(event),
                Ok(MediaEvent::Error(e)) => return Err(VidError::Media(e)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(VidError::Media("media element event channel closed".into()))
                }
            }
        }
    };

    match tokio::time::timeout(deadline, wait).await {
        Ok(result) => result,
        Err(_) => Err(VidError::Timeout(format!(
            "media element event not received within {:?}",
            deadline
        ))),
    }
}
