use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::av::{TimeRange, VideoFormat};
use crate::config;
use crate::error::{Result, VidError};

use super::element::{await_event, MediaElement, MediaEvent};

/// Spans of animation frames whose video content is known to be static.
#[derive(Debug, Clone, Default)]
pub struct StaticTimeRanges {
    ranges: Vec<TimeRange>,
}

impl StaticTimeRanges {
    /// Wraps the caller-supplied ranges.
    pub fn new(ranges: Vec<TimeRange>) -> Self {
        Self { ranges }
    }

    /// True if `frame` falls inside any static range.
    pub fn contains(&self, frame: i64) -> bool {
        self.ranges.iter().any(|r| r.contains(frame))
    }
}

// Ring of (frame, arrival time) observations used to estimate how fast the
// animation clock is actually consuming frames.
#[derive(Debug)]
struct RateEstimator {
    history: VecDeque<(i64, Instant)>,
    capacity: usize,
}

impl RateEstimator {
    fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn observe(&mut self, frame: i64) {
        self.history.push_back((frame, Instant::now()));
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    // ideal tick duration over measured tick duration across the window;
    // None until enough observations exist or when the clock went backwards
    fn implied_ratio(&self, frame_rate: f64) -> Option<f64> {
        if self.history.len() < 2 {
            return None;
        }
        let (first_frame, first_at) = *self.history.front()?;
        let (last_frame, last_at) = *self.history.back()?;

        let frames = (last_frame - first_frame) as f64;
        if frames <= 0.0 {
            return None;
        }
        let measured = (last_at - first_at).as_secs_f64();
        if measured <= 0.0 {
            return None;
        }
        Some((frames / frame_rate) / measured)
    }
}

/// Keeps one media element's decode position in lock-step with an
/// externally driven animation clock.
///
/// The reader owns its element exclusively. [`VideoReader::prepare`] is the
/// central contract: given the animation's current frame for this video, it
/// decides between doing nothing, nudging playback, or seeking, and never
/// blocks the caller longer than the configured deadlines. A failed or
/// timed-out wait degrades to the stale frame instead of stalling the
/// animation loop.
pub struct VideoReader {
    element: Arc<dyn MediaElement>,
    format: VideoFormat,
    static_time_ranges: StaticTimeRanges,
    current_frame: i64,
    primed: bool,
    is_playing: bool,
    sought: bool,
    destroyed: bool,
    error: Option<String>,
    rate: RateEstimator,
    last_target_time: Arc<AtomicU64>,
    watchdog: Option<JoinHandle<()>>,
}

impl VideoReader {
    /// Creates a reader over `element`, optionally feeding it a muxed buffer
    /// first, and starts the free-run watchdog.
    pub fn new(
        element: Arc<dyn MediaElement>,
        buffer: Option<Bytes>,
        format: VideoFormat,
        static_time_ranges: Vec<TimeRange>,
    ) -> Result<Self> {
        if format.frame_rate <= 0.0 {
            return Err(VidError::Config("frame rate must be positive".into()));
        }
        if let Some(buffer) = buffer {
            element.load(buffer)?;
        }

        let cfg = config::get();
        let last_target_time = Arc::new(AtomicU64::new(0f64.to_bits()));
        let tolerance_secs = cfg.tolerance_frames as f64 / format.frame_rate;
        let watchdog = spawn_watchdog(element.clone(), last_target_time.clone(), tolerance_secs);

        Ok(Self {
            element,
            format,
            static_time_ranges: StaticTimeRanges::new(static_time_ranges),
            current_frame: -1,
            primed: false,
            is_playing: false,
            sought: false,
            destroyed: false,
            error: None,
            rate: RateEstimator::new(cfg.rate_history_len),
            last_target_time,
            watchdog: Some(watchdog),
        })
    }

    /// Brings the decoded position to `target_frame`.
    ///
    /// `playback_rate` is the composition's nominal rate for this video; the
    /// effective element rate additionally folds in the measured arrival rate
    /// of `prepare` calls so a throttled animation clock does not drift away
    /// from the video.
    pub async fn prepare(&mut self, target_frame: i64, playback_rate: f64) -> Result<()> {
        if self.destroyed {
            return Err(VidError::Media("video reader already destroyed".into()));
        }
        if target_frame < 0 {
            return Err(VidError::InvalidData("target frame must be non-negative".into()));
        }
        if target_frame == self.current_frame {
            return Ok(());
        }

        self.error = None;
        self.sought = false;

        let cfg = config::get();
        let frame_rate = self.format.frame_rate;
        let current_time = self.element.current_time();
        let target_time = target_frame as f64 / frame_rate;
        let tolerance_secs = cfg.tolerance_frames as f64 / frame_rate;

        self.rate.observe(target_frame);
        self.align_playback_rate(playback_rate, &cfg);
        self.last_target_time
            .store(target_time.to_bits(), Ordering::Relaxed);

        if current_time == 0.0 && target_time == 0.0 {
            if !self.primed {
                self.prime(&cfg).await?;
                self.primed = true;
            }
        } else if (target_time * frame_rate).round() == (current_time * frame_rate).round() {
            // already on this tick
        } else if self.static_time_ranges.contains(target_frame) {
            // static content: scrub without resuming playback
            self.seek(target_time, false, &cfg).await?;
            self.current_frame = target_frame;
            return Ok(());
        } else if (current_time - target_time).abs() < tolerance_secs {
            // natural playback catches up without a seek
            if self.element.paused() {
                if let Err(e) = self.element.play().await {
                    self.error = Some(e.to_string());
                    self.current_frame = target_frame;
                    return Err(e);
                }
            }
        } else {
            self.sought = true;
            self.seek(target_time, true, &cfg).await?;
            self.current_frame = target_frame;
            return Ok(());
        }

        if self.is_playing && self.element.paused() {
            if let Err(e) = self.element.play().await {
                self.error = Some(e.to_string());
                self.current_frame = target_frame;
                return Err(e);
            }
        }
        self.current_frame = target_frame;
        Ok(())
    }

    /// Last frame successfully prepared; −1 before the first `prepare`.
    pub fn current_frame(&self) -> i64 {
        self.current_frame
    }

    /// True when the most recent `prepare` had to issue a seek.
    pub fn was_sought(&self) -> bool {
        self.sought
    }

    /// True while the reader intends continued playback.
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Marks the reader as playing and resumes the element if paused.
    pub async fn play(&mut self) -> Result<()> {
        self.is_playing = true;
        if self.element.paused() {
            self.element.play().await?;
        }
        Ok(())
    }

    /// Pauses the element and clears the playing intent.
    pub fn pause(&mut self) {
        self.is_playing = false;
        if !self.element.paused() {
            self.element.pause();
        }
    }

    /// Stops playback; alias of [`VideoReader::pause`] kept for interface
    /// parity with host players.
    pub fn stop(&mut self) {
        self.pause();
    }

    /// Last soft failure recorded by `prepare`, if any.
    pub fn get_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Detaches the watchdog and releases the element. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        self.element.pause();
    }

    // One-time async priming: start playback so the element decodes at least
    // one frame, then hold it paused at the head of the stream.
    async fn prime(&mut self, cfg: &config::Config) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.format.frame_rate);
        let deadline = frame_duration * cfg.seek_timeout_frames;

        let mut rx = self.element.subscribe();
        if !self.element.ready() {
            if let Err(e) = await_event(&mut rx, deadline, |e| *e == MediaEvent::CanPlay).await {
                log::warn!("video element not ready for priming: {}", e);
                return Ok(());
            }
        }

        if let Err(e) = self.element.play().await {
            self.error = Some(e.to_string());
            return Err(e);
        }
        // one frame-duration stands in for the host's next-paint callback
        let _ = await_event(
            &mut rx,
            frame_duration * cfg.tolerance_frames,
            |e| matches!(e, MediaEvent::Playing | MediaEvent::TimeUpdate(_)),
        )
        .await;
        self.element.pause();
        Ok(())
    }

    // Seek with a bounded wait; a timeout is a soft failure so the caller
    // carries on with the stale frame.
    async fn seek(&mut self, target_time: f64, resume: bool, cfg: &config::Config) -> Result<()> {
        let deadline =
            Duration::from_secs_f64(cfg.seek_timeout_frames as f64 / self.format.frame_rate);

        let mut rx = self.element.subscribe();
        if !self.element.ready() {
            if let Err(e) = await_event(&mut rx, deadline, |e| *e == MediaEvent::CanPlay).await {
                log::warn!("seek aborted, element never became ready: {}", e);
                self.error = Some(e.to_string());
                return Ok(());
            }
        }

        self.element.seek(target_time);
        match await_event(&mut rx, deadline, |e| *e == MediaEvent::Seeked).await {
            Ok(_) => {
                if resume {
                    if let Err(e) = self.element.play().await {
                        self.error = Some(e.to_string());
                        log::warn!("resume after seek failed: {}", e);
                    } else {
                        self.is_playing = true;
                    }
                } else if !self.element.paused() {
                    self.element.pause();
                }
            }
            Err(e) => {
                // stale video is preferable to blocking the animation loop
                log::warn!("seek to {:.3}s did not complete in time: {}", target_time, e);
                self.error = Some(e.to_string());
            }
        }
        Ok(())
    }

    fn align_playback_rate(&mut self, playback_rate: f64, cfg: &config::Config) {
        let ratio = self.rate.implied_ratio(self.format.frame_rate).unwrap_or(1.0);
        let target = (playback_rate * ratio)
            .clamp(cfg.min_playback_rate, cfg.max_playback_rate);
        if (self.element.playback_rate() - target).abs() > f64::EPSILON {
            self.element.set_playback_rate(target);
        }
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        self.destroy();
    }
}

// Pauses the element whenever it free-runs past the last requested tick by
// more than the tolerance while no new prepare has arrived.
fn spawn_watchdog(
    element: Arc<dyn MediaElement>,
    last_target_time: Arc<AtomicU64>,
    tolerance_secs: f64,
) -> JoinHandle<()> {
    let mut rx = element.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(MediaEvent::TimeUpdate(time)) => {
                    let target = f64::from_bits(last_target_time.load(Ordering::Relaxed));
                    if time > target + tolerance_secs && !element.paused() {
                        log::debug!(
                            "video free-ran to {:.3}s past requested {:.3}s; pausing",
                            time,
                            target
                        );
                        element.pause();
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
