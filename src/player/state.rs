//! Playback position accounting.

use std::time::Duration;

use tokio::time::Instant;

/// Position = offset + time since baseline, frozen while paused.
///
/// Pausing records a timestamp; resuming shifts the baseline forward by the
/// paused interval, so nothing has to tick while paused.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    offset: Duration,
    baseline: Option<Instant>,
    paused_at: Option<Instant>,
}

impl PlaybackClock {
    /// (Re)starts counting from `offset`.
    pub fn start(&mut self, offset: Duration) {
        self.offset = offset;
        self.baseline = Some(Instant::now());
        self.paused_at = None;
    }

    pub fn pause(&mut self) {
        if self.baseline.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    pub fn resume(&mut self) {
        if let (Some(baseline), Some(paused_at)) = (self.baseline, self.paused_at.take()) {
            self.baseline = Some(baseline + paused_at.elapsed());
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn position(&self) -> Duration {
        match (self.baseline, self.paused_at) {
            (Some(baseline), Some(paused_at)) => {
                self.offset + paused_at.saturating_duration_since(baseline)
            }
            (Some(baseline), None) => self.offset + baseline.elapsed(),
            (None, _) => self.offset,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_position_runs_while_playing() {
        let mut clock = PlaybackClock::default();
        clock.start(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(clock.position(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_frozen_while_paused() {
        let mut clock = PlaybackClock::default();
        clock.start(Duration::ZERO);
        tokio::time::advance(Duration::from_secs(3)).await;
        clock.pause();

        let frozen = clock.position();
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(clock.position(), frozen);
        assert_eq!(frozen, Duration::from_secs(3));

        clock.resume();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(clock.position(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_clock_reports_offset() {
        let mut clock = PlaybackClock::default();
        assert_eq!(clock.position(), Duration::ZERO);
        clock.pause();
        assert!(!clock.is_paused());
        clock.start(Duration::from_secs(4));
        clock.reset();
        assert_eq!(clock.position(), Duration::ZERO);
    }
}
