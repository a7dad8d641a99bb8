//! Playback state machine: the shared aggregate, its actions and the
//! pure reducer, plus the per-song bookkeeping types.

use super::types::Song;

/// The one authoritative playback aggregate for the room session.
/// Mutated only through [`reduce`]; everything else reads snapshots.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_muted: bool,
    pub current_song: Option<Song>,
    /// Seconds into the current song. Clamped to `duration_secs` once
    /// the duration is known.
    pub progress_secs: f64,
    /// 0.0 until the media engine has reported a duration.
    pub duration_secs: f64,
    /// Volume fraction in [0, 1].
    pub volume: f64,
    pub background_enabled: bool,
}

impl PlaybackState {
    pub fn new(background_enabled: bool, volume: f64) -> Self {
        Self {
            is_playing: false,
            is_muted: false,
            current_song: None,
            progress_secs: 0.0,
            duration_secs: 0.0,
            volume: volume.clamp(0.0, 1.0),
            background_enabled,
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(true, 1.0)
    }
}

/// Named state transitions. Exhaustive by construction, so an unhandled
/// action kind cannot exist at runtime.
#[derive(Clone, Debug)]
pub enum Action {
    SetPlaying(bool),
    SetMuted(bool),
    SetSong(Option<Song>),
    SetProgress(f64),
    SetDuration(f64),
    SetVolume(f64),
    SetBackground(bool),
}

/// Pure transition function: current state + action -> next state.
/// Performs no I/O; side effects belong to the calling component.
pub fn reduce(state: &PlaybackState, action: Action) -> PlaybackState {
    let mut next = state.clone();
    match action {
        Action::SetPlaying(playing) => next.is_playing = playing,
        Action::SetMuted(muted) => next.is_muted = muted,
        Action::SetSong(song) => {
            next.current_song = song;
            next.progress_secs = 0.0;
            next.duration_secs = 0.0;
        }
        Action::SetProgress(secs) => {
            next.progress_secs = clamp_progress(secs, next.duration_secs);
        }
        Action::SetDuration(secs) => {
            next.duration_secs = secs.max(0.0);
            next.progress_secs = clamp_progress(next.progress_secs, next.duration_secs);
        }
        Action::SetVolume(v) => next.volume = v.clamp(0.0, 1.0),
        Action::SetBackground(enabled) => next.background_enabled = enabled,
    }
    next
}

/// Progress is never negative and never past a known duration.
/// Violations are clamped, not errors.
fn clamp_progress(secs: f64, duration_secs: f64) -> f64 {
    let secs = secs.max(0.0);
    if duration_secs > 0.0 {
        secs.min(duration_secs)
    } else {
        secs
    }
}

/// Engaged-listening bookkeeping for the song currently playing.
/// Reset whenever a new song begins.
#[derive(Clone, Debug, Default)]
pub struct DriftTracker {
    /// Audio clock reading at the most recent sampler pass.
    pub last_sampled_secs: f64,
    /// Position last sent out as a `progress` event.
    pub last_broadcast_secs: f64,
    /// Wall-clock seconds of active, audible listening.
    pub engaged_secs: f64,
    /// Set once the 30%-of-duration threshold has fired; gates the
    /// analytics event to exactly one emission per song.
    pub listening_reported: bool,
}

impl DriftTracker {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Folds a seek into the engaged-time accumulator. A forward seek
    /// subtracts the skipped span so it never counts as listening; a
    /// backward seek leaves the accumulator alone so the threshold can
    /// still be reached for time actually listened to.
    pub fn apply_seek(&mut self, from_secs: f64, to_secs: f64) {
        if self.listening_reported {
            return;
        }
        let skipped = to_secs - from_secs;
        if skipped > 0.0 {
            self.engaged_secs = (self.engaged_secs - skipped).max(0.0);
        }
    }
}

/// Bounded retry budget for unplayable sources, scoped to one song.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryBudget {
    failures: u32,
}

impl RetryBudget {
    pub const MAX_FAILURES: u32 = 3;

    pub fn record_failure(&mut self) -> u32 {
        self.failures += 1;
        self.failures
    }

    pub fn exhausted(&self) -> bool {
        self.failures >= Self::MAX_FAILURES
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str) -> Song {
        Song {
            id: id.to_string(),
            name: format!("song {id}"),
            artists: vec![],
            images: vec![],
            sources: vec![],
            video: None,
            added_by: None,
        }
    }

    #[test]
    fn progress_is_clamped_to_known_duration() {
        let mut state = PlaybackState::default();
        state = reduce(&state, Action::SetDuration(120.0));
        state = reduce(&state, Action::SetProgress(500.0));
        assert_eq!(state.progress_secs, 120.0);

        state = reduce(&state, Action::SetProgress(-4.0));
        assert_eq!(state.progress_secs, 0.0);
    }

    #[test]
    fn progress_unclamped_until_duration_known() {
        let state = reduce(&PlaybackState::default(), Action::SetProgress(42.0));
        assert_eq!(state.progress_secs, 42.0);
    }

    #[test]
    fn shrinking_duration_reclamps_progress() {
        let mut state = reduce(&PlaybackState::default(), Action::SetProgress(90.0));
        state = reduce(&state, Action::SetDuration(60.0));
        assert_eq!(state.progress_secs, 60.0);
    }

    #[test]
    fn song_change_resets_timing() {
        let mut state = PlaybackState::default();
        state = reduce(&state, Action::SetDuration(100.0));
        state = reduce(&state, Action::SetProgress(50.0));
        state = reduce(&state, Action::SetSong(Some(song("b"))));
        assert_eq!(state.progress_secs, 0.0);
        assert_eq!(state.duration_secs, 0.0);
    }

    #[test]
    fn volume_clamped_to_unit_interval() {
        let state = reduce(&PlaybackState::default(), Action::SetVolume(1.8));
        assert_eq!(state.volume, 1.0);
        let state = reduce(&state, Action::SetVolume(-0.2));
        assert_eq!(state.volume, 0.0);
    }

    #[test]
    fn arbitrary_action_sequences_keep_progress_invariant() {
        let actions = vec![
            Action::SetProgress(10.0),
            Action::SetDuration(30.0),
            Action::SetProgress(29.0),
            Action::SetProgress(31.0),
            Action::SetSong(Some(song("a"))),
            Action::SetProgress(-1.0),
            Action::SetDuration(5.0),
            Action::SetProgress(100.0),
        ];
        let mut state = PlaybackState::default();
        for action in actions {
            state = reduce(&state, action);
            assert!(state.progress_secs >= 0.0);
            if state.duration_secs > 0.0 {
                assert!(state.progress_secs <= state.duration_secs);
            }
        }
    }

    #[test]
    fn forward_seek_does_not_inflate_engaged_time() {
        let mut tracker = DriftTracker::default();
        tracker.engaged_secs = 12.0;
        tracker.apply_seek(20.0, 80.0);
        assert_eq!(tracker.engaged_secs, 0.0);

        tracker.engaged_secs = 12.0;
        tracker.apply_seek(20.0, 25.0);
        assert_eq!(tracker.engaged_secs, 7.0);
    }

    #[test]
    fn backward_seek_leaves_engaged_time_alone() {
        let mut tracker = DriftTracker::default();
        tracker.engaged_secs = 12.0;
        tracker.apply_seek(40.0, 10.0);
        assert_eq!(tracker.engaged_secs, 12.0);
    }

    #[test]
    fn seek_after_report_is_ignored() {
        let mut tracker = DriftTracker {
            engaged_secs: 40.0,
            listening_reported: true,
            ..Default::default()
        };
        tracker.apply_seek(10.0, 90.0);
        assert_eq!(tracker.engaged_secs, 40.0);
    }

    #[test]
    fn retry_budget_exhausts_at_three() {
        let mut budget = RetryBudget::default();
        assert_eq!(budget.record_failure(), 1);
        assert!(!budget.exhausted());
        budget.record_failure();
        assert!(!budget.exhausted());
        budget.record_failure();
        assert!(budget.exhausted());
        budget.reset();
        assert!(!budget.exhausted());
    }
}
