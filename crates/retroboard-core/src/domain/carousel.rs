//! Carousel: timed rotation through a playlist of programs.
//!
//! The scheduler is evaluated once per run-loop tick, after queued commands
//! were applied and before the active program advances:
//!
//! ```text
//!   enabled && playlist non-empty?
//!        │ yes
//!        ▼
//!   now - last_transition >= playlist[index].duration ?
//!        │ yes
//!        ▼
//!   index = (index + 1) % len ; last_transition = now ; switch to playlist[index]
//! ```
//!
//! The scheduler never touches programs itself.  [`Carousel::evaluate`] only
//! reports which program should become active; the manager performs the switch
//! through the same path as an explicit `switch` command.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::snapshot::PersistedCarousel;

/// One playlist slot: which program to show and for how long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Registered program name.
    #[serde(alias = "app")]
    pub program: String,
    /// How long the program stays on screen, in seconds.  Must be positive.
    pub duration: f64,
}

impl PlaylistEntry {
    pub fn new(program: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            program: program.into(),
            duration: duration_secs,
        }
    }

    /// The slot length, or `None` when the duration is not a positive,
    /// finite number of seconds.
    pub fn duration(&self) -> Option<Duration> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(self.duration).ok()
    }
}

/// Full carousel state as owned by the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct CarouselState {
    pub enabled: bool,
    pub playlist: Vec<PlaylistEntry>,
    /// Index of the entry currently on screen.  Always valid while the
    /// playlist is non-empty.
    pub index: usize,
    pub last_transition: Instant,
}

impl CarouselState {
    /// `true` when the carousel can actually rotate.  An enabled carousel with
    /// an empty playlist behaves as disabled.
    pub fn is_rotating(&self) -> bool {
        self.enabled && !self.playlist.is_empty()
    }
}

/// The carousel scheduler.
#[derive(Debug, Clone)]
pub struct Carousel {
    state: CarouselState,
}

impl Carousel {
    /// Creates a disabled carousel with an empty playlist.
    pub fn new(now: Instant) -> Self {
        Self {
            state: CarouselState {
                enabled: false,
                playlist: Vec::new(),
                index: 0,
                last_transition: now,
            },
        }
    }

    /// Rebuilds the scheduler from a persisted snapshot.
    ///
    /// Entries with an invalid duration are dropped and an out-of-range index
    /// falls back to the first entry.  The slot timer starts at `now`.
    pub fn restore(persisted: &PersistedCarousel, now: Instant) -> Self {
        let mut carousel = Self::new(now);
        carousel.configure(persisted.enabled, persisted.playlist.clone(), now);
        if persisted.index < carousel.state.playlist.len() {
            carousel.state.index = persisted.index;
        }
        carousel
    }

    /// Replaces the playlist, resets the index to 0 and the slot timer to
    /// `now`.
    ///
    /// Returns the first program when the new configuration rotates, so the
    /// caller can switch to it immediately.
    pub fn configure(
        &mut self,
        enabled: bool,
        playlist: Vec<PlaylistEntry>,
        now: Instant,
    ) -> Option<&str> {
        let playlist: Vec<PlaylistEntry> = playlist
            .into_iter()
            .filter(|entry| {
                let valid = entry.duration().is_some();
                if !valid {
                    warn!(
                        program = %entry.program,
                        duration = entry.duration,
                        "dropping carousel entry with non-positive duration"
                    );
                }
                valid
            })
            .collect();

        self.state = CarouselState {
            enabled,
            playlist,
            index: 0,
            last_transition: now,
        };

        if self.state.is_rotating() {
            self.current().map(|entry| entry.program.as_str())
        } else {
            None
        }
    }

    /// Decides whether the active program should change at `now`.
    ///
    /// Returns the program to switch to when the current slot has elapsed.
    pub fn evaluate(&mut self, now: Instant) -> Option<String> {
        if !self.state.is_rotating() {
            return None;
        }

        let slot = self.current()?.duration()?;
        let elapsed = now.saturating_duration_since(self.state.last_transition);
        if elapsed < slot {
            return None;
        }

        self.state.index = (self.state.index + 1) % self.state.playlist.len();
        self.state.last_transition = now;
        let next = self.state.playlist[self.state.index].program.clone();
        debug!(index = self.state.index, program = %next, "carousel advancing");
        Some(next)
    }

    /// The entry currently on screen, if the playlist is non-empty.
    pub fn current(&self) -> Option<&PlaylistEntry> {
        self.state.playlist.get(self.state.index)
    }

    pub fn is_rotating(&self) -> bool {
        self.state.is_rotating()
    }

    pub fn state(&self) -> &CarouselState {
        &self.state
    }

    /// The subset of the state written to disk.
    pub fn to_persisted(&self) -> PersistedCarousel {
        PersistedCarousel {
            enabled: self.state.enabled,
            playlist: self.state.playlist.clone(),
            index: self.state.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_slot_playlist() -> Vec<PlaylistEntry> {
        vec![PlaylistEntry::new("p1", 2.0), PlaylistEntry::new("p2", 3.0)]
    }

    #[test]
    fn test_new_carousel_is_disabled_and_empty() {
        let carousel = Carousel::new(Instant::now());
        assert!(!carousel.is_rotating());
        assert!(carousel.current().is_none());
    }

    #[test]
    fn test_configure_enabled_returns_first_program() {
        // Arrange
        let t0 = Instant::now();
        let mut carousel = Carousel::new(t0);

        // Act
        let first = carousel.configure(true, two_slot_playlist(), t0).map(str::to_string);

        // Assert
        assert_eq!(first.as_deref(), Some("p1"));
        assert_eq!(carousel.state().index, 0);
    }

    #[test]
    fn test_configure_disabled_returns_none() {
        let t0 = Instant::now();
        let mut carousel = Carousel::new(t0);
        assert!(carousel.configure(false, two_slot_playlist(), t0).is_none());
        assert!(!carousel.is_rotating());
    }

    #[test]
    fn test_enabled_with_empty_playlist_never_rotates() {
        let t0 = Instant::now();
        let mut carousel = Carousel::new(t0);
        assert!(carousel.configure(true, Vec::new(), t0).is_none());
        assert!(carousel.evaluate(t0 + Duration::from_secs(3600)).is_none());
    }

    #[test]
    fn test_rotation_follows_slot_durations() {
        // Arrange: [(p1, 2s), (p2, 3s)] enabled at t=0
        let t0 = Instant::now();
        let mut carousel = Carousel::new(t0);
        carousel.configure(true, two_slot_playlist(), t0);
        let at = |ms: u64| t0 + Duration::from_millis(ms);

        // Act / Assert: p1 stays on screen for t in [0, 2)
        assert_eq!(carousel.evaluate(at(0)), None);
        assert_eq!(carousel.evaluate(at(1_999)), None);

        // p2 at t=2
        assert_eq!(carousel.evaluate(at(2_000)).as_deref(), Some("p2"));
        assert_eq!(carousel.evaluate(at(4_999)), None);

        // back to p1 at t=5, and the cycle repeats
        assert_eq!(carousel.evaluate(at(5_000)).as_deref(), Some("p1"));
        assert_eq!(carousel.evaluate(at(7_000)).as_deref(), Some("p2"));
        assert_eq!(carousel.state().index, 1);
    }

    #[test]
    fn test_invalid_durations_are_dropped() {
        let t0 = Instant::now();
        let mut carousel = Carousel::new(t0);
        carousel.configure(
            true,
            vec![
                PlaylistEntry::new("zero", 0.0),
                PlaylistEntry::new("negative", -1.0),
                PlaylistEntry::new("nan", f64::NAN),
                PlaylistEntry::new("ok", 1.5),
            ],
            t0,
        );
        assert_eq!(carousel.state().playlist.len(), 1);
        assert_eq!(carousel.current().unwrap().program, "ok");
    }

    #[test]
    fn test_restore_keeps_valid_index() {
        let persisted = PersistedCarousel {
            enabled: true,
            playlist: two_slot_playlist(),
            index: 1,
        };
        let carousel = Carousel::restore(&persisted, Instant::now());
        assert_eq!(carousel.current().unwrap().program, "p2");
    }

    #[test]
    fn test_restore_resets_out_of_range_index() {
        let persisted = PersistedCarousel {
            enabled: true,
            playlist: two_slot_playlist(),
            index: 7,
        };
        let carousel = Carousel::restore(&persisted, Instant::now());
        assert_eq!(carousel.state().index, 0);
    }

    #[test]
    fn test_to_persisted_mirrors_state() {
        let t0 = Instant::now();
        let mut carousel = Carousel::new(t0);
        carousel.configure(true, two_slot_playlist(), t0);
        carousel.evaluate(t0 + Duration::from_secs(2));

        let persisted = carousel.to_persisted();

        assert!(persisted.enabled);
        assert_eq!(persisted.index, 1);
        assert_eq!(persisted.playlist, two_slot_playlist());
    }
}
