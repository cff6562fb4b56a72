//! Mode switching by holding the ST in reset.
//!
//! The ST sends `0x80 0x01` to the IKBD as it comes out of reset. The
//! first time that sequence is seen, the time since boot tells how long
//! the user held the reset button during power-up.

use ikbd_core::Clock;

pub const RESET_SEQ_FIRST_BYTE: u8 = 0x80;
pub const RESET_SEQ_SECOND_BYTE: u8 = 0x01;

const SEC_TO_US: u64 = 1_000_000;

/// Holding reset at least this long swaps the keyboard source.
pub const TOGGLE_SOURCE_HOLD_US: u64 = 3 * SEC_TO_US;
/// Holding reset at least this long enters configuration mode.
pub const ENTER_CONFIG_HOLD_US: u64 = 10 * SEC_TO_US;
/// Longer holds are ignored.
pub const MAX_RESET_HOLD_US: u64 = 20 * SEC_TO_US;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAction {
    ToggleSource,
    EnterConfiguration,
}

/// What a hold of `held_us` asks for.
#[must_use]
pub fn classify_hold(held_us: u64) -> Option<ResetAction> {
    match held_us {
        0 => None,
        t if t > MAX_RESET_HOLD_US => None,
        t if t >= ENTER_CONFIG_HOLD_US => Some(ResetAction::EnterConfiguration),
        t if t >= TOGGLE_SOURCE_HOLD_US => Some(ResetAction::ToggleSource),
        _ => None,
    }
}

/// Watches ST-to-IKBD bytes for the first reset command.
pub struct ResetSequenceDetector<C> {
    clock: C,
    waiting_for_second: bool,
    seen_at: Option<u64>,
    reported: bool,
}

impl<C: Clock> ResetSequenceDetector<C> {
    /// `clock` should count from boot.
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            waiting_for_second: false,
            seen_at: None,
            reported: false,
        }
    }

    /// Feed one received byte. Only the first sequence is recorded.
    pub fn feed(&mut self, byte: u8) {
        if self.seen_at.is_some() {
            return;
        }
        if self.waiting_for_second && byte == RESET_SEQ_SECOND_BYTE {
            let now = self.clock.now_us();
            self.seen_at = Some(now);
            self.waiting_for_second = false;
            log::info!("First RESET sequence seen at {now} us since boot");
        } else {
            self.waiting_for_second = byte == RESET_SEQ_FIRST_BYTE;
        }
    }

    /// Time since boot of the first sequence, if seen.
    #[must_use]
    pub fn first_sequence_us(&self) -> Option<u64> {
        self.seen_at
    }

    /// The action the recorded hold asks for. Reported once.
    pub fn poll(&mut self) -> Option<ResetAction> {
        if self.reported {
            return None;
        }
        let action = classify_hold(self.seen_at?)?;
        self.reported = true;
        match action {
            ResetAction::EnterConfiguration => {
                log::info!("Reset held: entering configuration mode");
            }
            ResetAction::ToggleSource => log::info!("Reset held: toggling IKBD source"),
        }
        Some(action)
    }
}

/// Native mode's view of the physical RESET line: the first change after
/// the loop starts, if it falls between 10 and 20 seconds, asks for
/// configuration mode.
pub struct ResetLineWatch<C> {
    clock: C,
    started_at: u64,
    last_level: bool,
    done: bool,
}

impl<C: Clock> ResetLineWatch<C> {
    /// Start watching from the line's current `level`.
    #[must_use]
    pub fn new(clock: C, level: bool) -> Self {
        let started_at = clock.now_us();
        Self {
            clock,
            started_at,
            last_level: level,
            done: false,
        }
    }

    /// Sample the line. Returns true once, on a qualifying first change.
    pub fn sample(&mut self, level: bool) -> bool {
        if self.done {
            return false;
        }
        if self.last_level == level {
            return false;
        }
        self.last_level = level;
        self.done = true;
        let held = self.clock.elapsed_since(self.started_at);
        log::info!("RESET line changed after {held} us");
        (ENTER_CONFIG_HOLD_US..=MAX_RESET_HOLD_US).contains(&held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ikbd_core::ManualClock;

    fn detector_at(us: u64) -> (ResetSequenceDetector<ManualClock>, ManualClock) {
        let clock = ManualClock::starting_at(us);
        (ResetSequenceDetector::new(clock.clone()), clock)
    }

    #[test]
    fn hold_windows() {
        assert_eq!(classify_hold(0), None);
        assert_eq!(classify_hold(TOGGLE_SOURCE_HOLD_US - 1), None);
        assert_eq!(classify_hold(TOGGLE_SOURCE_HOLD_US), Some(ResetAction::ToggleSource));
        assert_eq!(classify_hold(ENTER_CONFIG_HOLD_US - 1), Some(ResetAction::ToggleSource));
        assert_eq!(
            classify_hold(ENTER_CONFIG_HOLD_US),
            Some(ResetAction::EnterConfiguration)
        );
        assert_eq!(
            classify_hold(MAX_RESET_HOLD_US),
            Some(ResetAction::EnterConfiguration)
        );
        assert_eq!(classify_hold(MAX_RESET_HOLD_US + 1), None);
    }

    #[test]
    fn sequence_at_toggle_threshold() {
        let (mut detector, _clock) = detector_at(TOGGLE_SOURCE_HOLD_US);
        detector.feed(0x80);
        detector.feed(0x01);
        assert_eq!(detector.poll(), Some(ResetAction::ToggleSource));
        assert_eq!(detector.poll(), None);
    }

    #[test]
    fn one_tick_short_does_nothing() {
        let (mut detector, _clock) = detector_at(TOGGLE_SOURCE_HOLD_US - 1);
        detector.feed(0x80);
        detector.feed(0x01);
        assert_eq!(detector.first_sequence_us(), Some(TOGGLE_SOURCE_HOLD_US - 1));
        assert_eq!(detector.poll(), None);
    }

    #[test]
    fn too_long_is_ignored() {
        let (mut detector, _clock) = detector_at(MAX_RESET_HOLD_US + 1);
        detector.feed(0x80);
        detector.feed(0x01);
        assert_eq!(detector.poll(), None);
    }

    #[test]
    fn only_first_sequence_counts() {
        let (mut detector, clock) = detector_at(1_000_000);
        detector.feed(0x80);
        detector.feed(0x01);
        clock.set(12 * SEC_TO_US);
        detector.feed(0x80);
        detector.feed(0x01);
        assert_eq!(detector.first_sequence_us(), Some(1_000_000));
        assert_eq!(detector.poll(), None);
    }

    #[test]
    fn interrupted_sequence_restarts() {
        let (mut detector, _clock) = detector_at(ENTER_CONFIG_HOLD_US);
        detector.feed(0x80);
        detector.feed(0x1C);
        detector.feed(0x01);
        assert_eq!(detector.first_sequence_us(), None);
        detector.feed(0x80);
        detector.feed(0x80);
        detector.feed(0x01);
        assert_eq!(detector.poll(), Some(ResetAction::EnterConfiguration));
    }

    #[test]
    fn reset_line_change_in_window() {
        let clock = ManualClock::new();
        let mut watch = ResetLineWatch::new(clock.clone(), true);
        clock.advance(12 * SEC_TO_US);
        assert!(!watch.sample(true));
        assert!(watch.sample(false));
        assert!(!watch.sample(true));
    }

    #[test]
    fn early_reset_line_change_is_spent() {
        let clock = ManualClock::new();
        let mut watch = ResetLineWatch::new(clock.clone(), true);
        clock.advance(SEC_TO_US);
        assert!(!watch.sample(false));
        clock.advance(11 * SEC_TO_US);
        assert!(!watch.sample(true));
    }
}
