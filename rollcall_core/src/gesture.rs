//! Single-frame pose classification and edge-triggered debouncing.
//!
//! [`classify`] is a coarse heuristic: each long finger is "extended" when
//! its tip sits above its knuckle in image space.  There is no temporal
//! smoothing and the thumb is ignored.  [`GestureDebouncer`] turns the
//! resulting per-frame stream into a sparse stream of symbol changes.

use std::fmt;

use crate::landmark::{FingerSet, Landmark};

// ════════════════════════════════════════════════════════════════════════════
// GestureSymbol
// ════════════════════════════════════════════════════════════════════════════

/// Discrete interpretation of one hand pose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GestureSymbol {
    /// No recognised pose.
    #[default]
    NoPose,
    /// All four long fingers extended.
    OpenPalm,
    /// All four long fingers retracted.
    ClosedFist,
    /// Index and middle extended, ring and pinky retracted.
    Victory,
}

impl GestureSymbol {
    pub const ALL: [GestureSymbol; 4] = [
        GestureSymbol::NoPose,
        GestureSymbol::OpenPalm,
        GestureSymbol::ClosedFist,
        GestureSymbol::Victory,
    ];

    /// Upper-case status label (`OPEN_PALM`, `NONE`, ...).
    pub fn label(&self) -> &'static str {
        match self {
            GestureSymbol::NoPose     => "NONE",
            GestureSymbol::OpenPalm   => "OPEN_PALM",
            GestureSymbol::ClosedFist => "CLOSED_FIST",
            GestureSymbol::Victory    => "VICTORY",
        }
    }

    pub fn from_fingers(f: FingerSet) -> Self {
        match f.as_array() {
            [true,  true,  true,  true ] => GestureSymbol::OpenPalm,
            [false, false, false, false] => GestureSymbol::ClosedFist,
            [true,  true,  false, false] => GestureSymbol::Victory,
            _                            => GestureSymbol::NoPose,
        }
    }
}

impl fmt::Display for GestureSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify one frame.
///
/// Returns `None` when the frame is empty or malformed, meaning "no
/// classification this frame".  This is distinct from `Some(NoPose)`, which is a
/// real observation of an unrecognised pose.
pub fn classify(frame: &[Landmark]) -> Option<GestureSymbol> {
    FingerSet::from_landmarks(frame).map(GestureSymbol::from_fingers)
}

// ════════════════════════════════════════════════════════════════════════════
// GestureDebouncer
// ════════════════════════════════════════════════════════════════════════════

/// Remembers the last *emitted* symbol and only lets changes through.
#[derive(Clone, Debug, Default)]
pub struct GestureDebouncer {
    last: GestureSymbol,
}

impl GestureDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one classification result.  Returns the symbol to emit, if any.
    ///
    /// A `None` frame (nothing classified) is absorbed and leaves the
    /// remembered symbol untouched.
    pub fn observe(&mut self, classified: Option<GestureSymbol>) -> Option<GestureSymbol> {
        let symbol = classified?;
        if symbol == self.last {
            return None;
        }
        self.last = symbol;
        Some(symbol)
    }

    /// Classify a frame and debounce in one step.
    pub fn observe_frame(&mut self, frame: &[Landmark]) -> Option<GestureSymbol> {
        self.observe(classify(frame))
    }

    pub fn last(&self) -> GestureSymbol {
        self.last
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::posed_hand;

    #[test]
    fn all_up_is_open_palm() {
        assert_eq!(classify(&posed_hand(FingerSet::ALL)), Some(GestureSymbol::OpenPalm));
    }

    #[test]
    fn all_down_is_closed_fist() {
        assert_eq!(classify(&posed_hand(FingerSet::NONE)), Some(GestureSymbol::ClosedFist));
    }

    #[test]
    fn index_and_middle_is_victory() {
        assert_eq!(classify(&posed_hand(FingerSet::VICTORY)), Some(GestureSymbol::Victory));
    }

    #[test]
    fn other_combinations_are_no_pose() {
        let mut named = 0;
        for bits in 0u8..16 {
            let set = FingerSet::from_array([
                bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0,
            ]);
            let got = classify(&posed_hand(set)).unwrap();
            if got != GestureSymbol::NoPose { named += 1; }
        }
        // Exactly three of the sixteen finger combinations have names.
        assert_eq!(named, 3);
        assert_eq!(classify(&posed_hand(FingerSet::POINT)), Some(GestureSymbol::NoPose));
    }

    #[test]
    fn thumb_is_ignored() {
        let mut frame = posed_hand(FingerSet::ALL);
        frame[crate::landmark::THUMB_TIP].y = 0.99;
        assert_eq!(classify(&frame), Some(GestureSymbol::OpenPalm));
    }

    #[test]
    fn empty_frame_declines() {
        assert_eq!(classify(&[]), None);
    }

    #[test]
    fn debouncer_emits_only_on_change() {
        use GestureSymbol::*;
        let mut d = GestureDebouncer::new();
        let emitted: Vec<_> = [NoPose, OpenPalm, OpenPalm, OpenPalm, ClosedFist]
            .iter()
            .filter_map(|&s| d.observe(Some(s)))
            .collect();
        assert_eq!(emitted, vec![OpenPalm, ClosedFist]);
    }

    #[test]
    fn debouncer_absorbs_missing_frames() {
        let mut d = GestureDebouncer::new();
        assert_eq!(d.observe(Some(GestureSymbol::Victory)), Some(GestureSymbol::Victory));
        assert_eq!(d.observe(None), None);
        assert_eq!(d.last(), GestureSymbol::Victory);
        assert_eq!(d.observe(Some(GestureSymbol::Victory)), None);
    }

    #[test]
    fn empty_frame_does_not_emit_spurious_none() {
        let mut d = GestureDebouncer::new();
        assert_eq!(d.observe_frame(&[]), None);
        assert_eq!(d.observe_frame(&posed_hand(FingerSet::POINT)), None);
        assert_eq!(d.observe_frame(&posed_hand(FingerSet::ALL)), Some(GestureSymbol::OpenPalm));
        assert_eq!(d.observe_frame(&posed_hand(FingerSet::POINT)), Some(GestureSymbol::NoPose));
    }

    #[test]
    fn labels_match_status_strings() {
        assert_eq!(GestureSymbol::OpenPalm.to_string(), "OPEN_PALM");
        assert_eq!(GestureSymbol::NoPose.to_string(), "NONE");
    }
}
