//! Hand landmark frames.
//!
//! A frame is an ordered slice of [`HAND_LANDMARK_COUNT`] points whose
//! meaning is fixed by position (the 21-point hand landmark convention).
//! Coordinates are normalised image coordinates: `x` grows to the right,
//! `y` grows *downward*, so a raised fingertip has a smaller `y` than its
//! knuckle.

use serde::Deserialize;

/// Number of points in a complete hand frame.
pub const HAND_LANDMARK_COUNT: usize = 21;

pub const WRIST:      usize = 0;
pub const THUMB_CMC:  usize = 1;
pub const THUMB_MCP:  usize = 2;
pub const THUMB_IP:   usize = 3;
pub const THUMB_TIP:  usize = 4;
pub const INDEX_MCP:  usize = 5;
pub const INDEX_TIP:  usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP:   usize = 13;
pub const RING_TIP:   usize = 16;
pub const PINKY_MCP:  usize = 17;
pub const PINKY_TIP:  usize = 20;

/// (tip, base) index pairs for index, middle, ring and pinky, in that order.
pub const FINGER_JOINTS: [(usize, usize); 4] = [
    (INDEX_TIP,  INDEX_MCP),
    (MIDDLE_TIP, MIDDLE_MCP),
    (RING_TIP,   RING_MCP),
    (PINKY_TIP,  PINKY_MCP),
];

// ════════════════════════════════════════════════════════════════════════════
// Landmark
// ════════════════════════════════════════════════════════════════════════════

/// One keypoint.  `z` is optional on the wire; 2D is enough for classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Landmark { x, y, z }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FingerSet
// ════════════════════════════════════════════════════════════════════════════

/// Which of the four long fingers are extended.  The thumb never counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FingerSet {
    pub index:  bool,
    pub middle: bool,
    pub ring:   bool,
    pub pinky:  bool,
}

impl FingerSet {
    pub const ALL:     FingerSet = FingerSet { index: true,  middle: true,  ring: true,  pinky: true  };
    pub const NONE:    FingerSet = FingerSet { index: false, middle: false, ring: false, pinky: false };
    pub const VICTORY: FingerSet = FingerSet { index: true,  middle: true,  ring: false, pinky: false };
    pub const POINT:   FingerSet = FingerSet { index: true,  middle: false, ring: false, pinky: false };

    pub fn as_array(&self) -> [bool; 4] {
        [self.index, self.middle, self.ring, self.pinky]
    }

    pub fn from_array(f: [bool; 4]) -> Self {
        FingerSet { index: f[0], middle: f[1], ring: f[2], pinky: f[3] }
    }

    /// Read the extended/retracted state of each finger out of a frame.
    ///
    /// Returns `None` for frames that are too short or carry non-finite
    /// coordinates at any of the points the comparison needs.
    pub fn from_landmarks(frame: &[Landmark]) -> Option<Self> {
        if frame.len() < HAND_LANDMARK_COUNT {
            return None;
        }
        let mut ext = [false; 4];
        for (slot, &(tip, base)) in ext.iter_mut().zip(FINGER_JOINTS.iter()) {
            let (t, b) = (frame[tip], frame[base]);
            if !t.y.is_finite() || !b.y.is_finite() {
                return None;
            }
            *slot = t.y < b.y;
        }
        Some(FingerSet::from_array(ext))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Reference poses
// ════════════════════════════════════════════════════════════════════════════

/// Build a plausible 21-point frame with the given fingers raised.
///
/// Used by the keyboard pose simulator and by tests; the geometry is a
/// front-facing right hand with the wrist near the bottom of the image.
pub fn posed_hand(fingers: FingerSet) -> Vec<Landmark> {
    let mut frame = vec![Landmark::default(); HAND_LANDMARK_COUNT];

    frame[WRIST]     = Landmark::new(0.50, 0.85, 0.0);
    frame[THUMB_CMC] = Landmark::new(0.42, 0.78, -0.01);
    frame[THUMB_MCP] = Landmark::new(0.36, 0.70, -0.02);
    frame[THUMB_IP]  = Landmark::new(0.32, 0.64, -0.03);
    frame[THUMB_TIP] = Landmark::new(0.30, 0.60, -0.03);

    for (f, &extended) in fingers.as_array().iter().enumerate() {
        let mcp = INDEX_MCP + f * 4;
        let x   = 0.40 + f as f32 * 0.07;
        // mcp, pip, dip, tip
        let ys: [f32; 4] = if extended {
            [0.60, 0.50, 0.42, 0.35]
        } else {
            [0.60, 0.55, 0.63, 0.68]
        };
        for (j, &y) in ys.iter().enumerate() {
            frame[mcp + j] = Landmark::new(x, y, -0.02 * j as f32);
        }
    }
    frame
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posed_hand_round_trips_every_finger_set() {
        for bits in 0u8..16 {
            let set = FingerSet::from_array([
                bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0,
            ]);
            assert_eq!(FingerSet::from_landmarks(&posed_hand(set)), Some(set));
        }
    }

    #[test]
    fn short_frame_is_rejected() {
        let frame = posed_hand(FingerSet::ALL);
        assert_eq!(FingerSet::from_landmarks(&frame[..20]), None);
        assert_eq!(FingerSet::from_landmarks(&[]), None);
    }

    #[test]
    fn nan_at_a_used_point_is_rejected() {
        let mut frame = posed_hand(FingerSet::ALL);
        frame[RING_TIP].y = f32::NAN;
        assert_eq!(FingerSet::from_landmarks(&frame), None);
    }

    #[test]
    fn nan_at_an_unused_point_is_ignored() {
        let mut frame = posed_hand(FingerSet::ALL);
        frame[THUMB_TIP].y = f32::NAN;
        assert_eq!(FingerSet::from_landmarks(&frame), Some(FingerSet::ALL));
    }

    #[test]
    fn landmark_z_defaults_when_missing() {
        let lm: Landmark = serde_json::from_str(r#"{"x":0.25,"y":0.75}"#).unwrap();
        assert_eq!(lm, Landmark::new(0.25, 0.75, 0.0));
    }
}
