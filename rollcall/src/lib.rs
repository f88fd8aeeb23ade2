//! # rollcall
//!
//! Gesture-driven random student selector.  Every student on the roster is a
//! marker on a slowly turning sphere; an open palm sets it spinning, a
//! closed fist stops it on one randomly chosen student, who is revealed
//! after a short suspense delay together with a trivia question.
//!
//! ## Gesture → Action mapping
//!
//! | Gesture | Phase | Action |
//! |---|---|---|
//! | Open palm (all four long fingers up; thumb ignored) | Idle | Start spinning |
//! | Closed fist (no fingers up) | Spinning | Pick the winner, start the reveal delay |
//! | Victory (index + middle up) | Spinning | Same as closed fist |
//! | Anything else / no hand | any | Nothing |
//!
//! Gestures are edge-triggered: holding a pose fires once, and a frame with
//! no hand does not re-arm it.
//!
//! ## Perception modes
//!
//! * `keyboard` (default): number keys are turned into synthetic hand
//!   frames and pushed through the real classifier.
//! * `process`: an external landmark provider speaks a line protocol on
//!   stdin/stdout (see [`tracker`]).
//! * `leap`: a LeapMotion controller via LeapC (requires the `leap`
//!   feature).
//!
//! ### Keyboard shortcuts
//!
//! | Key | Action |
//! |---|---|
//! | `Space` | Manual trigger: spin when idle, stop when spinning |
//! | `R` | Start over after a reveal |
//! | `Enter` | Show / hide the trivia answer |
//! | `1` `2` `3` `4` | Simulate open palm / fist / victory / pointing |
//! | `0` | Simulate the hand leaving the frame |
//! | `Q` / `Escape` | Quit |

pub mod config;
pub mod gesture;
pub mod tracker;
pub mod scene;
pub mod cues;
pub mod trivia;
pub mod visualizer;
pub mod app;
