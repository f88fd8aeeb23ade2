//! # rollcall_core
//!
//! The logic behind the roll-call selector: a hand-pose classifier, an
//! edge-triggered debouncer, a uniform winner picker and the
//! spin → select → reveal state machine that ties them together.
//!
//! Nothing in here touches a window, a camera or the network.  Landmark
//! frames go in, [`SelectionSnapshot`]s come out.
//!
//! ## Transition table
//!
//! | State | Event | Next |
//! |---|---|---|
//! | Idle | open palm / manual trigger | Spinning |
//! | Spinning | closed fist / victory / manual trigger | Selecting (winner picked now) |
//! | Selecting | reveal timer elapsed (matching token) | Selected |
//! | Selected | reset | Idle |
//!
//! Every other (state, event) pair is a no-op.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//! use rollcall_core::{Roster, RandomPicker, SelectionMachine, SelectionEvent, Phase};
//!
//! let roster  = Arc::new(Roster::from_names(["Ada", "Brian", "Chen"]).unwrap());
//! let picker  = RandomPicker::seeded(7);
//! let t0      = Instant::now();
//! let mut sm  = SelectionMachine::new(roster, picker, Duration::from_millis(1500), t0);
//!
//! sm.dispatch(SelectionEvent::ManualTrigger, t0);   // Idle → Spinning
//! sm.dispatch(SelectionEvent::ManualTrigger, t0);   // Spinning → Selecting
//! sm.tick(t0 + Duration::from_millis(1500));        // Selecting → Selected
//! assert_eq!(sm.snapshot(t0).phase, Phase::Selected);
//! ```

pub mod error;
pub mod landmark;
pub mod gesture;
pub mod roster;
pub mod picker;
pub mod timer;
pub mod selection;

pub use error::RosterError;
pub use landmark::{FingerSet, Landmark, HAND_LANDMARK_COUNT};
pub use gesture::{classify, GestureDebouncer, GestureSymbol};
pub use roster::{Roster, Student, StudentId};
pub use picker::{RandomPicker, WinnerPicker};
pub use timer::{RevealTimer, TimerToken, DEFAULT_REVEAL_DELAY};
pub use selection::{
    step, Phase, SelectionEvent, SelectionMachine, SelectionSnapshot, SelectionState, Step,
};
