//! The spin → select → reveal state machine.
//!
//! [`step`] is the pure transition table.  [`SelectionMachine`] owns the one
//! live [`SelectionState`], applies the side effects a step asks for
//! (picking a winner, arming or disarming the reveal timer) and is the only
//! place the state is ever written.  Presentation code reads
//! [`SelectionSnapshot`]s and nothing else.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::gesture::GestureSymbol;
use crate::picker::WinnerPicker;
use crate::roster::{Roster, StudentId};
use crate::timer::{RevealTimer, TimerToken};

// ════════════════════════════════════════════════════════════════════════════
// State, events, steps
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionState {
    /// Nothing in progress.
    Idle,
    /// Spinning, no winner yet.
    Spinning,
    /// Winner committed but withheld until `token`'s timer fires.
    Selecting { winner: StudentId, token: TimerToken },
    /// Winner fixed and on display.
    Selected { winner: StudentId },
}

impl SelectionState {
    pub fn phase(&self) -> Phase {
        match self {
            SelectionState::Idle            => Phase::Idle,
            SelectionState::Spinning        => Phase::Spinning,
            SelectionState::Selecting { .. } => Phase::Selecting,
            SelectionState::Selected { .. }  => Phase::Selected,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionEvent {
    /// The debounced gesture changed to this symbol.
    Gesture(GestureSymbol),
    /// The single manual control: start when idle, stop when spinning.
    ManualTrigger,
    /// The reveal timer armed with this token has fired.
    TimerElapsed(TimerToken),
    /// Explicit "start over".
    Reset,
}

/// What a (state, event) pair asks the machine to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// No-op.
    Stay,
    /// → Spinning, dropping any stale winner.
    StartSpin,
    /// → Selecting: pick the winner now, arm the reveal timer.
    Decide,
    /// → Selected with the already-chosen winner.
    Reveal(StudentId),
    /// → Idle, winner cleared.
    Clear,
}

/// The transition table.  Every pair not listed is [`Step::Stay`].
pub fn step(state: &SelectionState, event: &SelectionEvent) -> Step {
    use GestureSymbol as G;
    use SelectionEvent as E;
    use SelectionState as S;

    match (state, event) {
        (S::Idle, E::Gesture(G::OpenPalm)) | (S::Idle, E::ManualTrigger) => Step::StartSpin,

        (S::Spinning, E::Gesture(G::ClosedFist))
        | (S::Spinning, E::Gesture(G::Victory))
        | (S::Spinning, E::ManualTrigger) => Step::Decide,

        (S::Selecting { winner, token }, E::TimerElapsed(fired)) if fired == token => {
            Step::Reveal(*winner)
        }

        (S::Selected { .. }, E::Reset) => Step::Clear,

        _ => Step::Stay,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Phase & snapshot — what the presentation layer may see
// ════════════════════════════════════════════════════════════════════════════

/// Data-free view of [`SelectionState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Spinning,
    Selecting,
    Selected,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle      => "IDLE",
            Phase::Spinning  => "SPINNING",
            Phase::Selecting => "SELECTING",
            Phase::Selected  => "SELECTED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only picture of the machine after its most recent transition.
///
/// The committed winner is withheld while [`Phase::Selecting`]; it only
/// appears once the reveal has happened.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionSnapshot {
    pub phase:         Phase,
    pub gesture:       GestureSymbol,
    pub winner:        Option<StudentId>,
    pub winner_name:   Option<String>,
    /// Time spent in the current phase.
    pub phase_elapsed: Duration,
}

// ════════════════════════════════════════════════════════════════════════════
// SelectionMachine
// ════════════════════════════════════════════════════════════════════════════

pub struct SelectionMachine<P> {
    roster:     Arc<Roster>,
    picker:     P,
    timer:      RevealTimer,
    state:      SelectionState,
    gesture:    GestureSymbol,
    entered_at: Instant,
}

impl<P: WinnerPicker> SelectionMachine<P> {
    pub fn new(roster: Arc<Roster>, picker: P, reveal_delay: Duration, now: Instant) -> Self {
        SelectionMachine {
            roster,
            picker,
            timer:      RevealTimer::new(reveal_delay),
            state:      SelectionState::Idle,
            gesture:    GestureSymbol::NoPose,
            entered_at: now,
        }
    }

    /// Push one event through the transition table.
    ///
    /// Returns `true` if the state changed.  Gesture events always update
    /// the displayed gesture, whether or not they cause a transition.
    pub fn dispatch(&mut self, event: SelectionEvent, now: Instant) -> bool {
        if let SelectionEvent::Gesture(symbol) = event {
            self.gesture = symbol;
        }

        let next = match step(&self.state, &event) {
            Step::Stay => {
                if let SelectionEvent::TimerElapsed(token) = event {
                    debug!("[selection] ignoring stale timer token {}", token.raw());
                }
                return false;
            }
            Step::StartSpin => {
                self.timer.disarm();
                SelectionState::Spinning
            }
            Step::Decide => {
                let winner = self.decide();
                let token  = self.timer.arm(now);
                SelectionState::Selecting { winner, token }
            }
            Step::Reveal(winner) => {
                self.timer.disarm();
                info!(
                    "[selection] winner revealed: #{} {}",
                    winner,
                    self.roster.name_of(winner).unwrap_or("?")
                );
                SelectionState::Selected { winner }
            }
            Step::Clear => {
                self.timer.disarm();
                SelectionState::Idle
            }
        };

        debug!("[selection] {} -> {} on {:?}", self.state.phase(), next.phase(), event);
        self.state      = next;
        self.entered_at = now;
        true
    }

    /// Fire the reveal timer if it is due.  Call once per frame.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.timer.poll(now) {
            Some(token) => self.dispatch(SelectionEvent::TimerElapsed(token), now),
            None        => false,
        }
    }

    pub fn manual_trigger(&mut self, now: Instant) -> bool {
        self.dispatch(SelectionEvent::ManualTrigger, now)
    }

    pub fn reset(&mut self, now: Instant) -> bool {
        self.dispatch(SelectionEvent::Reset, now)
    }

    fn decide(&mut self) -> StudentId {
        let winner = self.picker.pick(&self.roster);
        if self.roster.contains(winner) {
            return winner;
        }
        // A picker handing back a foreign id must not leak into the state.
        let fallback = self.roster.students()[0].id;
        warn!("[selection] picker returned unknown id {}; using {}", winner, fallback);
        fallback
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn state(&self)   -> &SelectionState { &self.state }
    pub fn phase(&self)   -> Phase           { self.state.phase() }
    pub fn gesture(&self) -> GestureSymbol   { self.gesture }
    pub fn roster(&self)  -> &Arc<Roster>    { &self.roster }

    /// The winner once revealed; `None` in every other phase.
    pub fn revealed_winner(&self) -> Option<StudentId> {
        match self.state {
            SelectionState::Selected { winner } => Some(winner),
            _ => None,
        }
    }

    /// Time until the reveal while selecting.
    pub fn reveal_remaining(&self, now: Instant) -> Option<Duration> {
        self.timer.remaining(now)
    }

    pub fn snapshot(&self, now: Instant) -> SelectionSnapshot {
        let winner = self.revealed_winner();
        SelectionSnapshot {
            phase:         self.phase(),
            gesture:       self.gesture,
            winner,
            winner_name:   winner.and_then(|w| self.roster.name_of(w)).map(str::to_string),
            phase_elapsed: now.saturating_duration_since(self.entered_at),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picker::RandomPicker;
    use std::cell::Cell;
    use std::rc::Rc;

    const DELAY: Duration = Duration::from_millis(1500);

    /// Picker that hands out a fixed id and counts calls.
    struct Fixed {
        id:    StudentId,
        calls: Rc<Cell<u32>>,
    }

    impl WinnerPicker for Fixed {
        fn pick(&mut self, _roster: &Roster) -> StudentId {
            self.calls.set(self.calls.get() + 1);
            self.id
        }
    }

    fn roster() -> Arc<Roster> {
        Arc::new(Roster::from_names(["A", "B", "C"]).unwrap())
    }

    fn machine(id: u32) -> (SelectionMachine<Fixed>, Rc<Cell<u32>>, Instant) {
        let calls = Rc::new(Cell::new(0));
        let t0 = Instant::now();
        let m = SelectionMachine::new(
            roster(),
            Fixed { id: StudentId(id), calls: calls.clone() },
            DELAY,
            t0,
        );
        (m, calls, t0)
    }

    fn all_events(token: TimerToken) -> Vec<SelectionEvent> {
        let mut v: Vec<SelectionEvent> =
            GestureSymbol::ALL.iter().map(|&g| SelectionEvent::Gesture(g)).collect();
        v.push(SelectionEvent::ManualTrigger);
        v.push(SelectionEvent::TimerElapsed(token));
        v.push(SelectionEvent::Reset);
        v
    }

    #[test]
    fn step_table_from_idle() {
        let mut t = RevealTimer::default();
        let tok = t.arm(Instant::now());
        for e in all_events(tok) {
            let expected = matches!(
                e,
                SelectionEvent::Gesture(GestureSymbol::OpenPalm) | SelectionEvent::ManualTrigger
            );
            assert_eq!(step(&SelectionState::Idle, &e) == Step::StartSpin, expected, "{:?}", e);
            if !expected {
                assert_eq!(step(&SelectionState::Idle, &e), Step::Stay);
            }
        }
    }

    #[test]
    fn step_table_from_spinning() {
        let mut t = RevealTimer::default();
        let tok = t.arm(Instant::now());
        for e in all_events(tok) {
            let expected = matches!(
                e,
                SelectionEvent::Gesture(GestureSymbol::ClosedFist)
                    | SelectionEvent::Gesture(GestureSymbol::Victory)
                    | SelectionEvent::ManualTrigger
            );
            let got = step(&SelectionState::Spinning, &e);
            assert_eq!(got, if expected { Step::Decide } else { Step::Stay }, "{:?}", e);
        }
    }

    #[test]
    fn step_table_from_selecting_only_matching_timer() {
        let mut t = RevealTimer::default();
        let now = Instant::now();
        let stale = t.arm(now);
        let live  = t.arm(now);
        let s = SelectionState::Selecting { winner: StudentId(2), token: live };
        for e in all_events(stale) {
            assert_eq!(step(&s, &e), Step::Stay, "{:?}", e);
        }
        assert_eq!(step(&s, &SelectionEvent::TimerElapsed(live)), Step::Reveal(StudentId(2)));
    }

    #[test]
    fn step_table_from_selected_only_reset() {
        let mut t = RevealTimer::default();
        let tok = t.arm(Instant::now());
        let s = SelectionState::Selected { winner: StudentId(1) };
        for e in all_events(tok) {
            let want = if e == SelectionEvent::Reset { Step::Clear } else { Step::Stay };
            assert_eq!(step(&s, &e), want, "{:?}", e);
        }
    }

    #[test]
    fn open_palm_then_fist_decides_once() {
        let (mut m, calls, t0) = machine(1);
        assert!(m.dispatch(SelectionEvent::Gesture(GestureSymbol::OpenPalm), t0));
        assert_eq!(m.phase(), Phase::Spinning);
        assert!(m.dispatch(SelectionEvent::Gesture(GestureSymbol::ClosedFist), t0));
        assert_eq!(m.phase(), Phase::Selecting);
        assert_eq!(calls.get(), 1);

        // Further triggers while deciding are ignored and never re-pick.
        assert!(!m.manual_trigger(t0));
        assert!(!m.dispatch(SelectionEvent::Gesture(GestureSymbol::Victory), t0));
        assert!(!m.reset(t0));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn winner_is_hidden_until_reveal() {
        let (mut m, _, t0) = machine(2);
        m.manual_trigger(t0);
        m.manual_trigger(t0);
        let snap = m.snapshot(t0);
        assert_eq!(snap.phase, Phase::Selecting);
        assert_eq!(snap.winner, None);
        assert_eq!(snap.winner_name, None);
    }

    #[test]
    fn reveal_waits_for_the_full_window() {
        let (mut m, _, t0) = machine(2);
        m.manual_trigger(t0);
        m.manual_trigger(t0);
        assert!(!m.tick(t0 + Duration::from_millis(1499)));
        assert_eq!(m.phase(), Phase::Selecting);
        assert!(m.tick(t0 + DELAY));
        let snap = m.snapshot(t0 + DELAY);
        assert_eq!(snap.phase, Phase::Selected);
        assert_eq!(snap.winner, Some(StudentId(2)));
        assert_eq!(snap.winner_name.as_deref(), Some("C"));
    }

    #[test]
    fn stale_token_is_ignored() {
        let (mut m, _, t0) = machine(0);
        m.manual_trigger(t0);
        m.manual_trigger(t0);
        let SelectionState::Selecting { token, .. } = *m.state() else {
            panic!("expected selecting");
        };
        let mut other = RevealTimer::default();
        other.arm(t0);
        let foreign = other.arm(t0);
        assert_ne!(foreign, token);
        assert!(!m.dispatch(SelectionEvent::TimerElapsed(foreign), t0 + DELAY));
        assert_eq!(m.phase(), Phase::Selecting);
        assert!(m.dispatch(SelectionEvent::TimerElapsed(token), t0 + DELAY));
        assert_eq!(m.phase(), Phase::Selected);
    }

    #[test]
    fn timer_fired_after_moving_on_is_a_no_op() {
        let (mut m, _, t0) = machine(0);
        m.manual_trigger(t0);
        m.manual_trigger(t0);
        let SelectionState::Selecting { token, .. } = *m.state() else {
            panic!("expected selecting");
        };
        m.tick(t0 + DELAY);
        m.reset(t0 + DELAY);
        assert_eq!(m.phase(), Phase::Idle);
        assert!(!m.dispatch(SelectionEvent::TimerElapsed(token), t0 + DELAY * 2));
        assert_eq!(m.phase(), Phase::Idle);
        assert!(m.reveal_remaining(t0).is_none());
    }

    #[test]
    fn reset_only_from_selected() {
        let (mut m, _, t0) = machine(0);
        assert!(!m.reset(t0));
        m.manual_trigger(t0);
        assert!(!m.reset(t0));
        assert_eq!(m.phase(), Phase::Spinning);
    }

    #[test]
    fn reset_clears_winner() {
        let (mut m, _, t0) = machine(1);
        m.manual_trigger(t0);
        m.manual_trigger(t0);
        m.tick(t0 + DELAY);
        assert_eq!(m.revealed_winner(), Some(StudentId(1)));
        assert!(m.reset(t0 + DELAY));
        assert_eq!(m.revealed_winner(), None);
        assert_eq!(*m.state(), SelectionState::Idle);
    }

    #[test]
    fn gestures_are_recorded_even_without_transition() {
        let (mut m, _, t0) = machine(0);
        assert!(!m.dispatch(SelectionEvent::Gesture(GestureSymbol::Victory), t0));
        assert_eq!(m.snapshot(t0).gesture, GestureSymbol::Victory);
    }

    #[test]
    fn foreign_id_from_picker_falls_back_to_roster() {
        let (mut m, _, t0) = machine(99);
        m.manual_trigger(t0);
        m.manual_trigger(t0);
        m.tick(t0 + DELAY);
        let w = m.revealed_winner().unwrap();
        assert!(m.roster().contains(w));
    }

    #[test]
    fn phase_elapsed_tracks_entry_time() {
        let (mut m, _, t0) = machine(0);
        m.manual_trigger(t0 + Duration::from_millis(200));
        let snap = m.snapshot(t0 + Duration::from_millis(700));
        assert_eq!(snap.phase_elapsed, Duration::from_millis(500));
    }

    #[test]
    fn repeated_rounds_can_repeat_a_winner() {
        let roster = Arc::new(Roster::from_names(["solo"]).unwrap());
        let t0 = Instant::now();
        let mut m = SelectionMachine::new(roster, RandomPicker::seeded(5), DELAY, t0);
        for round in 0..3u32 {
            let t = t0 + DELAY * (round * 2);
            m.manual_trigger(t);
            m.manual_trigger(t);
            m.tick(t + DELAY);
            assert_eq!(m.revealed_winner(), Some(StudentId(0)));
            m.reset(t + DELAY);
        }
    }
}
