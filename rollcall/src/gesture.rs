//! Input sources: keyboard controls, simulated poses, landmark providers.
//!
//! The public interface is [`InputEvent`] delivered over one `mpsc` channel.
//! Every source runs on its own thread and only ever sends; the app loop is
//! the single consumer.  Consumers don't need to know whether a gesture came
//! from a camera, a LeapMotion controller or the number keys.

use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use rollcall_core::landmark::posed_hand;
use rollcall_core::{FingerSet, GestureDebouncer, GestureSymbol, Landmark};

use crate::tracker::TrackerProcess;

// ════════════════════════════════════════════════════════════════════════════
// InputEvent
// ════════════════════════════════════════════════════════════════════════════

/// Everything the app loop reacts to.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// The debounced hand pose changed.
    Gesture(GestureSymbol),
    /// Space: start when idle, stop when spinning.
    ManualTrigger,
    /// R: start over once a winner is shown.
    Reset,
    /// Enter: show or hide the trivia answer.
    ToggleAnswer,
    /// The landmark provider finished loading.
    PerceptionReady,
    /// The landmark provider failed; manual control keeps working.
    PerceptionUnavailable(String),
    /// Quit the application.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// GestureSource trait — unified interface for every provider
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`InputEvent`]s over a channel.
pub trait GestureSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<InputEvent>);
}

/// Spawn a source on its own thread, feeding the shared channel.
pub fn spawn_gesture_source<G: GestureSource>(source: G, tx: Sender<InputEvent>) -> JoinHandle<()> {
    thread::spawn(move || Box::new(source).run(tx))
}

/// One per-frame cycle: classify, debounce, forward on change.
///
/// Returns `false` once the receiving end has gone away.
fn forward_frame(
    debouncer: &mut GestureDebouncer,
    frame:     &[Landmark],
    tx:        &Sender<InputEvent>,
) -> bool {
    match debouncer.observe_frame(frame) {
        Some(symbol) => {
            debug!("[gesture] {}", symbol);
            tx.send(InputEvent::Gesture(symbol)).is_ok()
        }
        None => true,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimGestureSource — keyboard controls and pose simulation
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimInput {
    KeyDown(SimKey),
}

/// Keys the window forwards (mapped from minifb `Key`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    Trigger,      // Space
    Reset,        // R
    ToggleAnswer, // Enter
    PosePalm,     // 1
    PoseFist,     // 2
    PoseVictory,  // 3
    PosePoint,    // 4
    HandAway,     // 0
    Quit,         // Q / Escape
}

impl SimKey {
    /// The synthetic frame a pose key stands for.  `Some(empty)` is a
    /// frame with no hand in it; `None` means the key is not a pose.
    pub fn pose_frame(self) -> Option<Vec<Landmark>> {
        match self {
            SimKey::PosePalm    => Some(posed_hand(FingerSet::ALL)),
            SimKey::PoseFist    => Some(posed_hand(FingerSet::NONE)),
            SimKey::PoseVictory => Some(posed_hand(FingerSet::VICTORY)),
            SimKey::PosePoint   => Some(posed_hand(FingerSet::POINT)),
            SimKey::HandAway    => Some(Vec::new()),
            _ => None,
        }
    }
}

/// Translates [`SimInput`] from the window into [`InputEvent`]s.
///
/// With `simulate_poses` on, number keys are turned into landmark frames and
/// pushed through the real classifier and debouncer.  With it off (a camera
/// or Leap is the pose source), number keys are ignored and only the manual
/// controls pass through.
pub struct SimGestureSource {
    pub rx:             Receiver<SimInput>,
    pub simulate_poses: bool,
}

impl GestureSource for SimGestureSource {
    fn run(self: Box<Self>, tx: Sender<InputEvent>) {
        let mut debouncer = GestureDebouncer::new();
        for SimInput::KeyDown(key) in self.rx {
            let event = match key {
                SimKey::Trigger      => InputEvent::ManualTrigger,
                SimKey::Reset        => InputEvent::Reset,
                SimKey::ToggleAnswer => InputEvent::ToggleAnswer,
                SimKey::Quit         => {
                    let _ = tx.send(InputEvent::Quit);
                    return;
                }
                pose => {
                    if !self.simulate_poses {
                        debug!("[gesture] pose key {:?} ignored: not simulating", pose);
                        continue;
                    }
                    let frame = pose.pose_frame().unwrap_or_default();
                    if !forward_frame(&mut debouncer, &frame, &tx) { return; }
                    continue;
                }
            };
            if tx.send(event).is_err() { return; }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ProcessGestureSource — external landmark provider
// ════════════════════════════════════════════════════════════════════════════

/// Gesture source backed by a [`TrackerProcess`].
///
/// Waits for the provider to report `READY`, then requests one frame at a
/// time; the next request is only written after the previous frame has been
/// classified and debounced.  Any failure ends the thread with
/// [`InputEvent::PerceptionUnavailable`].  Dropping the source (thread exit)
/// kills the provider.
pub struct ProcessGestureSource {
    tracker:       TrackerProcess,
    ready_timeout: Duration,
}

impl ProcessGestureSource {
    pub fn new(tracker: TrackerProcess, ready_timeout: Duration) -> Self {
        ProcessGestureSource { tracker, ready_timeout }
    }
}

impl GestureSource for ProcessGestureSource {
    fn run(mut self: Box<Self>, tx: Sender<InputEvent>) {
        let timeout = self.ready_timeout;
        if let Err(e) = self.tracker.wait_ready(timeout) {
            warn!("[gesture] landmark provider failed to start: {:#}", e);
            let _ = tx.send(InputEvent::PerceptionUnavailable(format!("{:#}", e)));
            return;
        }
        info!("[gesture] landmark provider ready");
        if tx.send(InputEvent::PerceptionReady).is_err() { return; }

        let mut debouncer = GestureDebouncer::new();
        loop {
            let frame = match self.tracker.next_frame() {
                Ok(f)  => f.unwrap_or_default(),
                Err(e) => {
                    warn!("[gesture] landmark provider lost: {:#}", e);
                    let _ = tx.send(InputEvent::PerceptionUnavailable(format!("{:#}", e)));
                    return;
                }
            };
            if !forward_frame(&mut debouncer, &frame, &tx) { return; }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapGestureSource — real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Gesture source backed by a real LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Each tracking frame's first hand is mapped onto the 21-point convention:
/// palm centre as the wrist, then for each digit the metacarpal, proximal,
/// intermediate and distal bone end joints.  Leap's y axis points up, so it
/// is negated into image convention.  Hold the hand upright, fingers to the
/// ceiling, for the extended/retracted test to read cleanly.
#[cfg(feature = "leap")]
pub struct LeapGestureSource;

#[cfg(feature = "leap")]
impl GestureSource for LeapGestureSource {
    fn run(self: Box<Self>, tx: Sender<InputEvent>) {
        use leaprs::*;

        let mut connection = match Connection::create(ConnectionConfig::default()) {
            Ok(c)  => c,
            Err(e) => {
                let reason = format!("LeapC connection failed: {:?}", e);
                warn!("[gesture] {}", reason);
                let _ = tx.send(InputEvent::PerceptionUnavailable(reason));
                return;
            }
        };
        if let Err(e) = connection.open() {
            let reason = format!("LeapMotion device unavailable: {:?}", e);
            warn!("[gesture] {}", reason);
            let _ = tx.send(InputEvent::PerceptionUnavailable(reason));
            return;
        }
        if tx.send(InputEvent::PerceptionReady).is_err() { return; }

        let mut debouncer = GestureDebouncer::new();
        let mut link      = LinkWatch::new(LEAP_POLL_FAILURE_LIMIT);
        loop {
            let msg = match connection.poll(100) {
                Ok(m) => {
                    if link.success() == Some(LinkChange::Restored) {
                        info!("[gesture] LeapMotion tracking resumed");
                        if tx.send(InputEvent::PerceptionReady).is_err() { return; }
                    }
                    m
                }
                Err(e) => {
                    if link.failure() == Some(LinkChange::Lost) {
                        let reason = format!("LeapMotion stopped responding: {:?}", e);
                        warn!("[gesture] {}", reason);
                        if tx.send(InputEvent::PerceptionUnavailable(reason)).is_err() { return; }
                    }
                    continue;
                }
            };

            if let Event::Tracking(frame) = msg.event() {
                let landmarks = frame.hands().next().map(|h| leap_hand_landmarks(&h));
                let landmarks = landmarks.unwrap_or_default();
                if !forward_frame(&mut debouncer, &landmarks, &tx) { return; }
            }
        }
    }
}

/// Consecutive failed 100 ms polls (about three seconds) before the device counts as lost.
#[cfg(feature = "leap")]
const LEAP_POLL_FAILURE_LIMIT: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "leap"), allow(dead_code))]
enum LinkChange {
    Lost,
    Restored,
}

/// Counts consecutive poll failures of a streaming device and reports when
/// the link crosses between healthy and lost.
#[derive(Debug)]
#[cfg_attr(not(feature = "leap"), allow(dead_code))]
struct LinkWatch {
    failures: u32,
    limit:    u32,
    lost:     bool,
}

#[cfg_attr(not(feature = "leap"), allow(dead_code))]
impl LinkWatch {
    fn new(limit: u32) -> Self {
        LinkWatch { failures: 0, limit: limit.max(1), lost: false }
    }

    fn failure(&mut self) -> Option<LinkChange> {
        self.failures = self.failures.saturating_add(1);
        if !self.lost && self.failures >= self.limit {
            self.lost = true;
            return Some(LinkChange::Lost);
        }
        None
    }

    fn success(&mut self) -> Option<LinkChange> {
        self.failures = 0;
        if self.lost {
            self.lost = false;
            return Some(LinkChange::Restored);
        }
        None
    }
}

#[cfg(feature = "leap")]
fn leap_hand_landmarks(hand: &leaprs::Hand) -> Vec<Landmark> {
    let palm = hand.palm().position();

    let mut out = Vec::with_capacity(rollcall_core::HAND_LANDMARK_COUNT);
    out.push(Landmark::new(palm.x, -palm.y, palm.z));
    for digit in hand.digits() {
        for joint in [
            digit.metacarpal().next_joint(),
            digit.proximal().next_joint(),
            digit.intermediate().next_joint(),
            digit.distal().next_joint(),
        ] {
            out.push(Landmark::new(joint.x, -joint.y, joint.z));
        }
    }
    out
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn run_keys(keys: &[SimKey], simulate_poses: bool) -> Vec<InputEvent> {
        let (sim_tx, sim_rx) = mpsc::channel();
        let (tx, rx) = mpsc::channel();
        for &k in keys {
            sim_tx.send(SimInput::KeyDown(k)).unwrap();
        }
        drop(sim_tx);
        let handle = spawn_gesture_source(SimGestureSource { rx: sim_rx, simulate_poses }, tx);
        handle.join().unwrap();
        rx.try_iter().collect()
    }

    #[test]
    fn controls_pass_straight_through() {
        let events = run_keys(&[SimKey::Trigger, SimKey::ToggleAnswer, SimKey::Reset], true);
        assert_eq!(
            events,
            vec![InputEvent::ManualTrigger, InputEvent::ToggleAnswer, InputEvent::Reset]
        );
    }

    #[test]
    fn pose_keys_are_debounced() {
        let events = run_keys(
            &[
                SimKey::PosePalm,
                SimKey::PosePalm,
                SimKey::HandAway,
                SimKey::PosePalm,
                SimKey::PoseFist,
                SimKey::PosePoint,
                SimKey::PoseVictory,
            ],
            true,
        );
        assert_eq!(
            events,
            vec![
                InputEvent::Gesture(GestureSymbol::OpenPalm),
                InputEvent::Gesture(GestureSymbol::ClosedFist),
                InputEvent::Gesture(GestureSymbol::NoPose),
                InputEvent::Gesture(GestureSymbol::Victory),
            ]
        );
    }

    #[test]
    fn pose_keys_ignored_when_not_simulating() {
        let events = run_keys(&[SimKey::PosePalm, SimKey::Trigger, SimKey::PoseFist], false);
        assert_eq!(events, vec![InputEvent::ManualTrigger]);
    }

    #[test]
    fn quit_ends_the_source() {
        let events = run_keys(&[SimKey::Quit, SimKey::Trigger], true);
        assert_eq!(events, vec![InputEvent::Quit]);
    }

    #[test]
    fn hand_away_is_an_empty_frame() {
        assert_eq!(SimKey::HandAway.pose_frame(), Some(Vec::new()));
        assert_eq!(SimKey::Trigger.pose_frame(), None);
        assert_eq!(SimKey::PosePoint.pose_frame().map(|f| f.len()), Some(21));
    }

    #[test]
    fn link_watch_reports_loss_once_and_recovery() {
        let mut link = LinkWatch::new(3);
        assert_eq!(link.success(), None);
        assert_eq!(link.failure(), None);
        assert_eq!(link.failure(), None);
        assert_eq!(link.success(), None);

        assert_eq!(link.failure(), None);
        assert_eq!(link.failure(), None);
        assert_eq!(link.failure(), Some(LinkChange::Lost));
        assert_eq!(link.failure(), None);
        assert_eq!(link.failure(), None);
        assert_eq!(link.success(), Some(LinkChange::Restored));
        assert_eq!(link.success(), None);
    }

    // ── ProcessGestureSource against scripted providers ──────────────────

    #[cfg(unix)]
    fn frame_line(fingers: FingerSet) -> String {
        let pts: Vec<String> = posed_hand(fingers)
            .iter()
            .map(|p| format!("{{\"x\":{},\"y\":{},\"z\":{}}}", p.x, p.y, p.z))
            .collect();
        format!("{{\"hands\":[{{\"score\":0.9,\"landmarks\":[{}]}}],\"error\":null}}", pts.join(","))
    }

    /// Provider that prints READY, then answers each request with the next
    /// line of `replies` and exits once they run out.
    #[cfg(unix)]
    fn scripted_provider(replies: &[String]) -> TrackerProcess {
        let mut script = String::from("echo READY\n");
        for reply in replies {
            script.push_str(&format!("read cmd || exit 0\nprintf '%s\\n' '{}'\n", reply));
        }
        TrackerProcess::spawn("sh", &["-c".to_string(), script]).unwrap()
    }

    #[cfg(unix)]
    fn run_provider(tracker: TrackerProcess, ready_timeout: Duration) -> Vec<InputEvent> {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_gesture_source(ProcessGestureSource::new(tracker, ready_timeout), tx);
        handle.join().unwrap();
        rx.try_iter().collect()
    }

    #[cfg(unix)]
    fn is_unavailable(event: &InputEvent) -> bool {
        matches!(event, InputEvent::PerceptionUnavailable(_))
    }

    #[cfg(unix)]
    #[test]
    fn provider_frames_become_debounced_gestures() {
        let mut replies = vec![frame_line(FingerSet::ALL); 3];
        replies.push(r#"{"hands":[{"landmarks":[{"x":0.1,"y":null}]}]}"#.to_string());
        replies.push(r#"{"hands":[],"error":null}"#.to_string());
        replies.extend(vec![frame_line(FingerSet::NONE); 3]);

        let events = run_provider(scripted_provider(&replies), Duration::from_secs(5));
        assert_eq!(events.len(), 4, "{:?}", events);
        assert_eq!(events[0], InputEvent::PerceptionReady);
        assert_eq!(events[1], InputEvent::Gesture(GestureSymbol::OpenPalm));
        assert_eq!(events[2], InputEvent::Gesture(GestureSymbol::ClosedFist));
        // The script ends after its last reply.
        assert!(is_unavailable(&events[3]));
    }

    #[cfg(unix)]
    #[test]
    fn provider_exiting_mid_stream_is_unavailable() {
        let replies = vec![frame_line(FingerSet::VICTORY)];
        let events = run_provider(scripted_provider(&replies), Duration::from_secs(5));
        assert_eq!(events.len(), 3, "{:?}", events);
        assert_eq!(events[0], InputEvent::PerceptionReady);
        assert_eq!(events[1], InputEvent::Gesture(GestureSymbol::Victory));
        assert!(is_unavailable(&events[2]));
    }

    #[cfg(unix)]
    #[test]
    fn provider_without_ready_is_unavailable() {
        let tracker = TrackerProcess::spawn(
            "sh",
            &["-c".to_string(), "echo 'loading model'; echo 'no camera'".to_string()],
        )
        .unwrap();
        let events = run_provider(tracker, Duration::from_secs(5));
        assert_eq!(events.len(), 1, "{:?}", events);
        assert!(is_unavailable(&events[0]));
    }

    #[cfg(unix)]
    #[test]
    fn provider_ready_timeout_is_unavailable() {
        let tracker = TrackerProcess::spawn("sh", &["-c".to_string(), "exec sleep 5".to_string()]).unwrap();
        let events = run_provider(tracker, Duration::from_millis(200));
        assert_eq!(events.len(), 1, "{:?}", events);
        match &events[0] {
            InputEvent::PerceptionUnavailable(reason) => assert!(reason.contains("within 200 ms")),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }
}
