//! Top-level application state.
//!
//! `App` owns the `SelectionMachine`, the `Scene`, the `CuePlayer` and the
//! `TriviaService`.  It processes `InputEvent`s, turns phase changes into
//! cues and trivia requests, and feeds the visualizer each frame.

use std::sync::mpsc::{self, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};

use rollcall_core::{Phase, RandomPicker, Roster, SelectionEvent, SelectionMachine, SelectionSnapshot};

use crate::config::{AppConfig, PerceptionMode};
use crate::cues::CuePlayer;
use crate::gesture::{spawn_gesture_source, InputEvent, SimGestureSource, SimInput};
use crate::scene::Scene;
use crate::tracker::TrackerKill;
use crate::trivia::{Trivia, TriviaService};
use crate::visualizer::{Overlay, Visualizer, BASE_TITLE};

// ════════════════════════════════════════════════════════════════════════════
// Status shown next to the scene
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PerceptionStatus {
    /// Number keys simulate poses; no provider runs.
    Keyboard,
    Loading,
    Ready,
    /// The provider failed; manual control still works.
    Unavailable(String),
}

impl PerceptionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PerceptionStatus::Keyboard       => "KEYBOARD",
            PerceptionStatus::Loading        => "LOADING",
            PerceptionStatus::Ready          => "READY",
            PerceptionStatus::Unavailable(_) => "UNAVAILABLE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriviaCard {
    Hidden,
    Loading,
    Shown(Trivia),
}

// ════════════════════════════════════════════════════════════════════════════
// App
// ════════════════════════════════════════════════════════════════════════════

pub struct App {
    // ── selection ────────────────────────────────────────────────────────
    machine:      SelectionMachine<RandomPicker>,
    last_phase:   Phase,
    reveal_delay: Duration,

    // ── presentation ─────────────────────────────────────────────────────
    scene:        Scene,
    cues:         CuePlayer,

    // ── trivia ───────────────────────────────────────────────────────────
    trivia:       Option<TriviaService>,
    card:         TriviaCard,
    show_answer:  bool,

    perception:   PerceptionStatus,
}

impl App {
    pub fn new(
        roster:       Arc<Roster>,
        picker:       RandomPicker,
        reveal_delay: Duration,
        cues:         CuePlayer,
        trivia:       Option<TriviaService>,
        perception:   PerceptionStatus,
        now:          Instant,
    ) -> Self {
        let scene   = Scene::new(&roster);
        let machine = SelectionMachine::new(roster, picker, reveal_delay, now);
        App {
            last_phase: machine.phase(),
            machine,
            reveal_delay,
            scene,
            cues,
            trivia,
            card:        TriviaCard::Hidden,
            show_answer: false,
            perception,
        }
    }

    // ── process one InputEvent ───────────────────────────────────────────

    /// Returns `false` when the app should quit.
    pub fn handle_input(&mut self, event: InputEvent, now: Instant) -> bool {
        match event {
            InputEvent::Gesture(symbol) => {
                self.machine.dispatch(SelectionEvent::Gesture(symbol), now);
            }
            InputEvent::ManualTrigger => {
                self.machine.manual_trigger(now);
            }
            InputEvent::Reset => {
                self.machine.reset(now);
            }
            InputEvent::ToggleAnswer => {
                if matches!(self.card, TriviaCard::Shown(_)) {
                    self.show_answer = !self.show_answer;
                }
            }
            InputEvent::PerceptionReady => {
                info!("[app] perception ready");
                self.perception = PerceptionStatus::Ready;
            }
            InputEvent::PerceptionUnavailable(reason) => {
                warn!("[app] perception unavailable: {}", reason);
                self.perception = PerceptionStatus::Unavailable(reason);
            }
            InputEvent::Quit => return false,
        }
        self.sync_phase();
        true
    }

    // ── per-frame update ─────────────────────────────────────────────────

    pub fn tick(&mut self, now: Instant, dt: f32) {
        self.machine.tick(now);
        self.sync_phase();

        if let Some(service) = self.trivia.as_mut() {
            if let Some(t) = service.poll() {
                info!("[app] trivia: {}", t.question);
                self.card = TriviaCard::Shown(t);
            }
        }

        let snap = self.machine.snapshot(now);
        self.scene.advance(&snap, dt);
    }

    /// Run the side effects of entering a new phase, once per change.
    fn sync_phase(&mut self) {
        let phase = self.machine.phase();
        if phase == self.last_phase {
            return;
        }
        debug!("[app] {} → {}", self.last_phase, phase);
        self.last_phase = phase;

        match phase {
            Phase::Spinning => {
                self.clear_trivia();
                self.cues.spin();
            }
            Phase::Selecting => self.cues.slow(self.reveal_delay),
            Phase::Selected => {
                self.cues.reveal();
                let name = self.machine.revealed_winner()
                    .and_then(|id| self.machine.roster().name_of(id))
                    .map(str::to_string);
                if let Some(name) = &name {
                    info!("[app] selected {}", name);
                }
                if let (Some(service), Some(name)) = (self.trivia.as_mut(), name) {
                    service.request(&name);
                    self.card = TriviaCard::Loading;
                }
            }
            Phase::Idle => {
                self.clear_trivia();
                self.cues.idle();
            }
        }
    }

    fn clear_trivia(&mut self) {
        if let Some(service) = self.trivia.as_mut() {
            service.cancel();
        }
        self.card        = TriviaCard::Hidden;
        self.show_answer = false;
    }

    // ── accessors for the visualizer ─────────────────────────────────────

    pub fn phase(&self)       -> Phase             { self.machine.phase() }
    pub fn scene(&self)       -> &Scene            { &self.scene }
    pub fn roster(&self)      -> &Arc<Roster>      { self.machine.roster() }
    pub fn perception(&self)  -> &PerceptionStatus { &self.perception }
    pub fn card(&self)        -> &TriviaCard       { &self.card }
    pub fn show_answer(&self) -> bool              { self.show_answer }

    pub fn snapshot(&self, now: Instant) -> SelectionSnapshot {
        self.machine.snapshot(now)
    }

    /// Window title; carries the winner's full name once revealed.
    pub fn window_title(&self) -> String {
        match self.machine.revealed_winner().and_then(|id| self.machine.roster().name_of(id)) {
            Some(name) => format!("{} - {}", BASE_TITLE, name),
            None       => BASE_TITLE.to_string(),
        }
    }

    pub fn shutdown(&mut self) {
        self.clear_trivia();
        self.cues.shutdown();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Perception startup
// ════════════════════════════════════════════════════════════════════════════

/// Start the configured landmark source, if any.  Failures are reported as
/// `Unavailable` rather than errors.
fn start_perception(cfg: &AppConfig, tx: &Sender<InputEvent>) -> (PerceptionStatus, Option<TrackerKill>) {
    match cfg.perception.mode {
        PerceptionMode::Keyboard => (PerceptionStatus::Keyboard, None),
        PerceptionMode::Process => {
            use crate::gesture::ProcessGestureSource;
            use crate::tracker::TrackerProcess;

            match TrackerProcess::spawn(&cfg.perception.command, &cfg.perception.args) {
                Ok(tracker) => {
                    let kill = tracker.kill_handle();
                    spawn_gesture_source(ProcessGestureSource::new(tracker, cfg.ready_timeout()), tx.clone());
                    (PerceptionStatus::Loading, Some(kill))
                }
                Err(e) => {
                    warn!("[app] {:#}", e);
                    (PerceptionStatus::Unavailable(format!("{:#}", e)), None)
                }
            }
        }
        PerceptionMode::Leap => {
            #[cfg(feature = "leap")]
            {
                spawn_gesture_source(crate::gesture::LeapGestureSource, tx.clone());
                (PerceptionStatus::Loading, None)
            }
            #[cfg(not(feature = "leap"))]
            {
                let reason = "built without the `leap` feature".to_string();
                warn!("[app] {}", reason);
                (PerceptionStatus::Unavailable(reason), None)
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Main loop
// ════════════════════════════════════════════════════════════════════════════

pub fn run(cfg: AppConfig) -> Result<()> {
    let roster = Arc::new(cfg.build_roster(&mut rand::thread_rng())?);
    info!("[app] {} students on the sphere", roster.len());

    // ── Input channel (single consumer: this loop) ───────────────────────
    let (tx, rx) = mpsc::channel::<InputEvent>();
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let simulate_poses = cfg.perception.mode == PerceptionMode::Keyboard;
    spawn_gesture_source(SimGestureSource { rx: sim_rx, simulate_poses }, tx.clone());
    let (perception, tracker) = start_perception(&cfg, &tx);

    // ── Visualizer (owns the window and the sim input sender) ────────────
    let mut vis = Visualizer::new(sim_tx)?;

    // ── App state ─────────────────────────────────────────────────────────
    let cues   = CuePlayer::spawn(&cfg.cues);
    let trivia = cfg.trivia.enabled.then(|| TriviaService::new(&cfg.trivia));
    let mut app = App::new(
        roster,
        RandomPicker::from_entropy(),
        cfg.reveal_delay(),
        cues,
        trivia,
        perception,
        Instant::now(),
    );

    // ── Main loop ─────────────────────────────────────────────────────────
    let mut last = Instant::now();
    'frames: while vis.is_open() {
        // 1. Poll window input → translate to SimInput
        if !vis.poll_input() { break; }

        // 2. Drain input events
        loop {
            match rx.try_recv() {
                Ok(evt) => {
                    if !app.handle_input(evt, Instant::now()) { break 'frames; }
                }
                Err(TryRecvError::Empty)        => break,
                Err(TryRecvError::Disconnected) => break 'frames,
            }
        }

        // 3. Per-frame logic
        let now = Instant::now();
        let dt  = now.duration_since(last).as_secs_f32().min(0.1);
        last = now;
        app.tick(now, dt);

        // 4. Render
        let snapshot = app.snapshot(now);
        let overlay  = Overlay {
            snapshot:    &snapshot,
            perception:  app.perception(),
            trivia:      app.card(),
            show_answer: app.show_answer(),
        };
        vis.set_title(&app.window_title());
        vis.render(app.scene(), app.roster(), &overlay);
    }

    // ── Teardown: release the camera and silence the synth ───────────────
    if let Some(kill) = tracker {
        kill.kill();
    }
    app.shutdown();
    info!("[app] bye");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CueConfig;
    use rollcall_core::{GestureSymbol, StudentId};
    use std::thread;

    const DELAY: Duration = Duration::from_millis(1500);

    fn quiet_cues() -> CuePlayer {
        CuePlayer::spawn(&CueConfig { enabled: false, ..CueConfig::default() })
    }

    fn echo_trivia() -> TriviaService {
        TriviaService::with_fetcher(Arc::new(|name: &str| Trivia {
            question: format!("Who is {}?", name),
            answer:   name.to_string(),
        }))
    }

    fn make_app(trivia: Option<TriviaService>, t0: Instant) -> App {
        let roster = Arc::new(Roster::from_names(["Ada", "Grace", "Alan", "Barbara"]).unwrap());
        App::new(roster, RandomPicker::seeded(3), DELAY, quiet_cues(), trivia, PerceptionStatus::Keyboard, t0)
    }

    fn wait_for_card(app: &mut App, t: Instant) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            app.tick(t, 0.0);
            if matches!(app.card(), TriviaCard::Shown(_)) { return; }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn gestures_drive_a_full_round() {
        let t0 = Instant::now();
        let mut app = make_app(None, t0);

        app.handle_input(InputEvent::Gesture(GestureSymbol::OpenPalm), t0);
        assert_eq!(app.phase(), Phase::Spinning);

        app.handle_input(InputEvent::Gesture(GestureSymbol::ClosedFist), t0);
        assert_eq!(app.phase(), Phase::Selecting);
        assert_eq!(app.snapshot(t0).winner, None);
        assert_eq!(app.window_title(), BASE_TITLE);

        app.tick(t0 + DELAY, 0.016);
        assert_eq!(app.phase(), Phase::Selected);
        let winner = app.snapshot(t0 + DELAY).winner.unwrap();
        assert!(winner.0 < 4);
        let name = app.roster().name_of(winner).unwrap().to_string();
        assert_eq!(app.window_title(), format!("{} - {}", BASE_TITLE, name));

        app.handle_input(InputEvent::Reset, t0 + DELAY);
        assert_eq!(app.phase(), Phase::Idle);
        assert_eq!(app.window_title(), BASE_TITLE);
    }

    #[test]
    fn manual_trigger_works_without_perception() {
        let t0 = Instant::now();
        let mut app = make_app(None, t0);
        app.handle_input(InputEvent::PerceptionUnavailable("no camera".into()), t0);
        assert_eq!(app.perception(), &PerceptionStatus::Unavailable("no camera".into()));

        app.handle_input(InputEvent::ManualTrigger, t0);
        app.handle_input(InputEvent::ManualTrigger, t0);
        assert_eq!(app.phase(), Phase::Selecting);
        app.tick(t0 + DELAY, 0.016);
        assert_eq!(app.phase(), Phase::Selected);
    }

    #[test]
    fn perception_status_follows_events() {
        let t0 = Instant::now();
        let mut app = make_app(None, t0);
        assert_eq!(app.perception().label(), "KEYBOARD");
        app.handle_input(InputEvent::PerceptionReady, t0);
        assert_eq!(app.perception(), &PerceptionStatus::Ready);
    }

    #[test]
    fn reveal_requests_trivia_for_the_winner() {
        let t0 = Instant::now();
        let mut app = make_app(Some(echo_trivia()), t0);
        app.handle_input(InputEvent::ManualTrigger, t0);
        app.handle_input(InputEvent::ManualTrigger, t0);
        assert_eq!(app.card(), &TriviaCard::Hidden);

        let t1 = t0 + DELAY;
        app.tick(t1, 0.016);
        assert_eq!(app.card(), &TriviaCard::Loading);

        wait_for_card(&mut app, t1);
        let winner = app.snapshot(t1).winner.unwrap();
        let name   = app.roster().name_of(winner).unwrap();
        match app.card() {
            TriviaCard::Shown(t) => assert_eq!(t.answer, name),
            other => panic!("expected trivia, got {:?}", other),
        }
    }

    #[test]
    fn answer_toggles_only_when_trivia_is_shown() {
        let t0 = Instant::now();
        let mut app = make_app(Some(echo_trivia()), t0);
        app.handle_input(InputEvent::ToggleAnswer, t0);
        assert!(!app.show_answer());

        app.handle_input(InputEvent::ManualTrigger, t0);
        app.handle_input(InputEvent::ManualTrigger, t0);
        app.tick(t0 + DELAY, 0.016);
        wait_for_card(&mut app, t0 + DELAY);

        app.handle_input(InputEvent::ToggleAnswer, t0 + DELAY);
        assert!(app.show_answer());
        app.handle_input(InputEvent::ToggleAnswer, t0 + DELAY);
        assert!(!app.show_answer());
    }

    #[test]
    fn reset_discards_pending_trivia() {
        let t0 = Instant::now();
        let slow = TriviaService::with_fetcher(Arc::new(|name: &str| {
            thread::sleep(Duration::from_millis(50));
            Trivia { question: name.to_string(), answer: "A".into() }
        }));
        let mut app = make_app(Some(slow), t0);
        app.handle_input(InputEvent::ManualTrigger, t0);
        app.handle_input(InputEvent::ManualTrigger, t0);
        app.tick(t0 + DELAY, 0.016);
        assert_eq!(app.card(), &TriviaCard::Loading);

        app.handle_input(InputEvent::Reset, t0 + DELAY);
        assert_eq!(app.card(), &TriviaCard::Hidden);
        thread::sleep(Duration::from_millis(200));
        app.tick(t0 + DELAY, 0.016);
        assert_eq!(app.card(), &TriviaCard::Hidden);
    }

    #[test]
    fn quit_stops_the_loop() {
        let t0 = Instant::now();
        let mut app = make_app(None, t0);
        assert!(app.handle_input(InputEvent::ManualTrigger, t0));
        assert!(!app.handle_input(InputEvent::Quit, t0));
    }

    #[test]
    fn scene_tracks_the_revealed_winner() {
        let t0 = Instant::now();
        let mut app = make_app(None, t0);
        app.handle_input(InputEvent::ManualTrigger, t0);
        app.handle_input(InputEvent::ManualTrigger, t0);
        let t1 = t0 + DELAY;
        app.tick(t1, 0.016);
        for _ in 0..120 {
            app.tick(t1, 1.0 / 60.0);
        }
        let winner = app.snapshot(t1).winner.unwrap();
        let marker = app.scene().marker(winner).unwrap();
        assert!(marker.scale > 1.5);
        let others = (0..4).map(StudentId).filter(|&id| id != winner);
        for id in others {
            assert_ne!(app.scene().marker(id).unwrap().role, crate::scene::MarkerRole::Winner);
        }
    }
}
