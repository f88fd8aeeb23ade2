//! MIDI sound cues on a background thread.
//!
//! Rapid ticks while spinning, ticks that space out over the reveal window,
//! a rising arpeggio on reveal.  Cues are cosmetic: a missing MIDI port
//! falls back to a silent output and nothing here can affect selection.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::CueConfig;

// ════════════════════════════════════════════════════════════════════════════
// CueCommand — sent to the cue thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CueCommand {
    /// Rapid ticks until told otherwise.
    Spin,
    /// Ticks that slow to a stop over the given window.
    Slow(Duration),
    /// Rising arpeggio, then silence.
    Reveal,
    /// Silence.
    Idle,
    /// Terminate the thread.
    Quit,
}

// ── Timing ────────────────────────────────────────────────────────────────

pub const SPIN_INTERVAL:  Duration = Duration::from_millis(60);
pub const SLOW_MAX:       Duration = Duration::from_millis(450);
pub const ARPEGGIO_STEP:  Duration = Duration::from_millis(120);
const TICK_LENGTH:        Duration = Duration::from_millis(25);
const ARPEGGIO_NOTE:      Duration = Duration::from_millis(100);

const TICK_NOTE:      u8 = 84; // C6
const SLOW_TICK_NOTE: u8 = 79; // G5
/// C major triad up to the octave, from C5.
pub const REVEAL_ARPEGGIO: [u8; 4] = [72, 76, 79, 84];

/// Gap between ticks `elapsed` into a slow-down of length `over`.
/// Eases quadratically from [`SPIN_INTERVAL`] to [`SLOW_MAX`].
pub fn slow_interval(elapsed: Duration, over: Duration) -> Duration {
    let t = if over.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f32() / over.as_secs_f32()).clamp(0.0, 1.0)
    };
    let span = (SLOW_MAX - SPIN_INTERVAL).as_millis() as f32;
    SPIN_INTERVAL + Duration::from_millis((span * t * t).round() as u64)
}

// ════════════════════════════════════════════════════════════════════════════
// MidiOut — raw message sink
// ════════════════════════════════════════════════════════════════════════════

/// Anything that accepts raw MIDI channel messages.
pub trait MidiOut: Send {
    fn send(&mut self, msg: &[u8]);

    fn program_change(&mut self, channel: u8, program: u8) {
        self.send(&[0xC0 | (channel & 0x0F), program & 0x7F]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        self.send(&[0x80 | (channel & 0x0F), note & 0x7F, 0]);
    }
}

impl MidiOut for midir::MidiOutputConnection {
    fn send(&mut self, msg: &[u8]) {
        if let Err(e) = midir::MidiOutputConnection::send(self, msg) {
            debug!("[cues] send failed: {}", e);
        }
    }
}

/// Silent output used when no MIDI port is usable.
pub struct NullOut;

impl MidiOut for NullOut {
    fn send(&mut self, _msg: &[u8]) {}
}

// ── Port selection ────────────────────────────────────────────────────────

/// Substrings of port names that belong to software synthesisers.
const SYNTH_HINTS: [&str; 4] = ["fluid", "timidity", "microsoft", "synth"];

/// Index of the port to open: the first whose name contains `preferred`
/// (case-insensitive), else the first software synth, else port 0.
pub fn choose_port(names: &[String], preferred: &str) -> Option<usize> {
    if names.is_empty() {
        return None;
    }
    let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    let wanted = preferred.trim().to_lowercase();
    if !wanted.is_empty() {
        if let Some(i) = lowered.iter().position(|n| n.contains(&wanted)) {
            return Some(i);
        }
        warn!("[cues] no MIDI port matches \"{}\"; picking one", preferred);
    }
    let synth = lowered.iter().position(|n| SYNTH_HINTS.iter().any(|h| n.contains(h)));
    Some(synth.unwrap_or(0))
}

/// Connect to the chosen port, or fall back to [`NullOut`].
fn open_midi_output(preferred: &str) -> Box<dyn MidiOut> {
    let midi_out = match midir::MidiOutput::new("rollcall_cues") {
        Ok(m)  => m,
        Err(e) => {
            warn!("[cues] MIDI init error: {}; cues disabled", e);
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    let names: Vec<String> = ports
        .iter()
        .map(|p| midi_out.port_name(p).unwrap_or_default())
        .collect();
    let Some(index) = choose_port(&names, preferred) else {
        warn!("[cues] no MIDI output ports found; cues disabled");
        info!("[cues] start a synthesiser (e.g. `fluidsynth` or `timidity -iA`) for sound");
        return Box::new(NullOut);
    };

    info!("[cues] opening MIDI port: {}", names[index]);
    match midi_out.connect(&ports[index], "rollcall-cues") {
        Ok(conn) => Box::new(conn),
        Err(e) => {
            warn!("[cues] failed to connect: {}; cues disabled", e);
            Box::new(NullOut)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CuePlayer — handle to the cue thread
// ════════════════════════════════════════════════════════════════════════════

pub struct CuePlayer {
    cmd_tx: Option<Sender<CueCommand>>,
    handle: Option<JoinHandle<()>>,
}

impl CuePlayer {
    /// Spawn the cue thread on the first usable MIDI port, or a player that
    /// ignores every command when cues are disabled.
    pub fn spawn(cfg: &CueConfig) -> Self {
        if !cfg.enabled {
            info!("[cues] disabled");
            return CuePlayer { cmd_tx: None, handle: None };
        }
        let cfg  = cfg.clone();
        let port = cfg.port.clone();
        Self::spawn_with(move || open_midi_output(&port), cfg)
    }

    /// Spawn with a caller-supplied output; `make_out` runs on the thread.
    pub fn spawn_with<F>(make_out: F, cfg: CueConfig) -> Self
    where
        F: FnOnce() -> Box<dyn MidiOut> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<CueCommand>();
        let handle = thread::spawn(move || cue_thread(make_out(), &cfg, cmd_rx));
        CuePlayer { cmd_tx: Some(cmd_tx), handle: Some(handle) }
    }

    pub fn send(&self, cmd: CueCommand) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(cmd);
        }
    }

    pub fn spin(&self)                 { self.send(CueCommand::Spin); }
    pub fn slow(&self, over: Duration) { self.send(CueCommand::Slow(over)); }
    pub fn reveal(&self)               { self.send(CueCommand::Reveal); }
    pub fn idle(&self)                 { self.send(CueCommand::Idle); }

    /// Stop the thread and wait for it.
    pub fn shutdown(&mut self) {
        self.send(CueCommand::Quit);
        self.cmd_tx = None;
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for CuePlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// cue_thread — the actual loop
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
enum Mode {
    Silent,
    Spin,
    Slow { started: Instant, over: Duration },
    Reveal { next: usize },
}

/// How long to wait before the next note, or `None` to wait for a command.
fn next_wait(mode: Mode, now: Instant) -> Option<Duration> {
    match mode {
        Mode::Silent => None,
        Mode::Spin   => Some(SPIN_INTERVAL),
        Mode::Slow { started, over } => {
            let elapsed = now.saturating_duration_since(started);
            if elapsed >= over { None } else { Some(slow_interval(elapsed, over)) }
        }
        Mode::Reveal { next } if next == 0 => Some(Duration::ZERO),
        Mode::Reveal { next } if next < REVEAL_ARPEGGIO.len() => Some(ARPEGGIO_STEP),
        Mode::Reveal { .. } => None,
    }
}

fn cue_thread(mut midi: Box<dyn MidiOut>, cfg: &CueConfig, cmd_rx: Receiver<CueCommand>) {
    let (channel, velocity) = (cfg.channel, cfg.velocity);
    midi.program_change(channel, cfg.instrument);

    let mut mode = Mode::Silent;
    loop {
        let cmd = match next_wait(mode, Instant::now()) {
            None => match cmd_rx.recv() {
                Ok(c)  => Some(c),
                Err(_) => return,
            },
            Some(wait) => match cmd_rx.recv_timeout(wait) {
                Ok(c) => Some(c),
                Err(RecvTimeoutError::Timeout)      => None,
                Err(RecvTimeoutError::Disconnected) => return,
            },
        };

        if let Some(cmd) = cmd {
            debug!("[cues] {:?}", cmd);
            mode = match cmd {
                CueCommand::Spin       => Mode::Spin,
                CueCommand::Slow(over) => Mode::Slow { started: Instant::now(), over },
                CueCommand::Reveal     => Mode::Reveal { next: 0 },
                CueCommand::Idle       => Mode::Silent,
                CueCommand::Quit       => return,
            };
            continue;
        }

        // Due: play the next note of the current mode.
        match mode {
            Mode::Spin => {
                play(&mut *midi, channel, TICK_NOTE, velocity / 2, TICK_LENGTH);
            }
            Mode::Slow { .. } => {
                play(&mut *midi, channel, SLOW_TICK_NOTE, velocity / 2, TICK_LENGTH);
            }
            Mode::Reveal { next } => {
                let last = next + 1 == REVEAL_ARPEGGIO.len();
                let hold = if last { ARPEGGIO_NOTE * 4 } else { ARPEGGIO_NOTE };
                play(&mut *midi, channel, REVEAL_ARPEGGIO[next], velocity, hold);
                mode = Mode::Reveal { next: next + 1 };
            }
            Mode::Silent => {}
        }
    }
}

fn play(midi: &mut dyn MidiOut, channel: u8, note: u8, velocity: u8, hold: Duration) {
    midi.note_on(channel, note, velocity);
    thread::sleep(hold);
    midi.note_off(channel, note);
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
