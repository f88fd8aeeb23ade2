//! External hand-landmark provider.
//!
//! The provider is any executable (typically a camera + hand-landmark model
//! script) speaking a line protocol on stdin/stdout:
//!
//! ```text
//! provider → READY                          once the model is loaded
//! app      → FRAME                          request one frame
//! provider → {"hands":[{"score":0.97,"landmarks":[{"x":..,"y":..,"z":..}, ×21]}],"error":null}
//! ```
//!
//! Coordinates are normalised image coordinates with y growing downward.
//! Lines that don't start with `{` are provider chatter and are skipped.
//! Only the first hand is used.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;

use rollcall_core::Landmark;

pub const READY_LINE:    &str = "READY";
pub const FRAME_REQUEST: &str = "FRAME";

// ════════════════════════════════════════════════════════════════════════════
// Wire format
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FrameReply {
    #[serde(default)]
    pub hands: Vec<HandReply>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HandReply {
    #[serde(default)]
    pub score:     f32,
    pub landmarks: Vec<Landmark>,
}

impl FrameReply {
    /// Landmarks of the first detected hand, or `None` when no hand was seen
    /// or the provider reported a per-frame error.
    pub fn into_first_hand(self) -> Option<Vec<Landmark>> {
        if let Some(err) = self.error {
            debug!("[tracker] provider frame error: {}", err);
            return None;
        }
        self.hands.into_iter().next().map(|h| h.landmarks)
    }
}

pub fn parse_reply(line: &str) -> Result<FrameReply> {
    serde_json::from_str(line).with_context(|| format!("Malformed frame reply: {}", line))
}

// ════════════════════════════════════════════════════════════════════════════
// TrackerKill — teardown handle
// ════════════════════════════════════════════════════════════════════════════

/// Kills the provider from any thread, releasing the camera.
#[derive(Clone)]
pub struct TrackerKill(Arc<Mutex<Child>>);

impl TrackerKill {
    pub fn kill(&self) {
        if let Ok(mut child) = self.0.lock() {
            if let Ok(None) = child.try_wait() {
                debug!("[tracker] killing provider pid {}", child.id());
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TrackerProcess
// ════════════════════════════════════════════════════════════════════════════

pub struct TrackerProcess {
    child:  Arc<Mutex<Child>>,
    stdin:  ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl TrackerProcess {
    /// Start the provider.  Returns as soon as the process exists; loading
    /// is awaited separately with [`wait_ready`](Self::wait_ready).
    pub fn spawn(command: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start landmark provider `{}`", command))?;

        let stdin  = child.stdin.take().ok_or_else(|| anyhow!("provider stdin unavailable"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("provider stdout unavailable"))?;
        info!("[tracker] started `{}` (pid {})", command, child.id());

        Ok(TrackerProcess {
            child: Arc::new(Mutex::new(child)),
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    pub fn kill_handle(&self) -> TrackerKill {
        TrackerKill(self.child.clone())
    }

    /// Block until the provider prints `READY`.
    ///
    /// A watchdog kills the provider if `timeout` passes first, which turns
    /// the blocked read into an EOF.
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<()> {
        let done      = Arc::new(AtomicBool::new(false));
        let timed_out = Arc::new(AtomicBool::new(false));
        {
            let done      = done.clone();
            let timed_out = timed_out.clone();
            let kill      = self.kill_handle();
            thread::spawn(move || {
                let deadline = Instant::now() + timeout;
                while Instant::now() < deadline {
                    if done.load(Ordering::Acquire) { return; }
                    thread::sleep(Duration::from_millis(20));
                }
                if !done.load(Ordering::Acquire) {
                    timed_out.store(true, Ordering::Release);
                    kill.kill();
                }
            });
        }

        let result = loop {
            match self.read_line() {
                Ok(line) if line == READY_LINE => break Ok(()),
                Ok(line) => debug!("[tracker] {}", line),
                Err(e)   => break Err(e),
            }
        };
        done.store(true, Ordering::Release);

        if timed_out.load(Ordering::Acquire) {
            bail!("provider did not report {} within {} ms", READY_LINE, timeout.as_millis());
        }
        result.with_context(|| format!("provider exited before reporting {}", READY_LINE))
    }

    /// Request and read one frame.  `Ok(None)` means no hand this frame,
    /// including replies that don't parse.  Only I/O failure and EOF are
    /// errors.
    pub fn next_frame(&mut self) -> Result<Option<Vec<Landmark>>> {
        writeln!(self.stdin, "{}", FRAME_REQUEST).context("Failed to request frame")?;
        self.stdin.flush().context("Failed to request frame")?;

        loop {
            let line = self.read_line()?;
            if line.starts_with('{') {
                return Ok(match parse_reply(&line) {
                    Ok(reply) => reply.into_first_hand(),
                    Err(e) => {
                        warn!("[tracker] {:#}", e);
                        None
                    }
                });
            }
            debug!("[tracker] {}", line);
        }
    }

    /// Next non-empty line, trimmed.  EOF is an error.
    fn read_line(&mut self) -> Result<String> {
        let mut buf = String::new();
        loop {
            buf.clear();
            let n = self.stdout.read_line(&mut buf).context("Failed to read from provider")?;
            if n == 0 {
                bail!("provider closed its output");
            }
            let line = buf.trim();
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        }
    }
}

impl Drop for TrackerProcess {
    fn drop(&mut self) {
        self.kill_handle().kill();
        info!("[tracker] provider stopped");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::landmark::posed_hand;
    use rollcall_core::{classify, FingerSet, GestureSymbol};

    fn hand_obj(fingers: FingerSet) -> String {
        let pts: Vec<String> = posed_hand(fingers)
            .iter()
            .map(|p| format!("{{\"x\":{},\"y\":{},\"z\":{}}}", p.x, p.y, p.z))
            .collect();
        format!("{{\"score\":0.9,\"landmarks\":[{}]}}", pts.join(","))
    }

    fn hand_json(fingers: FingerSet) -> String {
        format!("{{\"hands\":[{}],\"error\":null}}", hand_obj(fingers))
    }

    #[test]
    fn reply_without_hands_is_no_frame() {
        assert_eq!(parse_reply(r#"{"hands":[],"error":null}"#).unwrap().into_first_hand(), None);
        assert_eq!(parse_reply("{}").unwrap().into_first_hand(), None);
    }

    #[test]
    fn reply_uses_first_hand_only() {
        let line = format!(
            "{{\"hands\":[{},{}]}}",
            hand_obj(FingerSet::ALL),
            hand_obj(FingerSet::NONE)
        );
        let frame = parse_reply(&line).unwrap().into_first_hand().unwrap();
        assert_eq!(frame.len(), 21);
        assert_eq!(classify(&frame), Some(GestureSymbol::OpenPalm));
    }

    #[test]
    fn reply_with_error_is_no_frame() {
        let reply = parse_reply(r#"{"hands":[],"error":"camera read failed"}"#).unwrap();
        assert_eq!(reply.into_first_hand(), None);
    }

    #[test]
    fn missing_z_defaults_to_zero() {
        let pts = vec![r#"{"x":0.5,"y":0.5}"#; 21].join(",");
        let line = format!(r#"{{"hands":[{{"landmarks":[{}]}}]}}"#, pts);
        let frame = parse_reply(&line).unwrap().into_first_hand().unwrap();
        assert!(frame.iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn malformed_reply_is_an_error() {
        assert!(parse_reply("{not json").is_err());
        assert!(parse_reply(r#"{"hands":[{"score":1.0}]}"#).is_err());
    }

    #[test]
    fn spawn_failure_is_reported() {
        assert!(TrackerProcess::spawn("/nonexistent/rollcall-provider", &[]).is_err());
    }

    #[cfg(unix)]
    fn sh(script: &str) -> TrackerProcess {
        TrackerProcess::spawn("sh", &["-c".to_string(), script.to_string()]).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn provider_protocol_round_trip() {
        let script = format!(
            "echo 'loading model'; echo READY; while read cmd; do printf '%s\\n' '{}'; done",
            hand_json(FingerSet::VICTORY)
        );
        let mut tracker = sh(&script);
        tracker.wait_ready(Duration::from_secs(5)).unwrap();
        for _ in 0..3 {
            let frame = tracker.next_frame().unwrap().unwrap();
            assert_eq!(classify(&frame), Some(GestureSymbol::Victory));
        }
    }

    #[cfg(unix)]
    #[test]
    fn malformed_reply_is_absorbed_as_no_hand() {
        let bad = r#"{"hands":[{"landmarks":[{"x":0.1,"y":null}]}]}"#;
        let script = [
            "echo READY",
            "n=0",
            "while read cmd; do",
            "  n=$((n+1))",
            format!("  if [ $n -eq 1 ]; then printf '%s\\n' '{}';", bad).as_str(),
            "  elif [ $n -eq 2 ]; then echo '{not json';",
            format!("  else printf '%s\\n' '{}'; fi", hand_json(FingerSet::NONE)).as_str(),
            "done",
        ]
        .join("\n");
        let mut tracker = sh(&script);
        tracker.wait_ready(Duration::from_secs(5)).unwrap();
        assert_eq!(tracker.next_frame().unwrap(), None);
        assert_eq!(tracker.next_frame().unwrap(), None);
        let frame = tracker.next_frame().unwrap().unwrap();
        assert_eq!(classify(&frame), Some(GestureSymbol::ClosedFist));
    }

    #[cfg(unix)]
    #[test]
    fn provider_exit_before_ready_is_an_error() {
        let mut tracker = sh("echo 'no camera found'");
        let err = tracker.wait_ready(Duration::from_secs(5)).unwrap_err();
        assert!(format!("{:#}", err).contains("READY"));
    }

    #[cfg(unix)]
    #[test]
    fn slow_provider_times_out() {
        let mut tracker = sh("exec sleep 5");
        let started = Instant::now();
        let err = tracker.wait_ready(Duration::from_millis(200)).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(format!("{:#}", err).contains("within 200 ms"));
    }

    #[cfg(unix)]
    #[test]
    fn killed_provider_stops_answering() {
        let mut tracker = sh("echo READY; while read cmd; do echo '{\"hands\":[]}'; done");
        tracker.wait_ready(Duration::from_secs(5)).unwrap();
        assert_eq!(tracker.next_frame().unwrap(), None);
        tracker.kill_handle().kill();
        assert!(tracker.next_frame().is_err());
    }
}
