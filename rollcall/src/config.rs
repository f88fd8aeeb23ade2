//! Application configuration.
//!
//! Settings come from a TOML file (explicit path, else the per-user config
//! directory, else built-in defaults) and are then patched by command-line
//! flags in `main.rs`.  Every section is optional in the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use rollcall_core::roster::{DEFAULT_NAMES, DEFAULT_RADIUS};
use rollcall_core::{Roster, DEFAULT_REVEAL_DELAY};

/// Upper bound on the reveal delay.
pub const MAX_REVEAL_DELAY_MS: u64 = 60_000;

// ════════════════════════════════════════════════════════════════════════════
// Sections
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Display names in roster order.  Empty means the built-in class list.
    pub names:  Vec<String>,
    /// Sphere radius in scene units.
    pub radius: f32,
}

impl Default for RosterConfig {
    fn default() -> Self {
        RosterConfig { names: Vec::new(), radius: DEFAULT_RADIUS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub reveal_delay_ms: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig { reveal_delay_ms: DEFAULT_REVEAL_DELAY.as_millis() as u64 }
    }
}

/// Where hand landmarks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PerceptionMode {
    /// Number keys stand in for hand poses.
    #[default]
    Keyboard,
    /// External landmark provider over stdin/stdout.
    Process,
    /// LeapMotion controller (requires the `leap` feature).
    Leap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub mode:             PerceptionMode,
    /// Provider executable for [`PerceptionMode::Process`].
    pub command:          String,
    pub args:             Vec<String>,
    /// How long to wait for the provider's `READY` line.
    pub ready_timeout_ms: u64,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        PerceptionConfig {
            mode:             PerceptionMode::Keyboard,
            command:          String::new(),
            args:             Vec::new(),
            ready_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub enabled:    bool,
    /// General MIDI program (0 to 127).
    pub instrument: u8,
    pub channel:    u8,
    pub velocity:   u8,
    /// Substring of the preferred MIDI output port name.  Empty picks the
    /// first software synth found.
    pub port:       String,
}

impl Default for CueConfig {
    fn default() -> Self {
        // 11 = Vibraphone
        CueConfig { enabled: true, instrument: 11, channel: 0, velocity: 100, port: String::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriviaConfig {
    pub enabled:    bool,
    pub subject:    String,
    pub model:      String,
    pub timeout_ms: u64,
}

impl Default for TriviaConfig {
    fn default() -> Self {
        TriviaConfig {
            enabled:    true,
            subject:    "General Knowledge".to_string(),
            model:      "gemini-3-flash-preview".to_string(),
            timeout_ms: 15_000,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub roster:     RosterConfig,
    pub selection:  SelectionConfig,
    pub perception: PerceptionConfig,
    pub cues:       CueConfig,
    pub trivia:     TriviaConfig,
}

impl AppConfig {
    /// `<config_dir>/rollcall`, if the platform has a config directory.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rollcall"))
    }

    /// `<config_dir>/rollcall/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load from `explicit` if given (it must exist), else from the default
    /// location if a file is there, else fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("[config] no config file found, using defaults");
                Ok(AppConfig::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let cfg = Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        info!("[config] loaded {}", path.display());
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Reject values the rest of the application cannot work with.
    pub fn validate(&self) -> Result<()> {
        let delay = self.selection.reveal_delay_ms;
        if delay == 0 || delay > MAX_REVEAL_DELAY_MS {
            bail!(
                "selection.reveal_delay_ms must be between 1 and {} (got {})",
                MAX_REVEAL_DELAY_MS, delay
            );
        }
        if !(self.roster.radius.is_finite() && self.roster.radius > 0.0) {
            bail!("roster.radius must be positive (got {})", self.roster.radius);
        }
        if self.cues.channel > 15 {
            bail!("cues.channel must be 0-15 (got {})", self.cues.channel);
        }
        if self.cues.instrument > 127 {
            bail!("cues.instrument must be 0-127 (got {})", self.cues.instrument);
        }
        if self.cues.velocity > 127 {
            bail!("cues.velocity must be 0-127 (got {})", self.cues.velocity);
        }
        if self.perception.mode == PerceptionMode::Process
            && self.perception.command.trim().is_empty()
        {
            bail!("perception.mode = \"process\" needs perception.command");
        }
        Ok(())
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.selection.reveal_delay_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.perception.ready_timeout_ms)
    }

    /// Lay the configured names (or the built-in list) out on the sphere.
    pub fn build_roster<R: Rng>(&self, rng: &mut R) -> Result<Roster> {
        let roster = if self.roster.names.is_empty() {
            Roster::on_sphere(&DEFAULT_NAMES[..], self.roster.radius, rng)
        } else {
            Roster::on_sphere(&self.roster.names[..], self.roster.radius, rng)
        };
        roster.context("Invalid roster")
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Roster files
// ════════════════════════════════════════════════════════════════════════════

/// One name per line; blank lines and `#` comments are skipped.
pub fn parse_roster(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_roster_file(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read roster file: {}", path.display()))?;
    let names = parse_roster(&text);
    if names.is_empty() {
        bail!("Roster file {} contains no names", path.display());
    }
    info!("[config] {} names from {}", names.len(), path.display());
    Ok(names)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.reveal_delay(), Duration::from_millis(1500));
        assert_eq!(cfg.perception.mode, PerceptionMode::Keyboard);
        assert_eq!(cfg.trivia.model, "gemini-3-flash-preview");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [selection]
            reveal_delay_ms = 800

            [perception]
            mode = "process"
            command = "python3"
            args = ["hand_landmarker.py"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.selection.reveal_delay_ms, 800);
        assert_eq!(cfg.perception.mode, PerceptionMode::Process);
        assert_eq!(cfg.perception.args, vec!["hand_landmarker.py"]);
        assert_eq!(cfg.perception.ready_timeout_ms, 30_000);
        assert_eq!(cfg.roster.radius, DEFAULT_RADIUS);
        assert!(cfg.cues.enabled);
        cfg.validate().unwrap();
    }

    #[test]
    fn toml_round_trip_preserves_everything() {
        let mut cfg = AppConfig::default();
        cfg.roster.names = vec!["Ada".into(), "Grace".into()];
        cfg.trivia.subject = "Physics".into();
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        assert!(AppConfig::from_toml_str("[perception]\nmode = \"telepathy\"\n").is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad: Vec<fn(&mut AppConfig)> = vec![
            |c: &mut AppConfig| c.selection.reveal_delay_ms = 0,
            |c: &mut AppConfig| c.selection.reveal_delay_ms = MAX_REVEAL_DELAY_MS + 1,
            |c: &mut AppConfig| c.roster.radius = 0.0,
            |c: &mut AppConfig| c.roster.radius = f32::NAN,
            |c: &mut AppConfig| c.cues.channel = 16,
            |c: &mut AppConfig| c.cues.instrument = 128,
            |c: &mut AppConfig| c.cues.velocity = 200,
            |c: &mut AppConfig| c.perception.mode = PerceptionMode::Process,
        ];
        for (i, patch) in bad.into_iter().enumerate() {
            let mut cfg = AppConfig::default();
            patch(&mut cfg);
            assert!(cfg.validate().is_err(), "case {} should be rejected", i);
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[trivia]\nenabled = false\nsubject = \"Chemistry\"").unwrap();
        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert!(!cfg.trivia.enabled);
        assert_eq!(cfg.trivia.subject, "Chemistry");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn roster_file_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class.txt");
        fs::write(&path, "# period 3\nAda\n\n  Grace  \n# absent: Linus\nAlan\n").unwrap();
        assert_eq!(read_roster_file(&path).unwrap(), vec!["Ada", "Grace", "Alan"]);
    }

    #[test]
    fn empty_roster_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "# nobody\n\n").unwrap();
        assert!(read_roster_file(&path).is_err());
    }

    #[test]
    fn build_roster_uses_defaults_when_no_names() {
        let mut rng = StdRng::seed_from_u64(5);
        let roster = AppConfig::default().build_roster(&mut rng).unwrap();
        assert_eq!(roster.len(), DEFAULT_NAMES.len());

        let mut cfg = AppConfig::default();
        cfg.roster.names = vec!["Solo".into()];
        let roster = cfg.build_roster(&mut rng).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.students()[0].name, "Solo");
    }
}
