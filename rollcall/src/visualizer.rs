//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ ROLL CALL                                       GESTURE CONTROL  │
//! │ SYSTEM STATUS: IDLE                             OPEN PALM     ●  │
//! │                                                 CLOSED FIST   ●  │
//! │                     · marker sphere ·           VICTORY       ●  │
//! │                  ·   ·   ·    ·   ·   ·                          │
//! │                     prompt / winner card                         │
//! │                     trivia card                                  │
//! │ PERCEPTION: READY                                                │
//! │ key legend                                                       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The 3×5 bitmap font only covers ASCII.  Names it cannot draw are shown
//! as `#id` on the canvas; the window title always carries the full name.

use std::sync::mpsc::Sender;

use anyhow::{anyhow, Result};
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use rand::Rng;

use rollcall_core::{GestureSymbol, Phase, Roster, SelectionSnapshot, StudentId};

use crate::app::{PerceptionStatus, TriviaCard};
use crate::gesture::{SimInput, SimKey};
use crate::scene::{MarkerRole, Scene, GOLD};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:       usize = 1280;
pub const WIN_H:       usize = 720;
pub const BASE_TITLE:  &str  = "Roll Call";
const STAR_COUNT:      usize = 400;
const BG_COLOR:        u32   = 0xFF05060B;
const PANEL_BG:        u32   = 0xFF101522;
const PANEL_EDGE:      u32   = 0xFF06B6D4;  // cyan
const TEXT_COLOR:      u32   = 0xFFEEEEEE;
const MUTED:           u32   = 0xFF6B7280;
const GREEN:           u32   = 0xFF4ADE80;
const YELLOW:          u32   = 0xFFFACC15;
const RED:             u32   = 0xFFF87171;
const CYAN:            u32   = 0xFF67E8F9;

// ════════════════════════════════════════════════════════════════════════════
// Overlay — everything besides the scene that a frame shows
// ════════════════════════════════════════════════════════════════════════════

pub struct Overlay<'a> {
    pub snapshot:    &'a SelectionSnapshot,
    pub perception:  &'a PerceptionStatus,
    pub trivia:      &'a TriviaCard,
    pub show_answer: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// Canvas — ARGB framebuffer with drawing primitives
// ════════════════════════════════════════════════════════════════════════════

pub struct Canvas {
    pub buf: Vec<u32>,
    pub w:   usize,
    pub h:   usize,
}

impl Canvas {
    pub fn new(w: usize, h: usize) -> Self {
        Canvas { buf: vec![BG_COLOR; w * h], w, h }
    }

    pub fn clear(&mut self, color: u32) {
        self.buf.fill(color);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x < self.w && y < self.h { Some(self.buf[y * self.w + x]) } else { None }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.w && y < self.h {
            self.buf[y * self.w + x] = color;
        }
    }

    fn set_pixel_i(&mut self, x: isize, y: isize, color: u32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize, color);
        }
    }

    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(self.h) {
            for col in x..(x + w).min(self.w) {
                self.buf[row * self.w + col] = color;
            }
        }
    }

    pub fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        for col in x..(x + w).min(self.w) {
            self.set_pixel(col, y, color);
            self.set_pixel(col, y + h - 1, color);
        }
        for row in y..(y + h).min(self.h) {
            self.set_pixel(x, row, color);
            self.set_pixel(x + w - 1, row, color);
        }
    }

    /// Shaded disc with a highlight toward the upper left.
    pub fn fill_sphere(&mut self, cx: f32, cy: f32, r: f32, color: u32) {
        if r < 0.5 {
            self.set_pixel_i(cx as isize, cy as isize, color);
            return;
        }
        let ri = r.ceil() as isize;
        let (hx, hy) = (cx - r * 0.35, cy - r * 0.35);
        for dy in -ri..=ri {
            for dx in -ri..=ri {
                let (px, py) = (cx + dx as f32, cy + dy as f32);
                if (dx * dx + dy * dy) as f32 > r * r { continue; }
                let d = ((px - hx).powi(2) + (py - hy).powi(2)).sqrt() / (r * 1.4);
                let shaded = if d < 0.5 {
                    blend(color, 0xFFFFFFFF, (0.5 - d) * 0.8)
                } else {
                    blend(color, 0xFF000000, ((d - 0.5) * 0.9).min(0.6))
                };
                self.set_pixel_i(px as isize, py as isize, shaded);
            }
        }
    }

    pub fn ring(&mut self, cx: f32, cy: f32, r: f32, thickness: f32, color: u32) {
        let ro = (r + thickness).ceil() as isize;
        for dy in -ro..=ro {
            for dx in -ro..=ro {
                let d = ((dx * dx + dy * dy) as f32).sqrt();
                if d >= r && d <= r + thickness {
                    self.set_pixel_i(cx as isize + dx, cy as isize + dy, color);
                }
            }
        }
    }

    fn fill_circle(&mut self, cx: usize, cy: usize, r: usize, color: u32) {
        let r = r as isize;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.set_pixel_i(cx as isize + dx, cy as isize + dy, color);
                }
            }
        }
    }

    /// Draw `text` with the 3×5 font, each font pixel `scale`×`scale`.
    pub fn draw_text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let scale = scale.max(1);
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch).unwrap_or(FALLBACK_GLYPH);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
            if cx + 4 * scale > self.w { break; }
        }
    }

    pub fn draw_text_centered(&mut self, text: &str, cx: usize, y: usize, scale: usize, color: u32) {
        let x = cx.saturating_sub(text_width(text, scale) / 2);
        self.draw_text(text, x, y, scale, color);
    }
}

pub fn text_width(text: &str, scale: usize) -> usize {
    (text.chars().count() * 4 * scale.max(1)).saturating_sub(scale.max(1))
}

/// Greedy word wrap to at most `width` characters per line.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line  = String::new();
    for word in text.split_whitespace() {
        let needed = if line.is_empty() { word.chars().count() } else { line.chars().count() + 1 + word.chars().count() };
        if needed > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// True if every character of `text` has a glyph in the bitmap font.
pub fn drawable(text: &str) -> bool {
    text.chars().all(|c| char_glyph(c).is_some())
}

/// On-canvas label for a student: the name, or `#id` if the font can't draw it.
pub fn marker_label(roster: &Roster, id: StudentId) -> String {
    match roster.name_of(id) {
        Some(name) if drawable(name) => name.to_string(),
        _ => format!("#{}", id),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

struct Star {
    x:     usize,
    y:     usize,
    phase: f32,
    base:  f32,
}

pub struct Visualizer {
    window: Window,
    canvas: Canvas,
    sim_tx: Sender<SimInput>,
    stars:  Vec<Star>,
    title:  String,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> Result<Self> {
        let mut window = Window::new(
            BASE_TITLE,
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| anyhow!("Failed to open window: {}", e))?;

        window.set_target_fps(60);

        let mut rng = rand::thread_rng();
        let stars = (0..STAR_COUNT)
            .map(|_| Star {
                x:     rng.gen_range(0..WIN_W),
                y:     rng.gen_range(0..WIN_H),
                phase: rng.gen_range(0.0..std::f32::consts::TAU),
                base:  rng.gen_range(0.2..0.8),
            })
            .collect();

        Ok(Visualizer {
            window,
            canvas: Canvas::new(WIN_W, WIN_H),
            sim_tx,
            stars,
            title: BASE_TITLE.to_string(),
        })
    }

    /// Returns false when the window should close.
    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll keyboard inputs and translate to SimInput events.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() { return false; }

        let pressed = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);

        if pressed(Key::Q) || pressed(Key::Escape) {
            let _ = self.sim_tx.send(SimInput::KeyDown(SimKey::Quit));
            return false;
        }

        let bindings: [(&[Key], SimKey); 8] = [
            (&[Key::Space],                    SimKey::Trigger),
            (&[Key::R],                        SimKey::Reset),
            (&[Key::Enter, Key::NumPadEnter],  SimKey::ToggleAnswer),
            (&[Key::Key1, Key::NumPad1],       SimKey::PosePalm),
            (&[Key::Key2, Key::NumPad2],       SimKey::PoseFist),
            (&[Key::Key3, Key::NumPad3],       SimKey::PoseVictory),
            (&[Key::Key4, Key::NumPad4],       SimKey::PosePoint),
            (&[Key::Key0, Key::NumPad0],       SimKey::HandAway),
        ];
        for (keys, sim) in bindings {
            if keys.iter().any(|&k| pressed(k)) {
                let _ = self.sim_tx.send(SimInput::KeyDown(sim));
            }
        }

        true
    }

    /// Update the window title if it changed.
    pub fn set_title(&mut self, title: &str) {
        if self.title != title {
            self.window.set_title(title);
            self.title = title.to_string();
        }
    }

    /// Render one frame.
    pub fn render(&mut self, scene: &Scene, roster: &Roster, overlay: &Overlay<'_>) {
        self.canvas.clear(BG_COLOR);
        self.draw_stars(scene.clock);
        paint(&mut self.canvas, scene, roster, overlay);
        self.window.update_with_buffer(&self.canvas.buf, WIN_W, WIN_H).ok();
    }

    fn draw_stars(&mut self, clock: f32) {
        for s in &self.stars {
            let b = (s.base + 0.2 * (clock * 0.8 + s.phase).sin()).clamp(0.0, 1.0);
            let v = (b * 255.0) as u32;
            self.canvas.set_pixel(s.x, s.y, 0xFF000000 | (v << 16) | (v << 8) | v);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// paint — scene + overlay, independent of the window
// ════════════════════════════════════════════════════════════════════════════

pub fn paint(canvas: &mut Canvas, scene: &Scene, roster: &Roster, overlay: &Overlay<'_>) {
    draw_markers(canvas, scene, roster);
    draw_header(canvas, overlay.snapshot.phase);
    draw_gesture_panel(canvas, overlay.snapshot.gesture);
    draw_centre(canvas, roster, overlay);
    draw_footer(canvas, overlay.perception);
}

fn draw_markers(canvas: &mut Canvas, scene: &Scene, roster: &Roster) {
    for p in scene.draw_list(canvas.w, canvas.h) {
        if p.role == MarkerRole::Winner {
            canvas.ring(p.x, p.y, p.radius + 2.0, 3.0, blend(GOLD, BG_COLOR, 0.3));
        }
        canvas.fill_sphere(p.x, p.y, p.radius, p.color);

        if p.role == MarkerRole::Dimmed {
            continue;
        }
        let label = marker_label(roster, p.id);
        let scale = if p.role == MarkerRole::Winner { 3 } else { 1 };
        let y = (p.y + p.radius + 4.0).max(0.0) as usize;
        let x = p.x.max(0.0) as usize;
        let w = text_width(&label, scale);
        canvas.fill_rect(x.saturating_sub(w / 2 + 2), y.saturating_sub(2), w + 4, 5 * scale + 4, 0xFF000000);
        canvas.draw_text_centered(&label, x, y, scale, TEXT_COLOR);
    }
}

fn draw_header(canvas: &mut Canvas, phase: Phase) {
    canvas.fill_rect(20, 20, 300, 70, PANEL_BG);
    canvas.fill_rect(20, 20, 4, 70, PANEL_EDGE);
    canvas.draw_text("ROLL CALL", 36, 32, 4, CYAN);

    let status_color = if phase == Phase::Idle { GREEN } else { YELLOW };
    canvas.draw_text("SYSTEM STATUS:", 36, 64, 2, MUTED);
    canvas.draw_text(phase.label(), 36 + text_width("SYSTEM STATUS: ", 2), 64, 2, status_color);
}

fn draw_gesture_panel(canvas: &mut Canvas, gesture: GestureSymbol) {
    let (x, w) = (canvas.w - 240, 220);
    canvas.fill_rect(x, 20, w, 104, PANEL_BG);
    canvas.draw_border(x, 20, w, 104, 0xFF1F2937);
    canvas.draw_text("GESTURE CONTROL", x + 12, 30, 2, MUTED);

    let rows = [
        (GestureSymbol::OpenPalm,   "OPEN PALM",   GREEN),
        (GestureSymbol::ClosedFist, "CLOSED FIST", RED),
        (GestureSymbol::Victory,    "VICTORY",     YELLOW),
    ];
    for (i, (symbol, label, on)) in rows.into_iter().enumerate() {
        let y = 54 + i * 22;
        let active = gesture == symbol;
        let color  = if active { on } else { MUTED };
        canvas.draw_text(label, x + 12, y, 2, color);
        canvas.fill_circle(x + w - 20, y + 4, 5, if active { on } else { 0xFF374151 });
    }
}

fn draw_centre(canvas: &mut Canvas, roster: &Roster, overlay: &Overlay<'_>) {
    let cx = canvas.w / 2;
    match overlay.snapshot.phase {
        Phase::Idle => {
            canvas.draw_text_centered("READY TO SELECT A STUDENT", cx, canvas.h - 190, 3, TEXT_COLOR);
            canvas.draw_text_centered("RAISE AN OPEN PALM TO SPIN", cx, canvas.h - 155, 2, CYAN);
            canvas.draw_text_centered("OR PRESS SPACE", cx, canvas.h - 130, 2, MUTED);
        }
        Phase::Spinning => {
            canvas.draw_text_centered("SPINNING...", cx, canvas.h / 2 - 30, 8, TEXT_COLOR);
            canvas.draw_text_centered("MAKE A FIST TO STOP!", cx, canvas.h / 2 + 30, 3, RED);
        }
        Phase::Selecting => {
            canvas.draw_text_centered("SELECTING...", cx, canvas.h / 2 - 30, 6, YELLOW);
        }
        Phase::Selected => draw_winner_card(canvas, roster, overlay),
    }
}

fn draw_winner_card(canvas: &mut Canvas, roster: &Roster, overlay: &Overlay<'_>) {
    let cx = canvas.w / 2;
    let (card_w, card_y) = (620, canvas.h - 300);
    let card_x = cx - card_w / 2;
    canvas.fill_rect(card_x, card_y, card_w, 90, PANEL_BG);
    canvas.draw_border(card_x, card_y, card_w, 90, blend(GOLD, PANEL_BG, 0.4));
    canvas.draw_text_centered("SELECTED STUDENT", cx, card_y + 12, 2, YELLOW);

    if let Some(id) = overlay.snapshot.winner {
        let label = marker_label(roster, id);
        canvas.draw_text_centered(&label, cx, card_y + 36, 6, TEXT_COLOR);
        if !drawable(overlay.snapshot.winner_name.as_deref().unwrap_or_default()) {
            canvas.draw_text_centered("(FULL NAME IN WINDOW TITLE)", cx, card_y + 74, 1, MUTED);
        }
    }

    draw_trivia(canvas, overlay, card_y + 100);
    canvas.draw_text_centered("PRESS R TO START OVER", cx, canvas.h - 70, 2, MUTED);
}

fn draw_trivia(canvas: &mut Canvas, overlay: &Overlay<'_>, y: usize) {
    let cx = canvas.w / 2;
    let (w, x) = (760, cx - 380);
    match overlay.trivia {
        TriviaCard::Hidden => {}
        TriviaCard::Loading => {
            canvas.draw_text_centered("THINKING OF A QUESTION...", cx, y + 10, 2, MUTED);
        }
        TriviaCard::Shown(t) => {
            let lines = wrap_text(&t.question, 60);
            let h = 40 + lines.len() * 16;
            canvas.fill_rect(x, y, w, h, PANEL_BG);
            canvas.fill_rect(x, y, 4, h, PANEL_EDGE);
            canvas.draw_text("QUESTION", x + 14, y + 8, 2, CYAN);
            for (i, line) in lines.iter().enumerate() {
                canvas.draw_text(line, x + 14, y + 28 + i * 16, 2, TEXT_COLOR);
            }
            let footer_y = y + h + 6;
            if overlay.show_answer {
                canvas.draw_text(&format!("ANSWER: {}", t.answer), x + 14, footer_y, 2, GREEN);
            } else {
                canvas.draw_text("ENTER = SHOW ANSWER", x + 14, footer_y, 1, MUTED);
            }
        }
    }
}

fn draw_footer(canvas: &mut Canvas, perception: &PerceptionStatus) {
    let y = canvas.h - 36;
    let color = match perception {
        PerceptionStatus::Ready       => GREEN,
        PerceptionStatus::Keyboard    => CYAN,
        PerceptionStatus::Loading     => YELLOW,
        PerceptionStatus::Unavailable(_) => RED,
    };
    canvas.draw_text("PERCEPTION:", 20, y, 2, MUTED);
    canvas.draw_text(perception.label(), 20 + text_width("PERCEPTION: ", 2), y, 2, color);

    canvas.draw_text(
        "SPACE=SPIN/STOP  R=RESET  ENTER=ANSWER  1=PALM 2=FIST 3=VICTORY 4=POINT 0=NO HAND  Q=QUIT",
        20, canvas.h - 14, 1, MUTED,
    );
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

const FALLBACK_GLYPH: [u8; 5] = [0b000, 0b000, 0b010, 0b000, 0b000];

fn char_glyph(c: char) -> Option<[u8; 5]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '?' => [0b111, 0b001, 0b011, 0b000, 0b010],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '"' => [0b101, 0b101, 0b000, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => return None,
    })
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
pub fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |ca: u32, cb: u32| (ca as f32 * (1.0-t) + cb as f32 * t) as u32;
    let ar = (a >> 16) & 0xFF; let br = (b >> 16) & 0xFF;
    let ag = (a >>  8) & 0xFF; let bg = (b >>  8) & 0xFF;
    let ab =  a        & 0xFF; let bb =  b        & 0xFF;
    0xFF000000 | (lerp(ar,br) << 16) | (lerp(ag,bg) << 8) | lerp(ab,bb)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
