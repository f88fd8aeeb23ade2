//! Marker-sphere animation state.
//!
//! The scene never looks at the state machine itself, only at the
//! [`SelectionSnapshot`] handed to [`Scene::advance`] each frame.  All motion
//! (group rotation, marker pulse, the winner's zoom to the front) is a
//! function of the snapshot's phase and the time step.

use std::f32::consts::PI;

use rollcall_core::{Phase, Roster, SelectionSnapshot, StudentId};

// ════════════════════════════════════════════════════════════════════════════
// Motion constants
// ════════════════════════════════════════════════════════════════════════════

/// Group rotation rates in rad/s.
pub const IDLE_YAW_RATE:       f32 = 0.1;
pub const SPIN_YAW_RATE:       f32 = 5.0;
pub const SPIN_PITCH_RATE:     f32 = 2.0;
pub const SELECTING_YAW_RATE:  f32 = 0.5;

/// Marker pulse while spinning: `0.8 + 0.2·sin(PULSE_HZ·t)`.
const PULSE_HZ:        f32 = 10.0;
/// Where the winner comes to rest, in group coordinates.
pub const WINNER_REST: [f32; 3] = [0.0, 0.0, 2.0];
pub const WINNER_SCALE: f32 = 2.0;

/// Camera on +z looking at the origin.
const CAMERA_Z:    f32 = 12.0;
const FOV_DEG:     f32 = 60.0;
/// Marker sphere radius in world units.
pub const MARKER_RADIUS: f32 = 0.4;

pub const GOLD:   u32 = 0xFFFFD700;
pub const DIMMED: u32 = 0xFF444444;

// ════════════════════════════════════════════════════════════════════════════
// Marker
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerRole {
    Normal,
    Winner,
    Dimmed,
}

/// One student's marker on the sphere.
#[derive(Clone, Debug)]
pub struct Marker {
    pub id:    StudentId,
    /// Formation position on the sphere.
    pub home:  [f32; 3],
    /// Current position in group coordinates.
    pub pos:   [f32; 3],
    pub scale: f32,
    pub color: u32,
    pub role:  MarkerRole,
}

impl Marker {
    pub fn display_color(&self) -> u32 {
        match self.role {
            MarkerRole::Normal => self.color,
            MarkerRole::Winner => GOLD,
            MarkerRole::Dimmed => DIMMED,
        }
    }
}

/// A marker after projection, ready to draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projected {
    pub id:     StudentId,
    pub x:      f32,
    pub y:      f32,
    /// Distance from the camera; larger is farther.
    pub depth:  f32,
    pub radius: f32,
    pub color:  u32,
    pub role:   MarkerRole,
}

// ════════════════════════════════════════════════════════════════════════════
// Scene
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct Scene {
    pub yaw:   f32,
    pub pitch: f32,
    /// Seconds since the scene was created.
    pub clock: f32,
    markers:   Vec<Marker>,
}

impl Scene {
    pub fn new(roster: &Roster) -> Self {
        let markers = roster
            .iter()
            .map(|s| Marker {
                id:    s.id,
                home:  s.position,
                pos:   s.position,
                scale: 1.0,
                color: s.color,
                role:  MarkerRole::Normal,
            })
            .collect();
        Scene { yaw: 0.0, pitch: 0.0, clock: 0.0, markers }
    }

    pub fn markers(&self) -> &[Marker] { &self.markers }

    pub fn marker(&self, id: StudentId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    /// Advance the animation by `dt` seconds.
    pub fn advance(&mut self, snap: &SelectionSnapshot, dt: f32) {
        let dt = dt.max(0.0);
        self.clock += dt;

        match snap.phase {
            Phase::Idle => {
                self.yaw += IDLE_YAW_RATE * dt;
            }
            Phase::Spinning => {
                self.yaw   += SPIN_YAW_RATE * dt;
                self.pitch += SPIN_PITCH_RATE * dt;
            }
            Phase::Selecting => {
                self.yaw += SELECTING_YAW_RATE * dt;
            }
            Phase::Selected => {
                let k = dt.min(1.0);
                self.yaw   = lerp(self.yaw, 0.0, k);
                self.pitch = lerp(self.pitch, 0.0, k);
            }
        }
        // Keep the angles bounded so the rest pose is reached by the short way.
        self.yaw   = wrap_angle(self.yaw);
        self.pitch = wrap_angle(self.pitch);

        let pulse = 0.8 + 0.2 * (self.clock * PULSE_HZ).sin();
        for m in &mut self.markers {
            let is_winner = snap.phase == Phase::Selected && snap.winner == Some(m.id);
            m.role = match snap.phase {
                Phase::Selected if is_winner => MarkerRole::Winner,
                Phase::Selected              => MarkerRole::Dimmed,
                _                            => MarkerRole::Normal,
            };

            if is_winner {
                let k = (dt * 4.0).min(1.0);
                m.pos   = lerp3(m.pos, WINNER_REST, k);
                m.scale = lerp(m.scale, WINNER_SCALE, k);
            } else if snap.phase == Phase::Spinning {
                m.pos   = lerp3(m.pos, m.home, (dt * 5.0).min(1.0));
                m.scale = pulse;
            } else {
                let k = (dt * 2.0).min(1.0);
                m.pos   = lerp3(m.pos, m.home, k);
                m.scale = lerp(m.scale, 1.0, k);
            }
        }
    }

    /// Rotate a group-space point into world space.
    pub fn to_world(&self, p: [f32; 3]) -> [f32; 3] {
        // Yaw about y, then pitch about x.
        let (sy, cy) = self.yaw.sin_cos();
        let x1 = p[0] * cy + p[2] * sy;
        let z1 = -p[0] * sy + p[2] * cy;
        let (sp, cp) = self.pitch.sin_cos();
        let y2 = p[1] * cp - z1 * sp;
        let z2 = p[1] * sp + z1 * cp;
        [x1, y2, z2]
    }

    /// Perspective-project every marker into a `w`×`h` viewport, farthest
    /// first so later entries paint over earlier ones.  The winner is always
    /// last.
    pub fn draw_list(&self, w: usize, h: usize) -> Vec<Projected> {
        let focal = (h as f32 / 2.0) / (FOV_DEG.to_radians() / 2.0).tan();
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);

        let mut out: Vec<Projected> = self
            .markers
            .iter()
            .filter_map(|m| {
                let world = self.to_world(m.pos);
                let depth = CAMERA_Z - world[2];
                if depth <= 0.1 {
                    return None;
                }
                let s = focal / depth;
                Some(Projected {
                    id:     m.id,
                    x:      cx + world[0] * s,
                    y:      cy - world[1] * s,
                    depth,
                    radius: MARKER_RADIUS * m.scale * s,
                    color:  m.display_color(),
                    role:   m.role,
                })
            })
            .collect();

        out.sort_by(|a, b| {
            (a.role == MarkerRole::Winner)
                .cmp(&(b.role == MarkerRole::Winner))
                .then(b.depth.total_cmp(&a.depth))
        });
        out
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

/// Map an angle into (-π, π].
fn wrap_angle(a: f32) -> f32 {
    let mut a = a % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
