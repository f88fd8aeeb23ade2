//! The fixed set of selectable students.
//!
//! A [`Roster`] is built once at session start and never changes afterwards.
//! Everything else holds it behind an `Arc` and only reads from it.

use std::collections::HashSet;
use std::f32::consts::PI;
use std::fmt;

use rand::Rng;

use crate::error::RosterError;

/// Sphere radius used by the original classroom layout.
pub const DEFAULT_RADIUS: f32 = 5.5;

/// The default class list.
pub const DEFAULT_NAMES: [&str; 53] = [
    "杨健强", "杜凌羽", "林思妍", "李烨", "李嘉宇",
    "吴宛欣", "钟皓翔", "郑翠琳", "苏颖琪", "梁玥",
    "冯铭杰", "黄富洪", "王文博", "梁银妹", "黄静怡",
    "张星阳", "苏彦铭", "叶梓仪", "林溪", "卢梓贤",
    "潘良聪", "李思禹", "林嘉源", "张钧宁", "林炜隽",
    "符志林", "何逸思", "张丽婷", "梁静文", "何晓雨",
    "周雪婷", "肖文俊", "林静敏", "冯静雯", "杨静杰",
    "伍守旭", "罗锦添", "赵诗雨", "孙奥绮", "林晓锋",
    "张重洋", "余熙雯", "桂蓬浩", "张其杰", "何紫杨",
    "滕飞宇", "梁思凯", "黎颖蒽", "李铖僖", "曾文进",
    "赵香珍", "陈嘉莹", "陈智浦",
];

// ════════════════════════════════════════════════════════════════════════════
// StudentId / Student
// ════════════════════════════════════════════════════════════════════════════

/// Stable identity of a student for the lifetime of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StudentId(pub u32);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Student {
    pub id:       StudentId,
    pub name:     String,
    /// Position on the marker sphere (world units).
    pub position: [f32; 3],
    /// Packed ARGB (0xAARRGGBB, A = 0xFF).
    pub color:    u32,
}

// ════════════════════════════════════════════════════════════════════════════
// Roster
// ════════════════════════════════════════════════════════════════════════════

/// Non-empty, ordered, immutable list of students with unique ids.
#[derive(Clone, Debug)]
pub struct Roster {
    students: Vec<Student>,
}

impl Roster {
    pub fn new(students: Vec<Student>) -> Result<Self, RosterError> {
        if students.is_empty() {
            return Err(RosterError::Empty);
        }
        let mut seen = HashSet::with_capacity(students.len());
        for s in &students {
            if !seen.insert(s.id) {
                return Err(RosterError::DuplicateId(s.id));
            }
        }
        Ok(Roster { students })
    }

    /// Lay `names` out on a golden-angle sphere of the given radius, with
    /// random marker hues drawn from `rng`.
    pub fn on_sphere<S, R>(names: &[S], radius: f32, rng: &mut R) -> Result<Self, RosterError>
    where
        S: AsRef<str>,
        R: Rng,
    {
        let count = names.len();
        let students = names
            .iter()
            .enumerate()
            .map(|(i, name)| Student {
                id:       StudentId(i as u32),
                name:     name.as_ref().to_string(),
                position: sphere_point(i, count, radius),
                color:    hsl_to_argb(rng.gen_range(0.0..360.0), 0.70, 0.60),
            })
            .collect();
        Roster::new(students)
    }

    /// Convenience: default radius, fresh thread-local randomness.
    pub fn from_names<I, S>(names: I) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        Roster::on_sphere(&names, DEFAULT_RADIUS, &mut rand::thread_rng())
    }

    pub fn students(&self) -> &[Student] { &self.students }
    pub fn len(&self) -> usize { self.students.len() }

    /// Always false; a roster cannot be built empty.
    pub fn is_empty(&self) -> bool { self.students.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, Student> { self.students.iter() }

    pub fn get(&self, id: StudentId) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: StudentId) -> bool {
        self.get(id).is_some()
    }

    pub fn name_of(&self, id: StudentId) -> Option<&str> {
        self.get(id).map(|s| s.name.as_str())
    }
}

impl<'a> IntoIterator for &'a Roster {
    type Item = &'a Student;
    type IntoIter = std::slice::Iter<'a, Student>;
    fn into_iter(self) -> Self::IntoIter { self.students.iter() }
}

// ════════════════════════════════════════════════════════════════════════════
// Layout & color helpers
// ════════════════════════════════════════════════════════════════════════════

/// Point `i` of `count` on a Fibonacci sphere.
pub fn sphere_point(i: usize, count: usize, radius: f32) -> [f32; 3] {
    let golden = PI * (3.0 - 5.0_f32.sqrt());
    let y = if count > 1 {
        1.0 - (i as f32 / (count - 1) as f32) * 2.0
    } else {
        0.0
    };
    let r     = (1.0 - y * y).max(0.0).sqrt();
    let theta = golden * i as f32;
    [theta.cos() * r * radius, y * radius, theta.sin() * r * radius]
}

/// Convert HSL → packed ARGB (0xAARRGGBB, A=0xFF).
pub fn hsl_to_argb(h: f32, s: f32, l: f32) -> u32 {
    let h = h.rem_euclid(360.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to8 = |v: f32| (((v + m) * 255.0).round().clamp(0.0, 255.0)) as u32;
    0xFF000000 | (to8(r) << 16) | (to8(g) << 8) | to8(b)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
