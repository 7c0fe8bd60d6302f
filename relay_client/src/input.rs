//! Input handling.
//!
//! In the rendered client a key press applies a physics impulse to the
//! player's box. Headless, an impulse becomes a direct nudge of the
//! record's position.

use relay_shared::{math::Vec3, player::PlayerRecord};

/// Fraction of an impulse applied per key press.
const IMPULSE_SCALE: f32 = 0.1;

/// Movement keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    W,
    A,
    S,
    D,
}

impl Key {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'w' => Some(Key::W),
            'a' => Some(Key::A),
            's' => Some(Key::S),
            'd' => Some(Key::D),
            _ => None,
        }
    }

    /// Impulse applied to the box for this key.
    pub fn impulse(self) -> Vec3 {
        match self {
            Key::W => Vec3::new(-10.0, 0.0, 0.0),
            Key::A => Vec3::new(0.0, 0.0, 10.0),
            Key::S => Vec3::new(10.0, 0.0, 0.0),
            Key::D => Vec3::new(0.0, 0.0, -10.0),
        }
    }
}

/// Applies a key press to the local record.
pub fn apply_key(record: &mut PlayerRecord, key: Key) {
    record.position = record.position + key.impulse() * IMPULSE_SCALE;
}
