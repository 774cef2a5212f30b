use crate::engine::KeyActuator;
use anyhow::{Result, anyhow};
use log::debug;
use rdev::{EventType, Key, simulate};
use std::time::Duration;

/// OS-level key injection via `rdev::simulate`.
///
/// A short settle delay follows every injected event; some platforms drop
/// or reorder synthetic input delivered back-to-back.
#[derive(Debug, Clone)]
pub struct RdevActuator {
    settle: Duration,
}

impl RdevActuator {
    pub fn new() -> Self {
        Self {
            settle: Duration::from_millis(1),
        }
    }

    fn send(&self, event: EventType) -> Result<()> {
        simulate(&event).map_err(|_| anyhow!("Failed to inject input event {:?}", event))?;
        spin_sleep::sleep(self.settle);
        Ok(())
    }
}

impl Default for RdevActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyActuator for RdevActuator {
    fn key_down(&self, key: &str) -> Result<()> {
        let key_code = resolve_key(key)?;
        debug!("key_down '{}' => {:?}", key, key_code);
        self.send(EventType::KeyPress(key_code))
    }

    fn key_up(&self, key: &str) -> Result<()> {
        let key_code = resolve_key(key)?;
        debug!("key_up '{}' => {:?}", key, key_code);
        self.send(EventType::KeyRelease(key_code))
    }
}

/// Translate a mapping-table key identifier into an `rdev` key code.
///
/// Accepts single letters/digits and a handful of named keys. Anything
/// else is an actuator error, surfaced when the note is first played.
fn resolve_key(key: &str) -> Result<Key> {
    if let Some(c) = single_char(key) {
        let code = match c.to_ascii_lowercase() {
            'a' => Key::KeyA,
            'b' => Key::KeyB,
            'c' => Key::KeyC,
            'd' => Key::KeyD,
            'e' => Key::KeyE,
            'f' => Key::KeyF,
            'g' => Key::KeyG,
            'h' => Key::KeyH,
            'i' => Key::KeyI,
            'j' => Key::KeyJ,
            'k' => Key::KeyK,
            'l' => Key::KeyL,
            'm' => Key::KeyM,
            'n' => Key::KeyN,
            'o' => Key::KeyO,
            'p' => Key::KeyP,
            'q' => Key::KeyQ,
            'r' => Key::KeyR,
            's' => Key::KeyS,
            't' => Key::KeyT,
            'u' => Key::KeyU,
            'v' => Key::KeyV,
            'w' => Key::KeyW,
            'x' => Key::KeyX,
            'y' => Key::KeyY,
            'z' => Key::KeyZ,
            '0' => Key::Num0,
            '1' => Key::Num1,
            '2' => Key::Num2,
            '3' => Key::Num3,
            '4' => Key::Num4,
            '5' => Key::Num5,
            '6' => Key::Num6,
            '7' => Key::Num7,
            '8' => Key::Num8,
            '9' => Key::Num9,
            ';' => Key::SemiColon,
            ',' => Key::Comma,
            '.' => Key::Dot,
            '/' => Key::Slash,
            '-' => Key::Minus,
            '=' => Key::Equal,
            '[' => Key::LeftBracket,
            ']' => Key::RightBracket,
            other => return Err(anyhow!("No key code for '{}'", other)),
        };
        return Ok(code);
    }

    let code = match key.to_ascii_lowercase().as_str() {
        "space" => Key::Space,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "shift" => Key::ShiftLeft,
        "ctrl" => Key::ControlLeft,
        "alt" => Key::Alt,
        other => return Err(anyhow!("Unknown key identifier '{}'", other)),
    };

    Ok(code)
}

fn single_char(key: &str) -> Option<char> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
