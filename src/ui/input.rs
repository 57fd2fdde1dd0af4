/// Input state tracker.
///
/// A memory game is all discrete actions (move cursor, flip a tile), so
/// everything is edge-triggered: Press and Repeat both count as a press,
/// Release events are ignored. Call `drain_events` once per frame.

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind};

pub struct InputState {
    /// Key codes pressed (or auto-repeated) during the most recent
    /// drain_events() call.
    presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for modifier checks.
    raw_events: Vec<KeyEvent>,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
        }
    }

    /// Drain all pending terminal events without blocking.
    pub fn drain_events(&mut self) {
        self.presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.raw_events.push(key);
                match key.kind {
                    KeyEventKind::Release => {}
                    _ => self.presses.push(key.code),
                }
            }
        }
    }

    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        use crossterm::event::KeyModifiers;
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}
