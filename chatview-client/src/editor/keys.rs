//! Key input and raw terminal mode

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// Keys the line editor reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    /// Printable character
    Char(char),
    Backspace,
    Left,
    Right,
    Up,
    Down,
    Enter,
    /// Ctrl-C / Ctrl-D
    Interrupt,
}

/// Raw terminal mode held for the lifetime of the value
///
/// Dropping restores the terminal, so every exit path out of the editor
/// (including `?` and panics) leaves it in cooked mode.
pub struct RawMode {
    restore: Option<Box<dyn FnOnce() -> io::Result<()> + Send>>,
}

impl RawMode {
    /// Switch the real terminal into raw mode
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self::with_restore(disable_raw_mode))
    }

    /// Guard that runs `restore` when dropped
    pub fn with_restore(restore: impl FnOnce() -> io::Result<()> + Send + 'static) -> Self {
        Self {
            restore: Some(Box::new(restore)),
        }
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            if let Err(e) = restore() {
                tracing::error!("Failed to restore terminal mode: {}", e);
            }
        }
    }
}

/// Source of editor keys
pub trait KeySource {
    /// Put the input into raw mode until the guard drops
    fn enter_raw_mode(&mut self) -> io::Result<RawMode>;

    /// Wait up to `timeout` for the next key
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<EditorKey>>;
}

/// Keys from the controlling terminal via crossterm
#[derive(Debug, Default)]
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn enter_raw_mode(&mut self) -> io::Result<RawMode> {
        RawMode::enable()
    }

    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<EditorKey>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(match event::read()? {
            Event::Key(key) => translate_key(&key),
            _ => None,
        })
    }
}

/// Map a crossterm key event to an editor key
pub fn translate_key(key: &KeyEvent) -> Option<EditorKey> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => Some(EditorKey::Interrupt),
        KeyCode::Char(c) if !ctrl && !c.is_control() => Some(EditorKey::Char(c)),
        KeyCode::Backspace | KeyCode::Delete => Some(EditorKey::Backspace),
        KeyCode::Left => Some(EditorKey::Left),
        KeyCode::Right => Some(EditorKey::Right),
        KeyCode::Up => Some(EditorKey::Up),
        KeyCode::Down => Some(EditorKey::Down),
        KeyCode::Enter => Some(EditorKey::Enter),
        _ => None,
    }
}
