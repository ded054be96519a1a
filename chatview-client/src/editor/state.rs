//! Editable line buffer with cursor and history

use super::keys::EditorKey;

/// Buffer, cursor and history of the interactive line editor
///
/// The cursor counts characters, not bytes, and always satisfies
/// `0 <= cursor <= len`. History is ordered oldest first; while browsing,
/// `history_index` counts back from the newest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorState {
    buffer: String,
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with previously committed lines (oldest first)
    #[cfg(test)]
    pub fn with_history(history: Vec<String>) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Length of the buffer in characters
    pub fn char_count(&self) -> usize {
        self.buffer.chars().count()
    }

    #[cfg(test)]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    #[cfg(test)]
    pub fn is_browsing_history(&self) -> bool {
        self.history_index.is_some()
    }

    /// Apply an editing key; returns whether the buffer or cursor changed
    ///
    /// `Enter` and `Interrupt` are handled by the editor loop and are
    /// no-ops here.
    pub fn apply(&mut self, key: EditorKey) -> bool {
        match key {
            EditorKey::Char(c) => {
                self.insert(c);
                true
            }
            EditorKey::Backspace => self.backspace(),
            EditorKey::Left => self.move_left(),
            EditorKey::Right => self.move_right(),
            EditorKey::Up => self.history_up(),
            EditorKey::Down => self.history_down(),
            EditorKey::Enter | EditorKey::Interrupt => false,
        }
    }

    /// Insert a character at the cursor and advance past it
    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
    }

    /// Remove the character before the cursor
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let at = self.byte_index(self.cursor - 1);
        self.buffer.remove(at);
        self.cursor -= 1;
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor >= self.char_count() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Step toward older history, replacing the buffer
    pub fn history_up(&mut self) -> bool {
        let next = self.history_index.map_or(0, |i| i + 1);
        if next >= self.history.len() {
            return false;
        }
        self.history_index = Some(next);
        self.load_history_entry(next);
        true
    }

    /// Step toward newer history; past the newest entry the buffer clears
    pub fn history_down(&mut self) -> bool {
        match self.history_index {
            None => false,
            Some(0) => {
                self.history_index = None;
                self.buffer.clear();
                self.cursor = 0;
                true
            }
            Some(i) => {
                self.history_index = Some(i - 1);
                self.load_history_entry(i - 1);
                true
            }
        }
    }

    /// Take the buffer as a committed line
    ///
    /// Non-empty lines are appended to history when `record` is set.
    /// Browsing always resets.
    pub fn commit(&mut self, record: bool) -> String {
        let line = std::mem::take(&mut self.buffer);
        self.cursor = 0;
        self.history_index = None;
        if record && !line.is_empty() {
            self.history.push(line.clone());
        }
        line
    }

    /// Drop the current buffer without committing it
    pub fn discard(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.history_index = None;
    }

    fn load_history_entry(&mut self, back: usize) {
        self.buffer = self.history[self.history.len() - 1 - back].clone();
        self.cursor = self.char_count();
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_index)
            .map_or(self.buffer.len(), |(i, _)| i)
    }
}
