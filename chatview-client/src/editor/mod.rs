//! Interactive line editor
//!
//! Reads keys in raw mode, redraws the input line in place and holds
//! incoming chat output while the user is composing so the two never
//! interleave on screen.

mod keys;
mod state;

pub use keys::{EditorKey, KeySource, TerminalKeys};
pub use state::EditorState;

#[cfg(test)]
pub use keys::RawMode;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::cursor::{MoveLeft, MoveToColumn};
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use crate::output::OutputCoordinator;

/// Sleep between key polls when no input is pending
pub const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Prompt drawn in front of chat input
pub const CHAT_PROMPT: &str = "> ";

/// Result of a single read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    Interrupted,
}

pub struct LineEditor<K: KeySource = TerminalKeys> {
    keys: K,
    output: Arc<OutputCoordinator>,
    state: EditorState,
}

impl LineEditor<TerminalKeys> {
    /// Editor reading from the controlling terminal
    pub fn terminal(output: Arc<OutputCoordinator>) -> Self {
        Self::new(TerminalKeys, output)
    }
}

impl<K: KeySource> LineEditor<K> {
    pub fn new(keys: K, output: Arc<OutputCoordinator>) -> Self {
        Self {
            keys,
            output,
            state: EditorState::new(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Read one chat line
    ///
    /// Output flows freely until the first keystroke, is held while the
    /// line is being composed and drained once it is committed.
    pub fn read_line(&mut self) -> io::Result<ReadOutcome> {
        self.output.end_composing();
        let result = self
            .keys
            .enter_raw_mode()
            .and_then(|_raw| self.run(CHAT_PROMPT, true));
        self.output.end_composing();
        result
    }

    /// Ask for a one-off answer such as a token or username
    ///
    /// The prompt is drawn immediately, output is held for the whole read
    /// and the answer is not recorded in history.
    pub fn read_prompt(&mut self, prompt: &str) -> io::Result<ReadOutcome> {
        self.output.begin_composing();
        let result = self.keys.enter_raw_mode().and_then(|_raw| {
            self.redraw(prompt)?;
            self.run(prompt, false)
        });
        self.output.end_composing();
        result
    }

    fn run(&mut self, prompt: &str, chat: bool) -> io::Result<ReadOutcome> {
        self.state.discard();
        loop {
            let Some(key) = self.keys.poll_key(IDLE_BACKOFF)? else {
                continue;
            };
            self.output.begin_composing();

            match key {
                EditorKey::Enter => {
                    self.clear_line()?;
                    return Ok(ReadOutcome::Line(self.state.commit(chat)));
                }
                EditorKey::Interrupt => {
                    self.clear_line()?;
                    self.state.discard();
                    return Ok(ReadOutcome::Interrupted);
                }
                EditorKey::Up | EditorKey::Down if !chat => {}
                other => {
                    self.state.apply(other);
                }
            }
            self.redraw(prompt)?;
        }
    }

    fn redraw(&self, prompt: &str) -> io::Result<()> {
        let mut frame: Vec<u8> = Vec::new();
        queue!(
            frame,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(prompt),
            Print(self.state.buffer())
        )?;
        let back = self.state.char_count() - self.state.cursor();
        if back > 0 {
            queue!(frame, MoveLeft(u16::try_from(back).unwrap_or(u16::MAX)))?;
        }
        self.output.write_raw(&frame)
    }

    fn clear_line(&self) -> io::Result<()> {
        let mut frame: Vec<u8> = Vec::new();
        queue!(frame, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        self.output.write_raw(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::SharedBuf;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Step {
        Key(EditorKey),
        Idle,
        Publish(&'static str),
    }

    /// Replays a fixed script; fails with UnexpectedEof once exhausted
    struct ScriptedKeys {
        steps: VecDeque<Step>,
        output: Arc<OutputCoordinator>,
        restored: Arc<AtomicUsize>,
    }

    impl KeySource for ScriptedKeys {
        fn enter_raw_mode(&mut self) -> io::Result<RawMode> {
            let restored = Arc::clone(&self.restored);
            Ok(RawMode::with_restore(move || {
                restored.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
        }

        fn poll_key(&mut self, _timeout: Duration) -> io::Result<Option<EditorKey>> {
            loop {
                match self.steps.pop_front() {
                    Some(Step::Key(key)) => return Ok(Some(key)),
                    Some(Step::Idle) => return Ok(None),
                    Some(Step::Publish(line)) => self.output.publish(line),
                    None => return Err(io::ErrorKind::UnexpectedEof.into()),
                }
            }
        }
    }

    fn editor(steps: Vec<Step>) -> (LineEditor<ScriptedKeys>, SharedBuf, Arc<AtomicUsize>) {
        let buf = SharedBuf::default();
        let output = Arc::new(OutputCoordinator::new(buf.clone()));
        let restored = Arc::new(AtomicUsize::new(0));
        let keys = ScriptedKeys {
            steps: steps.into(),
            output: Arc::clone(&output),
            restored: Arc::clone(&restored),
        };
        (LineEditor::new(keys, output), buf, restored)
    }

    fn keys(s: &str) -> Vec<Step> {
        s.chars().map(|c| Step::Key(EditorKey::Char(c))).collect()
    }

    #[test]
    fn test_read_line_with_cursor_edit() {
        let mut steps = keys("abc");
        steps.push(Step::Key(EditorKey::Left));
        steps.push(Step::Key(EditorKey::Left));
        steps.push(Step::Key(EditorKey::Char('X')));
        steps.push(Step::Key(EditorKey::Enter));
        let (mut editor, _buf, restored) = editor(steps);

        assert_eq!(
            editor.read_line().unwrap(),
            ReadOutcome::Line("aXbc".to_string())
        );
        assert_eq!(restored.load(Ordering::SeqCst), 1);
        assert_eq!(editor.state().history(), &["aXbc".to_string()]);
    }

    #[test]
    fn test_history_across_reads() {
        let mut steps = keys("first");
        steps.push(Step::Key(EditorKey::Enter));
        steps.extend(keys("second"));
        steps.push(Step::Key(EditorKey::Enter));
        steps.push(Step::Key(EditorKey::Up));
        steps.push(Step::Key(EditorKey::Up));
        steps.push(Step::Key(EditorKey::Down));
        steps.push(Step::Key(EditorKey::Enter));
        let (mut editor, _buf, _) = editor(steps);

        editor.read_line().unwrap();
        editor.read_line().unwrap();
        assert_eq!(
            editor.read_line().unwrap(),
            ReadOutcome::Line("second".to_string())
        );
    }

    #[test]
    fn test_output_flows_before_first_key() {
        let mut steps = vec![Step::Idle, Step::Publish("early")];
        steps.extend(keys("hi"));
        steps.push(Step::Key(EditorKey::Enter));
        let (mut editor, buf, _) = editor(steps);

        editor.read_line().unwrap();
        let out = buf.contents();
        let early = out.find("early").unwrap();
        let prompt = out.find("> h").unwrap();
        assert!(early < prompt);
    }

    #[test]
    fn test_output_held_while_composing() {
        let mut steps = keys("h");
        steps.push(Step::Publish("incoming"));
        steps.push(Step::Key(EditorKey::Char('i')));
        steps.push(Step::Key(EditorKey::Enter));
        let (mut editor, buf, _) = editor(steps);

        editor.read_line().unwrap();
        let out = buf.contents();
        let typed = out.rfind("> hi").unwrap();
        let incoming = out.find("incoming").unwrap();
        assert!(incoming > typed, "held line must follow the edit: {out:?}");
        assert!(!editor.output.is_composing());
    }

    #[test]
    fn test_prompt_holds_output_and_skips_history() {
        let mut steps = vec![Step::Publish("queued")];
        steps.push(Step::Key(EditorKey::Up));
        steps.extend(keys("oauth:abc"));
        steps.push(Step::Key(EditorKey::Enter));
        let (mut editor, buf, _) = editor(steps);

        assert_eq!(
            editor.read_prompt("Token: ").unwrap(),
            ReadOutcome::Line("oauth:abc".to_string())
        );
        let out = buf.contents();
        assert!(out.find("Token: ").unwrap() < out.find("queued").unwrap());
        assert!(editor.state().history().is_empty());
    }

    #[test]
    fn test_interrupt() {
        let mut steps = keys("partial");
        steps.push(Step::Key(EditorKey::Interrupt));
        let (mut editor, _buf, restored) = editor(steps);

        assert_eq!(editor.read_line().unwrap(), ReadOutcome::Interrupted);
        assert_eq!(restored.load(Ordering::SeqCst), 1);
        assert!(editor.state().buffer().is_empty());
    }

    #[test]
    fn test_error_restores_terminal_and_releases_output() {
        let (mut editor, buf, restored) = editor(keys("ab"));

        let err = editor.read_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(restored.load(Ordering::SeqCst), 1);
        assert!(!editor.output.is_composing());

        editor.output.publish("after");
        assert!(buf.contents().ends_with("after\r\n"));
    }
}
