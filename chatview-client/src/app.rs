//! Application: login, then the read-dispatch loop

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use chatview_protocol::Inbound;
use chatview_utils::{ChatviewError, Result};

use crate::auth::{self, HttpTokenValidator, Prompter, TokenValidator};
use crate::cli::Args;
use crate::color::Painter;
use crate::commands::{is_command, parse_command, Command, HighlightAction, COMMANDS};
use crate::config::{default_highlights, ConfigFile, Credentials, Highlight, UserSettings};
use crate::connection::{normalize_channel, ChatHandler, Connection};
use crate::editor::{KeySource, LineEditor, ReadOutcome, TerminalKeys};
use crate::output::OutputCoordinator;
use crate::render::{DisplaySettings, Renderer, UserState};

const ERROR_COLOR: &str = "#880000";
const INFO_COLOR: &str = "#005b5b";
const SHUTDOWN_COLOR: &str = "#5f0000";
const MENU_RULE: &str = "______________________________________________";

/// Whether the main loop keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Runs the line editor on the blocking pool
///
/// The editor polls the terminal synchronously, so each read moves it onto
/// a blocking thread and back. The async side stays free to run the
/// connection meanwhile.
pub struct EditorHandle<K: KeySource + Send + 'static = TerminalKeys> {
    editor: Option<LineEditor<K>>,
}

impl<K: KeySource + Send + 'static> EditorHandle<K> {
    pub fn new(editor: LineEditor<K>) -> Self {
        Self {
            editor: Some(editor),
        }
    }

    async fn run<T, F>(&mut self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut LineEditor<K>) -> std::io::Result<T> + Send + 'static,
    {
        let mut editor = self
            .editor
            .take()
            .ok_or_else(|| ChatviewError::internal("line editor unavailable"))?;

        let (editor, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut editor);
            (editor, result)
        })
        .await
        .map_err(|e| ChatviewError::internal(format!("line editor task failed: {}", e)))?;

        self.editor = Some(editor);
        Ok(result?)
    }

    pub async fn read_line(&mut self) -> Result<ReadOutcome> {
        self.run(|editor| editor.read_line()).await
    }

    pub async fn read_prompt(&mut self, prompt: &str) -> Result<ReadOutcome> {
        let prompt = prompt.to_string();
        self.run(move |editor| editor.read_prompt(&prompt)).await
    }
}

#[async_trait]
impl<K: KeySource + Send + 'static> Prompter for EditorHandle<K> {
    async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        Ok(match self.read_prompt(prompt).await? {
            ReadOutcome::Line(answer) => Some(answer),
            ReadOutcome::Interrupted => None,
        })
    }
}

pub struct App<K: KeySource + Send + 'static = TerminalKeys> {
    args: Args,
    output: Arc<OutputCoordinator>,
    editor: EditorHandle<K>,
    renderer: Renderer,
    user: Arc<ArcSwap<UserState>>,
    credentials: ConfigFile<Credentials>,
    settings: ConfigFile<UserSettings>,
}

impl App<TerminalKeys> {
    /// App on the real terminal with configuration from the default paths
    pub fn new(args: Args) -> Self {
        let output = Arc::new(OutputCoordinator::stdout());
        let editor = LineEditor::terminal(Arc::clone(&output));
        Self::with_parts(
            args,
            output,
            editor,
            ConfigFile::credentials(),
            ConfigFile::settings(),
            Painter::detect(),
        )
    }
}

impl<K: KeySource + Send + 'static> App<K> {
    pub fn with_parts(
        args: Args,
        output: Arc<OutputCoordinator>,
        editor: LineEditor<K>,
        credentials: ConfigFile<Credentials>,
        settings: ConfigFile<UserSettings>,
        painter: Painter,
    ) -> Self {
        let display = DisplaySettings::from_settings(settings.get(), args.raw);
        let user = Arc::new(ArcSwap::from_pointee(UserState::default()));
        let renderer = Renderer::new(
            painter,
            Arc::new(ArcSwap::from_pointee(display)),
            Arc::clone(&user),
        );

        Self {
            args,
            output,
            editor: EditorHandle::new(editor),
            renderer,
            user,
            credentials,
            settings,
        }
    }

    fn info(&self, text: &str) {
        self.output.publish(self.renderer.painter().fg(text, INFO_COLOR));
    }

    fn error(&self, text: &str) {
        self.output.publish(self.renderer.painter().fg(text, ERROR_COLOR));
    }

    /// Log in, connect and run until the user quits
    pub async fn run(mut self) -> Result<()> {
        let validator = if self.args.skip_token_check {
            None
        } else {
            Some(HttpTokenValidator::new()?)
        };

        let login = auth::resolve_login(
            self.credentials.get_mut(),
            self.args.user.as_deref(),
            self.args.channel.as_deref(),
            &mut self.editor,
            validator.as_ref().map(|v| v as &dyn TokenValidator),
        )
        .await?;
        let Some(login) = login else {
            tracing::info!("Login interrupted");
            self.output.finish();
            return Ok(());
        };

        self.save_credentials();

        let handler = Arc::new(ChatHandler::new(
            self.renderer.clone(),
            Arc::clone(&self.output),
            Arc::clone(&self.user),
            login.username.clone(),
        ));
        let mut connection = Connection::new(self.args.connection_settings(), login, handler);

        self.info("Type /help for a list of commands.");
        if let Err(e) = connection.connect().await {
            tracing::warn!("Initial connect failed: {}", e);
            self.error(&e.to_string());
        }

        let result = self.main_loop(&mut connection).await;

        self.output.publish(
            self.renderer
                .painter()
                .fg("Shutting down...", SHUTDOWN_COLOR),
        );
        connection.shutdown().await;
        self.output.finish();
        result
    }

    async fn main_loop(&mut self, connection: &mut Connection) -> Result<()> {
        loop {
            let line = match self.editor.read_line().await? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => return Ok(()),
            };

            if is_command(&line) {
                let flow = match parse_command(&line) {
                    Ok(command) => self.execute(connection, command).await?,
                    Err(e) => {
                        self.error(&e.to_string());
                        Flow::Continue
                    }
                };
                if flow == Flow::Quit {
                    return Ok(());
                }
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            match connection.send_message(&line) {
                Ok(()) => self.output.publish(self.renderer.own_line(
                    connection.channel(),
                    &connection.login().username,
                    &line,
                )),
                Err(e) => self.error(&format!("Message not sent: {}", e)),
            }
        }
    }

    async fn execute(&mut self, connection: &mut Connection, command: Command) -> Result<Flow> {
        tracing::debug!(?command, "Executing command");
        match command {
            Command::Quit => return Ok(Flow::Quit),
            Command::Help => self.show_help().await?,
            Command::Clear => self.clear_screen(),
            Command::Join(name) => match connection.join_channel(&name).await {
                Ok(channel) => tracing::info!(channel = %channel, "Joined channel"),
                Err(e) => self.error(&e.to_string()),
            },
            Command::ToggleRaw => {
                self.renderer.update_settings(|s| s.raw = !s.raw);
                let state = if self.renderer.settings().raw {
                    "enabled"
                } else {
                    "disabled"
                };
                self.output.publish(format!("Raw mode is now {}", state));
            }
            Command::Badges => self.show_badges().await?,
            Command::Debug(sample) => {
                let line = sample.line();
                match self.renderer.inbound_line(line, &Inbound::classify(line)) {
                    Some(rendered) => self.output.publish(rendered),
                    None => self.info("Sample produced no output"),
                }
            }
            Command::SetChannel(name) => match normalize_channel(&name) {
                Ok(channel) => {
                    self.output.publish(format!("Setting channel to {}", channel));
                    self.credentials.get_mut().channel = Some(channel);
                    self.save_credentials();
                }
                Err(e) => self.error(&e.to_string()),
            },
            Command::SetChannelColor(color) => {
                self.output.publish(format!(
                    "Setting channel color to {}",
                    self.renderer.painter().fg(&color, &color)
                ));
                self.settings.get_mut().channel_color = color.clone();
                self.save_settings();
                self.renderer.update_settings(|s| s.channel_color = color);
            }
            Command::Highlights(action) => self.highlights(action),
            Command::Unknown(name) => self.error(&format!("[Error] Unknown command: {}", name)),
        }
        Ok(Flow::Continue)
    }

    /// Hold incoming output until the user presses Enter
    async fn wait_for_enter(&mut self) -> Result<()> {
        self.output.publish("Press Enter to resume chat.");
        self.editor.read_prompt("").await?;
        Ok(())
    }

    async fn show_help(&mut self) -> Result<()> {
        self.output.publish("");
        self.output.publish("Help Menu - prefix commands with '/':");
        self.output.publish(format!(" {}", MENU_RULE));
        self.output.publish("|");
        for (name, description) in COMMANDS {
            self.output.publish(format!("| {} - {}", name, description));
        }
        self.output.publish(format!("|{}", MENU_RULE));
        self.wait_for_enter().await
    }

    async fn show_badges(&mut self) -> Result<()> {
        let settings = self.renderer.settings();
        if settings.badges.is_empty() {
            self.output.publish("No badges found.");
            return Ok(());
        }

        self.output.publish("Badges:");
        for (name, style) in &settings.badges {
            let marker = self
                .renderer
                .painter()
                .paint(&style.text, &style.color, style.background);
            self.output.publish(format!("{}: {}", name, marker));
        }
        self.output.publish("");
        self.wait_for_enter().await
    }

    fn clear_screen(&self) {
        let mut frame: Vec<u8> = Vec::new();
        let result = queue!(frame, Clear(ClearType::All), MoveTo(0, 0))
            .and_then(|()| self.output.write_raw(&frame));
        if let Err(e) = result {
            tracing::warn!("Failed to clear screen: {}", e);
        }
    }

    fn highlights(&mut self, action: HighlightAction) {
        let painter = *self.renderer.painter();
        match action {
            HighlightAction::List => {
                self.output.publish("");
                self.output.publish("Highlights: ");
                self.output.publish(format!(" {}", MENU_RULE));
                self.output.publish("|");
                for (key, highlight) in &self.settings.get().highlights {
                    self.output
                        .publish(format!("| {}", painter.bg(key, &highlight.color)));
                }
                self.output.publish(format!("|{}", MENU_RULE));
                self.output
                    .publish("Usage: /highlights <help|add|remove|clear|default>");
                return;
            }
            HighlightAction::Help => {
                for line in [
                    String::new(),
                    "Highlights Menu: ".to_string(),
                    format!(" {}", MENU_RULE),
                    "|".to_string(),
                    "| help - Displays this menu.".to_string(),
                    "| add - Adds a highlight. Usage: /highlights add <highlight> <user|badge> <color>"
                        .to_string(),
                    "| remove - Removes a highlight. Usage: /highlights remove <highlight>".to_string(),
                    "| clear - Clears all highlights.".to_string(),
                    "| default - Sets to default highlights.".to_string(),
                    format!("|{}", MENU_RULE),
                ] {
                    self.output.publish(line);
                }
                return;
            }
            HighlightAction::Add { key, kind, color } => {
                if self.settings.get().highlights.contains_key(&key) {
                    self.error(&format!("Highlight already exists: {}", key));
                    return;
                }
                self.output
                    .publish(painter.bg(&format!("Adding highlight: {}", key), &color));
                self.settings
                    .get_mut()
                    .highlights
                    .insert(key, Highlight { kind, color });
            }
            HighlightAction::Remove(key) => {
                let Some(removed) = self.settings.get_mut().highlights.remove(&key) else {
                    self.error(&format!("Highlight does not exist: {}", key));
                    return;
                };
                self.output.publish(format!(
                    "{}{}",
                    painter.fg("Removing highlight: ", ERROR_COLOR),
                    painter.bg(&key, &removed.color)
                ));
            }
            HighlightAction::Clear => {
                self.settings.get_mut().highlights.clear();
                self.error("Clearing all highlights.");
            }
            HighlightAction::Default => {
                self.settings.get_mut().highlights = default_highlights();
                self.error("Default highlights set.");
            }
        }

        self.save_settings();
        let highlights = self.settings.get().highlights.clone();
        self.renderer.update_settings(|s| s.highlights = highlights);
    }

    fn save_credentials(&self) {
        if let Err(e) = self.credentials.save() {
            tracing::warn!(
                path = %self.credentials.path().display(),
                "Failed to save credentials: {}",
                e
            );
            self.error(&format!("Failed to save credentials: {}", e));
        }
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings.save() {
            tracing::warn!(
                path = %self.settings.path().display(),
                "Failed to save settings: {}",
                e
            );
            self.error(&format!("Failed to save settings: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSupport;
    use crate::config::HighlightKind;
    use crate::connection::{CallbackHandler, ConnectionSettings, Login};
    use crate::editor::{EditorKey, RawMode};
    use crate::output::tests::SharedBuf;
    use clap::Parser;
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    struct Keys(VecDeque<EditorKey>);

    impl KeySource for Keys {
        fn enter_raw_mode(&mut self) -> io::Result<RawMode> {
            Ok(RawMode::with_restore(|| Ok(())))
        }

        fn poll_key(&mut self, _timeout: Duration) -> io::Result<Option<EditorKey>> {
            self.0
                .pop_front()
                .map(Some)
                .ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
        }
    }

    fn typed(lines: &[&str]) -> VecDeque<EditorKey> {
        let mut keys = VecDeque::new();
        for line in lines {
            keys.extend(line.chars().map(EditorKey::Char));
            keys.push_back(EditorKey::Enter);
        }
        keys
    }

    fn app(dir: &TempDir, keys: VecDeque<EditorKey>, args: &[&str]) -> (App<Keys>, SharedBuf) {
        let buf = SharedBuf::default();
        let output = Arc::new(OutputCoordinator::new(buf.clone()));
        let editor = LineEditor::new(Keys(keys), Arc::clone(&output));
        let argv = std::iter::once("chatview").chain(args.iter().copied());
        let app = App::with_parts(
            Args::parse_from(argv),
            output,
            editor,
            ConfigFile::load(dir.path().join("credentials.toml")),
            ConfigFile::load(dir.path().join("settings.toml")),
            Painter::new(ColorSupport::None),
        );
        (app, buf)
    }

    fn idle_connection() -> Connection {
        Connection::new(
            ConnectionSettings::default(),
            Login {
                token: "oauth:tok".into(),
                username: "viewer".into(),
                channel: "#chan".into(),
            },
            Arc::new(CallbackHandler::new(|_: &str, _: &Inbound| {})),
        )
    }

    async fn exec(app: &mut App<Keys>, line: &str) -> Flow {
        let mut connection = idle_connection();
        app.execute(&mut connection, parse_command(line).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_quit() {
        let dir = tempdir().unwrap();
        let (mut app, _) = app(&dir, VecDeque::new(), &[]);
        assert_eq!(exec(&mut app, "/quit").await, Flow::Quit);
        assert_eq!(exec(&mut app, "/raw").await, Flow::Continue);
    }

    #[tokio::test]
    async fn test_toggle_raw() {
        let dir = tempdir().unwrap();
        let (mut app, buf) = app(&dir, VecDeque::new(), &[]);

        exec(&mut app, "/raw").await;
        assert!(app.renderer.settings().raw);
        exec(&mut app, "/raw").await;
        assert!(!app.renderer.settings().raw);
        assert_eq!(
            buf.lines(),
            vec!["Raw mode is now enabled", "Raw mode is now disabled"]
        );
    }

    #[tokio::test]
    async fn test_raw_flag_sets_initial_mode() {
        let dir = tempdir().unwrap();
        let (app, _) = app(&dir, VecDeque::new(), &["--raw"]);
        assert!(app.renderer.settings().raw);
    }

    #[tokio::test]
    async fn test_set_channel_color_saves_and_applies() {
        let dir = tempdir().unwrap();
        let (mut app, buf) = app(&dir, VecDeque::new(), &[]);

        exec(&mut app, "/set channel_color light-red").await;
        assert_eq!(app.renderer.settings().channel_color, "#ff6666");
        assert_eq!(buf.lines(), vec!["Setting channel color to #ff6666"]);

        let saved = ConfigFile::<UserSettings>::read(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(saved.channel_color, "#ff6666");
    }

    #[tokio::test]
    async fn test_set_channel_saves_credentials() {
        let dir = tempdir().unwrap();
        let (mut app, buf) = app(&dir, VecDeque::new(), &[]);

        exec(&mut app, "/set channel other").await;
        assert_eq!(buf.lines(), vec!["Setting channel to #other"]);

        let saved = ConfigFile::<Credentials>::read(&dir.path().join("credentials.toml")).unwrap();
        assert_eq!(saved.channel.as_deref(), Some("#other"));
    }

    #[tokio::test]
    async fn test_highlight_lifecycle() {
        let dir = tempdir().unwrap();
        let (mut app, buf) = app(&dir, VecDeque::new(), &[]);

        exec(&mut app, "/highlights add somebody user #0000ff").await;
        exec(&mut app, "/highlights add somebody badge #00ff00").await;
        assert_eq!(
            app.renderer.settings().highlights["somebody"].kind,
            HighlightKind::User
        );

        exec(&mut app, "/highlights remove somebody").await;
        exec(&mut app, "/highlights remove somebody").await;
        assert!(app.renderer.settings().highlights.is_empty());

        exec(&mut app, "/highlights default").await;
        let saved = ConfigFile::<UserSettings>::read(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(saved.highlights, default_highlights());

        assert_eq!(
            buf.lines(),
            vec![
                "Adding highlight: somebody",
                "Highlight already exists: somebody",
                "Removing highlight: somebody",
                "Highlight does not exist: somebody",
                "Default highlights set.",
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let dir = tempdir().unwrap();
        let (mut app, buf) = app(&dir, VecDeque::new(), &[]);
        exec(&mut app, "/dance").await;
        assert_eq!(buf.lines(), vec!["[Error] Unknown command: dance"]);
    }

    #[tokio::test]
    async fn test_debug_sample_rendered() {
        let dir = tempdir().unwrap();
        let (mut app, buf) = app(&dir, VecDeque::new(), &[]);
        exec(&mut app, "/debug echo").await;
        assert_eq!(buf.lines(), vec!["#channel username: test message"]);
    }

    #[tokio::test]
    async fn test_help_waits_for_enter() {
        let dir = tempdir().unwrap();
        let (mut app, buf) = app(&dir, typed(&[""]), &[]);

        exec(&mut app, "/help").await;
        let out = buf.contents();
        assert!(out.contains("Help Menu - prefix commands with '/':"));
        assert!(out.contains("| quit - Quits the program."));
        assert!(out.contains("Press Enter to resume chat."));
        assert!(!app.output.is_composing());
    }

    #[tokio::test]
    async fn test_badges_listed() {
        let dir = tempdir().unwrap();
        let (mut app, buf) = app(&dir, typed(&[""]), &[]);

        exec(&mut app, "/badges").await;
        let lines = buf.lines();
        assert!(lines.contains(&"Badges:".to_string()));
        assert!(lines.contains(&"moderator: MD".to_string()));
    }

    #[tokio::test]
    async fn test_interrupted_login_exits_cleanly() {
        let dir = tempdir().unwrap();
        let keys = VecDeque::from([EditorKey::Interrupt]);
        let (app, _) = app(&dir, keys, &["--skip-token-check"]);

        app.run().await.unwrap();
        assert!(!dir.path().join("credentials.toml").exists());
    }

    #[tokio::test]
    async fn test_run_sends_chat_and_quits() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("credentials.toml"),
            "oauth = \"oauth:tok\"\nuser = \"viewer\"\nchannel = \"#chan\"\n",
        )
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                let done = line.starts_with("PRIVMSG #chan :hello");
                received.push(line);
                if done {
                    break;
                }
            }
            received
        });

        let (app, buf) = app(
            &dir,
            typed(&["hello", "   ", "/quit"]),
            &["--server", &addr, "--skip-token-check"],
        );
        app.run().await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(
            received,
            vec![
                "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership",
                "PASS oauth:tok",
                "NICK viewer",
                "JOIN #chan",
                "PRIVMSG #chan :hello",
            ]
        );

        let out = buf.contents();
        assert!(out.contains("Connected to #chan!"));
        assert!(out.contains("#chan viewer: hello"));
        assert!(out.contains("Shutting down..."));
    }
}
