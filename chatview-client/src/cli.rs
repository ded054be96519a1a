//! Command-line argument parsing for the chatview client
//!
//! Uses clap for argument parsing with derive macros.

use std::time::Duration;

use clap::Parser;

use crate::connection::{ConnectionSettings, RetryPolicy, DEFAULT_ADDR};

/// chatview - terminal chat viewer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Chat server address (host:port)
    #[arg(long, env = "CHATVIEW_ADDR", default_value = DEFAULT_ADDR)]
    pub server: String,

    /// Channel to join, overriding the saved one
    #[arg(long, short = 'c')]
    pub channel: Option<String>,

    /// Login name, overriding the saved one
    #[arg(long, short = 'u')]
    pub user: Option<String>,

    /// TCP connect timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub connect_timeout: u64,

    /// Pause between reconnect attempts in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub retry_delay: u64,

    /// Give up after this many consecutive failures
    ///
    /// Reconnects are attempted forever when omitted.
    #[arg(long)]
    pub max_reconnects: Option<u32>,

    /// Do not validate the saved token before connecting
    #[arg(long, default_value_t = false)]
    pub skip_token_check: bool,

    /// Start with raw display mode enabled
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            addr: self.server.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout),
            retry: RetryPolicy {
                delay: Duration::from_millis(self.retry_delay),
                max_attempts: self.max_reconnects,
            },
            ..ConnectionSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["chatview"]);
        assert!(args.channel.is_none());
        assert!(args.user.is_none());
        assert_eq!(args.connect_timeout, 2000);
        assert_eq!(args.retry_delay, 1000);
        assert!(args.max_reconnects.is_none());
        assert!(!args.skip_token_check);
        assert!(!args.raw);
    }

    #[test]
    fn test_default_settings() {
        let args = Args::parse_from(["chatview", "--server", "irc.chat.twitch.tv:6667"]);
        let settings = args.connection_settings();
        assert_eq!(settings.addr, DEFAULT_ADDR);
        assert_eq!(settings.connect_timeout, Duration::from_secs(2));
        assert_eq!(settings.retry, RetryPolicy::default());
    }

    #[test]
    fn test_server_flag() {
        let args = Args::parse_from(["chatview", "--server", "127.0.0.1:6667"]);
        assert_eq!(args.server, "127.0.0.1:6667");
        assert_eq!(args.connection_settings().addr, "127.0.0.1:6667");
    }

    #[test]
    fn test_channel_and_user() {
        let args = Args::parse_from(["chatview", "-c", "somechannel", "--user", "viewer"]);
        assert_eq!(args.channel.as_deref(), Some("somechannel"));
        assert_eq!(args.user.as_deref(), Some("viewer"));
    }

    #[test]
    fn test_retry_flags() {
        let args = Args::parse_from([
            "chatview",
            "--retry-delay",
            "250",
            "--max-reconnects",
            "5",
            "--connect-timeout",
            "100",
        ]);
        let settings = args.connection_settings();
        assert_eq!(settings.retry.delay, Duration::from_millis(250));
        assert_eq!(settings.retry.max_attempts, Some(5));
        assert_eq!(settings.connect_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_switches() {
        let args = Args::parse_from(["chatview", "--skip-token-check", "--raw"]);
        assert!(args.skip_token_check);
        assert!(args.raw);
    }
}
