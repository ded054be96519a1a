//! Persisted credentials and display settings

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use chatview_utils::{credentials_file, paths, settings_file, ChatviewError, Result};

/// Channel color used until the user picks one
pub const DEFAULT_CHANNEL_COLOR: &str = "#800000";

/// Login details, stored in `credentials.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Token including its `oauth:` prefix
    pub oauth: Option<String>,
    pub user: Option<String>,
    /// Channel including its leading `#`
    pub channel: Option<String>,
}

/// Rendering of one badge name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeStyle {
    pub text: String,
    pub color: String,
    #[serde(default = "default_true")]
    pub background: bool,
}

impl BadgeStyle {
    pub fn new(text: &str, color: &str) -> Self {
        Self {
            text: text.to_string(),
            color: color.to_string(),
            background: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// What a highlight key is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    /// Sender display name
    User,
    /// Any of the sender's badge names
    Badge,
}

impl FromStr for HighlightKind {
    type Err = ChatviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "badge" => Ok(Self::Badge),
            other => Err(ChatviewError::config(format!("Invalid type: {}", other))),
        }
    }
}

impl fmt::Display for HighlightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Badge => f.write_str("badge"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(rename = "type")]
    pub kind: HighlightKind,
    pub color: String,
}

/// Display preferences, stored in `settings.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub channel_color: String,
    pub badges: BTreeMap<String, BadgeStyle>,
    pub highlights: BTreeMap<String, Highlight>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            channel_color: DEFAULT_CHANNEL_COLOR.to_string(),
            badges: default_badges(),
            highlights: BTreeMap::new(),
        }
    }
}

impl UserSettings {
    /// Fill in the badge table and channel color if they were left empty
    ///
    /// Returns whether anything changed and the file should be saved.
    pub fn seed_defaults(&mut self) -> bool {
        let mut changed = false;
        if self.badges.is_empty() {
            self.badges = default_badges();
            changed = true;
        }
        if self.channel_color.is_empty() {
            self.channel_color = DEFAULT_CHANNEL_COLOR.to_string();
            changed = true;
        }
        changed
    }
}

/// Badge markers shipped with the client
pub fn default_badges() -> BTreeMap<String, BadgeStyle> {
    [
        ("moderator", "MD", "#005f00"),
        ("vip", "VP", "#af00af"),
        ("broadcaster", "BC", "#870000"),
        ("subscriber", "SB", "#af00af"),
        ("turbo", "TB", "#5f00af"),
        ("staff", "SF", "#875f5f"),
        ("partner", "PR", "#5f00ff"),
    ]
    .into_iter()
    .map(|(name, text, color)| (name.to_string(), BadgeStyle::new(text, color)))
    .collect()
}

/// Highlight table restored by `/highlights default`
pub fn default_highlights() -> BTreeMap<String, Highlight> {
    BTreeMap::from([(
        "partner".to_string(),
        Highlight {
            kind: HighlightKind::Badge,
            color: "#3b073b".to_string(),
        },
    )])
}

/// A TOML document bound to the file it was loaded from
#[derive(Debug, Clone)]
pub struct ConfigFile<T> {
    path: PathBuf,
    value: T,
}

impl<T> ConfigFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Load from `path`, falling back to defaults
    ///
    /// A missing file is expected on first run. A file that cannot be read
    /// or parsed is logged and replaced by defaults on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let value = if path.exists() {
            match Self::read(&path) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Using default configuration: {}", e);
                    T::default()
                }
            }
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            T::default()
        };
        Self { path, value }
    }

    /// Read and parse `path`
    pub fn read(path: &Path) -> Result<T> {
        let content = std::fs::read_to_string(path).map_err(|e| ChatviewError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parse a TOML document
    pub fn parse(content: &str, path: &Path) -> Result<T> {
        toml::from_str(content).map_err(|e| ChatviewError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Write the current value back, creating the directory if needed
    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(&self.value)
            .map_err(|e| ChatviewError::config(format!("Failed to serialize configuration: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            paths::ensure_dir(parent).map_err(|e| ChatviewError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, content).map_err(|e| ChatviewError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;

        tracing::debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}

impl ConfigFile<Credentials> {
    /// Credentials from the default location
    pub fn credentials() -> Self {
        Self::load(credentials_file())
    }
}

impl ConfigFile<UserSettings> {
    /// Settings from the default location, seeding defaults on first run
    pub fn settings() -> Self {
        let mut file = Self::load(settings_file());
        if file.get_mut().seed_defaults() {
            if let Err(e) = file.save() {
                tracing::warn!("Failed to save default settings: {}", e);
            }
        }
        file
    }
}
