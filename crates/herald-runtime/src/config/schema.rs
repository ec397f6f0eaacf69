//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use herald_core::{BoxedThrottler, ChannelTypes, Permissions, ThrottleScope};
use herald_framework::{LibraryDefaults, PrefixMatcher};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeraldConfig {
    /// How messages are recognised as invocations.
    #[serde(default)]
    pub bot: BotConfig,

    /// Execution pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Values used where no command, module or source sets one.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Bot
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Command prefixes, tried in order. The first match wins.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Whether a leading mention of the bot counts as a prefix.
    #[serde(default = "default_true")]
    pub mention_prefix: bool,

    /// Whether messages written by other bot accounts are ignored.
    #[serde(default = "default_true")]
    pub ignore_bots: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            mention_prefix: true,
            ignore_bots: true,
        }
    }
}

impl BotConfig {
    pub fn prefix_matcher(&self) -> PrefixMatcher {
        PrefixMatcher::new(self.prefixes.iter().cloned()).mention(self.mention_prefix)
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["!".to_string()]
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How often the typing indicator is refreshed while a command runs,
    /// in milliseconds. `0` disables the indicator.
    #[serde(default = "default_typing_interval_ms")]
    pub typing_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            typing_interval_ms: default_typing_interval_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn typing_interval(&self) -> Option<Duration> {
        (self.typing_interval_ms > 0).then(|| Duration::from_millis(self.typing_interval_ms))
    }
}

fn default_typing_interval_ms() -> u64 {
    6000
}

// =============================================================================
// Library defaults
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub hidden: bool,

    /// Channel kinds commands may run in, e.g. `["guild", "direct"]`.
    #[serde(default = "default_channel_types")]
    pub channel_types: ChannelTypes,

    /// Permissions the bot needs in the invoking channel.
    #[serde(default = "default_bot_permissions")]
    pub bot_permissions: Permissions,

    /// A throttler shared by every command that does not set its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<ThrottleConfig>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            hidden: false,
            channel_types: default_channel_types(),
            bot_permissions: default_bot_permissions(),
            throttle: None,
        }
    }
}

impl DefaultsConfig {
    /// Builds the library defaults. Each call creates a fresh throttler.
    pub fn to_library_defaults(&self) -> LibraryDefaults {
        LibraryDefaults {
            hidden: self.hidden,
            channel_types: self.channel_types,
            bot_permissions: self.bot_permissions,
            throttler: self.throttle.as_ref().map(ThrottleConfig::build),
            ..Default::default()
        }
    }
}

fn default_channel_types() -> ChannelTypes {
    ChannelTypes::ALL
}

fn default_bot_permissions() -> Permissions {
    Permissions::SEND_MESSAGES
}

/// A time-window throttler, e.g. `{ scope = "user", max = 2, window_ms = 30000 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default)]
    pub scope: ThrottleScope,

    /// Invocations admitted per window.
    pub max: u32,

    pub window_ms: u64,
}

impl ThrottleConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn build(&self) -> BoxedThrottler {
        self.scope.build(self.max, self.window())
    }
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[cfg(feature = "json-log")]
    Json,
    #[default]
    Compact,
    Full,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When a log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line number.
    #[serde(default)]
    pub file_location: bool,

    /// Required when `output` is `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-target levels, e.g. `herald_framework = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            filters: BTreeMap::new(),
        }
    }
}
