//! # Configuration
//!
//! [`SystemConfig`] holds the runtime-wide defaults; [`ActorOptions`] are the
//! per-actor settings derived from it and overridable at spawn.
//!
//! ## Sources
//!
//! | Source | How |
//! |--------|-----|
//! | Code | `SystemConfig::default().with_shutdown_timeout(..)` |
//! | Serialized (any serde format) | durations are given in milliseconds |
//! | Environment | [`SystemConfig::from_env`] |
//!
//! ```rust
//! use actor_runtime::{SystemConfig, TaskBackend};
//! use std::time::Duration;
//!
//! let config = SystemConfig::default()
//!     .with_shutdown_timeout(Duration::from_secs(2))
//!     .with_task_backend(TaskBackend::Threaded);
//! assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
//! ```

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How the tasks of an actor are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskBackend {
    /// Tasks are lightweight futures sharing the actor's thread.
    #[default]
    Fiber,
    /// Each task body runs on its own OS thread; for code that blocks.
    Threaded,
}

impl FromStr for TaskBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fiber" => Ok(TaskBackend::Fiber),
            "threaded" => Ok(TaskBackend::Threaded),
            other => Err(format!("unknown task backend `{other}`")),
        }
    }
}

impl fmt::Display for TaskBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBackend::Fiber => f.write_str("fiber"),
            TaskBackend::Threaded => f.write_str("threaded"),
        }
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

fn optional_millis<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
}

/// Runtime-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// How long [`ActorSystem::shutdown`](crate::ActorSystem::shutdown) waits
    /// before killing the remaining actors.
    #[serde(rename = "shutdown_timeout_ms", deserialize_with = "millis")]
    pub shutdown_timeout: Duration,
    /// `None` means unbounded.
    pub default_mailbox_capacity: Option<usize>,
    pub default_task_backend: TaskBackend,
    /// Timeout applied to synchronous calls that do not pass one explicitly.
    #[serde(rename = "default_call_timeout_ms", deserialize_with = "optional_millis")]
    pub default_call_timeout: Option<Duration>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            default_mailbox_capacity: None,
            default_task_backend: TaskBackend::Fiber,
            default_call_timeout: None,
        }
    }
}

impl SystemConfig {
    /// Reads `ACTOR_SHUTDOWN_TIMEOUT_MS`, `ACTOR_MAILBOX_CAPACITY`,
    /// `ACTOR_TASK_BACKEND` and `ACTOR_CALL_TIMEOUT_MS`. Unset variables keep
    /// their defaults; malformed ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(ms) = parse_var::<u64, _>(&lookup, "ACTOR_SHUTDOWN_TIMEOUT_MS") {
            config.shutdown_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = parse_var::<usize, _>(&lookup, "ACTOR_MAILBOX_CAPACITY") {
            config.default_mailbox_capacity = Some(capacity);
        }
        if let Some(backend) = parse_var::<TaskBackend, _>(&lookup, "ACTOR_TASK_BACKEND") {
            config.default_task_backend = backend;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "ACTOR_CALL_TIMEOUT_MS") {
            config.default_call_timeout = Some(Duration::from_millis(ms));
        }
        config
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.default_mailbox_capacity = Some(capacity);
        self
    }

    pub fn with_task_backend(mut self, backend: TaskBackend) -> Self {
        self.default_task_backend = backend;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.default_call_timeout = Some(timeout);
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring malformed setting");
            None
        }
    }
}

/// Per-actor settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActorOptions {
    pub mailbox_capacity: Option<usize>,
    pub task_backend: TaskBackend,
    /// Every task of the actor runs in exclusive mode.
    pub exclusive: bool,
    pub call_timeout: Option<Duration>,
}

impl ActorOptions {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            mailbox_capacity: config.default_mailbox_capacity,
            task_backend: config.default_task_backend,
            exclusive: false,
            call_timeout: config.default_call_timeout,
        }
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn threaded(mut self) -> Self {
        self.task_backend = TaskBackend::Threaded;
        self
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}
