//! Error and failure types for test setup, registration and runs.

use std::fmt;
use std::time::Duration;

use pdureplay_core::{ExchangeError, ScriptError, TransportError};

/// A peer could not be brought up. Fatal to one test instance, before any
/// step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// The factory produced no peer.
    Create(String),
    /// The peer refused to bind to its endpoint.
    Attach(String),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(msg) => write!(f, "peer construction failed: {msg}"),
            Self::Attach(msg) => write!(f, "peer attach failed: {msg}"),
        }
    }
}

impl std::error::Error for SetupError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    Duplicate(String),
    Script { name: String, error: ScriptError },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(name) => write!(f, "test case '{name}' is already registered"),
            Self::Script { name, error } => write!(f, "test case '{name}': {error}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Script { error, .. } => Some(error),
            Self::Duplicate(_) => None,
        }
    }
}

/// Why a test instance failed.
#[derive(Debug)]
pub enum TestFailure {
    Setup(SetupError),
    /// The exchange diverged from its script.
    Exchange(ExchangeError),
    /// A write to the engine's endpoint failed.
    Transport { step: usize, error: TransportError },
    /// No inbound PDU arrived within the per-step deadline.
    Timeout { step: usize, after: Duration },
    /// The run was cancelled from outside.
    Aborted { step: usize },
    /// The context went away without reporting.
    Lost,
}

impl TestFailure {
    /// Script step the failure is localized to, if any.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Exchange(err) => Some(err.step()),
            Self::Transport { step, .. } | Self::Timeout { step, .. } | Self::Aborted { step } => {
                Some(*step)
            }
            Self::Setup(_) | Self::Lost => None,
        }
    }
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(err) => write!(f, "setup failed: {err}"),
            Self::Exchange(err) => write!(f, "{err}"),
            Self::Transport { step, error } => write!(f, "step {step}: {error}"),
            Self::Timeout { step, after } => {
                write!(f, "step {step}: no PDU received within {after:?}")
            }
            Self::Aborted { step } => write!(f, "step {step}: aborted"),
            Self::Lost => write!(f, "context dropped without reporting"),
        }
    }
}

impl std::error::Error for TestFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Setup(err) => Some(err),
            Self::Exchange(err) => Some(err),
            Self::Transport { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<SetupError> for TestFailure {
    fn from(err: SetupError) -> Self {
        Self::Setup(err)
    }
}

impl From<ExchangeError> for TestFailure {
    fn from(err: ExchangeError) -> Self {
        Self::Exchange(err)
    }
}
