//! Error types for terrawalk

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("provider {provider} is not available: {message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error("failed to load schema for provider {provider}: {message}")]
    SchemaFetch { provider: String, message: String },

    #[error("provider {provider} does not support resource type {type_name}")]
    UnsupportedResourceType { provider: String, type_name: String },

    #[error("missing resolved provider for {addr}")]
    MissingProvider { addr: String },

    #[error("failed to read planned change for {addr}: {message}")]
    DiffRead { addr: String, message: String },

    #[error("failed to read state for {addr}: {message}")]
    StateRead { addr: String, message: String },

    #[error("failed to write state for {addr}: {message}")]
    StateWrite { addr: String, message: String },

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("execution halted by hook")]
    HookHalted,

    #[error("apply failed for {addr}: {message}")]
    Apply { addr: String, message: String },

    #[error("walk cancelled before {addr} completed")]
    Cancelled { addr: String },

    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("dependency cycle involving {0}")]
    Cycle(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn provider_unavailable(provider: impl ToString, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn schema_fetch(provider: impl ToString, message: impl Into<String>) -> Self {
        Self::SchemaFetch {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn diff_read(addr: impl ToString, message: impl Into<String>) -> Self {
        Self::DiffRead {
            addr: addr.to_string(),
            message: message.into(),
        }
    }

    pub fn state_read(addr: impl ToString, message: impl Into<String>) -> Self {
        Self::StateRead {
            addr: addr.to_string(),
            message: message.into(),
        }
    }

    pub fn state_write(addr: impl ToString, message: impl Into<String>) -> Self {
        Self::StateWrite {
            addr: addr.to_string(),
            message: message.into(),
        }
    }

    pub fn apply(addr: impl ToString, message: impl Into<String>) -> Self {
        Self::Apply {
            addr: addr.to_string(),
            message: message.into(),
        }
    }

    pub fn cancelled(addr: impl ToString) -> Self {
        Self::Cancelled {
            addr: addr.to_string(),
        }
    }

    pub fn invalid_address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// The resource instance address this error is about, if it carries one.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::MissingProvider { addr }
            | Self::DiffRead { addr, .. }
            | Self::StateRead { addr, .. }
            | Self::StateWrite { addr, .. }
            | Self::Apply { addr, .. }
            | Self::Cancelled { addr } => Some(addr),
            _ => None,
        }
    }
}
