//! Crate-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while the
//! CLI and `main` use `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: top-level error, the only type that unwinds out of a run
//! - Component errors ([`ModuleError`], [`TransportError`], [`ConversionError`],
//!   [`TagError`], [`NamingError`]) for detailed handling at the track boundary
//!
//! Fatal errors (configuration, invalid module, unsupported capability) abort
//! a run. Everything else is absorbed per track by the orchestrator.
//!
//! [`ModuleError`]: crate::module::ModuleError
//! [`TransportError`]: crate::transport::TransportError
//! [`ConversionError`]: crate::convert::ConversionError
//! [`TagError`]: crate::tagging::TagError
//! [`NamingError`]: crate::naming::NamingError

use crate::module::ModuleModes;

/// Crate-wide result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad settings or templates
    #[error("Configuration error: {0}")]
    Config(String),

    /// A module name that isn't registered
    #[error("Invalid module: {0}")]
    InvalidModule(String),

    /// A capability was requested from a module that doesn't declare it
    #[error("Module {module} does not support {mode:?}")]
    UnsupportedCapability { module: String, mode: ModuleModes },

    /// Source module call failed
    #[error("Module error: {0}")]
    Module(#[from] crate::module::ModuleError),

    /// Network transfer failed
    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// Transcoding failed
    #[error("Conversion error: {0}")]
    Conversion(#[from] crate::convert::ConversionError),

    /// Tag writing failed without a usable fallback
    #[error("Tagging error: {0}")]
    Tagging(#[from] crate::tagging::TagError),

    /// Template or path problem
    #[error("Naming error: {0}")]
    Naming(#[from] crate::naming::NamingError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid module error.
    pub fn invalid_module(name: impl Into<String>) -> Self {
        Self::InvalidModule(name.into())
    }

    /// Create an unsupported capability error.
    pub fn unsupported(module: impl Into<String>, mode: ModuleModes) -> Self {
        Self::UnsupportedCapability {
            module: module.into(),
            mode,
        }
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error must abort the whole run rather than a single track.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) | Self::InvalidModule(_) | Self::UnsupportedCapability { .. } => true,
            Self::Naming(e) => e.is_template_error(),
            Self::Transport(e) => e.is_interrupted(),
            Self::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}
