//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ManifestError: recipe manifest loading and saving (the ParseError family)
//! - UpstreamError: upstream release discovery
//! - VcsError: branch, commit and push operations
//! - RunnerError: build/test runner invocation
//! - ConfigError: CLI and settings file configuration

use std::path::PathBuf;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Manifest related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Upstream related errors
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Version control related errors
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors related to recipe manifest files
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file not found
    #[error("manifest file not found: {path}")]
    NotFound { path: PathBuf },

    /// Failed to read manifest file
    #[error("failed to read manifest file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write manifest file
    #[error("failed to write manifest file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing or schema error
    #[error("failed to parse YAML in {path}: {message}")]
    YamlParseError { path: PathBuf, message: String },

    /// Layout the text model cannot preserve
    #[error("unsupported layout in {path}: {message}")]
    UnsupportedLayout { path: PathBuf, message: String },

    /// A version references a recipe folder without a source file
    #[error("version '{version}' in {path} references missing file {missing}")]
    MissingSource {
        path: PathBuf,
        version: String,
        missing: PathBuf,
    },

    /// No upstream identity could be found for the recipe
    #[error("no upstream declared for recipe in {path}")]
    NoUpstream { path: PathBuf },
}

/// Errors related to upstream release discovery
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Network or lookup failure; may succeed on a later run
    #[error("upstream '{upstream}' unavailable: {message}")]
    Unavailable { upstream: String, message: String },

    /// No release matches the tracked line
    #[error("no upstream release of '{upstream}' matches line {line}")]
    NoCandidates { upstream: String, line: String },

    /// No source adapter understands this upstream
    #[error("unsupported upstream '{upstream}'")]
    Unsupported { upstream: String },

    /// The upstream project does not exist
    #[error("upstream '{upstream}' not found")]
    NotFound { upstream: String },
}

/// Errors related to version control operations
#[derive(Error, Debug)]
pub enum VcsError {
    /// The command could not be started
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited unsuccessfully
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Path outside the repository work tree
    #[error("path {path} is outside the repository")]
    OutsideRepository { path: PathBuf },

    /// Temporary index could not be prepared
    #[error("failed to prepare temporary index: {source}")]
    TempIndex {
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to running the build/test command
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The test command is empty
    #[error("test command is empty")]
    EmptyCommand,

    /// The command could not be started
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Recipe repository root does not exist or has no recipes directory
    #[error("recipe repository not found at {path}")]
    RepositoryNotFound { path: PathBuf },

    /// Settings file is unreadable or invalid
    #[error("invalid settings file {path}: {message}")]
    InvalidSettings { path: PathBuf, message: String },
}

impl ManifestError {
    /// Creates a new NotFound error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        ManifestError::NotFound { path: path.into() }
    }

    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new WriteError
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::WriteError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new YamlParseError
    pub fn yaml_parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ManifestError::YamlParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new UnsupportedLayout error
    pub fn unsupported_layout(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ManifestError::UnsupportedLayout {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error leaves the manifest unusable (as opposed to a write failure)
    pub fn is_parse_error(&self) -> bool {
        !matches!(self, ManifestError::WriteError { .. })
    }
}

impl UpstreamError {
    /// Creates a new Unavailable error
    pub fn unavailable(upstream: impl Into<String>, message: impl Into<String>) -> Self {
        UpstreamError::Unavailable {
            upstream: upstream.into(),
            message: message.into(),
        }
    }

    /// Creates a new NoCandidates error
    pub fn no_candidates(upstream: impl Into<String>, line: impl Into<String>) -> Self {
        UpstreamError::NoCandidates {
            upstream: upstream.into(),
            line: line.into(),
        }
    }

    /// Creates a new Unsupported error
    pub fn unsupported(upstream: impl Into<String>) -> Self {
        UpstreamError::Unsupported {
            upstream: upstream.into(),
        }
    }

    /// Creates a new NotFound error
    pub fn not_found(upstream: impl Into<String>) -> Self {
        UpstreamError::NotFound {
            upstream: upstream.into(),
        }
    }

    /// Returns true if a later run may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Unavailable { .. })
    }
}

impl VcsError {
    /// Creates a new CommandFailed error
    pub fn command_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        VcsError::CommandFailed {
            command: command.into(),
            stderr: stderr.into(),
        }
    }
}
