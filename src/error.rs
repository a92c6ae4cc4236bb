/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::error
  ------------------------------------------------------------
  Purpose:
    Centralise mirror error types to provide consistent
    diagnostics and exit semantics.

  Security / Safety Notes:
    Error contexts carry URLs and local paths only; no
    credentials are ever part of a request.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for fatal setup errors.

  Revision History:
    2026-10-16 NMR  Established shared error definitions.
  ------------------------------------------------------------
  Principles Observed:
    - Explicit error taxonomy with actionable context
    - Per-item failures are logged, never fatal
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

use crate::version::VersionError;

/// Result alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Enumerates high-level error domains surfaced by the mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl MirrorError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            MirrorError::Config(_) => ExitCode::from(20),
            MirrorError::Network(_) => ExitCode::from(30),
            MirrorError::Serialization(_) => ExitCode::from(31),
            MirrorError::Filesystem(_) => ExitCode::from(40),
            MirrorError::Io(_) => ExitCode::from(41),
            MirrorError::Version(_) => ExitCode::from(45),
        }
    }
}
