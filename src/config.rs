/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::config
  ------------------------------------------------------------
  Purpose:
    Load and validate mirror configuration from TOML, with
    defaults matching the public NuGet gallery.

  Security / Safety Notes:
    Configuration holds paths and URLs only; no secrets.

  Dependencies:
    serde + toml for parsing, dirs for platform locations.

  Operational Scope:
    Read once at startup; CLI flags override selected keys.

  Revision History:
    2026-10-16 NMR  Authored mirror configuration layer.
  ------------------------------------------------------------
  Principles Observed:
    - Every key optional with a documented default
    - Invalid values rejected before any network traffic
============================================================*/

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MirrorError, Result};

const APP_DIR: &str = "nuget-mirror";
const MIB: u64 = 1024 * 1024;

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    pub mirror: MirrorSection,
    pub throttle: ThrottleConfig,
    pub registry: RegistryConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
}

/// What to search for and how candidates are filtered.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorSection {
    pub output_dir: Option<PathBuf>,
    pub terms: Vec<String>,
    pub max_results: usize,
    pub min_downloads: u64,
    pub batch_size: usize,
    pub max_versions: usize,
    pub include_prerelease: bool,
    pub exclude: Vec<String>,
    pub exclude_case_sensitive: bool,
    pub artifact_extension: String,
}

impl Default for MirrorSection {
    fn default() -> Self {
        Self {
            output_dir: None,
            terms: vec!["microsoft".to_string()],
            max_results: 1000,
            min_downloads: 100_000,
            batch_size: 200,
            max_versions: 10,
            include_prerelease: true,
            exclude: Vec::new(),
            exclude_case_sensitive: true,
            artifact_extension: "nupkg".to_string(),
        }
    }
}

/// Per-package oversize throttle settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThrottleConfig {
    pub oversize_threshold_bytes: u64,
    pub oversize_cap: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            oversize_threshold_bytes: 20 * MIB,
            oversize_cap: 3,
        }
    }
}

/// Registry endpoints and HTTP behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub service_index: String,
    pub search_url: Option<String>,
    pub package_base_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub max_retries: usize,
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            service_index: "https://api.nuget.org/v3/index.json".to_string(),
            search_url: None,
            package_base_url: None,
            timeout: 300,
            max_retries: 3,
            user_agent: format!("nuget-mirror/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Local cleanup pass settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupConfig {
    pub oversize_threshold_bytes: u64,
    pub keep_largest: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            oversize_threshold_bytes: 20 * MIB,
            keep_largest: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

impl MirrorConfig {
    /// Load from an explicit path, else the default location when present,
    /// else built-in defaults. An explicit path must exist.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(explicit) => Self::load_from_path(explicit)?,
            None => match default_config_path() {
                Some(candidate) if candidate.is_file() => Self::load_from_path(&candidate)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            MirrorError::Config(format!(
                "Failed to read configuration {}: {err}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&raw).map_err(|err| match err {
            MirrorError::Config(msg) => {
                MirrorError::Config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|err| MirrorError::Config(format!("Invalid configuration: {err}")))
    }

    /// Reject values that would make the pipeline loop or do nothing.
    pub fn validate(&self) -> Result<()> {
        let mirror = &self.mirror;
        if mirror.batch_size == 0 {
            return Err(MirrorError::Config("mirror.batch_size must be > 0".into()));
        }
        if mirror.max_versions == 0 {
            return Err(MirrorError::Config("mirror.max_versions must be > 0".into()));
        }
        if mirror.terms.iter().all(|term| term.trim().is_empty()) {
            return Err(MirrorError::Config(
                "mirror.terms must contain at least one search term".into(),
            ));
        }
        if mirror.exclude.iter().any(|entry| entry.is_empty()) {
            return Err(MirrorError::Config(
                "mirror.exclude entries must not be empty".into(),
            ));
        }
        if mirror.artifact_extension.trim_start_matches('.').is_empty() {
            return Err(MirrorError::Config(
                "mirror.artifact_extension must not be empty".into(),
            ));
        }
        if self.registry.max_retries == 0 {
            return Err(MirrorError::Config("registry.max_retries must be > 0".into()));
        }
        Ok(())
    }

    /// Root folder receiving one subfolder per mirrored package.
    pub fn output_dir(&self) -> PathBuf {
        self.mirror.output_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("packages")
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logging.log_dir.clone().unwrap_or_else(|| {
            dirs::state_dir()
                .or_else(dirs::data_local_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("logs")
        })
    }

    /// Search terms with blanks dropped and surrounding whitespace trimmed.
    pub fn terms(&self) -> Vec<String> {
        self.mirror
            .terms
            .iter()
            .map(|term| term.trim())
            .filter(|term| !term.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn artifact_extension(&self) -> &str {
        self.mirror.artifact_extension.trim_start_matches('.')
    }
}

/// `$XDG_CONFIG_HOME/nuget-mirror/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}
