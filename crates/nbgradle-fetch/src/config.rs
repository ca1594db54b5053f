use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fetcher config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Settings of the model fetcher.
///
/// ```toml
/// gradle_path = "/opt/gradle/bin/gradle"
/// prefer_wrapper = true
/// temp_dir = "/var/tmp/nbgradle"
/// max_output_bytes = 67108864
/// runtime_artifact = "/opt/ide/lib/nbgradle-remote.jar"
/// fetch_task = "nbgradleFetchModels"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetcherConfig {
    /// `gradle` executable used when the project has no wrapper and no
    /// install override was supplied.
    #[serde(default = "FetcherConfig::default_gradle_path")]
    pub gradle_path: PathBuf,

    /// Prefer the project's `gradlew` wrapper when present.
    #[serde(default = "FetcherConfig::default_prefer_wrapper")]
    pub prefer_wrapper: bool,

    /// Directory for the transfer file and the bootstrap script. Defaults to
    /// the system temp directory.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Build output kept in memory per stream.
    #[serde(default = "FetcherConfig::default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Artifact holding the remote entry point. Defaults to the running
    /// executable.
    #[serde(default)]
    pub runtime_artifact: Option<PathBuf>,

    /// Task registered by the bootstrap script that runs the fetch.
    #[serde(default = "FetcherConfig::default_fetch_task")]
    pub fetch_task: String,
}

impl FetcherConfig {
    fn default_gradle_path() -> PathBuf {
        PathBuf::from("gradle")
    }

    fn default_prefer_wrapper() -> bool {
        true
    }

    fn default_max_output_bytes() -> usize {
        64 * 1024 * 1024
    }

    fn default_fetch_task() -> String {
        "nbgradleFetchModels".to_string()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn runtime_artifact(&self) -> std::io::Result<PathBuf> {
        match &self.runtime_artifact {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            gradle_path: Self::default_gradle_path(),
            prefer_wrapper: Self::default_prefer_wrapper(),
            temp_dir: None,
            max_output_bytes: Self::default_max_output_bytes(),
            runtime_artifact: None,
            fetch_task: Self::default_fetch_task(),
        }
    }
}
