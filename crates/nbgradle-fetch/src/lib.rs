//! IDE side of the model fetch protocol.
//!
//! [`ModelFetcher::fetch`] writes a [`Request`] to a transfer file, renders the
//! bootstrap script that points the build at that file and at the artifacts
//! holding the requested builders, launches the build through a
//! [`ModelProcess`], and returns the [`Response`]. Both temporary files are
//! removed on every exit path.
//!
//! ```no_run
//! use nbgradle_fetch::{FetcherConfig, LaunchParameters, ModelFetcher};
//! use nbgradle_remote::Request;
//! use nbgradle_transfer::CodeLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = ModelFetcher::new(FetcherConfig::default(), CodeLoader::system());
//! let request = Request::new();
//! let response = fetcher.fetch(&request, &|params: &mut LaunchParameters| {
//!     params.working_dir = Some("/path/to/project".into());
//! })?;
//! for issue in response.issues() {
//!     eprintln!("{issue}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;

mod config;
mod fetcher;
mod operation;
mod process;
mod transfer_file;

pub use config::{ConfigError, FetcherConfig};
pub use fetcher::ModelFetcher;
pub use operation::{LaunchParameters, OperationInitializer};
pub use process::{GradleProcess, ModelProcess, ProcessInvocation};

pub use nbgradle_process::{CancellationToken, OutputSink, ProgressEvent, ProgressListener};
pub use nbgradle_remote::{Request, Response};

use nbgradle_process::RunCommandError;
use nbgradle_remote::RemoteError;
use nbgradle_transfer::TransferError;
use std::path::{Path, PathBuf};

/// Transport failure of a fetch. Builder failures are not errors; they are
/// attached to the [`Response`] as issues.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no working directory was supplied for the model fetch")]
    MissingWorkingDirectory,

    #[error("failed to locate the runtime artifact: {0}")]
    RuntimeArtifact(#[source] std::io::Error),

    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path is not valid UTF-8: {}", .path.display())]
    NonUtf8Path { path: PathBuf },

    #[error(
        "build output exceeded {max_bytes} bytes before the response was complete; \
         raise `max_output_bytes`"
    )]
    OutputTruncated { max_bytes: usize },

    #[error("failed to encode the request: {0}")]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Process(#[from] RunCommandError),

    #[error("failed to read the response: {0}")]
    Remote(#[from] RemoteError),
}

/// `path` as UTF-8 text, for places that hand it to the build tool verbatim.
pub(crate) fn utf8_path(path: &Path) -> Result<&str, FetchError> {
    path.to_str().ok_or_else(|| FetchError::NonUtf8Path {
        path: path.to_path_buf(),
    })
}
