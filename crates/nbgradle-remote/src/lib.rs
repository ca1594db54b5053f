//! The build-process side of the model fetch protocol.
//!
//! The IDE writes a [`Request`] to a transfer file and launches the build
//! tool. Inside that process a [`ModelEntryPoint`] is registered as a
//! [`ToolingModelProvider`] and the [`ModelFetchAction`] drives the whole
//! build: build-level handles run once, project-level handles run once per
//! project through the provider, and everything is packaged as a
//! [`Response`]. The response travels back on stdout inside a marker
//! delimited frame (see [`write_response_frame`]).

mod action;
mod entry_point;
mod frame;
mod issue;
mod request;
mod response;
mod runner;

pub use action::{run_remote_fetch, ModelFetchAction, ToolingModelRegistry};
pub use entry_point::{ModelEntryPoint, ToolingModelProvider, RESPONSE_MODEL_NAME};
pub use frame::{
    extract_response_frame, write_response_frame, RESPONSE_FRAME_BEGIN, RESPONSE_FRAME_END,
};
pub use issue::{IssueKind, IssueScope, ModelIssue, TransferredError};
pub use request::{Request, RequestError, RequestRecord, RequestScope};
pub use response::{ProjectModels, Response};

use nbgradle_model::ModelError;
use nbgradle_transfer::TransferError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to read transfer file {path}: {source}")]
    ReadTransferFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("invalid project topology: {0}")]
    Topology(#[from] ModelError),

    #[error("no tooling model provider can provide `{0}`")]
    NoProvider(String),

    #[error("response frame `NBGRADLE_MODELS_BEGIN` not found in build output")]
    MissingFrame,

    #[error("response frame is not valid base64: {0}")]
    FrameEncoding(#[from] base64::DecodeError),

    #[error("failed to write response frame: {0}")]
    Io(#[from] std::io::Error),
}
