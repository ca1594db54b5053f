use crate::issue::IssueScope;
use crate::request::Request;
use crate::response::ProjectModels;
use crate::runner::run_handles;
use crate::RemoteError;
use nbgradle_model::EvaluatedProject;
use nbgradle_transfer::CodeLoader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Capability name under which the entry point answers model queries.
pub const RESPONSE_MODEL_NAME: &str = "nbgradle.ProjectModels";

/// A named, queryable model capability inside the build process.
pub trait ToolingModelProvider: Send + Sync {
    fn can_provide(&self, model_name: &str) -> bool;

    /// Computes the model `model_name` for `project`.
    ///
    /// Returns `Ok(None)` when this provider does not know `model_name`.
    fn provide(
        &self,
        model_name: &str,
        project: &EvaluatedProject,
    ) -> Result<Option<Vec<u8>>, RemoteError>;
}

enum RequestSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// Runs the project-level builders of a transferred [`Request`].
///
/// The request is decoded on first use and shared by every later query.
pub struct ModelEntryPoint {
    source: RequestSource,
    loader: Arc<CodeLoader>,
    request: OnceLock<Arc<Request>>,
}

impl ModelEntryPoint {
    /// Reads the request from the transfer file written by the IDE. The file
    /// is read lazily, on the first query.
    pub fn from_transfer_file(path: impl Into<PathBuf>, loader: Arc<CodeLoader>) -> Self {
        Self {
            source: RequestSource::File(path.into()),
            loader,
            request: OnceLock::new(),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, loader: Arc<CodeLoader>) -> Self {
        Self {
            source: RequestSource::Bytes(bytes),
            loader,
            request: OnceLock::new(),
        }
    }

    pub fn loader(&self) -> &Arc<CodeLoader> {
        &self.loader
    }

    pub fn request(&self) -> Result<Arc<Request>, RemoteError> {
        if let Some(request) = self.request.get() {
            return Ok(Arc::clone(request));
        }
        let request = Arc::new(self.read_request()?);
        Ok(Arc::clone(self.request.get_or_init(|| request)))
    }

    fn read_request(&self) -> Result<Request, RemoteError> {
        let request = match &self.source {
            RequestSource::File(path) => {
                let bytes = read_transfer_file(path)?;
                Request::decode(&bytes, &self.loader)?
            }
            RequestSource::Bytes(bytes) => Request::decode(bytes, &self.loader)?,
        };
        tracing::debug!(
            target = "nbgradle.remote",
            loader = %self.loader.name(),
            build_builders = request.build_builders().count(),
            project_builders = request.project_builders().count(),
            "decoded model request"
        );
        Ok(request)
    }

    /// Runs every project-level builder against `project`.
    pub fn project_models(&self, project: &EvaluatedProject) -> Result<ProjectModels, RemoteError> {
        let request = self.request()?;
        let scope = IssueScope::Project(project.path().to_string());
        let collected = run_handles(request.project_builders(), &scope, |builder| {
            builder.build(project)
        });
        tracing::debug!(
            target = "nbgradle.remote",
            project = %project.path(),
            results = collected.results.len(),
            issues = collected.issues.len(),
            "ran project-level model builders"
        );
        Ok(ProjectModels {
            project_path: project.path().to_string(),
            results: collected.results,
            issues: collected.issues,
        })
    }
}

impl ToolingModelProvider for ModelEntryPoint {
    fn can_provide(&self, model_name: &str) -> bool {
        model_name == RESPONSE_MODEL_NAME
    }

    fn provide(
        &self,
        model_name: &str,
        project: &EvaluatedProject,
    ) -> Result<Option<Vec<u8>>, RemoteError> {
        if !self.can_provide(model_name) {
            return Ok(None);
        }
        Ok(Some(self.project_models(project)?.encode()?))
    }
}

fn read_transfer_file(path: &Path) -> Result<Vec<u8>, RemoteError> {
    std::fs::read(path).map_err(|source| RemoteError::ReadTransferFile {
        path: path.to_path_buf(),
        source,
    })
}
