use crate::entry_point::{ModelEntryPoint, ToolingModelProvider, RESPONSE_MODEL_NAME};
use crate::issue::IssueScope;
use crate::response::{ProjectModels, Response};
use crate::runner::run_handles;
use crate::RemoteError;
use nbgradle_model::EvaluatedBuild;
use nbgradle_transfer::CodeLoader;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Capability providers registered in the build process, queried by name.
#[derive(Default)]
pub struct ToolingModelRegistry {
    providers: Vec<Arc<dyn ToolingModelProvider>>,
}

impl ToolingModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn ToolingModelProvider>) {
        self.providers.push(provider);
    }

    /// The first registered provider that can provide `model_name`.
    pub fn find(&self, model_name: &str) -> Option<&Arc<dyn ToolingModelProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.can_provide(model_name))
    }
}

impl std::fmt::Debug for ToolingModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolingModelRegistry")
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// Drives one fetch over a whole build.
///
/// Build-level builders run once against the build; project-level results
/// are obtained per project by querying the registry for
/// [`RESPONSE_MODEL_NAME`], the same way any other tooling model is fetched.
pub struct ModelFetchAction {
    entry_point: Arc<ModelEntryPoint>,
}

impl ModelFetchAction {
    pub fn new(entry_point: Arc<ModelEntryPoint>) -> Self {
        Self { entry_point }
    }

    pub fn run(
        &self,
        build: &EvaluatedBuild,
        registry: &ToolingModelRegistry,
    ) -> Result<Response, RemoteError> {
        let topology = build.topology()?;
        let request = self.entry_point.request()?;

        let collected = run_handles(request.build_builders(), &IssueScope::Build, |builder| {
            builder.build(build)
        });
        let build_results = collected.results;
        let mut issues = collected.issues;

        let provider = registry
            .find(RESPONSE_MODEL_NAME)
            .ok_or_else(|| RemoteError::NoProvider(RESPONSE_MODEL_NAME.to_string()))?;

        let mut project_results = BTreeMap::new();
        for project in build.projects() {
            let Some(bytes) = provider.provide(RESPONSE_MODEL_NAME, project)? else {
                tracing::debug!(
                    target = "nbgradle.remote",
                    project = %project.path(),
                    "no project models provided"
                );
                continue;
            };
            let models = ProjectModels::decode(&bytes)?;
            issues.extend(models.issues);
            project_results.insert(models.project_path, models.results);
        }

        tracing::info!(
            target = "nbgradle.remote",
            projects = project_results.len(),
            build_results = build_results.len(),
            issues = issues.len(),
            "model fetch finished"
        );
        Ok(Response::new(topology, build_results, project_results, issues))
    }
}

/// Entry point of the build-process side: reads the request from
/// `transfer_file`, runs it over `build`, and returns the response.
pub fn run_remote_fetch(
    transfer_file: &Path,
    loader: Arc<CodeLoader>,
    build: &EvaluatedBuild,
) -> Result<Response, RemoteError> {
    let entry_point = Arc::new(ModelEntryPoint::from_transfer_file(transfer_file, loader));
    let mut registry = ToolingModelRegistry::new();
    registry.register(entry_point.clone());
    ModelFetchAction::new(entry_point).run(build, &registry)
}
