use crate::bootstrap;
use crate::config::FetcherConfig;
use crate::operation::{LaunchParameters, OperationInitializer};
use crate::process::{GradleProcess, ModelProcess, ProcessInvocation};
use crate::transfer_file::ScopedFile;
use crate::FetchError;
use nbgradle_remote::{Request, Response};
use nbgradle_transfer::CodeLoader;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Runs [`Request`]s in a freshly launched build process.
#[derive(Debug)]
pub struct ModelFetcher {
    config: FetcherConfig,
    loader: Arc<CodeLoader>,
    process: Arc<dyn ModelProcess>,
}

impl ModelFetcher {
    /// `loader` is the IDE-side code-loading context; it locates the
    /// artifacts of direct builders.
    pub fn new(config: FetcherConfig, loader: Arc<CodeLoader>) -> Self {
        let process = Arc::new(GradleProcess::new(config.clone()));
        Self::with_process(config, loader, process)
    }

    pub fn with_process(
        config: FetcherConfig,
        loader: Arc<CodeLoader>,
        process: Arc<dyn ModelProcess>,
    ) -> Self {
        Self {
            config,
            loader,
            process,
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Artifacts the build process needs to load every builder of `request`.
    ///
    /// The runtime artifact comes first; duplicates are dropped keeping the
    /// first occurrence.
    pub fn classpath(&self, request: &Request) -> Result<Vec<PathBuf>, FetchError> {
        let runtime = self
            .config
            .runtime_artifact()
            .map_err(FetchError::RuntimeArtifact)?;
        let mut classpath = vec![runtime];
        classpath.extend(request.required_classpath(&self.loader));
        dedupe_paths(&mut classpath);
        Ok(classpath)
    }

    /// Runs `request` and returns the response.
    ///
    /// Blocks until the build process exits. Builder failures are reported
    /// as issues on the response; only transport failures are errors.
    pub fn fetch(
        &self,
        request: &Request,
        initializer: &dyn OperationInitializer,
    ) -> Result<Response, FetchError> {
        let mut parameters = LaunchParameters::default();
        initializer.initialize(&mut parameters);
        let project_dir = parameters
            .working_dir
            .clone()
            .ok_or(FetchError::MissingWorkingDirectory)?;

        let classpath = self.classpath(request)?;
        let temp_dir = self.config.temp_dir();
        std::fs::create_dir_all(&temp_dir).map_err(|source| FetchError::Io {
            action: "create temp directory",
            path: temp_dir.clone(),
            source,
        })?;

        let transfer = ScopedFile::create(
            &temp_dir,
            "nbgradle-request-",
            ".bin",
            &request.encode()?,
            "model fetch transfer file",
        )
        .map_err(|source| FetchError::Io {
            action: "write transfer file in",
            path: temp_dir.clone(),
            source,
        })?;

        let script = bootstrap::render(&classpath, transfer.path())?;
        let init_script = ScopedFile::create(
            &temp_dir,
            "nbgradle-init-",
            ".gradle",
            script.as_bytes(),
            "model fetch init script",
        )
        .map_err(|source| FetchError::Io {
            action: "write init script in",
            path: temp_dir.clone(),
            source,
        })?;

        tracing::debug!(
            target = "nbgradle.fetch",
            project_dir = %project_dir.display(),
            transfer_file = %transfer.path().display(),
            classpath = classpath.len(),
            build_builders = request.build_builders().count(),
            project_builders = request.project_builders().count(),
            "starting model fetch"
        );

        let start = Instant::now();
        let response = self.process.run(&ProcessInvocation {
            project_dir: &project_dir,
            init_script: init_script.path(),
            transfer_file: transfer.path(),
            parameters: &parameters,
        });

        match &response {
            Ok(response) => tracing::info!(
                target = "nbgradle.fetch",
                project_dir = %project_dir.display(),
                projects = response.topology().project_count(),
                issues = response.issues().len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "fetch completed"
            ),
            Err(err) => tracing::warn!(
                target = "nbgradle.fetch",
                project_dir = %project_dir.display(),
                error = %err,
                "model fetch failed"
            ),
        }
        response
    }
}

fn dedupe_paths(paths: &mut Vec<PathBuf>) {
    let mut seen = HashSet::new();
    paths.retain(|path| seen.insert(path.clone()));
}
