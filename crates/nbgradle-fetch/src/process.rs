use crate::config::FetcherConfig;
use crate::operation::LaunchParameters;
use crate::{utf8_path, FetchError};
use nbgradle_process::{run_process_checked, ProcessSpec, RunOptions};
use nbgradle_remote::{extract_response_frame, RemoteError, Response};
use std::fmt;
use std::path::{Path, PathBuf};

/// Everything a [`ModelProcess`] needs to run one fetch.
#[derive(Debug)]
pub struct ProcessInvocation<'a> {
    /// Root directory of the build.
    pub project_dir: &'a Path,
    /// Rendered bootstrap script, passed as `--init-script`.
    pub init_script: &'a Path,
    /// Encoded request the bootstrap script hands to the entry point.
    pub transfer_file: &'a Path,
    pub parameters: &'a LaunchParameters,
}

/// Runs the build process for a fetch and hands back its [`Response`].
pub trait ModelProcess: Send + Sync + fmt::Debug {
    fn run(&self, invocation: &ProcessInvocation<'_>) -> Result<Response, FetchError>;
}

/// Launches Gradle with the bootstrap script and reads the response frame
/// from its stdout.
#[derive(Debug, Clone)]
pub struct GradleProcess {
    config: FetcherConfig,
}

impl GradleProcess {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    /// The caller's install override first, then the project wrapper (when
    /// preferred and present), then the configured executable.
    pub fn gradle_executable(&self, project_dir: &Path, gradle_home: Option<&Path>) -> PathBuf {
        if let Some(home) = gradle_home {
            let launcher = if cfg!(windows) { "gradle.bat" } else { "gradle" };
            return home.join("bin").join(launcher);
        }
        if self.config.prefer_wrapper {
            let wrapper_candidates = if cfg!(windows) {
                ["gradlew.bat", "gradlew"]
            } else {
                ["gradlew", "gradlew.bat"]
            };
            for name in wrapper_candidates {
                let wrapper = project_dir.join(name);
                if wrapper.exists() {
                    return wrapper;
                }
            }
        }
        self.config.gradle_path.clone()
    }

    pub(crate) fn process_spec(
        &self,
        invocation: &ProcessInvocation<'_>,
    ) -> Result<ProcessSpec, FetchError> {
        let params = invocation.parameters;
        let program = self.gradle_executable(invocation.project_dir, params.gradle_home.as_deref());

        let mut spec = ProcessSpec::new(invocation.project_dir, program)
            .arg("--console=plain")
            .arg("--init-script")
            .arg(utf8_path(invocation.init_script)?);
        if !params.jvm_arguments.is_empty() {
            let jvm_arguments: Vec<String> = params
                .jvm_arguments
                .iter()
                .map(|arg| quote_jvm_argument(arg))
                .collect();
            spec = spec.arg(format!("-Dorg.gradle.jvmargs={}", jvm_arguments.join(" ")));
        }
        if let Some(java_home) = &params.java_home {
            spec = spec.arg(format!("-Dorg.gradle.java.home={}", utf8_path(java_home)?));
        }
        spec = spec
            .args(params.arguments.iter().cloned())
            .arg(self.config.fetch_task.clone());
        spec.env = params.env.clone();
        spec.stdin = params.stdin.clone();
        Ok(spec)
    }
}

/// Quotes one element of `org.gradle.jvmargs`, which Gradle splits on
/// whitespace outside of quotes.
fn quote_jvm_argument(arg: &str) -> String {
    if !arg.contains(char::is_whitespace) {
        return arg.to_string();
    }
    if arg.contains('"') {
        format!("'{arg}'")
    } else {
        format!("\"{arg}\"")
    }
}

impl ModelProcess for GradleProcess {
    fn run(&self, invocation: &ProcessInvocation<'_>) -> Result<Response, FetchError> {
        let params = invocation.parameters;
        let spec = self.process_spec(invocation)?;
        let opts = RunOptions {
            max_bytes: self.config.max_output_bytes,
            cancellation: params.cancellation.clone(),
            stdout_sink: params.stdout.clone(),
            stderr_sink: params.stderr.clone(),
            progress: params.progress.clone(),
            ..RunOptions::default()
        };

        let result = run_process_checked(&spec, &opts)?;
        match extract_response_frame(&result.output.stdout) {
            Ok(response) => Ok(response),
            Err(RemoteError::MissingFrame) if result.output.truncated => {
                tracing::warn!(
                    target = "nbgradle.fetch",
                    command = %spec,
                    max_bytes = self.config.max_output_bytes,
                    "build output was truncated before the response frame ended"
                );
                Err(FetchError::OutputTruncated {
                    max_bytes: self.config.max_output_bytes,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}
