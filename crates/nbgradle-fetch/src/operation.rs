use nbgradle_process::{CancellationToken, OutputSink, ProgressListener};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// How the build process is launched for one fetch. Filled in by the
/// caller's [`OperationInitializer`]; the fetcher only consumes it.
#[derive(Clone, Default)]
pub struct LaunchParameters {
    /// Root directory of the build. Required.
    pub working_dir: Option<PathBuf>,
    /// Extra build tool arguments, placed before the fetch task.
    pub arguments: Vec<String>,
    /// Passed as `org.gradle.jvmargs`, one JVM option per element. Elements
    /// containing whitespace are quoted so they reach the JVM whole.
    pub jvm_arguments: Vec<String>,
    /// Gradle installation to use instead of the configured executable.
    pub gradle_home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub stdout: Option<Arc<dyn OutputSink>>,
    pub stderr: Option<Arc<dyn OutputSink>>,
    pub stdin: Option<Vec<u8>>,
    pub progress: Vec<Arc<dyn ProgressListener>>,
    pub cancellation: Option<CancellationToken>,
}

impl fmt::Debug for LaunchParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchParameters")
            .field("working_dir", &self.working_dir)
            .field("arguments", &self.arguments)
            .field("jvm_arguments", &self.jvm_arguments)
            .field("gradle_home", &self.gradle_home)
            .field("java_home", &self.java_home)
            .field("env", &self.env)
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("stdin", &self.stdin.as_ref().map(Vec::len))
            .field("progress", &self.progress.len())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

/// Supplies the launch parameters of a fetch.
pub trait OperationInitializer {
    fn initialize(&self, parameters: &mut LaunchParameters);
}

impl<F> OperationInitializer for F
where
    F: Fn(&mut LaunchParameters),
{
    fn initialize(&self, parameters: &mut LaunchParameters) {
        self(parameters)
    }
}
