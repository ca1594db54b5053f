use nbgradle_model::MultiKey;
use nbgradle_transfer::ResolveError;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Where a builder failure happened.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueScope {
    Build,
    /// Gradle path of the project the builder was running against.
    Project(String),
}

impl fmt::Display for IssueScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueScope::Build => f.write_str("build"),
            IssueScope::Project(path) => write!(f, "project `{path}`"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    /// The handle could not be turned into a live builder.
    Resolution,
    /// The builder returned an error.
    Execution,
    /// The builder panicked.
    Panic,
    /// The builder's value could not be encoded.
    Encoding,
}

/// A failure captured in the build process in a form the IDE can always
/// render, whatever error types are loadable on its side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferredError {
    /// Label of the original error, e.g. the `ResolveError` variant.
    pub type_label: String,
    pub message: String,
    /// Messages of the source chain, outermost first, excluding `message`.
    pub causes: Vec<String>,
    /// Debug rendering of the original error, including a backtrace when
    /// one was captured.
    pub trace: String,
}

impl TransferredError {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            type_label: "anyhow::Error".to_string(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
            trace: format!("{err:?}"),
        }
    }

    pub fn from_error(
        type_label: impl Into<String>,
        err: &(dyn std::error::Error + 'static),
    ) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            type_label: type_label.into(),
            message: err.to_string(),
            causes,
            trace: format!("{err:?}"),
        }
    }

    pub fn from_resolve(err: &ResolveError) -> Self {
        Self::from_error(format!("ResolveError::{}", resolve_variant(err)), err)
    }

    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message =
            panic_message(payload).unwrap_or_else(|| "<non-string panic payload>".to_string());
        Self {
            type_label: "panic".to_string(),
            trace: format!("panicked: {message}"),
            message,
            causes: Vec::new(),
        }
    }
}

impl fmt::Display for TransferredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_label, self.message)?;
        for cause in &self.causes {
            write!(f, "\n  caused by: {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TransferredError {}

/// A builder failure attached to a response. Failures never abort the fetch;
/// they travel next to the results of the builders that succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelIssue {
    pub key: MultiKey,
    pub scope: IssueScope,
    pub kind: IssueKind,
    /// Description of the failing handle, see `BuilderHandle::describe`.
    pub builder: String,
    pub error: TransferredError,
}

impl fmt::Display for ModelIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "builder {} for key {} failed on {}: {}",
            self.builder, self.key, self.scope, self.error
        )
    }
}

fn resolve_variant(err: &ResolveError) -> &'static str {
    match err {
        ResolveError::TypeNotFound { .. } => "TypeNotFound",
        ResolveError::NoMatchingConstructor { .. } => "NoMatchingConstructor",
        ResolveError::NotAClass { .. } => "NotAClass",
        ResolveError::NotAnEnum { .. } => "NotAnEnum",
        ResolveError::NotRestorable { .. } => "NotRestorable",
        ResolveError::ConstantNotFound { .. } => "ConstantNotFound",
        ResolveError::NoConstants { .. } => "NoConstants",
        ResolveError::AmbiguousConstant { .. } => "AmbiguousConstant",
        ResolveError::WrongKind { .. } => "WrongKind",
        ResolveError::Construction { .. } => "Construction",
        ResolveError::Restore { .. } => "Restore",
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return Some((*message).to_string());
    }
    payload.downcast_ref::<String>().cloned()
}
