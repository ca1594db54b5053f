//! Shared value types for the Gradle model fetch protocol.
//!
//! Everything in this crate is plain data: it is loadable identically on the
//! IDE side and inside the build process, so it can be freely embedded in
//! requests and responses.

mod evaluated;
mod topology;
mod value;

pub use evaluated::{EvaluatedBuild, EvaluatedProject};
pub use topology::{GenericProjectProperties, ProjectTree, TaskInfo};
pub use value::{MultiKey, Value, ValueType};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid project path `{0}`: Gradle project paths must start with `:`")]
    InvalidProjectPath(String),

    #[error("duplicate child project `{name}` under `{parent}`")]
    DuplicateChild { parent: String, name: String },
}

/// Path of the root project in a Gradle build.
pub const ROOT_PROJECT_PATH: &str = ":";

/// Splits a Gradle project path (`:a:b:c`) into its segments.
///
/// Both `:` and the empty string address the root project and yield no
/// segments.
pub fn project_path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(':').filter(|segment| !segment.is_empty())
}

/// Joins a parent project path with a child project name.
pub fn child_project_path(parent: &str, name: &str) -> String {
    if parent == ROOT_PROJECT_PATH || parent.is_empty() {
        format!(":{name}")
    } else {
        format!("{parent}:{name}")
    }
}
