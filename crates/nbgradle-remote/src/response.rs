use crate::issue::{IssueScope, ModelIssue};
use nbgradle_model::{MultiKey, ProjectTree};
use nbgradle_transfer::{codec, PartitionedMap, TransferError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Project-level results of a single project, as produced by the entry
/// point for one capability query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectModels {
    pub project_path: String,
    pub results: PartitionedMap<MultiKey>,
    pub issues: Vec<ModelIssue>,
}

impl ProjectModels {
    pub fn encode(&self) -> Result<Vec<u8>, TransferError> {
        Ok(codec::encode(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransferError> {
        Ok(codec::decode(bytes)?)
    }
}

/// Everything one fetch produced.
///
/// Results stay encoded until a caller decodes a key, so a response can be
/// passed around and stored even when some result types are not loadable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    topology: ProjectTree,
    build_results: PartitionedMap<MultiKey>,
    project_results: BTreeMap<String, PartitionedMap<MultiKey>>,
    issues: Vec<ModelIssue>,
}

impl Response {
    pub fn new(
        topology: ProjectTree,
        build_results: PartitionedMap<MultiKey>,
        project_results: BTreeMap<String, PartitionedMap<MultiKey>>,
        issues: Vec<ModelIssue>,
    ) -> Self {
        Self {
            topology,
            build_results,
            project_results,
            issues,
        }
    }

    pub fn topology(&self) -> &ProjectTree {
        &self.topology
    }

    pub fn build_results(&self) -> &PartitionedMap<MultiKey> {
        &self.build_results
    }

    /// Results of the project at `path`, or `None` when the project was not
    /// visited.
    pub fn project_results(&self, path: &str) -> Option<&PartitionedMap<MultiKey>> {
        self.project_results.get(path)
    }

    /// Paths of every visited project.
    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.project_results.keys().map(String::as_str)
    }

    pub fn issues(&self) -> &[ModelIssue] {
        &self.issues
    }

    pub fn project_issues<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ModelIssue> {
        self.issues
            .iter()
            .filter(move |issue| matches!(&issue.scope, IssueScope::Project(p) if p == path))
    }

    pub fn build_issues(&self) -> impl Iterator<Item = &ModelIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.scope == IssueScope::Build)
    }

    pub fn encode(&self) -> Result<Vec<u8>, TransferError> {
        Ok(codec::encode(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransferError> {
        Ok(codec::decode(bytes)?)
    }
}
