use crate::{GenericProjectProperties, ModelError, ProjectTree, TaskInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A project as seen by model builders running inside the build process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatedProject {
    pub properties: GenericProjectProperties,
    pub tasks: Vec<TaskInfo>,
    /// Ids of the plugins applied to the project (e.g. `java-library`).
    pub plugins: Vec<String>,
    /// Project properties with a string representation.
    pub extra_properties: BTreeMap<String, String>,
    pub children: Vec<EvaluatedProject>,
}

impl EvaluatedProject {
    pub fn new(properties: GenericProjectProperties) -> Self {
        Self {
            properties,
            tasks: Vec::new(),
            plugins: Vec::new(),
            extra_properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.properties.path
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn project_dir(&self) -> &Path {
        &self.properties.project_dir
    }

    pub fn has_plugin(&self, id: &str) -> bool {
        self.plugins.iter().any(|plugin| plugin == id)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.extra_properties.get(name).map(String::as_str)
    }

    /// Depth-first, pre-order iteration over this project and its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &EvaluatedProject> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    pub fn to_tree(&self) -> Result<ProjectTree, ModelError> {
        let children = self
            .children
            .iter()
            .map(EvaluatedProject::to_tree)
            .collect::<Result<Vec<_>, _>>()?;
        ProjectTree::new(self.properties.clone(), self.tasks.clone(), children)
    }
}

/// The whole evaluated build, handed to build-level model builders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatedBuild {
    pub root_dir: PathBuf,
    pub gradle_version: Option<String>,
    pub root_project: EvaluatedProject,
}

impl EvaluatedBuild {
    pub fn new(root_project: EvaluatedProject) -> Self {
        Self {
            root_dir: root_project.properties.project_dir.clone(),
            gradle_version: None,
            root_project,
        }
    }

    pub fn projects(&self) -> impl Iterator<Item = &EvaluatedProject> {
        self.root_project.iter()
    }

    pub fn find_project(&self, path: &str) -> Option<&EvaluatedProject> {
        self.projects().find(|project| project.path() == path)
    }

    pub fn topology(&self) -> Result<ProjectTree, ModelError> {
        self.root_project.to_tree()
    }
}
