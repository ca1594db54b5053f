use crate::{project_path_segments, ModelError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Identity of a Gradle project, independent of any build-tool model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenericProjectProperties {
    pub name: String,
    /// Fully-qualified Gradle path, e.g. `:lib:core` (`:` for the root).
    pub path: String,
    pub project_dir: PathBuf,
    pub build_script: Option<PathBuf>,
}

impl GenericProjectProperties {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            project_dir: project_dir.into(),
            build_script: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    /// Task path including the owning project (e.g. `:app:compileJava`).
    pub path: String,
    pub description: Option<String>,
    pub group: Option<String>,
}

impl TaskInfo {
    pub fn new(project_path: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: crate::child_project_path(project_path, &name),
            name,
            description: None,
            group: None,
        }
    }
}

/// Immutable tree of evaluated projects shipped alongside fetch results.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectTree {
    properties: GenericProjectProperties,
    tasks: Vec<TaskInfo>,
    children: Vec<ProjectTree>,
    #[serde(skip)]
    child_index: OnceLock<HashMap<String, usize>>,
}

impl ProjectTree {
    pub fn new(
        properties: GenericProjectProperties,
        tasks: Vec<TaskInfo>,
        children: Vec<ProjectTree>,
    ) -> Result<Self, ModelError> {
        if !properties.path.starts_with(':') {
            return Err(ModelError::InvalidProjectPath(properties.path));
        }

        let mut seen = std::collections::HashSet::new();
        for child in &children {
            if !seen.insert(child.name()) {
                return Err(ModelError::DuplicateChild {
                    parent: properties.path.clone(),
                    name: child.name().to_string(),
                });
            }
        }

        Ok(Self {
            properties,
            tasks,
            children,
            child_index: OnceLock::new(),
        })
    }

    pub fn properties(&self) -> &GenericProjectProperties {
        &self.properties
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn path(&self) -> &str {
        &self.properties.path
    }

    pub fn project_dir(&self) -> &Path {
        &self.properties.project_dir
    }

    pub fn tasks(&self) -> &[TaskInfo] {
        &self.tasks
    }

    pub fn children(&self) -> &[ProjectTree] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&ProjectTree> {
        let index = self.child_index.get_or_init(|| {
            self.children
                .iter()
                .enumerate()
                .map(|(idx, child)| (child.name().to_string(), idx))
                .collect()
        });
        index.get(name).map(|idx| &self.children[*idx])
    }

    /// Resolves a `:a:b:c` style path relative to this node by descending one
    /// segment at a time. `:` resolves to `self`.
    pub fn find_by_path(&self, path: &str) -> Option<&ProjectTree> {
        let mut current = self;
        for segment in project_path_segments(path) {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Depth-first, pre-order iteration over this node and all descendants.
    pub fn iter(&self) -> impl Iterator<Item = &ProjectTree> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    pub fn project_count(&self) -> usize {
        self.iter().count()
    }
}

impl PartialEq for ProjectTree {
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties
            && self.tasks == other.tasks
            && self.children == other.children
    }
}

impl Eq for ProjectTree {}
