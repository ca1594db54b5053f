use crate::TransferValue;
use nbgradle_model::{EvaluatedBuild, EvaluatedProject};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Outcome of running a model builder. `Ok(None)` means "nothing to report".
pub type ModelResult = anyhow::Result<Option<Box<dyn TransferValue>>>;

/// Computes a model for a single project inside the build process.
pub trait ProjectInfoBuilder: Send + Sync {
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    fn build(&self, project: &EvaluatedProject) -> ModelResult;
}

/// Computes a model once for the whole build inside the build process.
pub trait BuildInfoBuilder: Send + Sync {
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    fn build(&self, build: &EvaluatedBuild) -> ModelResult;
}

/// The builder trait a handle must resolve to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    ProjectInfoBuilder,
    BuildInfoBuilder,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::ProjectInfoBuilder => f.write_str("ProjectInfoBuilder"),
            TargetKind::BuildInfoBuilder => f.write_str("BuildInfoBuilder"),
        }
    }
}

/// A live builder produced by a [`crate::CodeLoader`].
#[derive(Clone)]
pub enum BuilderInstance {
    Project(Arc<dyn ProjectInfoBuilder>),
    Build(Arc<dyn BuildInfoBuilder>),
}

impl BuilderInstance {
    pub fn kind(&self) -> TargetKind {
        match self {
            BuilderInstance::Project(_) => TargetKind::ProjectInfoBuilder,
            BuilderInstance::Build(_) => TargetKind::BuildInfoBuilder,
        }
    }

    pub fn project(builder: impl ProjectInfoBuilder + 'static) -> Self {
        BuilderInstance::Project(Arc::new(builder))
    }

    pub fn build(builder: impl BuildInfoBuilder + 'static) -> Self {
        BuilderInstance::Build(Arc::new(builder))
    }
}

impl fmt::Debug for BuilderInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderInstance::Project(builder) => {
                f.debug_tuple("Project").field(&builder.name()).finish()
            }
            BuilderInstance::Build(builder) => {
                f.debug_tuple("Build").field(&builder.name()).finish()
            }
        }
    }
}

/// Ties a builder trait object type to its [`TargetKind`].
pub trait BuilderKind: Send + Sync + 'static {
    const TARGET: TargetKind;

    fn from_instance(instance: BuilderInstance) -> Option<Arc<Self>>;

    fn builder_name(&self) -> String;
}

impl BuilderKind for dyn ProjectInfoBuilder {
    const TARGET: TargetKind = TargetKind::ProjectInfoBuilder;

    fn from_instance(instance: BuilderInstance) -> Option<Arc<Self>> {
        match instance {
            BuilderInstance::Project(builder) => Some(builder),
            BuilderInstance::Build(_) => None,
        }
    }

    fn builder_name(&self) -> String {
        self.name()
    }
}

impl BuilderKind for dyn BuildInfoBuilder {
    const TARGET: TargetKind = TargetKind::BuildInfoBuilder;

    fn from_instance(instance: BuilderInstance) -> Option<Arc<Self>> {
        match instance {
            BuilderInstance::Build(builder) => Some(builder),
            BuilderInstance::Project(_) => None,
        }
    }

    fn builder_name(&self) -> String {
        self.name()
    }
}

impl fmt::Debug for dyn ProjectInfoBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProjectInfoBuilder").field(&self.name()).finish()
    }
}

impl fmt::Debug for dyn BuildInfoBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BuildInfoBuilder").field(&self.name()).finish()
    }
}
