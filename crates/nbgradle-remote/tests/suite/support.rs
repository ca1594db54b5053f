use nbgradle_model::{EvaluatedBuild, EvaluatedProject, GenericProjectProperties, ValueType};
use nbgradle_transfer::{
    BuildInfoBuilder, BuilderInstance, CodeLoader, Constructor, ModelResult, NamedType, ParamSpec,
    ProjectInfoBuilder, TransferValue,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Returns the same text for every project.
#[derive(Debug)]
pub struct Constant(pub String);

impl ProjectInfoBuilder for Constant {
    fn build(&self, _project: &EvaluatedProject) -> ModelResult {
        Ok(Some(Box::new(self.0.clone())))
    }
}

/// Fails for one project and reports the project path for all others.
#[derive(Debug)]
pub struct FailsOn(pub String);

impl ProjectInfoBuilder for FailsOn {
    fn build(&self, project: &EvaluatedProject) -> ModelResult {
        if project.path() == self.0 {
            anyhow::bail!("cannot inspect {}", project.path());
        }
        Ok(Some(Box::new(project.path().to_string())))
    }
}

#[derive(Debug)]
pub struct Panics;

impl ProjectInfoBuilder for Panics {
    fn build(&self, project: &EvaluatedProject) -> ModelResult {
        panic!("builder exploded on {}", project.path());
    }
}

#[derive(Debug)]
pub struct Nothing;

impl ProjectInfoBuilder for Nothing {
    fn build(&self, _project: &EvaluatedProject) -> ModelResult {
        Ok(None)
    }
}

pub static VERSION_BUILDS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
pub struct GradleVersion;

impl BuildInfoBuilder for GradleVersion {
    fn build(&self, build: &EvaluatedBuild) -> ModelResult {
        VERSION_BUILDS.fetch_add(1, Ordering::SeqCst);
        Ok(build
            .gradle_version
            .clone()
            .map(|version| Box::new(version) as Box<dyn TransferValue>))
    }
}

/// Counts the projects of the build.
#[derive(Debug)]
pub struct ProjectCount;

impl BuildInfoBuilder for ProjectCount {
    fn build(&self, build: &EvaluatedBuild) -> ModelResult {
        Ok(Some(Box::new(build.projects().count() as u64)))
    }
}

/// A builder passed by value, reading one string property of the project.
#[derive(Debug, Serialize, Deserialize)]
pub struct PropertyReader {
    pub property: String,
}

impl NamedType for PropertyReader {
    const TYPE_NAME: &'static str = "test.PropertyReader";
}

impl ProjectInfoBuilder for PropertyReader {
    fn build(&self, project: &EvaluatedProject) -> ModelResult {
        Ok(project
            .property(&self.property)
            .map(|value| Box::new(value.to_string()) as Box<dyn TransferValue>))
    }
}

/// Loader holding every test builder, as the build process would see it
/// after the injected artifacts are on its classpath.
pub fn plugin_loader() -> Arc<CodeLoader> {
    CodeLoader::builder("test-plugin")
        .parent(CodeLoader::system())
        .from_artifact("/plugins/test-builders.jar")
        .class(
            "test.Constant",
            vec![Constructor::new(vec![ParamSpec::of(ValueType::Str)], |args| {
                let text = args[0].as_str().unwrap_or_default().to_string();
                Ok(BuilderInstance::project(Constant(text)))
            })],
        )
        .class(
            "test.FailsOn",
            vec![Constructor::new(vec![ParamSpec::of(ValueType::Str)], |args| {
                let path = args[0].as_str().unwrap_or_default().to_string();
                Ok(BuilderInstance::project(FailsOn(path)))
            })],
        )
        .class(
            "test.GradleVersion",
            vec![Constructor::new(Vec::new(), |_| {
                Ok(BuilderInstance::build(GradleVersion))
            })],
        )
        .enumeration(
            "test.Misc",
            vec![
                ("PANICS", BuilderInstance::project(Panics)),
                ("NOTHING", BuilderInstance::project(Nothing)),
            ],
        )
        .enumeration(
            "test.BuildStats",
            vec![("PROJECT_COUNT", BuilderInstance::build(ProjectCount))],
        )
        .direct_project_builder::<PropertyReader>()
        .build()
}

/// A two-project build: `:` (named `root`) with a single child `:sub`.
pub fn two_project_build() -> EvaluatedBuild {
    let mut sub = EvaluatedProject::new(GenericProjectProperties::new("sub", ":sub", "/ws/sub"));
    sub.extra_properties
        .insert("version".into(), "2.0".into());

    let mut root = EvaluatedProject::new(GenericProjectProperties::new("root", ":", "/ws"));
    root.extra_properties
        .insert("version".into(), "1.0".into());
    root.children.push(sub);

    let mut build = EvaluatedBuild::new(root);
    build.gradle_version = Some("8.7".into());
    build
}
