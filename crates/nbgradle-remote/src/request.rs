use nbgradle_model::MultiKey;
use nbgradle_transfer::{
    codec, BuildBuilderHandle, CodeLoader, HandleRecord, ProjectBuilderHandle, TransferError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Which of the two request mappings a key belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestScope {
    Build,
    Project,
}

impl fmt::Display for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestScope::Build => f.write_str("build-level"),
            RequestScope::Project => f.write_str("project-level"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("{scope} builder already registered under key {key}")]
    DuplicateKey { scope: RequestScope, key: MultiKey },
}

/// The set of builders to run in one fetch.
///
/// Keys are unique within each mapping; the same key may be used for a
/// build-level and a project-level builder at the same time.
#[derive(Debug, Default)]
pub struct Request {
    build_builders: BTreeMap<MultiKey, BuildBuilderHandle>,
    project_builders: BTreeMap<MultiKey, ProjectBuilderHandle>,
    classpath: Vec<PathBuf>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a builder that runs once against the whole build.
    pub fn add_build_builder(
        &mut self,
        key: impl Into<MultiKey>,
        handle: BuildBuilderHandle,
    ) -> Result<&mut Self, RequestError> {
        insert_unique(&mut self.build_builders, RequestScope::Build, key.into(), handle)?;
        Ok(self)
    }

    /// Registers a builder that runs once per project.
    pub fn add_project_builder(
        &mut self,
        key: impl Into<MultiKey>,
        handle: ProjectBuilderHandle,
    ) -> Result<&mut Self, RequestError> {
        insert_unique(
            &mut self.project_builders,
            RequestScope::Project,
            key.into(),
            handle,
        )?;
        Ok(self)
    }

    /// Adds artifacts the remote side needs beyond what the handles declare,
    /// e.g. libraries the builder types depend on.
    pub fn add_classpath_entries(
        &mut self,
        entries: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> &mut Self {
        self.classpath.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn build_builders(&self) -> impl Iterator<Item = (&MultiKey, &BuildBuilderHandle)> {
        self.build_builders.iter()
    }

    pub fn project_builders(&self) -> impl Iterator<Item = (&MultiKey, &ProjectBuilderHandle)> {
        self.project_builders.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.build_builders.is_empty() && self.project_builders.is_empty()
    }

    /// Classpath artifacts required by the registered builders, in
    /// registration order. May contain duplicates.
    ///
    /// `loader` is consulted for direct builders, whose type is not bound to
    /// a loader of its own.
    pub fn required_classpath(&self, loader: &CodeLoader) -> Vec<PathBuf> {
        let build = self
            .build_builders
            .values()
            .flat_map(|handle| handle.required_classpath(loader));
        let project = self
            .project_builders
            .values()
            .flat_map(|handle| handle.required_classpath(loader));
        build
            .chain(project)
            .chain(self.classpath.iter().cloned())
            .collect()
    }

    pub fn to_record(&self) -> RequestRecord {
        RequestRecord {
            build_builders: self
                .build_builders
                .iter()
                .map(|(key, handle)| (key.clone(), handle.to_record()))
                .collect(),
            project_builders: self
                .project_builders
                .iter()
                .map(|(key, handle)| (key.clone(), handle.to_record()))
                .collect(),
        }
    }

    /// Rebuilds a request from its record; handles resolve against `loader`.
    pub fn from_record(
        record: RequestRecord,
        loader: &Arc<CodeLoader>,
    ) -> Result<Self, TransferError> {
        let build_builders = record
            .build_builders
            .into_iter()
            .map(|(key, record)| Ok((key, BuildBuilderHandle::from_record(record, loader)?)))
            .collect::<Result<_, TransferError>>()?;
        let project_builders = record
            .project_builders
            .into_iter()
            .map(|(key, record)| Ok((key, ProjectBuilderHandle::from_record(record, loader)?)))
            .collect::<Result<_, TransferError>>()?;
        Ok(Self {
            build_builders,
            project_builders,
            classpath: Vec::new(),
        })
    }

    /// Bytes written to the transfer file.
    pub fn encode(&self) -> Result<Vec<u8>, TransferError> {
        Ok(codec::encode(&self.to_record())?)
    }

    pub fn decode(bytes: &[u8], loader: &Arc<CodeLoader>) -> Result<Self, TransferError> {
        let record: RequestRecord = codec::decode(bytes)?;
        Self::from_record(record, loader)
    }
}

/// Transferable form of a [`Request`]. Classpath entries stay on the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub build_builders: BTreeMap<MultiKey, HandleRecord>,
    pub project_builders: BTreeMap<MultiKey, HandleRecord>,
}

fn insert_unique<V>(
    map: &mut BTreeMap<MultiKey, V>,
    scope: RequestScope,
    key: MultiKey,
    value: V,
) -> Result<(), RequestError> {
    if map.contains_key(&key) {
        return Err(RequestError::DuplicateKey { scope, key });
    }
    map.insert(key, value);
    Ok(())
}
