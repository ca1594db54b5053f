use crate::builder::{BuildInfoBuilder, BuilderKind, ProjectInfoBuilder, TargetKind};
use crate::codec;
use crate::error::{ResolveError, TransferError};
use crate::loader::CodeLoader;
use crate::reference::{
    describe_arguments, ConstructedReference, EnumeratedReference, ReferenceRecord,
};
use crate::value::NamedType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Transferable form of a [`BuilderHandle`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleRecord {
    Direct {
        target: TargetKind,
        type_name: String,
        state: Vec<u8>,
    },
    Reference(ReferenceRecord),
}

/// A builder passed by value: its serialized state travels with the request
/// and is restored by the receiving loader under the same type name.
pub struct DirectBuilder<B: ?Sized + BuilderKind> {
    type_name: String,
    state: Vec<u8>,
    loader: Option<Arc<CodeLoader>>,
    builder: OnceLock<Arc<B>>,
}

impl<B: ?Sized + BuilderKind> DirectBuilder<B> {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn resolve(&self) -> Result<Arc<B>, ResolveError> {
        if let Some(builder) = self.builder.get() {
            return Ok(Arc::clone(builder));
        }
        let Some(loader) = &self.loader else {
            return Err(ResolveError::NotRestorable {
                type_name: self.type_name.clone(),
            });
        };
        let instance = loader.restore_direct(&self.type_name, B::TARGET, &self.state)?;
        let actual = instance.kind();
        let builder = B::from_instance(instance).ok_or_else(|| ResolveError::WrongKind {
            type_name: self.type_name.clone(),
            expected: B::TARGET,
            actual,
        })?;
        match self.builder.set(Arc::clone(&builder)) {
            Ok(()) => Ok(builder),
            Err(_) => Ok(self.builder.get().map(Arc::clone).unwrap_or(builder)),
        }
    }
}

/// A transferable description of "run this builder remotely".
///
/// Only the record form of a handle crosses the process boundary; see
/// [`BuilderHandle::to_record`] and [`BuilderHandle::from_record`].
pub enum BuilderHandle<B: ?Sized + BuilderKind> {
    Direct(DirectBuilder<B>),
    Constructed(ConstructedReference<B>),
    Enumerated(EnumeratedReference<B>),
}

pub type ProjectBuilderHandle = BuilderHandle<dyn ProjectInfoBuilder>;
pub type BuildBuilderHandle = BuilderHandle<dyn BuildInfoBuilder>;

impl BuilderHandle<dyn ProjectInfoBuilder> {
    pub fn direct<T>(builder: T) -> Result<Self, TransferError>
    where
        T: ProjectInfoBuilder + NamedType + Serialize + 'static,
    {
        let state = codec::encode(&builder)?;
        let live: Arc<dyn ProjectInfoBuilder> = Arc::new(builder);
        Ok(Self::Direct(DirectBuilder {
            type_name: T::TYPE_NAME.to_string(),
            state,
            loader: None,
            builder: OnceLock::from(live),
        }))
    }
}

impl BuilderHandle<dyn BuildInfoBuilder> {
    pub fn direct<T>(builder: T) -> Result<Self, TransferError>
    where
        T: BuildInfoBuilder + NamedType + Serialize + 'static,
    {
        let state = codec::encode(&builder)?;
        let live: Arc<dyn BuildInfoBuilder> = Arc::new(builder);
        Ok(Self::Direct(DirectBuilder {
            type_name: T::TYPE_NAME.to_string(),
            state,
            loader: None,
            builder: OnceLock::from(live),
        }))
    }
}

impl<B: ?Sized + BuilderKind> BuilderHandle<B> {
    pub fn constructed(
        loader: Arc<CodeLoader>,
        type_name: impl Into<String>,
        arguments: Vec<nbgradle_model::Value>,
    ) -> Self {
        Self::Constructed(ConstructedReference::new(loader, type_name, arguments))
    }

    pub fn enumerated(
        loader: Arc<CodeLoader>,
        type_name: impl Into<String>,
        constant: Option<&str>,
    ) -> Self {
        Self::Enumerated(EnumeratedReference::new(
            loader,
            type_name,
            constant.map(str::to_string),
        ))
    }

    pub fn type_name(&self) -> &str {
        match self {
            BuilderHandle::Direct(direct) => direct.type_name(),
            BuilderHandle::Constructed(reference) => reference.type_name(),
            BuilderHandle::Enumerated(reference) => reference.type_name(),
        }
    }

    pub fn resolve(&self) -> Result<Arc<B>, ResolveError> {
        match self {
            BuilderHandle::Direct(direct) => direct.resolve(),
            BuilderHandle::Constructed(reference) => reference.resolve(),
            BuilderHandle::Enumerated(reference) => reference.resolve(),
        }
    }

    /// Human-readable identity used in logs and attached issues.
    pub fn describe(&self) -> String {
        match self {
            BuilderHandle::Direct(direct) => format!("direct `{}`", direct.type_name()),
            BuilderHandle::Constructed(reference) => format!(
                "constructed `{}`({})",
                reference.type_name(),
                describe_arguments(reference.arguments())
            ),
            BuilderHandle::Enumerated(reference) => match reference.constant() {
                Some(constant) => format!("enumerated `{}`.{constant}", reference.type_name()),
                None => format!("enumerated `{}`", reference.type_name()),
            },
        }
    }

    /// Artifacts that must be on the remote classpath for this handle to
    /// resolve there. References consult the loader they are bound to;
    /// direct builders consult `loader`.
    pub fn required_classpath(&self, loader: &CodeLoader) -> Vec<PathBuf> {
        let origin = match self {
            BuilderHandle::Direct(direct) => loader.origin_of(direct.type_name()),
            BuilderHandle::Constructed(reference) => {
                reference.loader().origin_of(reference.type_name())
            }
            BuilderHandle::Enumerated(reference) => {
                reference.loader().origin_of(reference.type_name())
            }
        };
        origin.map(|path| vec![path.to_path_buf()]).unwrap_or_default()
    }

    pub fn to_record(&self) -> HandleRecord {
        match self {
            BuilderHandle::Direct(direct) => HandleRecord::Direct {
                target: B::TARGET,
                type_name: direct.type_name.clone(),
                state: direct.state.clone(),
            },
            BuilderHandle::Constructed(reference) => HandleRecord::Reference(reference.to_record()),
            BuilderHandle::Enumerated(reference) => HandleRecord::Reference(reference.to_record()),
        }
    }

    /// Rebuilds a handle on the receiving side; nothing is resolved until
    /// [`BuilderHandle::resolve`] is called.
    pub fn from_record(
        record: HandleRecord,
        loader: &Arc<CodeLoader>,
    ) -> Result<Self, TransferError> {
        match record {
            HandleRecord::Direct {
                target,
                type_name,
                state,
            } => {
                if target != B::TARGET {
                    return Err(TransferError::WrongTarget {
                        expected: B::TARGET,
                        actual: target,
                    });
                }
                Ok(BuilderHandle::Direct(DirectBuilder {
                    type_name,
                    state,
                    loader: Some(Arc::clone(loader)),
                    builder: OnceLock::new(),
                }))
            }
            HandleRecord::Reference(record @ ReferenceRecord::Constructed { .. }) => {
                let reference = ConstructedReference::from_record(record, Arc::clone(loader))?;
                Ok(BuilderHandle::Constructed(reference))
            }
            HandleRecord::Reference(record @ ReferenceRecord::Enumerated { .. }) => {
                let reference = EnumeratedReference::from_record(record, Arc::clone(loader))?;
                Ok(BuilderHandle::Enumerated(reference))
            }
        }
    }
}

impl<B: ?Sized + BuilderKind> Serialize for BuilderHandle<B> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<B: ?Sized + BuilderKind> fmt::Debug for BuilderHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderHandle::Direct(direct) => f
                .debug_struct("Direct")
                .field("type_name", &direct.type_name)
                .field("state_len", &direct.state.len())
                .finish(),
            BuilderHandle::Constructed(reference) => reference.fmt(f),
            BuilderHandle::Enumerated(reference) => reference.fmt(f),
        }
    }
}
