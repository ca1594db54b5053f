use crate::builder::{BuildInfoBuilder, BuilderInstance, ProjectInfoBuilder, TargetKind};
use crate::codec;
use crate::error::{DecodeError, ResolveError};
use crate::value::{NamedType, TransferValue};
use nbgradle_model::{GenericProjectProperties, MultiKey, TaskInfo, Value, ValueType};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

type ValueDecoder = fn(&[u8]) -> Result<Box<dyn TransferValue>, bincode::Error>;
type RestoreFn = fn(&[u8]) -> Result<BuilderInstance, bincode::Error>;
type ConstructFn = dyn Fn(&[Value]) -> anyhow::Result<BuilderInstance> + Send + Sync;

/// Parameter signature of a registered constructor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    /// `None` accepts any non-null value.
    pub ty: Option<ValueType>,
    pub nullable: bool,
}

impl ParamSpec {
    pub const fn of(ty: ValueType) -> Self {
        Self {
            ty: Some(ty),
            nullable: false,
        }
    }

    pub const fn nullable(ty: ValueType) -> Self {
        Self {
            ty: Some(ty),
            nullable: true,
        }
    }

    pub const fn any() -> Self {
        Self {
            ty: None,
            nullable: true,
        }
    }

    pub fn accepts(&self, arg: &Value) -> bool {
        match arg.value_type() {
            None => self.nullable,
            Some(actual) => self.ty.map_or(true, |expected| expected == actual),
        }
    }
}

/// A constructor of a builder type, matched against arguments by signature.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<ParamSpec>,
    construct: Arc<ConstructFn>,
}

impl Constructor {
    pub fn new(
        params: Vec<ParamSpec>,
        construct: impl Fn(&[Value]) -> anyhow::Result<BuilderInstance> + Send + Sync + 'static,
    ) -> Self {
        Self {
            params,
            construct: Arc::new(construct),
        }
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| param.accepts(arg))
    }

    pub(crate) fn invoke(&self, args: &[Value]) -> anyhow::Result<BuilderInstance> {
        (self.construct)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

pub(crate) enum TypeKind {
    Class { constructors: Vec<Constructor> },
    Enum { constants: Vec<(String, BuilderInstance)> },
    Direct { target: TargetKind, restore: RestoreFn },
    Value { decode: ValueDecoder },
}

impl TypeKind {
    fn label(&self) -> &'static str {
        match self {
            TypeKind::Class { .. } => "class",
            TypeKind::Enum { .. } => "enum",
            TypeKind::Direct { .. } => "direct",
            TypeKind::Value { .. } => "value",
        }
    }
}

pub(crate) struct TypeDef {
    pub(crate) kind: TypeKind,
    origin: Option<PathBuf>,
}

/// A code-loading context: the set of named types that can be looked up,
/// instantiated, and decoded on one side of the process boundary.
///
/// Lookups delegate to the parent loader first, mirroring how plugin
/// contexts see the platform types but not each other's.
pub struct CodeLoader {
    name: String,
    parent: Option<Arc<CodeLoader>>,
    types: HashMap<String, TypeDef>,
}

impl CodeLoader {
    pub fn builder(name: impl Into<String>) -> CodeLoaderBuilder {
        CodeLoaderBuilder {
            name: name.into(),
            parent: None,
            origin: None,
            types: HashMap::new(),
        }
    }

    /// The default loader: built-in value types only.
    pub fn system() -> Arc<CodeLoader> {
        static SYSTEM: OnceLock<Arc<CodeLoader>> = OnceLock::new();
        SYSTEM
            .get_or_init(|| {
                CodeLoader::builder("system")
                    .value::<String>()
                    .value::<bool>()
                    .value::<i64>()
                    .value::<u64>()
                    .value::<PathBuf>()
                    .value::<Vec<String>>()
                    .value::<Vec<PathBuf>>()
                    .value::<BTreeMap<String, String>>()
                    .value::<Value>()
                    .value::<MultiKey>()
                    .value::<GenericProjectProperties>()
                    .value::<TaskInfo>()
                    .value::<Vec<TaskInfo>>()
                    .build()
            })
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<CodeLoader>> {
        self.parent.as_ref()
    }

    pub fn contains_type(&self, type_name: &str) -> bool {
        self.lookup(type_name).is_some()
    }

    /// The artifact that provides `type_name`, if one was declared.
    pub fn origin_of(&self, type_name: &str) -> Option<&Path> {
        self.lookup(type_name)?.origin.as_deref()
    }

    pub(crate) fn lookup(&self, type_name: &str) -> Option<&TypeDef> {
        if let Some(parent) = &self.parent {
            if let Some(found) = parent.lookup(type_name) {
                return Some(found);
            }
        }
        self.types.get(type_name)
    }

    pub(crate) fn require(&self, type_name: &str) -> Result<&TypeDef, ResolveError> {
        self.lookup(type_name)
            .ok_or_else(|| ResolveError::TypeNotFound {
                type_name: type_name.to_string(),
                loader: self.name.clone(),
            })
    }

    pub fn decode_value(
        &self,
        type_name: &str,
        payload: &[u8],
    ) -> Result<Box<dyn TransferValue>, DecodeError> {
        let decode = match self.lookup(type_name).map(|def| &def.kind) {
            Some(TypeKind::Value { decode }) => decode,
            _ => {
                return Err(DecodeError::TypeNotVisible {
                    type_name: type_name.to_string(),
                    loader: self.name.clone(),
                })
            }
        };
        decode(payload).map_err(|err| DecodeError::Payload {
            type_name: type_name.to_string(),
            message: err.to_string(),
        })
    }

    pub(crate) fn restore_direct(
        &self,
        type_name: &str,
        expected: TargetKind,
        state: &[u8],
    ) -> Result<BuilderInstance, ResolveError> {
        let (target, restore) = match &self.require(type_name)?.kind {
            TypeKind::Direct { target, restore } => (*target, restore),
            _ => {
                return Err(ResolveError::NotRestorable {
                    type_name: type_name.to_string(),
                })
            }
        };
        if target != expected {
            return Err(ResolveError::WrongKind {
                type_name: type_name.to_string(),
                expected,
                actual: target,
            });
        }
        restore(state).map_err(|err| ResolveError::Restore {
            type_name: type_name.to_string(),
            message: err.to_string(),
        })
    }
}

impl fmt::Debug for CodeLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self
            .types
            .iter()
            .map(|(name, def)| format!("{name}: {}", def.kind.label()))
            .collect();
        types.sort();
        f.debug_struct("CodeLoader")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|parent| parent.name()))
            .field("types", &types)
            .finish()
    }
}

pub struct CodeLoaderBuilder {
    name: String,
    parent: Option<Arc<CodeLoader>>,
    origin: Option<PathBuf>,
    types: HashMap<String, TypeDef>,
}

impl CodeLoaderBuilder {
    pub fn parent(mut self, parent: Arc<CodeLoader>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Types registered after this call are attributed to `artifact`.
    pub fn from_artifact(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.origin = Some(artifact.into());
        self
    }

    pub fn class(self, type_name: impl Into<String>, constructors: Vec<Constructor>) -> Self {
        self.define(type_name.into(), TypeKind::Class { constructors })
    }

    pub fn enumeration(
        self,
        type_name: impl Into<String>,
        constants: Vec<(&str, BuilderInstance)>,
    ) -> Self {
        let constants = constants
            .into_iter()
            .map(|(name, instance)| (name.to_string(), instance))
            .collect();
        self.define(type_name.into(), TypeKind::Enum { constants })
    }

    pub fn direct_project_builder<T>(self) -> Self
    where
        T: ProjectInfoBuilder + NamedType + DeserializeOwned + 'static,
    {
        self.define(
            T::TYPE_NAME.to_string(),
            TypeKind::Direct {
                target: TargetKind::ProjectInfoBuilder,
                restore: restore_project::<T>,
            },
        )
    }

    pub fn direct_build_builder<T>(self) -> Self
    where
        T: BuildInfoBuilder + NamedType + DeserializeOwned + 'static,
    {
        self.define(
            T::TYPE_NAME.to_string(),
            TypeKind::Direct {
                target: TargetKind::BuildInfoBuilder,
                restore: restore_build::<T>,
            },
        )
    }

    pub fn value<T>(self) -> Self
    where
        T: TransferValue + NamedType + DeserializeOwned,
    {
        self.define(
            T::TYPE_NAME.to_string(),
            TypeKind::Value {
                decode: decode_value::<T>,
            },
        )
    }

    pub fn build(self) -> Arc<CodeLoader> {
        Arc::new(CodeLoader {
            name: self.name,
            parent: self.parent,
            types: self.types,
        })
    }

    fn define(mut self, type_name: String, kind: TypeKind) -> Self {
        let def = TypeDef {
            kind,
            origin: self.origin.clone(),
        };
        if let Some(previous) = self.types.insert(type_name.clone(), def) {
            tracing::debug!(
                target = "nbgradle.transfer",
                loader = %self.name,
                type_name = %type_name,
                previous = previous.kind.label(),
                "type definition replaced"
            );
        }
        self
    }
}

fn decode_value<T>(bytes: &[u8]) -> Result<Box<dyn TransferValue>, bincode::Error>
where
    T: TransferValue + DeserializeOwned,
{
    Ok(Box::new(codec::decode::<T>(bytes)?))
}

fn restore_project<T>(bytes: &[u8]) -> Result<BuilderInstance, bincode::Error>
where
    T: ProjectInfoBuilder + DeserializeOwned + 'static,
{
    Ok(BuilderInstance::Project(Arc::new(codec::decode::<T>(bytes)?)))
}

fn restore_build<T>(bytes: &[u8]) -> Result<BuilderInstance, bincode::Error>
where
    T: BuildInfoBuilder + DeserializeOwned + 'static,
{
    Ok(BuilderInstance::Build(Arc::new(codec::decode::<T>(bytes)?)))
}
