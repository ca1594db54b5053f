//! Name-based builder references.
//!
//! A reference never carries a live builder across the process boundary. It
//! encodes to a [`ReferenceRecord`] (type name plus constructor arguments or
//! constant name) and is rebuilt from that record on the receiving side,
//! where it resolves against that side's [`CodeLoader`].

use crate::builder::{BuilderKind, TargetKind};
use crate::error::{ResolveError, TransferError};
use crate::loader::{CodeLoader, TypeKind};
use nbgradle_model::Value;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Plain-data form of a reference, the only form that is transferred.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceRecord {
    Constructed {
        target: TargetKind,
        type_name: String,
        arguments: Vec<Value>,
    },
    Enumerated {
        target: TargetKind,
        type_name: String,
        constant: Option<String>,
    },
}

impl ReferenceRecord {
    pub fn target(&self) -> TargetKind {
        match self {
            ReferenceRecord::Constructed { target, .. }
            | ReferenceRecord::Enumerated { target, .. } => *target,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            ReferenceRecord::Constructed { type_name, .. }
            | ReferenceRecord::Enumerated { type_name, .. } => type_name,
        }
    }
}

/// Resolve-once cache with compare-and-set semantics.
///
/// Resolution runs outside of any lock; when two threads race, the first
/// stored instance wins and the other result is dropped.
struct Resolved<B: ?Sized> {
    cell: OnceLock<Arc<B>>,
}

impl<B: ?Sized> Resolved<B> {
    fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    fn get_or_try_resolve(
        &self,
        resolve: impl FnOnce() -> Result<Arc<B>, ResolveError>,
    ) -> Result<Arc<B>, ResolveError> {
        if let Some(builder) = self.cell.get() {
            return Ok(Arc::clone(builder));
        }
        let builder = resolve()?;
        match self.cell.set(Arc::clone(&builder)) {
            Ok(()) => Ok(builder),
            Err(_) => Ok(self.cell.get().map(Arc::clone).unwrap_or(builder)),
        }
    }

    fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

fn check_kind<B: ?Sized + BuilderKind>(
    type_name: &str,
    instance: crate::BuilderInstance,
) -> Result<Arc<B>, ResolveError> {
    let actual = instance.kind();
    B::from_instance(instance).ok_or_else(|| ResolveError::WrongKind {
        type_name: type_name.to_string(),
        expected: B::TARGET,
        actual,
    })
}

/// A builder identified by type name plus constructor arguments.
pub struct ConstructedReference<B: ?Sized + BuilderKind> {
    loader: Arc<CodeLoader>,
    type_name: String,
    arguments: Vec<Value>,
    resolved: Resolved<B>,
}

impl<B: ?Sized + BuilderKind> ConstructedReference<B> {
    /// `loader` is the context that defines the builder's target kind; the
    /// wrapped type is always looked up there, regardless of who resolves.
    pub fn new(
        loader: Arc<CodeLoader>,
        type_name: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            loader,
            type_name: type_name.into(),
            arguments,
            resolved: Resolved::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn loader(&self) -> &Arc<CodeLoader> {
        &self.loader
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_resolved()
    }

    pub fn resolve(&self) -> Result<Arc<B>, ResolveError> {
        self.resolved.get_or_try_resolve(|| self.resolve_uncached())
    }

    fn resolve_uncached(&self) -> Result<Arc<B>, ResolveError> {
        let constructors = match &self.loader.require(&self.type_name)?.kind {
            TypeKind::Class { constructors } => constructors,
            _ => {
                return Err(ResolveError::NotAClass {
                    type_name: self.type_name.clone(),
                })
            }
        };

        let constructor = constructors
            .iter()
            .find(|constructor| constructor.accepts(&self.arguments))
            .ok_or_else(|| ResolveError::NoMatchingConstructor {
                type_name: self.type_name.clone(),
                arguments: describe_arguments(&self.arguments),
            })?;

        let instance =
            constructor
                .invoke(&self.arguments)
                .map_err(|err| ResolveError::Construction {
                    type_name: self.type_name.clone(),
                    message: format!("{err:#}"),
                })?;

        tracing::trace!(
            target = "nbgradle.transfer",
            loader = %self.loader.name(),
            type_name = %self.type_name,
            "resolved constructed builder reference"
        );
        check_kind::<B>(&self.type_name, instance)
    }

    pub fn to_record(&self) -> ReferenceRecord {
        ReferenceRecord::Constructed {
            target: B::TARGET,
            type_name: self.type_name.clone(),
            arguments: self.arguments.clone(),
        }
    }

    /// Rebuilds a reference on the receiving side. This is the only way back
    /// from a record to a live reference.
    pub fn from_record(
        record: ReferenceRecord,
        loader: Arc<CodeLoader>,
    ) -> Result<Self, TransferError> {
        match record {
            ReferenceRecord::Constructed {
                target,
                type_name,
                arguments,
            } => {
                ensure_target::<B>(target)?;
                Ok(Self::new(loader, type_name, arguments))
            }
            ReferenceRecord::Enumerated { .. } => Err(TransferError::RecordMismatch {
                expected: "constructed reference",
            }),
        }
    }
}

impl<B: ?Sized + BuilderKind> Serialize for ConstructedReference<B> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<B: ?Sized + BuilderKind> fmt::Debug for ConstructedReference<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructedReference")
            .field("target", &B::TARGET)
            .field("loader", &self.loader.name())
            .field("type_name", &self.type_name)
            .field("arguments", &self.arguments)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// A builder identified by an enumeration type and one of its constants.
pub struct EnumeratedReference<B: ?Sized + BuilderKind> {
    loader: Arc<CodeLoader>,
    type_name: String,
    constant: Option<String>,
    resolved: Resolved<B>,
}

impl<B: ?Sized + BuilderKind> EnumeratedReference<B> {
    /// When `constant` is `None` the enumeration must declare exactly one
    /// constant.
    pub fn new(
        loader: Arc<CodeLoader>,
        type_name: impl Into<String>,
        constant: Option<String>,
    ) -> Self {
        Self {
            loader,
            type_name: type_name.into(),
            constant,
            resolved: Resolved::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn constant(&self) -> Option<&str> {
        self.constant.as_deref()
    }

    pub fn loader(&self) -> &Arc<CodeLoader> {
        &self.loader
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_resolved()
    }

    pub fn resolve(&self) -> Result<Arc<B>, ResolveError> {
        self.resolved.get_or_try_resolve(|| self.resolve_uncached())
    }

    fn resolve_uncached(&self) -> Result<Arc<B>, ResolveError> {
        let constants = match &self.loader.require(&self.type_name)?.kind {
            TypeKind::Enum { constants } => constants,
            _ => {
                return Err(ResolveError::NotAnEnum {
                    type_name: self.type_name.clone(),
                })
            }
        };

        let instance = match self.constant.as_deref() {
            Some(name) => constants
                .iter()
                .find(|(constant, _)| constant == name)
                .map(|(_, instance)| instance.clone())
                .ok_or_else(|| ResolveError::ConstantNotFound {
                    type_name: self.type_name.clone(),
                    constant: name.to_string(),
                })?,
            None => match constants.as_slice() {
                [] => {
                    return Err(ResolveError::NoConstants {
                        type_name: self.type_name.clone(),
                    })
                }
                [(_, only)] => only.clone(),
                many => {
                    return Err(ResolveError::AmbiguousConstant {
                        type_name: self.type_name.clone(),
                        constants: many.iter().map(|(name, _)| name.clone()).collect(),
                    })
                }
            },
        };

        check_kind::<B>(&self.type_name, instance)
    }

    pub fn to_record(&self) -> ReferenceRecord {
        ReferenceRecord::Enumerated {
            target: B::TARGET,
            type_name: self.type_name.clone(),
            constant: self.constant.clone(),
        }
    }

    /// Rebuilds a reference on the receiving side. This is the only way back
    /// from a record to a live reference.
    pub fn from_record(
        record: ReferenceRecord,
        loader: Arc<CodeLoader>,
    ) -> Result<Self, TransferError> {
        match record {
            ReferenceRecord::Enumerated {
                target,
                type_name,
                constant,
            } => {
                ensure_target::<B>(target)?;
                Ok(Self::new(loader, type_name, constant))
            }
            ReferenceRecord::Constructed { .. } => Err(TransferError::RecordMismatch {
                expected: "enumerated reference",
            }),
        }
    }
}

impl<B: ?Sized + BuilderKind> Serialize for EnumeratedReference<B> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<B: ?Sized + BuilderKind> fmt::Debug for EnumeratedReference<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumeratedReference")
            .field("target", &B::TARGET)
            .field("loader", &self.loader.name())
            .field("type_name", &self.type_name)
            .field("constant", &self.constant)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

fn ensure_target<B: ?Sized + BuilderKind>(actual: TargetKind) -> Result<(), TransferError> {
    if actual == B::TARGET {
        Ok(())
    } else {
        Err(TransferError::WrongTarget {
            expected: B::TARGET,
            actual,
        })
    }
}

pub(crate) fn describe_arguments(arguments: &[Value]) -> String {
    arguments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
