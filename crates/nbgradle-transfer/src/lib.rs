//! Transfer primitives shared by both sides of the model fetch protocol.
//!
//! The IDE process and the build process assemble their code independently,
//! so a builder type that exists on one side may be missing on the other.
//! This crate provides the pieces that make that workable:
//!
//! - [`CodeLoader`]: a named registry of types that can be looked up and
//!   instantiated by name (the "code-loading context").
//! - [`BuilderHandle`]: a transferable description of a model builder that is
//!   only resolved into a live instance on the side that runs it.
//! - [`PartitionedMap`]: results keyed by an opaque key, each key encoded into
//!   its own byte block and decoded on demand with a caller-chosen loader.

pub mod codec;

mod builder;
mod error;
mod handle;
mod loader;
mod partitioned;
mod reference;
mod value;

pub use builder::{
    BuildInfoBuilder, BuilderInstance, BuilderKind, ModelResult, ProjectInfoBuilder, TargetKind,
};
pub use error::{DecodeError, ResolveError, TransferError};
pub use handle::{
    BuildBuilderHandle, BuilderHandle, DirectBuilder, HandleRecord, ProjectBuilderHandle,
};
pub use loader::{CodeLoader, CodeLoaderBuilder, Constructor, ParamSpec};
pub use partitioned::PartitionedMap;
pub use reference::{ConstructedReference, EnumeratedReference, ReferenceRecord};
pub use value::{NamedType, TransferValue};
