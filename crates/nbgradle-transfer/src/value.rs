use crate::codec;
use nbgradle_model::{GenericProjectProperties, MultiKey, TaskInfo, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Associates a stable transfer name with a Rust type.
///
/// The name is what crosses the process boundary; the receiving side looks it
/// up in its own [`crate::CodeLoader`] to find a decoder.
pub trait NamedType {
    const TYPE_NAME: &'static str;
}

/// A model value produced by a builder and shipped back to the IDE.
pub trait TransferValue: Any + Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    fn encode_payload(&self) -> Result<Vec<u8>, bincode::Error>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T> TransferValue for T
where
    T: NamedType + Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn encode_payload(&self) -> Result<Vec<u8>, bincode::Error> {
        codec::encode(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

impl dyn TransferValue {
    pub fn is<T: 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast<T: 'static>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }
}

macro_rules! named_types {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl NamedType for $ty {
                const TYPE_NAME: &'static str = $name;
            }
        )*
    };
}

named_types! {
    String => "string",
    bool => "bool",
    i64 => "i64",
    u64 => "u64",
    PathBuf => "path",
    Vec<String> => "list<string>",
    Vec<PathBuf> => "list<path>",
    BTreeMap<String, String> => "map<string,string>",
    Value => "nbgradle.Value",
    MultiKey => "nbgradle.MultiKey",
    GenericProjectProperties => "nbgradle.GenericProjectProperties",
    TaskInfo => "nbgradle.TaskInfo",
    Vec<TaskInfo> => "list<nbgradle.TaskInfo>",
}
