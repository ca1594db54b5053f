use crate::codec;
use crate::error::{DecodeError, TransferError};
use crate::loader::CodeLoader;
use crate::value::TransferValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize)]
struct EncodedValue {
    type_name: String,
    payload: Vec<u8>,
}

/// Results keyed by an opaque key, each key encoded into its own block.
///
/// Decoding a key touches only that key's block, so a value type that is not
/// visible to the caller's [`CodeLoader`] only fails the keys that contain it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize",
    deserialize = "K: Ord + Deserialize<'de>"
))]
pub struct PartitionedMap<K> {
    partitions: BTreeMap<K, Vec<u8>>,
}

impl<K> Default for PartitionedMap<K> {
    fn default() -> Self {
        Self {
            partitions: BTreeMap::new(),
        }
    }
}

impl<K: Ord> PartitionedMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes every key's values into an independent block.
    pub fn from_mapping<I>(entries: I) -> Result<Self, TransferError>
    where
        I: IntoIterator<Item = (K, Vec<Box<dyn TransferValue>>)>,
    {
        let mut map = Self::new();
        for (key, values) in entries {
            map.insert(key, &values)?;
        }
        Ok(map)
    }

    /// Encodes `values` into the block for `key`, replacing any earlier block.
    ///
    /// On error the map is left unchanged.
    pub fn insert(
        &mut self,
        key: K,
        values: &[Box<dyn TransferValue>],
    ) -> Result<(), TransferError> {
        let block = encode_partition(values)?;
        self.partitions.insert(key, block);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.partitions.keys()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.partitions.contains_key(key)
    }

    /// Size in bytes of one key's encoded block.
    pub fn partition_len(&self, key: &K) -> Option<usize> {
        self.partitions.get(key).map(Vec::len)
    }

    /// Decodes the values stored under `key` using `loader`, or the system
    /// loader when `None`. Returns `Ok(None)` when the key is absent.
    pub fn decode(
        &self,
        key: &K,
        loader: Option<&CodeLoader>,
    ) -> Result<Option<Vec<Box<dyn TransferValue>>>, DecodeError> {
        let Some(block) = self.partitions.get(key) else {
            return Ok(None);
        };

        let system;
        let loader = match loader {
            Some(loader) => loader,
            None => {
                system = CodeLoader::system();
                system.as_ref()
            }
        };

        let encoded: Vec<EncodedValue> =
            codec::decode(block).map_err(|err| DecodeError::Corrupted(err.to_string()))?;
        encoded
            .iter()
            .map(|value| loader.decode_value(&value.type_name, &value.payload))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Like [`PartitionedMap::decode`], downcasting every value to `T`.
    pub fn decode_as<T: 'static>(
        &self,
        key: &K,
        loader: Option<&CodeLoader>,
    ) -> Result<Option<Vec<T>>, DecodeError> {
        let Some(values) = self.decode(key, loader)? else {
            return Ok(None);
        };
        values
            .into_iter()
            .map(|value| {
                let actual = value.type_name().to_string();
                value
                    .downcast::<T>()
                    .map(|value| *value)
                    .ok_or_else(|| DecodeError::UnexpectedType {
                        expected: std::any::type_name::<T>().to_string(),
                        actual,
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn encode_partition(values: &[Box<dyn TransferValue>]) -> Result<Vec<u8>, TransferError> {
    let encoded = values
        .iter()
        .map(|value| {
            let payload =
                value
                    .encode_payload()
                    .map_err(|source| TransferError::EncodeValue {
                        type_name: value.type_name().to_string(),
                        source,
                    })?;
            Ok(EncodedValue {
                type_name: value.type_name().to_string(),
                payload,
            })
        })
        .collect::<Result<Vec<_>, TransferError>>()?;
    Ok(codec::encode(&encoded)?)
}
