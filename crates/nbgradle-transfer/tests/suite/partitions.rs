use nbgradle_model::MultiKey;
use nbgradle_transfer::{CodeLoader, DecodeError, NamedType, PartitionedMap, TransferValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct CoverageReport {
    covered: u32,
    total: u32,
}

impl NamedType for CoverageReport {
    const TYPE_NAME: &'static str = "coverage.CoverageReport";
}

fn plugin_loader() -> std::sync::Arc<CodeLoader> {
    CodeLoader::builder("coverage-plugin")
        .parent(CodeLoader::system())
        .value::<CoverageReport>()
        .build()
}

fn mixed_map() -> PartitionedMap<MultiKey> {
    let mut entries: BTreeMap<MultiKey, Vec<Box<dyn TransferValue>>> = BTreeMap::new();
    entries.insert(
        MultiKey::single("coverage"),
        vec![Box::new(CoverageReport {
            covered: 3,
            total: 4,
        }) as Box<dyn TransferValue>],
    );
    entries.insert(
        MultiKey::new(["greeting", "en"]),
        vec![
            Box::new("HELLO".to_string()) as Box<dyn TransferValue>,
            Box::new("HI".to_string()),
        ],
    );
    PartitionedMap::from_mapping(entries).unwrap()
}

#[test]
fn unloadable_partition_does_not_affect_its_neighbours() {
    let map = mixed_map();
    let system = CodeLoader::system();

    let greetings = map
        .decode_as::<String>(&MultiKey::new(["greeting", "en"]), Some(&*system))
        .unwrap()
        .unwrap();
    assert_eq!(greetings, vec!["HELLO".to_string(), "HI".to_string()]);

    let err = map
        .decode(&MultiKey::single("coverage"), Some(&*system))
        .unwrap_err();
    assert_eq!(
        err,
        DecodeError::TypeNotVisible {
            type_name: "coverage.CoverageReport".into(),
            loader: "system".into(),
        }
    );

    // A failed decode leaves the block intact for a better-equipped loader.
    let reports = map
        .decode_as::<CoverageReport>(&MultiKey::single("coverage"), Some(&*plugin_loader()))
        .unwrap()
        .unwrap();
    assert_eq!(
        reports,
        vec![CoverageReport {
            covered: 3,
            total: 4
        }]
    );
}

#[test]
fn default_loader_is_the_system_loader() {
    let map = mixed_map();
    assert!(map
        .decode(&MultiKey::new(["greeting", "en"]), None)
        .unwrap()
        .is_some());
    assert!(matches!(
        map.decode(&MultiKey::single("coverage"), None),
        Err(DecodeError::TypeNotVisible { .. })
    ));
}

#[test]
fn keys_are_known_without_decoding() {
    let map = mixed_map();
    assert_eq!(map.len(), 2);
    assert!(map.contains_key(&MultiKey::single("coverage")));
    assert!(map.partition_len(&MultiKey::single("coverage")).unwrap() > 0);
    assert!(map.partition_len(&MultiKey::single("missing")).is_none());
    assert!(map
        .decode(&MultiKey::single("missing"), None)
        .unwrap()
        .is_none());
}

#[test]
fn partitions_decode_repeatedly() {
    let map = mixed_map();
    let key = MultiKey::new(["greeting", "en"]);
    let first = map.decode_as::<String>(&key, None).unwrap();
    let second = map.decode_as::<String>(&key, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn downcast_mismatch_names_the_transferred_type() {
    let map = mixed_map();
    let err = map
        .decode_as::<i64>(&MultiKey::new(["greeting", "en"]), None)
        .unwrap_err();
    match err {
        DecodeError::UnexpectedType { expected, actual } => {
            assert_eq!(expected, "i64");
            assert_eq!(actual, "string");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn empty_partitions_decode_to_no_values() {
    let map = PartitionedMap::from_mapping([(MultiKey::single("nothing"), Vec::new())]).unwrap();
    assert_eq!(
        map.decode(&MultiKey::single("nothing"), None)
            .unwrap()
            .map(|values| values.len()),
        Some(0)
    );
}

#[test]
fn map_survives_the_wire_and_detects_corruption() {
    let map = mixed_map();
    let bytes = nbgradle_transfer::codec::encode(&map).unwrap();
    let decoded: PartitionedMap<MultiKey> = nbgradle_transfer::codec::decode(&bytes).unwrap();
    assert_eq!(decoded, map);

    let mut blocks: BTreeMap<MultiKey, Vec<u8>> =
        nbgradle_transfer::codec::decode(&bytes).unwrap();
    for block in blocks.values_mut() {
        block.truncate(3);
    }
    let corrupted: PartitionedMap<MultiKey> =
        nbgradle_transfer::codec::decode(&nbgradle_transfer::codec::encode(&blocks).unwrap())
            .unwrap();
    assert!(matches!(
        corrupted.decode(&MultiKey::single("coverage"), None),
        Err(DecodeError::Corrupted(_))
    ));
}
