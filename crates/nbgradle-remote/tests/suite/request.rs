use super::support::{plugin_loader, two_project_build, PropertyReader};
use nbgradle_model::{MultiKey, Value};
use nbgradle_remote::{Request, RequestError, RequestRecord, RequestScope};
use nbgradle_transfer::{codec, BuildBuilderHandle, CodeLoader, ProjectBuilderHandle, TransferValue};
use std::path::PathBuf;

fn mixed_request() -> Request {
    let loader = plugin_loader();
    let mut request = Request::new();
    request
        .add_build_builder(
            "version",
            BuildBuilderHandle::constructed(loader.clone(), "test.GradleVersion", Vec::new()),
        )
        .unwrap()
        .add_build_builder(
            "stats",
            BuildBuilderHandle::enumerated(
                loader.clone(),
                "test.BuildStats",
                Some("PROJECT_COUNT"),
            ),
        )
        .unwrap()
        .add_project_builder(
            MultiKey::new([Value::from("greeting"), Value::Int(1)]),
            ProjectBuilderHandle::constructed(
                loader.clone(),
                "test.Constant",
                vec![Value::from("HELLO")],
            ),
        )
        .unwrap()
        .add_project_builder(
            "version",
            ProjectBuilderHandle::direct(PropertyReader {
                property: "version".into(),
            })
            .unwrap(),
        )
        .unwrap()
        .add_project_builder(
            "nothing",
            ProjectBuilderHandle::enumerated(loader, "test.Misc", Some("NOTHING")),
        )
        .unwrap();
    request
}

fn render(value: Option<Box<dyn TransferValue>>) -> Option<String> {
    value.map(|value| format!("{value:?}"))
}

#[test]
fn decoded_request_builds_the_same_results() {
    let original = mixed_request();
    let bytes = original.encode().unwrap();
    let decoded = Request::decode(&bytes, &plugin_loader()).unwrap();

    let build = two_project_build();
    assert_eq!(decoded.build_builders().count(), 2);
    assert_eq!(decoded.project_builders().count(), 3);

    for ((key, before), (decoded_key, after)) in
        original.build_builders().zip(decoded.build_builders())
    {
        assert_eq!(key, decoded_key);
        let before = before.resolve().unwrap().build(&build).unwrap();
        let after = after.resolve().unwrap().build(&build).unwrap();
        assert_eq!(render(before), render(after), "build key {key}");
    }

    for project in build.projects() {
        for ((key, before), (decoded_key, after)) in
            original.project_builders().zip(decoded.project_builders())
        {
            assert_eq!(key, decoded_key);
            assert_eq!(before.describe(), after.describe());
            let before = before.resolve().unwrap().build(project).unwrap();
            let after = after.resolve().unwrap().build(project).unwrap();
            assert_eq!(render(before), render(after), "{key} on {}", project.path());
        }
    }
}

#[test]
fn record_is_plain_data() {
    let request = mixed_request();
    let record: RequestRecord = codec::decode(&request.encode().unwrap()).unwrap();
    assert_eq!(record, request.to_record());
    assert!(record
        .project_builders
        .contains_key(&MultiKey::new([Value::from("greeting"), Value::Int(1)])));
}

#[test]
fn decoding_does_not_resolve_anything() {
    // Nothing in the request exists in the system loader, yet decoding succeeds;
    // failures only surface when a handle is resolved.
    let decoded =
        Request::decode(&mixed_request().encode().unwrap(), &CodeLoader::system()).unwrap();
    assert!(decoded
        .project_builders()
        .all(|(_, handle)| handle.resolve().is_err()));
}

#[test]
fn same_key_is_allowed_once_per_mapping() {
    let mut request = mixed_request();
    let err = request
        .add_build_builder(
            "version",
            BuildBuilderHandle::constructed(plugin_loader(), "test.GradleVersion", Vec::new()),
        )
        .unwrap_err();
    assert_eq!(
        err,
        RequestError::DuplicateKey {
            scope: RequestScope::Build,
            key: MultiKey::single("version"),
        }
    );
    assert!(err.to_string().contains("build-level"));
}

#[test]
fn classpath_comes_from_bound_loaders_and_client_loader() {
    let request = mixed_request();
    let classpath = request.required_classpath(&plugin_loader());
    assert_eq!(classpath.len(), 5);
    assert!(classpath
        .iter()
        .all(|entry| entry == &PathBuf::from("/plugins/test-builders.jar")));

    // The direct builder's type is only known to the client loader.
    let without_client_types = request.required_classpath(&CodeLoader::system());
    assert_eq!(without_client_types.len(), 4);
}
