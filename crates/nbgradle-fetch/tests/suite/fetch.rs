use super::support::{
    config, constant, dir_entries, InProcessGradle, PropertyReader, PLUGIN_ARTIFACT,
    RUNTIME_ARTIFACT,
};
use nbgradle_fetch::{CancellationToken, FetchError, LaunchParameters, ModelFetcher, Request};
use nbgradle_model::MultiKey;
use nbgradle_process::RunCommandError;
use nbgradle_remote::RemoteError;
use nbgradle_transfer::{CodeLoader, ProjectBuilderHandle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

fn in_project(dir: &Path) -> impl Fn(&mut LaunchParameters) + '_ {
    move |params: &mut LaunchParameters| params.working_dir = Some(dir.to_path_buf())
}

fn fetcher(temp_dir: &Path, process: Arc<InProcessGradle>) -> ModelFetcher {
    ModelFetcher::with_process(config(temp_dir), super::support::plugin_loader(), process)
}

#[test]
fn fetch_returns_remote_results_and_cleans_up() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let process = Arc::new(InProcessGradle::default());
    let fetcher = fetcher(temp.path(), process.clone());

    let mut request = Request::new();
    request
        .add_project_builder("hello", constant("HELLO"))
        .unwrap()
        .add_project_builder(
            MultiKey::new(["property", "version"]),
            ProjectBuilderHandle::direct(PropertyReader {
                property: "version".into(),
            })
            .unwrap(),
        )
        .unwrap();

    let response = fetcher.fetch(&request, &in_project(project.path())).unwrap();

    let version = MultiKey::new(["property", "version"]);
    let sub = response.project_results(":sub").unwrap();
    assert_eq!(
        sub.decode_as::<String>(&MultiKey::single("hello"), None).unwrap(),
        Some(vec!["HELLO".to_string()])
    );
    assert_eq!(
        sub.decode_as::<String>(&version, None).unwrap(),
        Some(vec!["2.0".to_string()])
    );
    assert!(response.issues().is_empty());
    assert_eq!(response.topology().project_count(), 2);

    let runs = process.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].project_dir, project.path());
    assert!(runs[0].transfer_file.starts_with(temp.path()));
    assert!(runs[0].init_script.starts_with(temp.path()));
    assert!(runs[0].script.contains(&format!("'{RUNTIME_ARTIFACT}'")));
    assert!(runs[0].script.contains(&format!("'{PLUGIN_ARTIFACT}'")));

    assert!(!runs[0].transfer_file.exists());
    assert!(!runs[0].init_script.exists());
    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn temp_files_are_removed_when_the_process_fails() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let process = Arc::new(InProcessGradle::failing());
    let fetcher = fetcher(temp.path(), process.clone());

    let mut request = Request::new();
    request.add_project_builder("hello", constant("HELLO")).unwrap();

    let err = fetcher
        .fetch(&request, &in_project(project.path()))
        .unwrap_err();
    assert!(
        matches!(err, FetchError::Remote(RemoteError::MissingFrame)),
        "{err:?}"
    );
    assert_eq!(process.runs().len(), 1);
    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn temp_files_are_removed_when_the_fetch_is_cancelled() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let process = Arc::new(InProcessGradle::cancelling());
    let fetcher = fetcher(temp.path(), process.clone());
    let token = CancellationToken::new();

    let mut request = Request::new();
    request.add_project_builder("hello", constant("HELLO")).unwrap();

    let err = fetcher
        .fetch(&request, &|params: &mut LaunchParameters| {
            params.working_dir = Some(project.path().to_path_buf());
            params.cancellation = Some(token.clone());
        })
        .unwrap_err();

    assert!(
        matches!(err, FetchError::Process(RunCommandError::Cancelled { .. })),
        "{err:?}"
    );
    assert!(token.is_cancelled());
    let runs = process.runs();
    assert_eq!(runs.len(), 1);
    assert!(!runs[0].transfer_file.exists());
    assert!(!runs[0].init_script.exists());
    assert!(dir_entries(temp.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn non_utf8_classpath_entry_fails_before_launch_and_cleans_up() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let process = Arc::new(InProcessGradle::default());
    let fetcher = fetcher(temp.path(), process.clone());

    let bad = PathBuf::from(OsStr::from_bytes(b"/libs/caf\xe9.jar"));
    let mut request = Request::new();
    request.add_classpath_entries([bad.clone()]);

    let err = fetcher
        .fetch(&request, &in_project(project.path()))
        .unwrap_err();

    assert!(
        matches!(&err, FetchError::NonUtf8Path { path } if *path == bad),
        "{err:?}"
    );
    assert!(process.runs().is_empty());
    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn working_directory_is_required() {
    let temp = tempfile::tempdir().unwrap();
    let process = Arc::new(InProcessGradle::default());
    let fetcher = fetcher(temp.path(), process.clone());

    let err = fetcher
        .fetch(&Request::new(), &|_: &mut LaunchParameters| {})
        .unwrap_err();
    assert!(matches!(err, FetchError::MissingWorkingDirectory), "{err:?}");
    assert!(process.runs().is_empty());
    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn missing_temp_directory_is_created() {
    let temp = tempfile::tempdir().unwrap();
    let nested = temp.path().join("nested").join("fetch");
    let project = tempfile::tempdir().unwrap();
    let process = Arc::new(InProcessGradle::default());
    let fetcher = fetcher(&nested, process.clone());

    fetcher
        .fetch(&Request::new(), &in_project(project.path()))
        .unwrap();
    assert!(nested.is_dir());
    assert!(dir_entries(&nested).is_empty());
}

#[test]
fn classpath_starts_with_runtime_artifact_and_has_no_duplicates() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = fetcher(temp.path(), Arc::new(InProcessGradle::default()));

    let mut request = Request::new();
    request
        .add_project_builder("a", constant("A"))
        .unwrap()
        .add_project_builder("b", constant("B"))
        .unwrap()
        .add_project_builder(
            "c",
            ProjectBuilderHandle::direct(PropertyReader {
                property: "version".into(),
            })
            .unwrap(),
        )
        .unwrap()
        .add_classpath_entries(["/libs/extra.jar", RUNTIME_ARTIFACT, "/libs/extra.jar"]);

    assert_eq!(
        fetcher.classpath(&request).unwrap(),
        vec![
            PathBuf::from(RUNTIME_ARTIFACT),
            PathBuf::from(PLUGIN_ARTIFACT),
            PathBuf::from("/libs/extra.jar"),
        ]
    );
}

#[test]
fn direct_builders_unknown_to_the_loader_add_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = ModelFetcher::with_process(
        config(temp.path()),
        CodeLoader::system(),
        Arc::new(InProcessGradle::default()),
    );

    let mut request = Request::new();
    request
        .add_project_builder(
            "c",
            ProjectBuilderHandle::direct(PropertyReader {
                property: "version".into(),
            })
            .unwrap(),
        )
        .unwrap();

    assert_eq!(
        fetcher.classpath(&request).unwrap(),
        vec![PathBuf::from(RUNTIME_ARTIFACT)]
    );
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn finished_fetch_is_logged() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let fetcher = fetcher(temp.path(), Arc::new(InProcessGradle::default()));

    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        fetcher
            .fetch(&Request::new(), &in_project(project.path()))
            .unwrap();
    });

    let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("fetch completed"), "{logs}");
    assert!(logs.contains("projects=2"), "{logs}");
}
