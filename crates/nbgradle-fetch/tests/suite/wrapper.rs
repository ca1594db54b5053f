use super::support::{config, constant, dir_entries, plugin_loader, two_project_build};
use nbgradle_fetch::{
    CancellationToken, FetchError, FetcherConfig, LaunchParameters, ModelFetcher, Request,
};
use nbgradle_model::MultiKey;
use nbgradle_process::RunCommandError;
use nbgradle_remote::{run_remote_fetch, write_response_frame, RemoteError};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Installs `gradlew` in `project` running `body` after recording its
/// arguments and a copy of the init script in `record_dir`.
fn install_wrapper(project: &Path, record_dir: &Path, body: &str) {
    let script = format!(
        "#!/bin/sh\n\
         printf '%s\\n' \"$@\" > '{args}'\n\
         cp \"$3\" '{init}'\n\
         {body}\n",
        args = record_dir.join("args.txt").display(),
        init = record_dir.join("init.gradle").display(),
    );
    let wrapper = project.join("gradlew");
    std::fs::write(&wrapper, script).unwrap();
    std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn canned_frame(request: &Request) -> String {
    let dir = tempfile::tempdir().unwrap();
    let transfer_file = dir.path().join("request.bin");
    std::fs::write(&transfer_file, request.encode().unwrap()).unwrap();
    let response = run_remote_fetch(&transfer_file, plugin_loader(), &two_project_build()).unwrap();
    let mut out = Vec::new();
    write_response_frame(&mut out, &response).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn wrapper_output_frame_becomes_the_response() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let record = tempfile::tempdir().unwrap();

    let mut request = Request::new();
    request.add_project_builder("hello", constant("HELLO")).unwrap();

    let body = format!(
        "echo '> Task :nbgradleFetchModels'\ncat <<'EOF'\n{}EOF\necho 'BUILD SUCCESSFUL'",
        canned_frame(&request)
    );
    install_wrapper(project.path(), record.path(), &body);

    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let seen = lines.clone();
    let fetcher = ModelFetcher::new(config(temp.path()), plugin_loader());
    let response = fetcher
        .fetch(&request, &|params: &mut LaunchParameters| {
            params.working_dir = Some(project.path().to_path_buf());
            params.arguments = vec!["--offline".into()];
            let seen = seen.clone();
            params.stdout = Some(Arc::new(move |line: &str| {
                seen.lock().unwrap().push(line.to_string())
            }));
        })
        .unwrap();

    assert_eq!(
        response
            .project_results(":sub")
            .unwrap()
            .decode_as::<String>(&MultiKey::single("hello"), None)
            .unwrap(),
        Some(vec!["HELLO".to_string()])
    );
    assert!(lines
        .lock()
        .unwrap()
        .iter()
        .any(|line| line == "BUILD SUCCESSFUL"));

    let args = std::fs::read_to_string(record.path().join("args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(args[0], "--console=plain");
    assert_eq!(args[1], "--init-script");
    assert!(Path::new(args[2]).starts_with(temp.path()));
    assert_eq!(&args[3..], ["--offline", "nbgradleFetchModels"]);

    let init = std::fs::read_to_string(record.path().join("init.gradle")).unwrap();
    assert!(init.contains("nbgradleFetchModels"));
    assert!(init.contains("'/plugins/test-builders.jar'"));

    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn failed_build_reports_exit_status_and_stderr() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let record = tempfile::tempdir().unwrap();
    install_wrapper(
        project.path(),
        record.path(),
        "echo 'Could not resolve plugin' >&2\nexit 3",
    );

    let fetcher = ModelFetcher::new(config(temp.path()), plugin_loader());
    let err = fetcher
        .fetch(&Request::new(), &|params: &mut LaunchParameters| {
            params.working_dir = Some(project.path().to_path_buf());
        })
        .unwrap_err();

    match &err {
        FetchError::Process(RunCommandError::Failed { status, .. }) => {
            assert_eq!(status.code(), Some(3));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("Could not resolve plugin"), "{err}");
    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn output_without_frame_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let record = tempfile::tempdir().unwrap();
    install_wrapper(project.path(), record.path(), "echo 'BUILD SUCCESSFUL'");

    let fetcher = ModelFetcher::new(config(temp.path()), plugin_loader());
    let err = fetcher
        .fetch(&Request::new(), &|params: &mut LaunchParameters| {
            params.working_dir = Some(project.path().to_path_buf());
        })
        .unwrap_err();

    assert!(
        matches!(err, FetchError::Remote(RemoteError::MissingFrame)),
        "{err:?}"
    );
    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn cancelled_build_is_killed_and_temp_files_removed() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let record = tempfile::tempdir().unwrap();
    install_wrapper(project.path(), record.path(), "sleep 30");

    let token = CancellationToken::new();
    let canceller = token.clone();
    let args_file = record.path().join("args.txt");
    std::thread::spawn(move || {
        // Cancel once the wrapper is running.
        let start = Instant::now();
        while !args_file.exists() && start.elapsed() < Duration::from_secs(10) {
            std::thread::sleep(Duration::from_millis(10));
        }
        canceller.cancel();
    });

    let fetcher = ModelFetcher::new(config(temp.path()), plugin_loader());
    let start = Instant::now();
    let err = fetcher
        .fetch(&Request::new(), &|params: &mut LaunchParameters| {
            params.working_dir = Some(project.path().to_path_buf());
            params.cancellation = Some(token.clone());
        })
        .unwrap_err();

    assert!(
        matches!(err, FetchError::Process(RunCommandError::Cancelled { .. })),
        "{err:?}"
    );
    assert!(
        start.elapsed() < Duration::from_secs(15),
        "cancellation took {:?}",
        start.elapsed()
    );
    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn truncated_output_is_reported_as_such() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let record = tempfile::tempdir().unwrap();

    let mut request = Request::new();
    request.add_project_builder("hello", constant("HELLO")).unwrap();
    let body = format!(
        "i=0\nwhile [ $i -lt 50 ]; do echo \"configuring project $i\"; i=$((i+1)); done\n\
         cat <<'EOF'\n{}EOF",
        canned_frame(&request)
    );
    install_wrapper(project.path(), record.path(), &body);

    let fetcher = ModelFetcher::new(
        FetcherConfig {
            max_output_bytes: 256,
            ..config(temp.path())
        },
        plugin_loader(),
    );
    let err = fetcher
        .fetch(&request, &|params: &mut LaunchParameters| {
            params.working_dir = Some(project.path().to_path_buf());
        })
        .unwrap_err();

    assert!(
        matches!(err, FetchError::OutputTruncated { max_bytes: 256 }),
        "{err:?}"
    );
    assert!(err.to_string().contains("max_output_bytes"), "{err}");
    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn install_override_is_used_even_with_a_wrapper() {
    let temp = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let record = tempfile::tempdir().unwrap();
    let gradle_home = tempfile::tempdir().unwrap();

    install_wrapper(project.path(), record.path(), "exit 7");
    let bin = gradle_home.path().join("bin");
    std::fs::create_dir(&bin).unwrap();
    let override_record = tempfile::tempdir().unwrap();
    install_wrapper(&bin, override_record.path(), "exit 9");
    std::fs::rename(bin.join("gradlew"), bin.join("gradle")).unwrap();

    let fetcher = ModelFetcher::new(config(temp.path()), plugin_loader());
    let err = fetcher
        .fetch(&Request::new(), &|params: &mut LaunchParameters| {
            params.working_dir = Some(project.path().to_path_buf());
            params.gradle_home = Some(gradle_home.path().to_path_buf());
        })
        .unwrap_err();

    match &err {
        FetchError::Process(RunCommandError::Failed { status, .. }) => {
            assert_eq!(status.code(), Some(9));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(override_record.path().join("args.txt").exists());
    assert!(!record.path().join("args.txt").exists());
}
