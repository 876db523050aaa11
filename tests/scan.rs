use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deoxit::backend::{FixedPicker, LocalBackend};
use deoxit::config::Settings;
use deoxit::controller::Controller;
use deoxit::event::EventHub;
use deoxit::view::View;
use deoxit::Error;
use tempfile::TempDir;

fn cargo_project(base: &Path, name: &str, artifact_bytes: usize) -> PathBuf {
    let dir = base.join(name);
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::create_dir_all(dir.join("target/debug/deps")).unwrap();
    fs::write(dir.join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
    fs::write(dir.join("src/main.rs"), "fn main() {}\n").unwrap();
    fs::write(
        dir.join("target/debug/deps/libdemo.rlib"),
        vec![0u8; artifact_bytes],
    )
    .unwrap();
    dir
}

fn local_controller(root: &Path, clean_program: &str) -> Controller<LocalBackend, FixedPicker> {
    let settings = Settings {
        quote_delay_ms: 0,
        clean_program: clean_program.to_string(),
        ..Settings::default()
    };
    let hub = EventHub::new();
    let events = hub.subscribe();
    Controller::new(
        View::new(Some(root.to_path_buf())),
        Arc::new(LocalBackend::new(hub, &settings)),
        FixedPicker::default(),
        events,
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn rescan_lists_projects_largest_first() {
    let tmp = TempDir::new().unwrap();
    let small = cargo_project(tmp.path(), "small", 1_200);
    let large = cargo_project(&tmp.path().join("work"), "large", 2_500_000);
    let medium = cargo_project(tmp.path(), "medium", 40_000);
    fs::create_dir_all(tmp.path().join("notes/target")).unwrap();

    let mut ctl = local_controller(tmp.path(), "cargo");
    ctl.update_root_path().await.unwrap();

    let rows = ctl.view.projects.rows();
    let paths: Vec<PathBuf> = rows.iter().map(|r| PathBuf::from(&r.path)).collect();
    assert_eq!(paths, vec![large, medium, small]);
    let labels: Vec<&str> = rows.iter().map(|r| r.size_label.as_str()).collect();
    assert_eq!(labels, vec!["2.50MB", "40.0KB", "1.20KB"]);
    assert!(!ctl.view.projects.loading);
}

#[tokio::test(flavor = "multi_thread")]
async fn rescan_of_a_missing_root_keeps_the_spinner() {
    let tmp = TempDir::new().unwrap();
    let mut ctl = local_controller(&tmp.path().join("gone"), "cargo");

    assert!(ctl.update_root_path().await.is_err());
    assert!(ctl.view.projects.loading);
    assert!(ctl.view.projects.rows().is_empty());
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn clean_runs_in_each_checked_project() {
    let tmp = TempDir::new().unwrap();
    let first = cargo_project(tmp.path(), "first", 10);
    cargo_project(tmp.path(), "second", 20);

    let mut ctl = local_controller(tmp.path(), "true");
    ctl.update_root_path().await.unwrap();
    ctl.view.projects.toggle(&first.to_string_lossy());

    let handles = ctl.cargo_clean();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn failing_clean_program_is_reported_per_project() {
    let tmp = TempDir::new().unwrap();
    cargo_project(tmp.path(), "first", 10);
    cargo_project(tmp.path(), "second", 20);

    let mut ctl = local_controller(tmp.path(), "false");
    ctl.update_root_path().await.unwrap();
    ctl.view.projects.set_all_checked(true);

    let handles = ctl.cargo_clean();
    assert_eq!(handles.len(), 2);
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::CleanFailed { .. }));
    }
}
