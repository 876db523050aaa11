use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use deoxit::backend::{Backend, FixedPicker};
use deoxit::controller::{binding_for, Action, Controller};
use deoxit::event::{Emitter, EventHub, HubEvent};
use deoxit::view::View;
use deoxit::{Error, Result};

/// In-memory backend: scans replay canned entries, cleans are recorded.
#[derive(Default)]
struct RecordingBackend {
    hub: EventHub,
    entries: Vec<(String, u64)>,
    failing_rescans: Mutex<usize>,
    fail_quote_after: Option<usize>,
    quotes: Mutex<usize>,
    cleaned: Mutex<Vec<PathBuf>>,
    rescanned: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn greet(&self, name: &str) -> Result<String> {
        Ok(format!("hi {}", name))
    }

    async fn some_quote(&self) -> Result<String> {
        let mut quotes = self.quotes.lock().unwrap();
        *quotes += 1;
        if self.fail_quote_after.is_some_and(|limit| *quotes > limit) {
            return Err(Error::Task("quote service down".to_string()));
        }
        Ok(format!(" q{}", *quotes))
    }

    async fn update_root_path(&self, root: &Path) -> Result<()> {
        self.rescanned.lock().unwrap().push(root.to_path_buf());
        {
            let mut failing = self.failing_rescans.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(Error::InvalidRoot(root.to_path_buf()));
            }
        }
        for (index, (path, size)) in self.entries.iter().enumerate() {
            self.hub.emit(HubEvent {
                index,
                path: path.clone(),
                size: *size,
                last_build: None,
            });
        }
        Ok(())
    }

    async fn clean_directory(&self, path: &Path) -> Result<()> {
        self.cleaned.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

fn controller(
    backend: RecordingBackend,
    picker: FixedPicker,
) -> Controller<RecordingBackend, FixedPicker> {
    let events = backend.hub.subscribe();
    Controller::new(
        View::new(Some(PathBuf::from("/src"))),
        Arc::new(backend),
        picker,
        events,
    )
}

fn entries(n: usize) -> Vec<(String, u64)> {
    (0..n).map(|i| (format!("/src/p{}", i), 1_000 * (i as u64 + 1))).collect()
}

async fn wait_all(handles: Vec<tokio::task::JoinHandle<Result<()>>>) {
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn rescan_renders_pushed_entries_and_hides_the_spinner() {
    let backend = RecordingBackend {
        entries: entries(3),
        ..Default::default()
    };
    let mut ctl = controller(backend, FixedPicker::default());

    ctl.update_root_path().await.unwrap();

    let rows = ctl.view.projects.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].path, "/src/p0");
    assert_eq!(rows[2].size_label, "3.00KB");
    assert!(!ctl.view.projects.loading);
    assert_eq!(
        *ctl.backend().rescanned.lock().unwrap(),
        vec![PathBuf::from("/src")]
    );
}

#[tokio::test]
async fn failed_rescan_leaves_the_spinner_visible() {
    let backend = RecordingBackend {
        failing_rescans: Mutex::new(1),
        ..Default::default()
    };
    let mut ctl = controller(backend, FixedPicker::default());
    ctl.view.dispatch(&HubEvent {
        index: 0,
        path: "/old".to_string(),
        size: 1,
        last_build: None,
    });

    ctl.dispatch(Action::UpdateRootPath).await;

    assert!(ctl.view.projects.rows().is_empty());
    assert!(ctl.view.projects.loading);
}

#[tokio::test]
async fn rescan_after_a_failed_one_hides_the_spinner() {
    let backend = RecordingBackend {
        entries: entries(2),
        failing_rescans: Mutex::new(1),
        ..Default::default()
    };
    let mut ctl = controller(backend, FixedPicker::default());

    ctl.dispatch(Action::UpdateRootPath).await;
    assert!(ctl.view.projects.loading);

    ctl.dispatch(Action::UpdateRootPath).await;
    assert!(!ctl.view.projects.loading);
    assert_eq!(ctl.view.projects.rows().len(), 2);
    assert_eq!(ctl.backend().rescanned.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn detached_steps_run_on_another_task() {
    let backend = RecordingBackend {
        entries: entries(3),
        failing_rescans: Mutex::new(1),
        ..Default::default()
    };
    let mut ctl = controller(backend, FixedPicker::new(Some(PathBuf::from("/work"))));
    ctl.view.demo.greet_input = "Ferris".to_string();

    let greeting = tokio::spawn(ctl.start_greet()).await.unwrap().unwrap();
    ctl.finish_greet(greeting);
    assert_eq!(ctl.view.demo.greet_msg, "hi Ferris");

    let choice = tokio::spawn(ctl.start_choose_root_path()).await.unwrap();
    assert!(ctl.finish_choose_root_path(choice));

    let failed = tokio::spawn(ctl.start_update_root_path()).await.unwrap();
    assert!(failed.is_err());
    assert!(ctl.view.projects.loading);

    tokio::spawn(ctl.start_update_root_path()).await.unwrap().unwrap();
    assert!(ctl.view.projects.loading);
    ctl.finish_update_root_path();
    assert!(!ctl.view.projects.loading);
    assert_eq!(ctl.view.projects.rows().len(), 3);
    assert_eq!(
        *ctl.backend().rescanned.lock().unwrap(),
        vec![PathBuf::from("/work"), PathBuf::from("/work")]
    );
}

#[tokio::test]
async fn something_can_restart_after_a_failure() {
    let backend = RecordingBackend {
        fail_quote_after: Some(1),
        ..Default::default()
    };
    let mut ctl = controller(backend, FixedPicker::default());
    ctl.dispatch(Action::Something).await;
    assert!(ctl.view.demo.busy_open);

    ctl.begin_something();
    assert_eq!(ctl.view.demo.meter, 1);
    assert_eq!(ctl.view.demo.something_msg, "something done");
}

#[tokio::test]
async fn cleaning_fires_one_call_per_checked_entry() {
    let backend = RecordingBackend {
        entries: entries(5),
        ..Default::default()
    };
    let mut ctl = controller(backend, FixedPicker::default());
    ctl.update_root_path().await.unwrap();

    ctl.view.projects.toggle("/src/p1");
    ctl.view.projects.toggle("/src/p3");
    ctl.view.projects.toggle("/src/p4");
    wait_all(ctl.cargo_clean()).await;

    let mut cleaned = ctl.backend().cleaned.lock().unwrap().clone();
    cleaned.sort();
    assert_eq!(
        cleaned,
        vec![
            PathBuf::from("/src/p1"),
            PathBuf::from("/src/p3"),
            PathBuf::from("/src/p4"),
        ]
    );
}

#[tokio::test]
async fn cleaning_with_nothing_checked_issues_no_calls() {
    let backend = RecordingBackend {
        entries: entries(4),
        ..Default::default()
    };
    let mut ctl = controller(backend, FixedPicker::default());
    ctl.update_root_path().await.unwrap();

    let handles = ctl.cargo_clean();
    assert!(handles.is_empty());
    assert!(ctl.backend().cleaned.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_picker_keeps_the_root_label() {
    let mut ctl = controller(RecordingBackend::default(), FixedPicker::new(None));
    assert!(!ctl.choose_root_path().await);
    assert_eq!(ctl.view.root.text(), "/src");
    assert!(ctl.backend().rescanned.lock().unwrap().is_empty());
}

#[tokio::test]
async fn picked_root_is_used_by_the_next_rescan() {
    let picker = FixedPicker::new(Some(PathBuf::from("/work")));
    let mut ctl = controller(RecordingBackend::default(), picker);

    ctl.dispatch(binding_for("choose-root-button").unwrap()).await;
    assert_eq!(ctl.view.root.text(), "/work");
    assert!(ctl.backend().rescanned.lock().unwrap().is_empty());

    ctl.dispatch(Action::UpdateRootPath).await;
    assert_eq!(
        *ctl.backend().rescanned.lock().unwrap(),
        vec![PathBuf::from("/work")]
    );
}

#[tokio::test]
async fn greet_resets_the_meter() {
    let mut ctl = controller(RecordingBackend::default(), FixedPicker::default());
    ctl.view.demo.greet_input = "Ferris".to_string();
    ctl.view.demo.meter = 3;

    ctl.dispatch(Action::Greet).await;

    assert_eq!(ctl.view.demo.greet_msg, "hi Ferris");
    assert_eq!(ctl.view.demo.meter, 0);
}

#[tokio::test]
async fn something_appends_quotes_in_order() {
    let mut ctl = controller(RecordingBackend::default(), FixedPicker::default());

    ctl.something().await.unwrap();

    assert_eq!(ctl.view.demo.something_msg, "something done q1 q2 q3");
    assert_eq!(ctl.view.demo.meter, 4);
    assert!(!ctl.view.demo.busy_open);
}

#[tokio::test]
async fn something_failure_leaves_the_dialog_open() {
    let backend = RecordingBackend {
        fail_quote_after: Some(1),
        ..Default::default()
    };
    let mut ctl = controller(backend, FixedPicker::default());

    ctl.dispatch(Action::Something).await;

    assert!(ctl.view.demo.busy_open);
    assert_eq!(ctl.view.demo.meter, 2);
    assert_eq!(ctl.view.demo.something_msg, "something done q1");
}

#[tokio::test]
async fn search_table_stays_bounded() {
    let mut ctl = controller(RecordingBackend::default(), FixedPicker::default());
    for i in 0..12 {
        ctl.view.search.search_input = format!("term{}", i);
        ctl.dispatch(Action::UpdateSearch { final_query: i == 11 }).await;
    }
    assert_eq!(ctl.view.search.table.len(), 8);
    assert_eq!(ctl.view.search.result_msg, "term11 done");
}
