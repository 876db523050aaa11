//! Wires view elements to handlers and runs them against a [`Backend`].

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::backend::{Backend, DirectoryPicker};
use crate::core;
use crate::error::{Error, Result};
use crate::event::Subscription;
use crate::view::{View, QUOTE_STEPS};

/// A user action that an element can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Greet,
    Something,
    UpdateSearch { final_query: bool },
    UpdateRootPath,
    ChooseRootPath,
    CargoClean,
    ToggleEntry(String),
}

/// Element id to action, established once when the view is built.
pub const BINDINGS: &[(&str, Action)] = &[
    ("greet-button", Action::Greet),
    ("something-button", Action::Something),
    ("search-button", Action::UpdateSearch { final_query: false }),
    ("search-final-button", Action::UpdateSearch { final_query: true }),
    ("update-root-button", Action::UpdateRootPath),
    ("choose-root-button", Action::ChooseRootPath),
    ("clean-button", Action::CargoClean),
];

pub fn binding_for(element_id: &str) -> Option<Action> {
    BINDINGS
        .iter()
        .find(|(id, _)| *id == element_id)
        .map(|(_, action)| action.clone())
}

/// Logs a handler failure. Failures never reach the view.
pub fn report_failure(action: &Action, err: &Error) {
    tracing::error!(?action, %err, "handler failed");
}

/// Owns the view and the handles it needs; built once at startup.
///
/// Every handler is split into synchronous view steps and a detached backend
/// call (`start_*`). The `async` handlers chain the steps directly; the GUI
/// runs the detached calls on its runtime and applies the `finish_*` steps
/// when they return.
pub struct Controller<B, P> {
    pub view: View,
    backend: Arc<B>,
    picker: Arc<P>,
    events: Subscription,
}

impl<B, P> Controller<B, P>
where
    B: Backend + 'static,
    P: DirectoryPicker + 'static,
{
    pub fn new(view: View, backend: Arc<B>, picker: P, events: Subscription) -> Self {
        Self {
            view,
            backend,
            picker: Arc::new(picker),
            events,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Renders every queued push notification. Returns how many were applied.
    pub fn pump_events(&mut self) -> usize {
        let events = self.events.drain();
        for event in &events {
            self.view.dispatch(event);
        }
        events.len()
    }

    /// Runs the handler bound to `action`. Failures are logged, never shown.
    pub async fn dispatch(&mut self, action: Action) {
        if self.apply_immediate(&action) {
            return;
        }
        let outcome = match &action {
            Action::Greet => self.greet().await,
            Action::Something => self.something().await,
            Action::UpdateRootPath => self.update_root_path().await,
            Action::ChooseRootPath => {
                self.choose_root_path().await;
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = outcome {
            report_failure(&action, &err);
        }
    }

    /// Handles the actions that need no backend reply. Returns `false` for
    /// the others.
    pub fn apply_immediate(&mut self, action: &Action) -> bool {
        match action {
            Action::UpdateSearch { final_query } => {
                self.view.search.update_search(*final_query);
            }
            Action::ToggleEntry(path) => {
                self.view.projects.toggle(path);
            }
            Action::CargoClean => {
                let fired = self.cargo_clean();
                tracing::info!(count = fired.len(), "clean requested");
            }
            Action::Greet
            | Action::Something
            | Action::UpdateRootPath
            | Action::ChooseRootPath => return false,
        }
        true
    }

    pub async fn greet(&mut self) -> Result<()> {
        let message = self.start_greet().await?;
        self.finish_greet(message);
        Ok(())
    }

    pub fn start_greet(&self) -> impl Future<Output = Result<String>> + Send + 'static {
        let name = self.view.demo.greet_request();
        let backend = Arc::clone(&self.backend);
        async move { backend.greet(&name).await }
    }

    pub fn finish_greet(&mut self, message: String) {
        self.view.demo.show_greeting(message);
    }

    /// Fetches the quotes one after another; the busy dialog stays open on failure.
    pub async fn something(&mut self) -> Result<()> {
        self.begin_something();
        for step in 1..=QUOTE_STEPS {
            let quote = self.start_quote().await?;
            self.apply_quote(step, &quote);
        }
        self.finish_something();
        Ok(())
    }

    pub fn begin_something(&mut self) {
        self.view.demo.begin_something();
    }

    pub fn start_quote(&self) -> impl Future<Output = Result<String>> + Send + 'static {
        let backend = Arc::clone(&self.backend);
        async move { backend.some_quote().await }
    }

    pub fn apply_quote(&mut self, step: u32, quote: &str) {
        self.view.demo.append_quote(step, quote);
    }

    pub fn finish_something(&mut self) {
        self.view.demo.finish_something();
    }

    /// Clears the list, rescans the labelled root and hides the spinner on success.
    pub async fn update_root_path(&mut self) -> Result<()> {
        self.start_update_root_path().await?;
        self.finish_update_root_path();
        Ok(())
    }

    /// Clears the list and shows the spinner, then hands back the scan of the
    /// labelled root (home when unset).
    pub fn start_update_root_path(&mut self) -> impl Future<Output = Result<()>> + Send + 'static {
        let root = match self.view.begin_rescan() {
            Some(root) => root,
            None => core::home_dir().unwrap_or_else(|| PathBuf::from(".")),
        };
        let backend = Arc::clone(&self.backend);
        async move { backend.update_root_path(&root).await }
    }

    /// Renders what the scan pushed and hides the spinner.
    pub fn finish_update_root_path(&mut self) {
        self.pump_events();
        self.view.finish_rescan();
    }

    /// Opens the picker at the home directory. Does not rescan.
    pub async fn choose_root_path(&mut self) -> bool {
        let choice = self.start_choose_root_path().await;
        self.finish_choose_root_path(choice)
    }

    pub fn start_choose_root_path(&self) -> impl Future<Output = Option<PathBuf>> + Send + 'static {
        let picker = Arc::clone(&self.picker);
        let home = core::home_dir();
        async move { picker.pick_directory(home.as_deref()).await }
    }

    pub fn finish_choose_root_path(&mut self, choice: Option<PathBuf>) -> bool {
        self.view.apply_chosen_root(choice)
    }

    /// Fires one independent clean per checked row, in row order. Each task
    /// logs its own failure and hands it back.
    pub fn cargo_clean(&self) -> Vec<JoinHandle<Result<()>>> {
        self.view
            .projects
            .checked_paths()
            .into_iter()
            .map(|path| {
                let backend = Arc::clone(&self.backend);
                tokio::spawn(async move {
                    let outcome = backend.clean_directory(&path).await;
                    if let Err(err) = &outcome {
                        tracing::error!(path = %path.display(), %err, "clean failed");
                    }
                    outcome
                })
            })
            .collect()
    }
}
