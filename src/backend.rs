//! Operations the view invokes, and the in-process implementation of them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::config::Settings;
use crate::core::{self, CargoDirFilter, Found, SizeRanking};
use crate::error::{Error, Result};
use crate::event::{Emitter, EventHub, HubEvent};

const SCAN_CHANNEL_CAPACITY: usize = 64;

/// Request/response operations behind the UI.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn greet(&self, name: &str) -> Result<String>;

    async fn some_quote(&self) -> Result<String>;

    /// Rescans `root`, emitting one hub event per build directory found.
    async fn update_root_path(&self, root: &Path) -> Result<()>;

    async fn clean_directory(&self, path: &Path) -> Result<()>;
}

/// Runs every operation on the current tokio runtime and emits into an [`EventHub`].
pub struct LocalBackend {
    hub: EventHub,
    quote_delay: Duration,
    clean_program: String,
}

impl LocalBackend {
    pub fn new(hub: EventHub, settings: &Settings) -> Self {
        Self {
            hub,
            quote_delay: settings.quote_delay(),
            clean_program: settings.clean_program.clone(),
        }
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn greet(&self, name: &str) -> Result<String> {
        Ok(format!("Hello, {}! You've been greeted from Rust!", name))
    }

    async fn some_quote(&self) -> Result<String> {
        tokio::time::sleep(self.quote_delay).await;
        Ok(" ... one second later".to_string())
    }

    async fn update_root_path(&self, root: &Path) -> Result<()> {
        if !root.is_dir() {
            return Err(Error::InvalidRoot(root.to_path_buf()));
        }
        tracing::info!(root = %root.display(), "rescanning");

        let (sender, receiver) = mpsc::channel::<Found>(SCAN_CHANNEL_CAPACITY);
        let relay = tokio::spawn(relay_ranked(receiver, self.hub.clone()));

        let scan_root = root.to_path_buf();
        let scanned = tokio::task::spawn_blocking(move || {
            core::find_dirs_filter(&scan_root, &CargoDirFilter, &sender)
        })
        .await?;

        let emitted = relay.await?;
        let found = scanned?;
        tracing::info!(root = %root.display(), found, emitted, "rescan finished");
        Ok(())
    }

    async fn clean_directory(&self, path: &Path) -> Result<()> {
        if !path.is_dir() {
            return Err(Error::InvalidRoot(path.to_path_buf()));
        }
        tracing::info!(path = %path.display(), program = %self.clean_program, "clean");

        let output = Command::new(&self.clean_program)
            .arg("clean")
            .current_dir(path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::CleanFailed {
                path: path.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::debug!(
            path = %path.display(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "clean finished"
        );
        Ok(())
    }
}

/// Turns scan results into hub events positioned by descending size.
async fn relay_ranked<E: Emitter>(mut receiver: mpsc::Receiver<Found>, emitter: E) -> usize {
    let mut ranking = SizeRanking::new();
    while let Some(found) = receiver.recv().await {
        let index = ranking.insert(found.size_bytes);
        emitter.emit(HubEvent {
            index,
            path: found.display_name(),
            size: found.size_bytes,
            last_build: found.last_build,
        });
    }
    ranking.len()
}

/// Picks a directory, starting somewhere. `None` means cancelled.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    async fn pick_directory(&self, start: Option<&Path>) -> Option<PathBuf>;
}

/// Always answers with the same choice; used by the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedPicker {
    choice: Option<PathBuf>,
}

impl FixedPicker {
    pub fn new(choice: Option<PathBuf>) -> Self {
        Self { choice }
    }
}

#[async_trait]
impl DirectoryPicker for FixedPicker {
    async fn pick_directory(&self, _start: Option<&Path>) -> Option<PathBuf> {
        self.choice.clone()
    }
}
