use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

pub const TARGET_DIR_NAME: &str = "target";
const MANIFEST_NAME: &str = "Cargo.toml";
const SKIP_DIR_NAMES: &[&str] = &[".git", ".hg", ".svn", ".idea", ".vscode", TARGET_DIR_NAME];

/// A project directory accepted by a [`DirFilter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Found {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub last_build: Option<DateTime<Utc>>,
}

impl Found {
    pub fn display_name(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Decides whether a directory, given its entries, is something to report.
pub trait DirFilter {
    fn accept(&self, entries: &[DirEntry]) -> bool;

    /// The subdirectory whose size is reported for an accepted directory.
    fn artifact_dir(&self, dir: &Path) -> PathBuf;
}

/// Accepts Cargo projects that hold a manifest and a real `target` directory.
pub struct CargoDirFilter;

impl DirFilter for CargoDirFilter {
    fn accept(&self, entries: &[DirEntry]) -> bool {
        let mut has_manifest = false;
        let mut has_target_dir = false;

        for entry in entries {
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            if file_type.is_symlink() {
                continue;
            }
            let name = entry.file_name();
            has_target_dir |= name == TARGET_DIR_NAME && file_type.is_dir();
            has_manifest |= name == MANIFEST_NAME && file_type.is_file();
        }

        has_manifest && has_target_dir
    }

    fn artifact_dir(&self, dir: &Path) -> PathBuf {
        dir.join(TARGET_DIR_NAME)
    }
}

/// Walks `root` depth first and sends every directory `filter` accepts.
///
/// Blocking; run it on a blocking thread. Returns early with
/// [`Error::Cancelled`] once the receiver is gone.
pub fn find_dirs_filter<F>(root: &Path, filter: &F, sender: &mpsc::Sender<Found>) -> Result<usize>
where
    F: DirFilter + ?Sized,
{
    if !root.is_dir() {
        return Err(Error::InvalidRoot(root.to_path_buf()));
    }

    let mut found = 0usize;
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries: Vec<DirEntry> = match fs::read_dir(&current) {
            Ok(iter) => iter.flatten().collect(),
            Err(err) => {
                tracing::debug!(path = %current.display(), %err, "skipping unreadable directory");
                continue;
            }
        };

        if filter.accept(&entries) {
            let artifact = filter.artifact_dir(&current);
            let item = Found {
                size_bytes: calculate_size(&artifact),
                last_build: modified_at(&artifact),
                path: current.clone(),
            };
            tracing::debug!(path = %item.path.display(), size = item.size_bytes, "found build directory");
            if sender.blocking_send(item).is_err() {
                return Err(Error::Cancelled);
            }
            found += 1;
        }

        for entry in entries {
            let is_dir = entry
                .file_type()
                .map(|ft| ft.is_dir() && !ft.is_symlink())
                .unwrap_or(false);
            if !is_dir || should_skip(&entry.file_name()) {
                continue;
            }
            stack.push(entry.path());
        }
    }

    Ok(found)
}

fn should_skip(name: &OsStr) -> bool {
    SKIP_DIR_NAMES.iter().any(|skip| name == *skip)
}

/// Orders sizes from largest to smallest and hands out insertion positions.
#[derive(Default, Debug)]
pub struct SizeRanking {
    sizes: Vec<u64>,
}

impl SizeRanking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `size` and returns where it lands in the descending order.
    /// Equal sizes go before the ones already recorded.
    pub fn insert(&mut self, size: u64) -> usize {
        let index = self.sizes.partition_point(|existing| *existing > size);
        self.sizes.insert(index, size);
        index
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw.starts_with("~/") || raw == "~" {
        if let Some(home) = home_dir() {
            let trimmed = raw.trim_start_matches('~');
            return home.join(trimmed.trim_start_matches('/'));
        }
    }
    PathBuf::from(raw.as_ref())
}

fn safe_metadata(path: &Path) -> Option<fs::Metadata> {
    fs::symlink_metadata(path).ok()
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let modified: SystemTime = safe_metadata(path)?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Sums file lengths below `path` without following symlinks.
pub fn calculate_size(path: &Path) -> u64 {
    let metadata = match safe_metadata(path) {
        Some(meta) => meta,
        None => return 0,
    };

    if !metadata.is_dir() {
        return metadata.len();
    }

    let mut total = 0u64;
    let mut stack = vec![path.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let entry_path = entry.path();
            let entry_meta = match safe_metadata(&entry_path) {
                Some(meta) => meta,
                None => continue,
            };
            if entry_meta.file_type().is_symlink() {
                continue;
            }
            if entry_meta.is_dir() {
                stack.push(entry_path);
            } else {
                total = total.saturating_add(entry_meta.len());
            }
        }
    }

    total
}
