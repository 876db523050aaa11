//! View state for every panel. Handlers mutate these in small synchronous
//! steps; the controller and the GUI await backend calls between the steps.

use chrono::{DateTime, Local, Utc};
use std::collections::VecDeque;
use std::path::PathBuf;

use crate::event::{HubEvent, HubRenderer};
use crate::size::format_size;

/// Rows kept by the bounded search table and activity feed.
pub const MAX_FEED_ROWS: usize = 8;
/// Number of sequential quotes fetched by the demo handler.
pub const QUOTE_STEPS: u32 = 3;

#[derive(Debug, Default)]
pub struct DemoPanel {
    pub greet_input: String,
    pub greet_msg: String,
    pub something_msg: String,
    pub meter: u32,
    pub busy_open: bool,
}

impl DemoPanel {
    /// Name sent to the greet operation.
    pub fn greet_request(&self) -> String {
        self.greet_input.clone()
    }

    pub fn show_greeting(&mut self, message: String) {
        self.greet_msg = message;
        self.meter = 0;
    }

    pub fn begin_something(&mut self) {
        self.busy_open = true;
        self.meter = 1;
        self.something_msg = "something done".to_string();
    }

    /// Appends the reply of quote `step` (1-based) and advances the meter.
    pub fn append_quote(&mut self, step: u32, quote: &str) {
        self.something_msg.push_str(quote);
        self.meter = step + 1;
    }

    pub fn finish_something(&mut self) {
        self.busy_open = false;
    }
}

/// Keeps at most `capacity` rows, dropping the oldest first.
#[derive(Debug, Clone)]
pub struct BoundedRows<T> {
    rows: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedRows<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, row: T) {
        self.rows.push_back(row);
        while self.rows.len() > self.capacity {
            self.rows.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter()
    }
}

#[derive(Debug)]
pub struct SearchPanel {
    pub search_input: String,
    pub result_msg: String,
    pub table: BoundedRows<[String; 2]>,
    pub feed: BoundedRows<String>,
}

impl Default for SearchPanel {
    fn default() -> Self {
        Self {
            search_input: String::new(),
            result_msg: String::new(),
            table: BoundedRows::new(MAX_FEED_ROWS),
            feed: BoundedRows::new(MAX_FEED_ROWS),
        }
    }
}

impl SearchPanel {
    pub fn update_search(&mut self, final_query: bool) {
        let query = self.search_input.clone();
        self.result_msg = query.clone();
        if final_query {
            self.result_msg.push_str(" done");
        }
        self.table.push(["1".to_string(), query.clone()]);
        self.feed.push(query);
    }
}

impl HubRenderer for SearchPanel {
    fn render_hub_event(&mut self, event: &HubEvent) {
        self.feed.push(format!("{} {}", event.path, format_size(event.size)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListVariant {
    /// Path and size only.
    Plain,
    /// Flex rows with size and a selection checkbox.
    #[default]
    Selectable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRow {
    pub path: String,
    pub size: u64,
    pub size_label: String,
    pub last_build: Option<DateTime<Utc>>,
    pub checked: bool,
}

impl ProjectRow {
    pub fn from_event(event: &HubEvent) -> Self {
        Self {
            path: event.path.clone(),
            size: event.size,
            size_label: format_size(event.size),
            last_build: event.last_build,
            checked: false,
        }
    }

    pub fn last_build_str(&self) -> String {
        match self.last_build {
            Some(ts) => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            None => "-".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ProjectList {
    rows: Vec<ProjectRow>,
    pub loading: bool,
    pub variant: ListVariant,
}

impl ProjectList {
    pub fn new(variant: ListVariant) -> Self {
        Self {
            rows: Vec::new(),
            loading: false,
            variant,
        }
    }

    pub fn rows(&self) -> &[ProjectRow] {
        &self.rows
    }

    /// Inserts at `index`, or appends when `index` is past the end.
    pub fn insert(&mut self, index: usize, row: ProjectRow) {
        let at = index.min(self.rows.len());
        self.rows.insert(at, row);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Flips the checkbox tagged with `path`. Returns the new state.
    pub fn toggle(&mut self, path: &str) -> Option<bool> {
        if self.variant != ListVariant::Selectable {
            return None;
        }
        let row = self.rows.iter_mut().find(|row| row.path == path)?;
        row.checked = !row.checked;
        Some(row.checked)
    }

    pub fn set_all_checked(&mut self, checked: bool) {
        if self.variant != ListVariant::Selectable {
            return;
        }
        for row in &mut self.rows {
            row.checked = checked;
        }
    }

    pub fn checked_paths(&self) -> Vec<PathBuf> {
        self.rows
            .iter()
            .filter(|row| row.checked)
            .map(|row| PathBuf::from(&row.path))
            .collect()
    }

    pub fn total_size(&self) -> u64 {
        self.rows.iter().map(|row| row.size).sum()
    }
}

impl HubRenderer for ProjectList {
    fn render_hub_event(&mut self, event: &HubEvent) {
        self.insert(event.index, ProjectRow::from_event(event));
    }
}

/// The label next to the "choose root" button.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RootLabel(Option<PathBuf>);

impl RootLabel {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self(root)
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.0.as_ref()
    }

    pub fn set(&mut self, root: PathBuf) {
        self.0 = Some(root);
    }

    pub fn text(&self) -> String {
        match &self.0 {
            Some(path) => path.display().to_string(),
            None => "No root selected".to_string(),
        }
    }
}

/// Every panel of the window, built once at startup.
#[derive(Debug, Default)]
pub struct View {
    pub demo: DemoPanel,
    pub search: SearchPanel,
    pub projects: ProjectList,
    pub root: RootLabel,
}

impl View {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root: RootLabel::new(root),
            ..Self::default()
        }
    }

    /// Panels that draw pushed directory entries.
    fn renderers(&mut self) -> [&mut dyn HubRenderer; 2] {
        [&mut self.projects, &mut self.search]
    }

    pub fn dispatch(&mut self, event: &HubEvent) {
        for renderer in self.renderers() {
            renderer.render_hub_event(event);
        }
    }

    /// Clears the list and shows the spinner. Returns the root to rescan.
    pub fn begin_rescan(&mut self) -> Option<PathBuf> {
        self.projects.clear();
        self.projects.loading = true;
        self.root.path().cloned()
    }

    pub fn finish_rescan(&mut self) {
        self.projects.loading = false;
    }

    /// Applies a picker result; a cancelled pick leaves the label alone.
    pub fn apply_chosen_root(&mut self, choice: Option<PathBuf>) -> bool {
        match choice {
            Some(path) => {
                self.root.set(path);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(index: usize, path: &str, size: u64) -> HubEvent {
        HubEvent {
            index,
            path: path.to_string(),
            size,
            last_build: None,
        }
    }

    #[test]
    fn increasing_indices_keep_arrival_order() {
        let mut view = View::default();
        for (i, path) in ["/a", "/b", "/c", "/d"].iter().enumerate() {
            view.dispatch(&event(i, path, 1));
        }
        let paths: Vec<&str> = view.projects.rows().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/b", "/c", "/d"]);
    }

    #[test]
    fn out_of_range_index_appends() {
        let mut list = ProjectList::default();
        list.render_hub_event(&event(0, "/a", 1));
        list.render_hub_event(&event(17, "/b", 1));
        list.render_hub_event(&event(0, "/c", 1));
        let paths: Vec<&str> = list.rows().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/c", "/a", "/b"]);
    }

    #[test]
    fn rows_carry_formatted_sizes() {
        let row = ProjectRow::from_event(&event(0, "/a", 1_500_000));
        assert_eq!(row.size_label, "1.50MB");
        assert_eq!(row.last_build_str(), "-");
    }

    #[test]
    fn feed_never_exceeds_eight_rows() {
        let mut search = SearchPanel::default();
        for i in 0..9 {
            search.search_input = format!("q{}", i);
            search.update_search(false);
        }
        assert_eq!(search.table.len(), MAX_FEED_ROWS);
        assert_eq!(search.feed.len(), MAX_FEED_ROWS);
        assert_eq!(search.table.iter().next().unwrap()[1], "q1");
        assert_eq!(search.feed.iter().last().unwrap(), "q8");
    }

    #[test]
    fn final_search_marks_done() {
        let mut search = SearchPanel::default();
        search.search_input = "serde".to_string();
        search.update_search(true);
        assert_eq!(search.result_msg, "serde done");
        search.update_search(false);
        assert_eq!(search.result_msg, "serde");
    }

    #[test]
    fn hub_events_reach_the_activity_feed() {
        let mut view = View::default();
        view.dispatch(&event(0, "/work/app", 2_000));
        assert_eq!(view.search.feed.iter().next().unwrap(), "/work/app 2.00KB");
    }

    #[test]
    fn plain_list_has_no_checkboxes() {
        let mut list = ProjectList::new(ListVariant::Plain);
        list.render_hub_event(&event(0, "/a", 1));
        assert_eq!(list.toggle("/a"), None);
        list.set_all_checked(true);
        assert!(list.checked_paths().is_empty());
    }

    #[test]
    fn toggle_flips_only_the_tagged_row() {
        let mut list = ProjectList::default();
        list.render_hub_event(&event(0, "/a", 1));
        list.render_hub_event(&event(1, "/b", 1));
        assert_eq!(list.toggle("/b"), Some(true));
        assert_eq!(list.toggle("/missing"), None);
        assert_eq!(list.checked_paths(), vec![PathBuf::from("/b")]);
        assert_eq!(list.toggle("/b"), Some(false));
        assert!(list.checked_paths().is_empty());
    }

    #[test]
    fn rescan_clears_and_shows_the_spinner() {
        let mut view = View::new(Some(PathBuf::from("/src")));
        view.dispatch(&event(0, "/src/a", 1));
        assert_eq!(view.begin_rescan(), Some(PathBuf::from("/src")));
        assert!(view.projects.rows().is_empty());
        assert!(view.projects.loading);
        view.finish_rescan();
        assert!(!view.projects.loading);
    }

    #[test]
    fn cancelled_pick_keeps_the_label() {
        let mut view = View::new(Some(PathBuf::from("/src")));
        assert!(!view.apply_chosen_root(None));
        assert_eq!(view.root.text(), "/src");
        assert!(view.apply_chosen_root(Some(PathBuf::from("/other"))));
        assert_eq!(view.root.text(), "/other");
    }

    #[test]
    fn demo_meter_follows_the_quote_steps() {
        let mut demo = DemoPanel::default();
        demo.begin_something();
        assert!(demo.busy_open);
        for step in 1..=QUOTE_STEPS {
            demo.append_quote(step, " ...");
        }
        assert_eq!(demo.meter, 4);
        demo.finish_something();
        assert!(!demo.busy_open);
        demo.show_greeting("hi".to_string());
        assert_eq!(demo.meter, 0);
    }
}
