use crate::backend::{DirectoryPicker, LocalBackend};
use crate::config::Settings;
use crate::controller::{binding_for, report_failure, Action, Controller};
use crate::core;
use crate::error::{Error, Result};
use crate::event::EventHub;
use crate::logging;
use crate::size::format_size;
use crate::view::{BoundedRows, ListVariant, ProjectRow, View, QUOTE_STEPS};
use async_trait::async_trait;
use clap::Parser;
use gpui::{
    div, prelude::*, px, size, App, Application, Bounds, ClickEvent, Context, Div, FlexDirection,
    FocusHandle, Focusable, KeyDownEvent, Overflow, Render, SharedString, Stateful, Window,
    WindowBounds, WindowOptions,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(author, version, about = "Find Cargo build directories and clean them", long_about = None)]
struct Args {
    /// Root shown in the label at startup.
    #[arg(long = "root", value_name = "PATH")]
    root: Option<PathBuf>,
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Native folder dialog.
struct RfdPicker;

#[async_trait]
impl DirectoryPicker for RfdPicker {
    async fn pick_directory(&self, start: Option<&Path>) -> Option<PathBuf> {
        let mut dialog = rfd::AsyncFileDialog::new().set_title("Choose a root directory");
        if let Some(start) = start {
            dialog = dialog.set_directory(start);
        }
        dialog
            .pick_folder()
            .await
            .map(|handle| handle.path().to_path_buf())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InputField {
    Greet,
    Search,
}

type GuiController = Controller<LocalBackend, RfdPicker>;

struct DeoxitView {
    controller: GuiController,
    runtime: Arc<Runtime>,
    focus_handle: FocusHandle,
    active_input: InputField,
}

impl DeoxitView {
    fn new(settings: &Settings, runtime: Arc<Runtime>, cx: &mut Context<Self>) -> Self {
        let hub = EventHub::new();
        let events = hub.subscribe();
        let backend = Arc::new(LocalBackend::new(hub, settings));
        let view = View::new(settings.initial_root());
        let controller = Controller::new(view, backend, RfdPicker, events);

        cx.spawn(async move |this, cx| loop {
            cx.background_executor().timer(EVENT_POLL_INTERVAL).await;
            let alive = this.update(cx, |this, cx| {
                if this.controller.pump_events() > 0 {
                    cx.notify();
                }
            });
            if alive.is_err() {
                break;
            }
        })
        .detach();

        Self {
            controller,
            runtime,
            focus_handle: cx.focus_handle(),
            active_input: InputField::Greet,
        }
    }

    fn view(&self) -> &View {
        &self.controller.view
    }

    fn view_mut(&mut self) -> &mut View {
        &mut self.controller.view
    }

    fn run_action(&mut self, action: Action, cx: &mut Context<Self>) {
        tracing::debug!(?action, "action");
        let handled = {
            let _guard = self.runtime.enter();
            self.controller.apply_immediate(&action)
        };
        if handled {
            cx.notify();
            return;
        }
        match action {
            Action::Greet => self.greet(cx),
            Action::Something => self.something(cx),
            Action::UpdateRootPath => self.update_root_path(cx),
            Action::ChooseRootPath => self.choose_root_path(cx),
            _ => {}
        }
    }

    fn greet(&mut self, cx: &mut Context<Self>) {
        let call = self.runtime.spawn(self.controller.start_greet());
        cx.spawn(async move |this, cx| match settle(call.await) {
            Ok(message) => {
                this.update(cx, move |this, cx| {
                    this.controller.finish_greet(message);
                    cx.notify();
                })
                .ok();
            }
            Err(err) => report_failure(&Action::Greet, &err),
        })
        .detach();
    }

    fn something(&mut self, cx: &mut Context<Self>) {
        self.controller.begin_something();
        cx.notify();

        cx.spawn(async move |this, cx| {
            for step in 1..=QUOTE_STEPS {
                let spawned =
                    this.update(cx, |this, _| this.runtime.spawn(this.controller.start_quote()));
                let Ok(call) = spawned else {
                    return;
                };
                let quote = match settle(call.await) {
                    Ok(quote) => quote,
                    Err(err) => {
                        report_failure(&Action::Something, &err);
                        return;
                    }
                };
                let updated = this.update(cx, move |this, cx| {
                    this.controller.apply_quote(step, &quote);
                    cx.notify();
                });
                if updated.is_err() {
                    return;
                }
            }
            this.update(cx, |this, cx| {
                this.controller.finish_something();
                cx.notify();
            })
            .ok();
        })
        .detach();
    }

    fn update_root_path(&mut self, cx: &mut Context<Self>) {
        let call = self.runtime.spawn(self.controller.start_update_root_path());
        cx.notify();

        cx.spawn(async move |this, cx| match settle(call.await) {
            Ok(()) => {
                this.update(cx, |this, cx| {
                    this.controller.finish_update_root_path();
                    cx.notify();
                })
                .ok();
            }
            Err(err) => report_failure(&Action::UpdateRootPath, &err),
        })
        .detach();
    }

    fn choose_root_path(&mut self, cx: &mut Context<Self>) {
        let pick = self.controller.start_choose_root_path();
        cx.spawn(async move |this, cx| {
            let choice = pick.await;
            this.update(cx, move |this, cx| {
                if this.controller.finish_choose_root_path(choice) {
                    cx.notify();
                }
            })
            .ok();
        })
        .detach();
    }

    fn handle_key(&mut self, event: &KeyDownEvent, cx: &mut Context<Self>) {
        let key = event.keystroke.key.to_lowercase();
        let field = self.active_input;
        match key.as_str() {
            "enter" => match field {
                InputField::Greet => self.run_action(Action::Greet, cx),
                InputField::Search => {
                    self.run_action(Action::UpdateSearch { final_query: true }, cx)
                }
            },
            "backspace" => {
                self.input_mut(field).pop();
                self.after_edit(field, cx);
            }
            _ => {
                let typed = match &event.keystroke.key_char {
                    Some(text) => text.clone(),
                    None => return,
                };
                if typed.chars().any(char::is_control) {
                    return;
                }
                self.input_mut(field).push_str(&typed);
                self.after_edit(field, cx);
            }
        }
    }

    fn input_mut(&mut self, field: InputField) -> &mut String {
        match field {
            InputField::Greet => &mut self.view_mut().demo.greet_input,
            InputField::Search => &mut self.view_mut().search.search_input,
        }
    }

    fn after_edit(&mut self, field: InputField, cx: &mut Context<Self>) {
        if field == InputField::Search {
            self.run_action(Action::UpdateSearch { final_query: false }, cx);
        }
        cx.notify();
    }

    fn bound_button(
        &self,
        element_id: &'static str,
        label: &str,
        enabled: bool,
        cx: &mut Context<Self>,
    ) -> Stateful<Div> {
        let mut button = div()
            .id(element_id)
            .px_4()
            .py_2()
            .rounded_md()
            .border_1()
            .border_color(gpui::rgb(0x1D4ED8))
            .text_color(gpui::white());

        match binding_for(element_id) {
            Some(action) if enabled => {
                button = button
                    .bg(gpui::rgb(0x2563EB))
                    .cursor_pointer()
                    .on_click(cx.listener(move |this, _event: &ClickEvent, _, cx| {
                        this.run_action(action.clone(), cx);
                    }));
            }
            _ => {
                button = button
                    .bg(gpui::rgb(0x93C5FD))
                    .text_color(gpui::rgb(0x1E3A8A))
                    .opacity(0.75);
            }
        }

        button.child(label.to_string())
    }

    fn text_input(
        &self,
        id: &'static str,
        field: InputField,
        value: &str,
        placeholder: &str,
        cx: &mut Context<Self>,
    ) -> Stateful<Div> {
        let active = self.active_input == field;
        let (border, text) = if value.is_empty() {
            (gpui::rgb(0xD1D5DB), placeholder.to_string())
        } else {
            (gpui::rgb(0x9CA3AF), value.to_string())
        };

        div()
            .id(id)
            .px_3()
            .py_2()
            .min_w(px(220.0))
            .rounded_md()
            .border_1()
            .border_color(if active { gpui::rgb(0x2563EB) } else { border })
            .bg(gpui::rgb(0xFFFFFF))
            .text_sm()
            .text_color(if value.is_empty() {
                gpui::rgb(0x9CA3AF)
            } else {
                gpui::rgb(0x111827)
            })
            .cursor_pointer()
            .child(if active { format!("{}|", text) } else { text })
            .on_click(cx.listener(move |this, _event: &ClickEvent, window, cx| {
                this.active_input = field;
                this.focus_handle.focus(window);
                cx.notify();
            }))
    }

    fn panel(id: &'static str) -> Stateful<Div> {
        div()
            .id(id)
            .flex()
            .flex_col()
            .gap_3()
            .bg(gpui::rgb(0xFFFFFF))
            .border_1()
            .border_color(gpui::rgb(0xE5E7EB))
            .rounded_md()
            .p_4()
    }

    fn caption(text: impl Into<SharedString>) -> Div {
        div()
            .text_sm()
            .text_color(gpui::rgb(0x4B5563))
            .child(text.into())
    }

    fn render_demo_panel(&self, cx: &mut Context<Self>) -> Stateful<Div> {
        let demo = &self.view().demo;
        let mut block = Self::panel("demo-panel").child(div().text_lg().child("Greeting"));

        block = block.child(
            div()
                .flex()
                .gap_3()
                .items_center()
                .child(self.text_input(
                    "greet-input",
                    InputField::Greet,
                    &demo.greet_input,
                    "Enter a name...",
                    cx,
                ))
                .child(self.bound_button("greet-button", "Greet", true, cx)),
        );
        if !demo.greet_msg.is_empty() {
            block = block.child(
                div()
                    .id("greet-msg")
                    .text_sm()
                    .text_color(gpui::rgb(0x1F2937))
                    .child(demo.greet_msg.clone()),
            );
        }

        block = block.child(
            div()
                .flex()
                .gap_3()
                .items_center()
                .child(self.bound_button("something-button", "Do something", true, cx))
                .child(Self::meter("something-meter", demo.meter, QUOTE_STEPS + 1)),
        );
        if !demo.something_msg.is_empty() {
            block = block.child(Self::caption(demo.something_msg.clone()));
        }
        if demo.busy_open {
            block = block.child(Self::busy_dialog());
        }

        block
    }

    fn meter(id: &'static str, value: u32, max: u32) -> Stateful<Div> {
        let filled = value.min(max);
        let mut bar = div().id(id).flex().gap_1();
        for step in 0..max {
            let color = if step < filled {
                gpui::rgb(0x2563EB)
            } else {
                gpui::rgb(0xE5E7EB)
            };
            bar = bar.child(div().w(px(18.0)).h(px(8.0)).rounded_sm().bg(color));
        }
        bar
    }

    fn busy_dialog() -> Stateful<Div> {
        div()
            .id("busy-dialog")
            .bg(gpui::rgb(0xE0F2FE))
            .border_1()
            .border_color(gpui::rgb(0x7DD3FC))
            .rounded_md()
            .p_3()
            .text_sm()
            .text_color(gpui::rgb(0x0C4A6E))
            .child("Working...")
    }

    fn render_search_panel(&self, cx: &mut Context<Self>) -> Stateful<Div> {
        let search = &self.view().search;
        let mut block = Self::panel("search-panel").child(div().text_lg().child("Search"));

        block = block.child(
            div()
                .flex()
                .gap_3()
                .items_center()
                .child(self.text_input(
                    "search-input",
                    InputField::Search,
                    &search.search_input,
                    "Type to search...",
                    cx,
                ))
                .child(self.bound_button("search-button", "Search", true, cx))
                .child(self.bound_button("search-final-button", "Done", true, cx)),
        );

        if !search.result_msg.is_empty() {
            block = block.child(
                div()
                    .id("search-result-msg")
                    .text_sm()
                    .text_color(gpui::rgb(0x1F2937))
                    .child(search.result_msg.clone()),
            );
        }

        let mut table = div().id("search-result-table").flex().flex_col().gap_1();
        for [count, query] in search.table.iter() {
            table = table.child(
                div()
                    .flex()
                    .gap_3()
                    .text_sm()
                    .child(
                        div()
                            .w(px(24.0))
                            .text_color(gpui::rgb(0x6B7280))
                            .child(count.clone()),
                    )
                    .child(query.clone()),
            );
        }
        block = block.child(table);
        block.child(Self::render_feed(&search.feed))
    }

    fn render_feed(feed: &BoundedRows<String>) -> Stateful<Div> {
        let mut list = div()
            .id("list-outer")
            .flex()
            .flex_col()
            .gap_1()
            .p_2()
            .bg(gpui::rgb(0xF9FAFB))
            .rounded_md();
        if feed.is_empty() {
            return list.child(Self::caption("No activity yet."));
        }
        for line in feed.iter() {
            list = list.child(Self::caption(line.clone()));
        }
        list
    }

    fn render_project_panel(&self, cx: &mut Context<Self>) -> Stateful<Div> {
        let view = self.view();
        let projects = &view.projects;
        let mut block = Self::panel("projects-panel");

        {
            let style = block.style();
            style.flex_grow = Some(1.0);
            style.min_size.height = Some(px(0.0).into());
        }

        block = block.child(div().text_lg().child("Cargo projects"));
        block = block.child(
            div()
                .flex()
                .gap_3()
                .items_center()
                .flex_wrap()
                .child(self.bound_button("choose-root-button", "Choose root", true, cx))
                .child(self.bound_button("update-root-button", "Rescan", true, cx))
                .child(
                    div()
                        .id("root-path")
                        .text_sm()
                        .text_color(gpui::rgb(0x1F2937))
                        .child(view.root.text()),
                ),
        );

        if projects.loading {
            block = block.child(
                div()
                    .id("load-spinner")
                    .text_sm()
                    .text_color(gpui::rgb(0x1D4ED8))
                    .child("Scanning in progress..."),
            );
        }

        let rows = projects.rows();
        let checked = projects.checked_paths().len();
        if rows.is_empty() {
            if !projects.loading {
                block = block.child(Self::caption(
                    "No build directories listed. Choose a root and press Rescan.",
                ));
            }
        } else {
            block = block.child(Self::caption(format!(
                "{} project(s), approx {} reclaimable in target directories. {} selected.",
                rows.len(),
                format_size(projects.total_size()),
                checked
            )));
        }

        let mut scroll_area = div().id("projects-list").flex().flex_col().gap_2();
        {
            let style = scroll_area.style();
            style.flex_grow = Some(1.0);
            style.min_size.height = Some(px(0.0).into());
            style.overflow.y = Some(Overflow::Scroll);
            style.overflow.x = Some(Overflow::Hidden);
            style.scrollbar_width = Some(px(10.0).into());
        }
        for (index, row) in rows.iter().enumerate() {
            scroll_area = scroll_area.child(self.project_row(index, row, projects.variant, cx));
        }
        block = block.child(scroll_area);

        if projects.variant == ListVariant::Selectable {
            block = block.child(self.bound_button(
                "clean-button",
                "Clean selected",
                checked > 0,
                cx,
            ));
        }

        block
    }

    fn project_row(
        &self,
        index: usize,
        row: &ProjectRow,
        variant: ListVariant,
        cx: &mut Context<Self>,
    ) -> Stateful<Div> {
        let (background_hex, accent_hex) = Self::size_palette(row.size);

        let mut item = div()
            .id(SharedString::from(format!("project-{}", index)))
            .flex()
            .gap_3()
            .items_center()
            .bg(gpui::rgb(background_hex))
            .border_1()
            .border_color(gpui::rgb(0xE5E7EB))
            .rounded_lg()
            .px_4()
            .py_2();

        if variant == ListVariant::Selectable {
            let path = row.path.clone();
            let indicator = if row.checked { "[x]" } else { "[ ]" };
            item = item.child(
                div()
                    .id(SharedString::from(format!("project-{}-checkbox", index)))
                    .cursor_pointer()
                    .border_1()
                    .border_color(gpui::rgb(0x9CA3AF))
                    .rounded_sm()
                    .px_2()
                    .child(indicator)
                    .on_click(cx.listener(move |this, _event: &ClickEvent, _, cx| {
                        this.run_action(Action::ToggleEntry(path.clone()), cx);
                    })),
            );
        }

        item.child(
            div()
                .flex()
                .flex_col()
                .flex_grow()
                .child(
                    div()
                        .text_sm()
                        .text_color(gpui::rgb(0x1F2937))
                        .child(row.path.clone()),
                )
                .child(Self::caption(format!("Last build: {}", row.last_build_str()))),
        )
        .child(
            div()
                .text_sm()
                .text_color(gpui::rgb(accent_hex))
                .child(row.size_label.clone()),
        )
    }

    fn size_palette(bytes: u64) -> (u32, u32) {
        if bytes >= 10_000_000_000 {
            (0xFEE2E2, 0x991B1B)
        } else if bytes >= 1_000_000_000 {
            (0xFEF3C7, 0x92400E)
        } else if bytes >= 1_000_000 {
            (0xDBEAFE, 0x1D4ED8)
        } else {
            (0xDCFCE7, 0x047857)
        }
    }
}

/// Unwraps a backend call that ran on the runtime.
fn settle<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.map_err(Error::from)?
}

impl Focusable for DeoxitView {
    fn focus_handle(&self, _cx: &App) -> FocusHandle {
        self.focus_handle.clone()
    }
}

impl Render for DeoxitView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let mut side = div().flex().flex_col().gap_4();
        {
            let style = side.style();
            style.size.width = Some(px(380.0).into());
            style.flex_shrink = Some(0.0);
        }
        side = side.child(
            Self::panel("header")
                .child(
                    div()
                        .text_lg()
                        .child(format!("Deoxit {}", env!("CARGO_PKG_VERSION"))),
                )
                .child(Self::caption(
                    "Find Cargo build directories under a root and clean the ones you pick.",
                )),
        );
        side = side.child(self.render_demo_panel(cx));
        side = side.child(self.render_search_panel(cx));

        let mut layout = div().id("main-layout").size_full().flex().gap_4().p_4();
        {
            let style = layout.style();
            style.flex_grow = Some(1.0);
            style.min_size.height = Some(px(0.0).into());
            style.flex_direction = Some(FlexDirection::Row);
        }
        layout = layout.child(side);
        layout = layout.child(self.render_project_panel(cx));

        div()
            .size_full()
            .bg(gpui::rgb(0xF3F4F6))
            .track_focus(&self.focus_handle)
            .on_key_down(cx.listener(|this, event: &KeyDownEvent, _, cx| {
                this.handle_key(event, cx);
            }))
            .child(layout)
    }
}

pub fn run() {
    let args = Args::parse();
    let loaded = match &args.config {
        Some(path) => Settings::from_path(&core::expand_path(path)),
        None => Settings::load(),
    };
    let mut settings = match loaded {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    };
    if let Some(root) = &args.root {
        settings.root = Some(core::expand_path(root));
    }
    logging::init(&settings.log_filter);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => Arc::new(runtime),
        Err(err) => {
            eprintln!("Error: unable to start async runtime: {}", err);
            process::exit(1);
        }
    };

    Application::new().run(move |cx: &mut App| {
        let bounds = Bounds::centered(None, size(px(1100.0), px(720.0)), cx);
        cx.open_window(
            WindowOptions {
                window_bounds: Some(WindowBounds::Windowed(bounds)),
                ..Default::default()
            },
            |window, cx| {
                let view = cx.new(|cx| DeoxitView::new(&settings, runtime, cx));
                view.read(cx).focus_handle.focus(window);
                view
            },
        )
        .expect("failed to open window");
        cx.on_window_closed(|_app| {
            process::exit(0);
        })
        .detach();
        cx.activate(true);
    });
}
