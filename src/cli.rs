use crate::backend::{FixedPicker, LocalBackend};
use crate::config::Settings;
use crate::controller::Controller;
use crate::core;
use crate::event::EventHub;
use crate::logging;
use crate::size::format_size;
use crate::view::{ProjectRow, View};
use clap::Parser;
use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub fn run() {
    if let Err(err) = real_main() {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

type Result<T> = std::result::Result<T, String>;

type CliController = Controller<LocalBackend, FixedPicker>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Find Cargo build directories and clean them (CLI)", long_about = None)]
struct Args {
    /// Root to scan; defaults to the configured root or the home directory.
    #[arg(value_name = "ROOT")]
    root: Option<PathBuf>,
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
    /// 1-based entries to clean, e.g. `1,3,4`.
    #[arg(short = 's', long = "select", value_name = "LIST", value_delimiter = ',')]
    select: Vec<usize>,
    #[arg(short = 'a', long = "all")]
    all: bool,
    #[arg(short = 'y', long = "yes")]
    yes: bool,
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[arg(long = "no-color")]
    no_color: bool,
}

fn real_main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args)?;
    logging::init(&settings.log_filter);
    let styler = TerminalStyler::new(args.no_color);

    let root = match &args.root {
        Some(root) => core::expand_path(root),
        None => settings
            .initial_root()
            .ok_or_else(|| "Unable to determine a root directory to scan.".to_string())?,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Unable to start async runtime: {}", e))?;

    let hub = EventHub::new();
    let backend = Arc::new(LocalBackend::new(hub.clone(), &settings));
    let events = hub.subscribe();
    let mut controller = Controller::new(
        View::new(None),
        backend,
        FixedPicker::new(Some(root.clone())),
        events,
    );
    runtime.block_on(controller.choose_root_path());

    let handle = runtime.handle().clone();
    let mut controller = run_with_spinner(
        &format!("Scanning {}", root.display()),
        &styler,
        move |reporter| {
            handle.block_on(async move {
                let mut progress = hub.subscribe();
                let watcher = tokio::spawn(async move {
                    while let Some(event) = progress.recv().await {
                        reporter.update(format!("Found {}", event.path));
                    }
                });
                let outcome = controller.update_root_path().await;
                watcher.abort();
                outcome.map_err(|e| e.to_string())?;
                Ok::<_, String>(controller)
            })
        },
    )?;

    let rows = controller.view.projects.rows();
    if rows.is_empty() {
        println!(
            "{}",
            styler.warning("No Cargo build directories were found.")
        );
        return Ok(());
    }

    print_cli_report(rows, &styler);

    apply_selection(&mut controller, &args)?;
    let selected = controller.view.projects.checked_paths();
    if selected.is_empty() {
        println!(
            "{}",
            styler.dim("Nothing selected. Pass --select or --all to clean.")
        );
        return Ok(());
    }

    if args.dry_run {
        println!("{}", styler.dim("Dry-run: these projects would be cleaned:"));
        for path in &selected {
            println!("- {}", path.display());
        }
        return Ok(());
    }

    if !args.yes && !confirm_cleanup(selected.len(), &styler)? {
        println!("Cleanup aborted.");
        return Ok(());
    }

    let handles = controller.cargo_clean();
    let total = handles.len();
    let outcomes = runtime.block_on(async {
        let mut outcomes = Vec::with_capacity(total);
        for (index, (handle, path)) in handles.into_iter().zip(&selected).enumerate() {
            let outcome = handle.await.unwrap_or_else(|err| Err(err.into()));
            render_cleanup_progress(index, total, path, outcome.is_ok(), &styler);
            outcomes.push((path.clone(), outcome));
        }
        outcomes
    });
    if styler.supports_animation {
        println!();
    }

    report_cleanup(outcomes, &styler)
}

/// Prints the summary of a clean run. Any failure turns into an error.
fn report_cleanup(
    outcomes: Vec<(PathBuf, crate::Result<()>)>,
    styler: &TerminalStyler,
) -> Result<()> {
    let failures: Vec<(PathBuf, String)> = outcomes
        .iter()
        .filter_map(|(path, outcome)| {
            outcome
                .as_ref()
                .err()
                .map(|err| (path.clone(), err.to_string()))
        })
        .collect();

    println!(
        "{}",
        styler.success(&format!(
            "Cleaned {} of {} project(s).",
            outcomes.len() - failures.len(),
            outcomes.len()
        ))
    );

    if !failures.is_empty() {
        println!("{}", styler.error("Failed to clean the following projects:"));
        for (path, reason) in &failures {
            println!("- {}: {}", path.display(), reason);
        }
        return Err("One or more projects could not be cleaned.".to_string());
    }

    Ok(())
}

fn load_settings(args: &Args) -> Result<Settings> {
    let loaded = match &args.config {
        Some(path) => Settings::from_path(&core::expand_path(path)),
        None => Settings::load(),
    };
    loaded.map_err(|e| e.to_string())
}

fn apply_selection(controller: &mut CliController, args: &Args) -> Result<()> {
    if args.all {
        controller.view.projects.set_all_checked(true);
        return Ok(());
    }

    let paths: Vec<String> = controller
        .view
        .projects
        .rows()
        .iter()
        .map(|row| row.path.clone())
        .collect();
    for number in &args.select {
        let path = number
            .checked_sub(1)
            .and_then(|index| paths.get(index))
            .ok_or_else(|| format!("No entry numbered {} (1-{}).", number, paths.len()))?;
        controller.view.projects.toggle(path);
    }
    Ok(())
}

struct TerminalStyler {
    use_color: bool,
    supports_animation: bool,
}

impl TerminalStyler {
    const RESET: &'static str = "\u{1b}[0m";
    const BOLD: &'static str = "\u{1b}[1m";
    const DIM: &'static str = "\u{1b}[2m";
    const RED: &'static str = "\u{1b}[31m";
    const GREEN: &'static str = "\u{1b}[32m";
    const YELLOW: &'static str = "\u{1b}[33m";
    const BLUE: &'static str = "\u{1b}[34m";
    const CYAN: &'static str = "\u{1b}[36m";

    fn new(no_color: bool) -> Self {
        let stdout_terminal = io::stdout().is_terminal();
        let env_no_color = env::var_os("NO_COLOR").is_some();
        let use_color = !no_color && stdout_terminal && !env_no_color;
        let supports_animation = stdout_terminal;
        Self {
            use_color,
            supports_animation,
        }
    }

    fn format(&self, text: &str, codes: &[&str]) -> String {
        if !self.use_color || codes.is_empty() {
            return text.to_string();
        }
        let mut out = String::new();
        for code in codes {
            out.push_str(code);
        }
        out.push_str(text);
        out.push_str(Self::RESET);
        out
    }

    fn bold(&self, text: &str) -> String {
        self.format(text, &[Self::BOLD])
    }

    fn dim(&self, text: &str) -> String {
        self.format(text, &[Self::DIM])
    }

    fn success(&self, text: &str) -> String {
        self.format(text, &[Self::GREEN])
    }

    fn error(&self, text: &str) -> String {
        self.format(text, &[Self::RED, Self::BOLD])
    }

    fn warning(&self, text: &str) -> String {
        self.format(text, &[Self::YELLOW])
    }

    fn blue(&self, text: &str) -> String {
        self.format(text, &[Self::BLUE])
    }

    fn accent(&self, text: &str) -> String {
        self.format(text, &[Self::CYAN])
    }
}

/// Sends spinner text to the UI thread.
struct StatusReporter {
    tx: Option<mpsc::Sender<String>>,
}

impl StatusReporter {
    fn update(&self, text: impl AsRef<str>) {
        match &self.tx {
            Some(tx) => {
                let _ = tx.send(text.as_ref().to_string());
            }
            None => println!("{}", text.as_ref()),
        }
    }
}

fn run_with_spinner<T, F>(message: &str, styler: &TerminalStyler, func: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(StatusReporter) -> Result<T> + Send + 'static,
{
    if !styler.supports_animation {
        println!("{}...", message);
        let result = func(StatusReporter { tx: None })?;
        println!("{} done", message);
        return Ok(result);
    }

    let (status_tx, status_rx) = mpsc::channel::<String>();
    let (result_tx, result_rx) = mpsc::channel::<Result<T>>();

    thread::spawn(move || {
        let outcome = func(StatusReporter { tx: Some(status_tx) });
        let _ = result_tx.send(outcome);
    });

    let mut current = message.to_string();
    let frames = ["|", "/", "-", "\\"];
    let mut frame_index = 0usize;
    let mut prev_len = 0usize;

    loop {
        while let Ok(update) = status_rx.try_recv() {
            current = update;
        }

        match result_rx.try_recv() {
            Ok(result) => {
                finish_spinner_line(message, prev_len);
                return result;
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                finish_spinner_line(message, prev_len);
                return Err("Background task ended unexpectedly.".to_string());
            }
        }

        let frame = frames[frame_index % frames.len()];
        frame_index += 1;
        let text = format!("{} {}", frame, truncate_middle(&current, 80));
        let padding = " ".repeat(prev_len.saturating_sub(text.chars().count()));
        print!("\r{}{}", text, padding);
        let _ = io::stdout().flush();
        prev_len = text.chars().count();
        thread::sleep(Duration::from_millis(100));
    }
}

fn finish_spinner_line(message: &str, prev_len: usize) {
    let final_text = format!("{} done", message);
    let padding = " ".repeat(prev_len.saturating_sub(final_text.chars().count()));
    print!("\r{}{}\n", final_text, padding);
    let _ = io::stdout().flush();
}

fn truncate_middle(text: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }
    if max_len == 1 {
        return "…".to_string();
    }
    let head_len = (max_len - 1) / 2;
    let tail_len = max_len - 1 - head_len;
    let mut result = String::new();
    result.extend(chars.iter().take(head_len));
    result.push('…');
    result.extend(chars.iter().skip(chars.len() - tail_len));
    result
}

fn print_cli_report(rows: &[ProjectRow], styler: &TerminalStyler) {
    let headers = [
        styler.bold("#"),
        styler.bold("Size"),
        styler.bold("Last Build"),
        styler.bold("Path"),
    ];
    println!("{}", headers.join(" "));

    let size_width = rows
        .iter()
        .map(|row| row.size_label.len())
        .max()
        .unwrap_or(6);

    for (idx, row) in rows.iter().enumerate() {
        let size_plain = format!("{:>width$}", row.size_label, width = size_width);
        let size_colored = colorize_size(row.size, &size_plain, styler);
        let index_label = styler.dim(&format!("[{:02}]", idx + 1));
        let last_build = styler.dim(&format!("{:<16}", row.last_build_str()));
        println!(
            "{} {} {} {}",
            index_label,
            size_colored,
            last_build,
            styler.accent(&row.path)
        );
    }

    let total: u64 = rows.iter().map(|row| row.size).sum();
    println!(
        "{}",
        styler.bold(&format!("Reclaimable space: {}", format_size(total)))
    );
}

fn render_cleanup_progress(
    index: usize,
    total: usize,
    path: &std::path::Path,
    succeeded: bool,
    styler: &TerminalStyler,
) {
    if styler.supports_animation {
        let bar = render_progress_bar(index + 1, total, 28);
        let label = styler.bold(&format!("[{}]", bar));
        print!(
            "\rCleaning {} {}/{} {}",
            label,
            index + 1,
            total,
            truncate_middle(&path.display().to_string(), 48)
        );
        let _ = io::stdout().flush();
    } else {
        let verb = if succeeded { "Cleaned" } else { "Failed" };
        println!("{} {}/{}: {}", verb, index + 1, total, path.display());
    }
}

fn render_progress_bar(position: usize, total: usize, width: usize) -> String {
    if total == 0 || width == 0 {
        return String::new();
    }
    let filled = (position * width).div_ceil(total);
    let filled = filled.min(width);
    let mut bar = String::new();
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width - filled));
    bar
}

fn confirm_cleanup(count: usize, styler: &TerminalStyler) -> Result<bool> {
    print!(
        "{}",
        styler.bold(&format!(
            "Run `cargo clean` in {} project(s)? Type yes to proceed [yes/N]: ",
            count
        ))
    );
    let _ = io::stdout().flush();
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(_) => Ok(input.trim().eq_ignore_ascii_case("yes")),
        Err(err) => Err(format!("Failed to read input: {}", err)),
    }
}

fn colorize_size(size_bytes: u64, text: &str, styler: &TerminalStyler) -> String {
    if size_bytes >= 1_000_000_000 {
        styler.warning(text)
    } else if size_bytes >= 1_000_000 {
        styler.blue(text)
    } else if size_bytes >= 1_000 {
        styler.success(text)
    } else {
        styler.dim(text)
    }
}
