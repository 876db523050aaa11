#![cfg_attr(
    all(not(debug_assertions), target_os = "windows", feature = "gui"),
    windows_subsystem = "windows"
)]

fn main() {
    #[cfg(feature = "gui")]
    deoxit::gui::run();

    #[cfg(feature = "cli")]
    deoxit::cli::run();
}
