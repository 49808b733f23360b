//! Progress indicators for long imports

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner counting rows read for one import
///
/// Hidden unless `enabled`, so library callers and tests draw nothing.
pub fn import_spinner(table: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg} {human_pos} rows ({per_sec})")
    {
        pb.set_style(style);
    }
    pb.set_message(format!("Importing {}", table));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
