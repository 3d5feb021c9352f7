use indicatif::{ProgressBar, ProgressStyle};

pub fn default_style() -> ProgressStyle {
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        Ok(style) => style.progress_chars("##-"),
        Err(_) => ProgressStyle::default_bar(),
    }
}

/// Progress bar sized for a scan over `total` directory entries.
pub fn scan_progress(total: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(total);
    progress_bar.set_style(default_style());
    progress_bar
}
