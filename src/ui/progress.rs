use crate::migrate::MigrationStats;
use crate::output::is_quiet;
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

fn visible() -> bool {
    console::Term::stdout().is_term() && !is_quiet()
}

/// Progress over the codes of a batch run
pub struct BatchProgress {
    pb: ProgressBar,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        let pb = if visible() {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message("Resolving activities");
        Self { pb }
    }

    pub fn inc(&self, code: &str) {
        self.pb.set_message(format!("Resolving: {}", code));
        self.pb.inc(1);
    }

    /// Print a line above the bar
    pub fn println(&self, line: &str) {
        self.pb.println(line);
    }

    pub fn abandon(&self) {
        self.pb.abandon_with_message("Aborted");
    }

    pub fn finish_with_summary(&self, duration: Duration, processed: usize, stats: &MigrationStats) {
        self.pb.finish_and_clear();
        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success.clone()),
            format!("{} activities in {}", processed, HumanDuration(duration)).style(theme().success.clone())
        );
        println!(
            "  {} {}  {} {}  {} {}  {} {}",
            Icons::LINK.style(theme().info.clone()),
            stats.exact + stats.fuzzy,
            Icons::NEW.style(theme().info.clone()),
            stats.created_records,
            Icons::LEAF.style(theme().info.clone()),
            stats.biosphere_exact + stats.biosphere_fuzzy,
            Icons::CROSS.style(theme().info.clone()),
            stats.not_found
        );
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        if !visible() {
            return Self { pb: ProgressBar::hidden() };
        }
        let pb = ProgressBar::new_spinner();
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    pub fn set_message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }
}
