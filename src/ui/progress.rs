use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::icons::{CHECK, CROSS, ROCKET, RUNNING};
use crate::session::{RunSession, RunStatus, SUGGESTIONS_PLACEHOLDER};

/// Terminal rendering of one run: a spinner carrying the current status,
/// with log messages printed above it as they arrive.
pub struct RunView {
    spinner: ProgressBar,
}

impl RunView {
    pub fn new(repo_url: &str) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style);
        spinner.set_prefix("Sandbox");
        spinner.set_message(format!("Submitting {}", style(repo_url).cyan()));
        spinner.enable_steady_tick(Duration::from_millis(120));

        Self { spinner }
    }

    /// Print above the spinner, falling back to stderr if the terminal is gone.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.spinner.is_hidden() {
            eprintln!("{}", msg.as_ref());
        } else {
            self.spinner.println(msg.as_ref());
        }
    }

    pub fn run_accepted(&self, run_id: &str, session: &RunSession) {
        self.print_line(format!("{}Run {} started", ROCKET, style(run_id).bold()));
        self.spinner.set_message(session.logs_text().to_string());
    }

    pub fn log_message(&self, data: &str, session: &RunSession) {
        for line in data.lines() {
            self.print_line(format!("  {} {}", style("│").dim(), line));
        }
        self.spinner
            .set_message(format!("{}{}", RUNNING, status_label(session.status)));
    }

    /// Stop the spinner and print the final status, summary and suggestions.
    pub fn finish(&self, session: &RunSession) {
        self.spinner.finish_and_clear();

        let icon = match session.status {
            RunStatus::Ready => CHECK,
            RunStatus::NotReady => CROSS,
            RunStatus::Running => RUNNING,
        };
        println!();
        println!("{}Sandbox status: {}", icon, status_label(session.status));
        println!();
        println!("{}", style("AI Summary").bold());
        println!("  {}", session.summary_text());
        println!();
        println!("{}", style("Suggested Fixes").bold());
        match &session.analysis {
            Some(analysis) => {
                for suggestion in &analysis.suggestions {
                    println!("  • {}", suggestion);
                }
            }
            None => println!("  {}", style(SUGGESTIONS_PLACEHOLDER).dim()),
        }
    }

    pub fn fail(&self, message: &str) {
        self.spinner.finish_and_clear();
        eprintln!("{}{}", CROSS, style(message).red());
    }
}

fn status_label(status: RunStatus) -> String {
    let label = status.to_string();
    match status {
        RunStatus::Ready => style(label).green().bold().to_string(),
        RunStatus::NotReady => style(label).red().bold().to_string(),
        RunStatus::Running => style(label).yellow().to_string(),
    }
}
