use crate::ui::icons::{CHECK, CLOCK, CROSS, GEAR, ROCKET, SKIP, SPARKLE, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Terminal UI for a provisioning run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Step bar — tracks how many steps have finished (skipped or executed)
/// - Activity spinner — live status of the step or readiness poll in flight
///
/// All methods coordinate output via `indicatif`'s `MultiProgress` internally.
pub struct ProvisionUI {
    multi: MultiProgress,
    step_bar: ProgressBar,
    spinner: ProgressBar,
    verbose: bool,
}

impl ProvisionUI {
    /// Create the UI and add both progress bars to the multiplex renderer.
    ///
    /// # Arguments
    /// * `total_steps` — number of steps in the run, sizes the step bar
    /// * `verbose` — when `true`, extra per-step detail lines are printed
    pub fn new(total_steps: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let step_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let step_bar = multi.add(ProgressBar::new(total_steps));
        step_bar.set_style(step_style);
        step_bar.set_prefix("Steps");

        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let spinner = multi.add(ProgressBar::new_spinner());
        spinner.set_style(spinner_style);
        spinner.set_prefix("     ");

        Self {
            multi,
            step_bar,
            spinner,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the
    /// rich UI fails, so critical operator-facing messages are never lost.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Print a full-width separator plus a run title.
    pub fn banner(&self, title: &str) {
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!("{} {}", style("▶").green().bold(), title));
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
    }

    /// Record a step whose probe reported the goal state already satisfied.
    pub fn step_satisfied(&self, name: &str) {
        self.step_bar.inc(1);
        self.print_line(format!(
            "{}{} {}",
            SKIP,
            style(name).yellow(),
            style("— already satisfied").dim()
        ));
    }

    /// Start the spinner for a step whose action is about to run.
    ///
    /// # Arguments
    /// * `name` — step name
    /// * `reason` — why the probe reported unsatisfied
    pub fn step_start(&self, name: &str, reason: &str) {
        self.spinner.set_message(format!(
            "{}{}: {}",
            GEAR,
            style(name).yellow(),
            style(reason).dim()
        ));
        self.spinner.enable_steady_tick(Duration::from_millis(100));
        if self.verbose {
            self.print_line(format!(
                "    {} {} ({})",
                style("→").dim(),
                name,
                style(reason).dim()
            ));
        }
    }

    /// Finish the spinner for a step whose action and verify both passed.
    pub fn step_executed(&self, name: &str) {
        self.spinner.set_message(String::new());
        self.spinner.disable_steady_tick();
        self.step_bar.inc(1);
        self.print_line(format!("{}{}", CHECK, style(name).green()));
    }

    /// Print a step-failure banner; the run is about to abort.
    pub fn step_failed(&self, name: &str, cause: &str) {
        self.spinner.set_message(String::new());
        self.spinner.disable_steady_tick();
        self.print_line(format!(
            "{}{}: {}",
            CROSS,
            style(name).red().bold(),
            cause
        ));
    }

    /// Announce the readiness poll against the server's health endpoint.
    pub fn await_ready_start(&self, url: &str, timeout: Duration) {
        self.print_line(format!(
            "{}Waiting for {} (up to {}s)",
            CLOCK,
            style(url).cyan(),
            timeout.as_secs()
        ));
        self.spinner.enable_steady_tick(Duration::from_millis(100));
    }

    /// Refresh the spinner with poll progress; called once per poll attempt.
    pub fn poll_tick(&self, attempt: u32, elapsed: Duration) {
        let secs = elapsed.as_secs();
        let time_str = if secs >= 60 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}s", secs)
        };
        self.spinner.set_message(format!(
            "health check attempt {} {}",
            style(attempt).cyan(),
            style(format!("({})", time_str)).dim()
        ));
    }

    /// The server answered its health check.
    pub fn ready(&self, attempts: u32) {
        self.spinner.finish_with_message(format!(
            "{}server ready after {} health check(s)",
            ROCKET, attempts
        ));
    }

    /// Polling timed out while the process is still alive — a warning, not a
    /// failure: a large model can outlast the polling window while loading.
    pub fn ready_timeout(&self, log_path: &Path) {
        self.spinner.finish_with_message(String::new());
        self.print_line(format!(
            "{}{}",
            WARN,
            style("server not ready before the timeout; it may still be loading the model").yellow()
        ));
        self.print_line(format!(
            "    watch its progress: tail -f {}",
            style(log_path.display()).cyan()
        ));
    }

    /// The server died before becoming ready; dump the captured log tail.
    pub fn process_died(&self, exit_code: Option<i32>, log_tail: &str) {
        self.spinner.finish_with_message(String::new());
        self.print_line(format!(
            "{}{}",
            CROSS,
            style(format!(
                "server exited before becoming ready (code {})",
                exit_code.map_or("unknown".to_string(), |c| c.to_string())
            ))
            .red()
            .bold()
        ));
        if !log_tail.is_empty() {
            self.print_line(format!("{}", style("─── log tail ───").dim()));
            for line in log_tail.lines() {
                self.print_line(format!("    {}", style(line).dim()));
            }
        }
    }

    /// Print the final summary block with connection instructions.
    pub fn summary(&self, did_work: bool, server_url: &str, webui_url: Option<&str>, log_path: &Path) {
        self.step_bar.finish();
        self.print_line("");
        if did_work {
            self.print_line(format!("{} {}", SPARKLE, style("Rig provisioned.").green().bold()));
        } else {
            self.print_line(format!(
                "{} {}",
                SPARKLE,
                style("Nothing to do — environment already provisioned.").green()
            ));
        }
        self.print_line(format!(
            "  {}  {}/v1/chat/completions",
            style("Completions:").dim(),
            server_url
        ));
        if let Some(url) = webui_url {
            self.print_line(format!("  {}      {}", style("Chat UI:").dim(), url));
        }
        self.print_line(format!(
            "  {}   {}",
            style("Server log:").dim(),
            log_path.display()
        ));
        self.print_line("");
    }
}
