use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Controls how step output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Spinners with a short log tail that collapses on completion.
    Normal,
    /// Like Normal, but log lines stay on screen after the step finishes.
    Verbose,
    /// Spinners only.
    Quiet,
    /// No ANSI, one println per event (stderr/stdout not a TTY).
    Plain,
    /// Nothing at all. Used by tests.
    Silent,
}

impl OutputMode {
    fn draws_bars(self) -> bool {
        matches!(self, OutputMode::Normal | OutputMode::Verbose | OutputMode::Quiet)
    }
}

/// Numbered `[n/m]` steps with spinners and checkmarks.
pub struct StepProgress {
    multi: MultiProgress,
    total_steps: usize,
    current_step: usize,
    mode: OutputMode,
}

struct StepState {
    log_lines: VecDeque<String>,
    done_label: Option<String>,
}

/// Handle given to a running step for log lines and its final label.
pub struct Step {
    bar: ProgressBar,
    state: Arc<Mutex<StepState>>,
    label: String,
    mode: OutputMode,
}

const MAX_LOG_LINES: usize = 8;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("[{prefix}] {spinner:.cyan} {msg}")
        .expect("valid spinner template")
}

fn done_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("[{prefix}] \u{2713} {msg:.green}")
        .expect("valid done template")
}

fn failed_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("[{prefix}] \u{2717} {msg:.red}")
        .expect("valid failed template")
}

fn lock(state: &Mutex<StepState>) -> MutexGuard<'_, StepState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StepProgress {
    pub fn new(total_steps: usize, mode: OutputMode) -> Self {
        let multi = if mode.draws_bars() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self {
            multi,
            total_steps,
            current_step: 0,
            mode,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    fn next_prefix(&mut self) -> String {
        self.current_step += 1;
        format!("{}/{}", self.current_step, self.total_steps)
    }

    /// Run a fallible async task as the next numbered step.
    ///
    /// The bar ends with a checkmark on `Ok` and a cross on `Err`.
    pub async fn run<F, Fut, T, E>(&mut self, label: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(Step) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let prefix = self.next_prefix();

        if self.mode == OutputMode::Plain {
            println!("[{prefix}] {label}");
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style());
        bar.set_prefix(prefix.clone());
        bar.set_message(label.to_string());
        if self.mode.draws_bars() {
            bar.enable_steady_tick(Duration::from_millis(80));
        }

        let state = Arc::new(Mutex::new(StepState {
            log_lines: VecDeque::new(),
            done_label: None,
        }));

        let step = Step {
            bar: bar.clone(),
            state: state.clone(),
            label: label.to_string(),
            mode: self.mode,
        };

        let result = f(step).await;

        let st = lock(&state);
        if self.mode == OutputMode::Verbose {
            for line in &st.log_lines {
                self.multi.println(format!("        {line}")).ok();
            }
        }
        let done_label = st.done_label.clone().unwrap_or_else(|| label.to_string());
        drop(st);

        match &result {
            Ok(_) => {
                if self.mode == OutputMode::Plain {
                    println!("[{prefix}] \u{2713} {done_label}");
                }
                bar.set_style(done_style());
                bar.finish_with_message(done_label);
            }
            Err(_) => {
                if self.mode == OutputMode::Plain {
                    println!("[{prefix}] \u{2717} {label}");
                }
                bar.set_style(failed_style());
                bar.finish_with_message(label.to_string());
            }
        }

        result
    }

    /// Count a step as done without running anything.
    pub fn skip(&mut self, label: &str) {
        let prefix = self.next_prefix();

        match self.mode {
            OutputMode::Plain => println!("[{prefix}] \u{2713} {label} (skipped)"),
            OutputMode::Silent => {}
            _ => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(done_style());
                bar.set_prefix(prefix);
                bar.finish_with_message(format!("{label} (skipped)"));
            }
        }
    }

    /// Indented arrow line between steps.
    pub fn info(&self, text: &str) {
        self.println(&format!("      \u{2192} {text}"));
    }

    /// Final result lines.
    pub fn println(&self, text: &str) {
        match self.mode {
            OutputMode::Silent => {}
            OutputMode::Plain => println!("{text}"),
            _ => {
                self.multi.println(text).ok();
            }
        }
    }
}

impl Step {
    /// Add a log line under the spinner, keeping only the most recent few.
    pub fn log(&self, line: &str) {
        match self.mode {
            OutputMode::Quiet | OutputMode::Silent => {}
            OutputMode::Plain => {
                for sub in line.split('\n') {
                    println!("        {sub}");
                }
            }
            OutputMode::Normal | OutputMode::Verbose => {
                let mut state = lock(&self.state);
                for sub in line.split('\n') {
                    if state.log_lines.len() >= MAX_LOG_LINES {
                        state.log_lines.pop_front();
                    }
                    state.log_lines.push_back(sub.to_string());
                }

                let mut msg = self.label.clone();
                for log_line in &state.log_lines {
                    msg.push_str("\n        ");
                    msg.push_str(log_line);
                }
                self.bar.set_message(msg);
            }
        }
    }

    /// Override the label shown next to the checkmark.
    pub fn set_done_label(&self, label: impl Into<String>) {
        lock(&self.state).done_label = Some(label.into());
    }
}
