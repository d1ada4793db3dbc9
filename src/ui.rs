use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    #[default]
    Auto,
    Plain,
    Pretty,
}

/// Stage reporting on stderr, numbered as `[n/total]`.
#[derive(Debug)]
pub struct Ui {
    pretty: bool,
    total: usize,
    current: Cell<usize>,
}

impl Ui {
    /// `quiet_tty` is true when pretty output should be avoided even on a
    /// terminal, e.g. because stdout is piped somewhere.
    pub fn new(mode: UiMode, is_tty: bool, quiet_tty: bool, total: usize) -> Self {
        let pretty = is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => !quiet_tty,
                UiMode::Plain => false,
            };
        Self {
            pretty,
            total,
            current: Cell::new(0),
        }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        let n = self.current.get() + 1;
        self.current.set(n);
        let label = format!("[{}/{}] {}", n, self.total.max(n), name);

        if self.pretty {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{label}…"));
            StageGuard::new(label, Some(spinner))
        } else {
            eprintln!("==> {}", label);
            StageGuard::new(label, None)
        }
    }
}

pub struct StageGuard {
    label: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    detail: RefCell<Option<String>>,
}

impl StageGuard {
    fn new(label: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            label,
            start: Instant::now(),
            spinner,
            detail: RefCell::new(None),
        }
    }

    /// Short outcome shown after the stage completes.
    pub fn detail(&self, detail: impl Into<String>) {
        *self.detail.borrow_mut() = Some(detail.into());
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let mut message = format!("✔ {} ({})", self.label, format_duration(elapsed));
        if let Some(detail) = self.detail.borrow().as_deref() {
            message.push_str(": ");
            message.push_str(detail);
        }
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
