//! Spinner and progress bar output
//!
//! On a color terminal, spinners and bars are drawn by indicatif on stderr.
//! Plain mode (no color, or stderr is not a terminal) keeps the indicatif
//! state on a hidden draw target and writes one line per update instead,
//! with no escape codes, so logs stay readable.

use super::InitFlag;
use crate::error::EngineResult;
use indicatif::{ProgressDrawTarget, ProgressStyle};
use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
const BAR_TEMPLATE: &str = "{msg:.bold} [{bar:24.green}] {pos}/{len}";
const SPINNER_TICK: Duration = Duration::from_millis(100);

type Output = Arc<Mutex<Box<dyn Write + Send>>>;

fn write_line(out: &Output, line: &str) {
    let mut out = out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

enum Mode {
    Terminal,
    Plain(Output),
    Hidden,
}

/// Creates spinners and bars sharing one output
pub struct ProgressReporter {
    mode: Mode,
    init: InitFlag,
}

impl ProgressReporter {
    /// Report to stderr; drawn only on a terminal with color enabled
    pub fn new(no_color: bool) -> Self {
        if !no_color && std::io::stderr().is_terminal() {
            Self::with_mode(Mode::Terminal)
        } else {
            Self::plain(Box::new(std::io::stderr()))
        }
    }

    /// One line per update to `out`
    pub fn plain(out: Box<dyn Write + Send>) -> Self {
        Self::with_mode(Mode::Plain(Arc::new(Mutex::new(out))))
    }

    /// Track progress without printing anything
    pub fn hidden() -> Self {
        Self::with_mode(Mode::Hidden)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            init: InitFlag::default(),
        }
    }

    pub fn initialize(&self) {
        self.init.set();
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.mode, Mode::Terminal)
    }

    fn plain_output(&self) -> Option<Output> {
        match &self.mode {
            Mode::Plain(out) => Some(Arc::clone(out)),
            Mode::Terminal | Mode::Hidden => None,
        }
    }

    pub fn spinner(&self, message: impl Into<String>) -> EngineResult<Spinner> {
        self.init.check("progress")?;
        let message: String = message.into();
        let bar = if self.is_interactive() {
            let bar = indicatif::ProgressBar::new_spinner();
            bar.set_style(style(SPINNER_TEMPLATE, ProgressStyle::default_spinner));
            bar.enable_steady_tick(SPINNER_TICK);
            bar
        } else {
            indicatif::ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        };
        bar.set_message(message);
        Ok(Spinner {
            bar,
            plain: self.plain_output(),
        })
    }

    pub fn bar(&self, message: impl Into<String>, total: u64) -> EngineResult<ProgressBar> {
        self.init.check("progress")?;
        let message: String = message.into();
        let target = if self.is_interactive() {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = indicatif::ProgressBar::with_draw_target(Some(total), target);
        bar.set_style(style(BAR_TEMPLATE, ProgressStyle::default_bar).progress_chars("#>-"));
        bar.set_message(message);
        Ok(ProgressBar {
            bar,
            plain: self.plain_output(),
        })
    }
}

/// Indeterminate progress
pub struct Spinner {
    bar: indicatif::ProgressBar,
    plain: Option<Output>,
}

impl Spinner {
    pub fn tick(&mut self) {
        self.bar.tick();
        if let Some(out) = &self.plain {
            write_line(out, &format!("... {}", self.bar.message()));
        }
    }

    pub fn finish(self, message: &str) {
        self.bar.finish_with_message(format!("done: {message}"));
        if let Some(out) = &self.plain {
            write_line(out, &format!("done: {message}"));
        }
    }
}

/// Determinate progress over `total` steps
pub struct ProgressBar {
    bar: indicatif::ProgressBar,
    plain: Option<Output>,
}

impl ProgressBar {
    pub fn inc(&mut self, n: u64) {
        self.set(self.position().saturating_add(n));
    }

    /// Position is clamped to the total
    pub fn set(&mut self, position: u64) {
        self.bar.set_position(position.min(self.total()));
        self.render();
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn total(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }

    pub fn finish(self) {
        self.bar.set_position(self.total());
        self.render();
        self.bar.finish();
    }

    /// Stop at the current position, leaving `reason` in place of the bar
    pub fn abandon(self, reason: &str) {
        let line = format!("{}: {reason}", self.bar.message());
        if let Some(out) = &self.plain {
            write_line(out, &format!("[{}/{}] {line}", self.position(), self.total()));
        }
        self.bar.abandon_with_message(line);
    }

    fn render(&self) {
        if let Some(out) = &self.plain {
            write_line(
                out,
                &format!("[{}/{}] {}", self.position(), self.total(), self.bar.message()),
            );
        }
    }
}
