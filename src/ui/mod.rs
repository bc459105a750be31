//! Conversion progress for the command line
//!
//! The model build and the SQLite writer report milestones through [`Ui`]:
//! phase changes, one outcome per derivation step, recovered warnings and
//! rows written per export table. [`UiApp`] draws them full-screen with
//! ratatui, [`ConsoleUi`] prints them as lines.

mod components;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Terminal;
use std::fmt;
use std::io::{self, Stdout};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::ModelWarning;
use crate::model::{StepOutcome, StepStatus};
use components::{StatusPanel, StepPanel, WarningPanel, WritePanel};

/// Stages of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reading,
    Assembling,
    Writing,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Reading => write!(f, "Reading solution archive"),
            Phase::Assembling => write!(f, "Assembling derived tables"),
            Phase::Writing => write!(f, "Writing SQLite database"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

/// Receives the milestones of a conversion
pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    /// Outcome of one derivation step, in build order
    fn step(&mut self, outcome: &StepOutcome);
    fn warning(&mut self, warning: &ModelWarning);
    /// `written` of `total` rows of an export table are committed
    fn rows_written(&mut self, table: &str, written: u64, total: u64);
}

/// One-line summary of a step outcome
pub fn describe_step(outcome: &StepOutcome) -> String {
    match &outcome.status {
        StepStatus::Built { rows } => format!("{}: {} rows", outcome.table, rows),
        StepStatus::Skipped(reason) => format!("{} skipped: {}", outcome.table, reason),
    }
}

/// Full-screen display: phase header, derivation steps next to warnings,
/// and a gauge for the table being written
pub struct UiApp {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    status: StatusPanel,
    steps: StepPanel,
    warnings: WarningPanel,
    writes: WritePanel,
}

impl UiApp {
    /// Enter the alternate screen
    pub fn new(archive: &Path) -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            status: StatusPanel::new(archive.display().to_string()),
            steps: StepPanel::new(),
            warnings: WarningPanel::default(),
            writes: WritePanel::default(),
        })
    }

    fn draw(&mut self) {
        let Self {
            terminal,
            status,
            steps,
            warnings,
            writes,
        } = self;

        let drawn = terminal.draw(|frame| {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(4),
                    Constraint::Min(6),
                    Constraint::Length(3),
                ])
                .split(frame.area());
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
                .split(rows[1]);

            status.render(frame, rows[0]);
            steps.render(frame, body[0]);
            warnings.render(frame, body[1]);
            writes.render(frame, rows[2]);
        });
        if let Err(e) = drawn {
            debug!(error = %e, "redraw failed");
        }
    }

    /// Show the summary and wait for a key; the terminal is restored when
    /// the display is dropped
    pub fn finish(mut self, summary: &str) -> Result<()> {
        self.status.set_phase(Phase::Complete);
        self.status.set_summary(format!("{} (press any key)", summary));
        self.draw();

        loop {
            if event::poll(Duration::from_millis(100))? {
                if let CrosstermEvent::Key(_) = event::read()? {
                    return Ok(());
                }
            }
        }
    }
}

impl Ui for UiApp {
    fn set_phase(&mut self, phase: Phase) {
        self.status.set_phase(phase);
        self.draw();
    }

    fn step(&mut self, outcome: &StepOutcome) {
        self.steps.record(outcome);
        self.draw();
    }

    fn warning(&mut self, warning: &ModelWarning) {
        self.status.add_warning();
        self.warnings.push(warning.to_string());
        self.draw();
    }

    fn rows_written(&mut self, table: &str, written: u64, total: u64) {
        self.writes.update(table, written, total);
        self.draw();
    }
}

impl Drop for UiApp {
    fn drop(&mut self) {
        terminal::disable_raw_mode().ok();
        self.terminal
            .backend_mut()
            .execute(LeaveAlternateScreen)
            .ok();
        self.terminal.show_cursor().ok();
    }
}

/// Discards everything
#[derive(Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn step(&mut self, _outcome: &StepOutcome) {}
    fn warning(&mut self, _warning: &ModelWarning) {}
    fn rows_written(&mut self, _table: &str, _written: u64, _total: u64) {}
}

/// Plain line-oriented output. A table is reported once, when its last
/// row is written.
#[derive(Default)]
pub struct ConsoleUi {
    phase: Option<Phase>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }
}

impl Ui for ConsoleUi {
    fn set_phase(&mut self, phase: Phase) {
        if self.phase != Some(phase) {
            println!("{}...", phase);
            self.phase = Some(phase);
        }
    }

    fn step(&mut self, outcome: &StepOutcome) {
        println!("  {}", describe_step(outcome));
    }

    fn warning(&mut self, warning: &ModelWarning) {
        println!("  warning: {}", warning);
    }

    fn rows_written(&mut self, table: &str, written: u64, total: u64) {
        if written == total {
            println!("  {}: {} rows written", table, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::model::DerivedTable;

    #[test]
    fn test_describe_step() {
        let built = StepOutcome {
            table: DerivedTable::Key,
            status: StepStatus::Built { rows: 12 },
        };
        assert_eq!(describe_step(&built), "key: 12 rows");

        let skipped = StepOutcome {
            table: DerivedTable::Phase1,
            status: StepStatus::Skipped(StepError::MissingRecordType {
                record: "phase_1".into(),
            }),
        };
        assert_eq!(
            describe_step(&skipped),
            "phase_1 skipped: raw record type phase_1 is missing"
        );
    }

    #[test]
    fn test_console_ui_tracks_phase() {
        let mut ui = ConsoleUi::new();
        assert!(ui.phase().is_none());
        ui.set_phase(Phase::Writing);
        ui.set_phase(Phase::Writing);
        assert_eq!(ui.phase(), Some(Phase::Writing));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Assembling.to_string(), "Assembling derived tables");
        assert_eq!(Phase::Complete.to_string(), "Complete");
    }
}
