//! Panels of the full-screen display

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;

use super::Phase;
use crate::model::{DerivedTable, StepOutcome, StepStatus};

const MAX_WARNINGS: usize = 200;

/// Header: phase, archive path, warning count and the final summary
pub struct StatusPanel {
    phase: Phase,
    archive: String,
    summary: Option<String>,
    warnings: usize,
}

impl StatusPanel {
    pub fn new(archive: String) -> Self {
        Self {
            phase: Phase::Reading,
            archive,
            summary: None,
            warnings: 0,
        }
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn set_summary(&mut self, summary: String) {
        self.summary = Some(summary);
    }

    pub fn add_warning(&mut self) {
        self.warnings += 1;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let color = match self.phase {
            Phase::Complete if self.warnings > 0 => Color::Yellow,
            Phase::Complete => Color::Green,
            _ => Color::Cyan,
        };
        let phase_style = Style::default().fg(color).add_modifier(Modifier::BOLD);

        let mut header = vec![Span::styled(format!(" {}", self.phase), phase_style)];
        if self.warnings > 0 {
            header.push(Span::styled(
                format!("  ({} warnings)", self.warnings),
                Style::default().fg(Color::Yellow),
            ));
        }

        let detail = self.summary.as_deref().unwrap_or(&self.archive);
        let lines = vec![
            Line::from(header),
            Line::from(Span::styled(format!(" {}", detail), Style::default().fg(Color::Gray))),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" PLEXOS Solution to SQLite ")
            .border_style(Style::default().fg(Color::Blue));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum StepState {
    Pending,
    Built(usize),
    Skipped(String),
}

/// Every derived table in build order with what became of it
pub struct StepPanel {
    steps: Vec<(DerivedTable, StepState)>,
}

impl StepPanel {
    pub fn new() -> Self {
        Self {
            steps: DerivedTable::ALL
                .into_iter()
                .map(|t| (t, StepState::Pending))
                .collect(),
        }
    }

    pub fn record(&mut self, outcome: &StepOutcome) {
        let state = match &outcome.status {
            StepStatus::Built { rows } => StepState::Built(*rows),
            StepStatus::Skipped(reason) => StepState::Skipped(reason.to_string()),
        };
        if let Some(entry) = self.steps.iter_mut().find(|(t, _)| *t == outcome.table) {
            entry.1 = state;
        }
    }

    fn lines(&self) -> Vec<(Color, String)> {
        self.steps
            .iter()
            .map(|(table, state)| match state {
                StepState::Pending => (Color::DarkGray, format!("· {}", table)),
                StepState::Built(rows) => (Color::Green, format!("✓ {:<11} {:>8} rows", table.name(), rows)),
                StepState::Skipped(reason) => (Color::Yellow, format!("✗ {:<11} {}", table.name(), reason)),
            })
            .collect()
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .lines()
            .into_iter()
            .map(|(color, line)| ListItem::new(Span::styled(line, Style::default().fg(color))))
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Derived tables ")
            .border_style(Style::default().fg(Color::Blue));
        frame.render_widget(List::new(items).block(block), area);
    }
}

/// Most recent recovered warnings
#[derive(Default)]
pub struct WarningPanel {
    entries: Vec<String>,
}

impl WarningPanel {
    pub fn push(&mut self, warning: String) {
        self.entries.push(warning);
        if self.entries.len() > MAX_WARNINGS {
            self.entries.remove(0);
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let visible = area.height.saturating_sub(2) as usize;
        let start = self.entries.len().saturating_sub(visible);
        let items: Vec<ListItem> = self.entries[start..]
            .iter()
            .map(|w| ListItem::new(Span::styled(format!(" {}", w), Style::default().fg(Color::Yellow))))
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Warnings ")
            .border_style(Style::default().fg(Color::Blue));
        frame.render_widget(List::new(items).block(block), area);
    }
}

/// Gauge for the export table being written, plus totals so far
#[derive(Default)]
pub struct WritePanel {
    current: Option<(String, u64, u64)>,
    tables_done: usize,
    rows_done: u64,
}

impl WritePanel {
    pub fn update(&mut self, table: &str, written: u64, total: u64) {
        if written == total {
            self.tables_done += 1;
            self.rows_done += total;
        }
        self.current = Some((table.to_string(), written, total));
    }

    fn label(&self) -> Option<(f64, String)> {
        let (table, written, total) = self.current.as_ref()?;
        let ratio = if *total == 0 {
            1.0
        } else {
            *written as f64 / *total as f64
        };
        Some((
            ratio.min(1.0),
            format!(
                "{}: {}/{} rows  ({} tables, {} rows done)",
                table, written, total, self.tables_done, self.rows_done
            ),
        ))
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue));

        match self.label() {
            Some((ratio, label)) => {
                let gauge = Gauge::default()
                    .block(block)
                    .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
                    .ratio(ratio)
                    .label(label);
                frame.render_widget(gauge, area);
            }
            None => frame.render_widget(Paragraph::new("").block(block), area),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;

    #[test]
    fn test_step_panel_follows_build_report() {
        let mut panel = StepPanel::new();
        assert_eq!(panel.lines().len(), DerivedTable::ALL.len());
        assert_eq!(panel.lines()[0], (Color::DarkGray, "· class".to_string()));

        panel.record(&StepOutcome {
            table: DerivedTable::Class,
            status: StepStatus::Built { rows: 3 },
        });
        panel.record(&StepOutcome {
            table: DerivedTable::Phase1,
            status: StepStatus::Skipped(StepError::MissingRecordType {
                record: "phase_1".into(),
            }),
        });

        let lines = panel.lines();
        assert_eq!(lines[0].0, Color::Green);
        assert!(lines[0].1.ends_with("3 rows"));
        assert_eq!(lines[7].0, Color::Yellow);
        assert!(lines[7].1.contains("raw record type phase_1 is missing"));
        assert_eq!(lines[1].0, Color::DarkGray);
    }

    #[test]
    fn test_write_panel_counts_finished_tables() {
        let mut panel = WritePanel::default();
        assert!(panel.label().is_none());

        panel.update("key", 1000, 1500);
        panel.update("key", 1500, 1500);
        panel.update("band", 0, 0);

        assert_eq!(panel.tables_done, 2);
        assert_eq!(panel.rows_done, 1500);
        let (ratio, label) = panel.label().unwrap();
        assert_eq!(ratio, 1.0);
        assert!(label.starts_with("band: 0/0 rows"));
    }
}
