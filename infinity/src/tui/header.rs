use std::path::Path;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::types::{Tally, TestOutcome};

use super::app::RunnerStatus;
use super::theme::{outcome_color, HEADER_COLOR, MUTED_COLOR, NORD11, NORD14, TEXT_COLOR};

pub struct Header<'a> {
    pub scratch_dir: &'a Path,
    pub elapsed_ms: u64,
    pub runner: RunnerStatus,
    pub totals: Tally,
}

impl Widget for Header<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let separator = || Span::styled(" | ", Style::default().fg(MUTED_COLOR));

        let runner = match self.runner {
            RunnerStatus::Running => Span::styled("running", Style::default().fg(NORD14)),
            RunnerStatus::Exited(Some(0)) => Span::styled("exited 0", Style::default().fg(TEXT_COLOR)),
            RunnerStatus::Exited(Some(code)) => {
                Span::styled(format!("exited {code}"), Style::default().fg(NORD11))
            }
            RunnerStatus::Exited(None) => Span::styled("killed", Style::default().fg(NORD11)),
        };

        let title = Line::from(vec![
            Span::styled(
                "∞ infinity",
                Style::default().fg(HEADER_COLOR).add_modifier(Modifier::BOLD),
            ),
            separator(),
            Span::styled(
                format!("Runtime: {}", format_duration(self.elapsed_ms)),
                Style::default().fg(TEXT_COLOR),
            ),
            separator(),
            runner,
            separator(),
            Span::styled(
                format!("{} passed", self.totals.success),
                Style::default().fg(outcome_color(TestOutcome::Success)),
            ),
            Span::styled(", ", Style::default().fg(MUTED_COLOR)),
            Span::styled(
                format!("{} failed", self.totals.fail),
                Style::default().fg(outcome_color(TestOutcome::Fail)),
            ),
            Span::styled(", ", Style::default().fg(MUTED_COLOR)),
            Span::styled(
                format!("{} skipped", self.totals.skip),
                Style::default().fg(outcome_color(TestOutcome::Skip)),
            ),
        ]);
        buf.set_line(area.x + 1, area.y, &title, area.width.saturating_sub(1));

        if area.height > 1 {
            let dir = Line::from(vec![
                Span::styled("Test directory: ", Style::default().fg(MUTED_COLOR)),
                Span::styled(
                    self.scratch_dir.display().to_string(),
                    Style::default().fg(TEXT_COLOR),
                ),
            ]);
            buf.set_line(area.x + 1, area.y + 1, &dir, area.width.saturating_sub(1));
        }
    }
}

/// Format a duration in milliseconds to a human-readable string.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Header height: status line + directory line
pub const HEADER_HEIGHT: u16 = 2;
