use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Widget};

use crate::types::Tally;

use super::header::format_duration;
use super::theme::{MUTED_COLOR, NORD0, NORD13, TEXT_COLOR};

/// Shown when the operator quits while pytest is still running.
pub struct ExitModal {
    pub totals: Tally,
    pub elapsed_ms: u64,
}

impl Widget for ExitModal {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let modal_width = 44u16;
        let modal_height = 10u16;

        let x = area.x + area.width.saturating_sub(modal_width) / 2;
        let y = area.y + area.height.saturating_sub(modal_height) / 2;

        let modal_area = Rect::new(
            x,
            y,
            modal_width.min(area.width),
            modal_height.min(area.height),
        );

        Clear.render(modal_area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(NORD13))
            .style(Style::default().bg(NORD0));

        let inner = block.inner(modal_area);
        block.render(modal_area, buf);

        let lines = vec![
            Line::raw(""),
            Line::from(Span::styled(
                "⚠ Confirm Exit",
                Style::default().fg(NORD13).add_modifier(Modifier::BOLD),
            )),
            Line::raw(""),
            Line::from(Span::styled(
                "  Stop the running test session?",
                Style::default().fg(TEXT_COLOR),
            )),
            Line::from(Span::styled(
                format!(
                    "  Results: {} passed, {} failed, {} skipped",
                    self.totals.success, self.totals.fail, self.totals.skip
                ),
                Style::default().fg(MUTED_COLOR),
            )),
            Line::from(Span::styled(
                format!("  Runtime: {}", format_duration(self.elapsed_ms)),
                Style::default().fg(MUTED_COLOR),
            )),
            Line::raw(""),
            Line::from(vec![
                Span::styled("        [Y]es", Style::default().fg(NORD13)),
                Span::styled("    ", Style::default()),
                Span::styled("[N]o", Style::default().fg(TEXT_COLOR)),
            ]),
        ];

        for (i, line) in lines.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}
