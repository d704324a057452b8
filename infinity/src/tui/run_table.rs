use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget};

use crate::types::{Tally, TallyTable, TestOutcome};

use super::theme::{outcome_color, BORDER_COLOR, HEADER_COLOR, MUTED_COLOR, TEXT_COLOR};

/// Render one cell: `[success] [fail]`, plus `[skip]` once anything skipped.
pub fn format_tally(tally: &Tally) -> Line<'static> {
    let count = |outcome: TestOutcome, n: u64| {
        let color = if n > 0 { outcome_color(outcome) } else { MUTED_COLOR };
        Span::styled(format!("[{n}]"), Style::default().fg(color))
    };

    let mut spans = vec![
        count(TestOutcome::Success, tally.success),
        Span::raw(" "),
        count(TestOutcome::Fail, tally.fail),
    ];
    if tally.skip > 0 {
        spans.push(Span::raw(" "));
        spans.push(count(TestOutcome::Skip, tally.skip));
    }
    Line::from(spans)
}

/// The RUN tab: one row per xdist group, one column per test.
pub struct RunTable<'a> {
    pub table: &'a TallyTable,
}

impl Widget for RunTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BORDER_COLOR))
            .title(Span::styled(" Results ", Style::default().fg(HEADER_COLOR)));

        if self.table.is_empty() {
            Paragraph::new(Line::styled(
                "Waiting for results...",
                Style::default().fg(MUTED_COLOR),
            ))
            .block(block)
            .render(area, buf);
            return;
        }

        let tests = self.table.tests();
        let groups = self.table.groups();

        let mut widths = vec![Constraint::Length(column_width(
            groups.iter().map(|g| g.chars().count()),
            "group".len(),
        ))];
        let rows: Vec<Row> = groups
            .iter()
            .map(|group| {
                let mut cells = vec![Cell::from(Span::styled(
                    group.clone(),
                    Style::default().fg(TEXT_COLOR),
                ))];
                cells.extend(tests.iter().map(|test| {
                    let tally = self.table.get(group, test).copied().unwrap_or_default();
                    Cell::from(format_tally(&tally))
                }));
                Row::new(cells)
            })
            .collect();

        for test in tests {
            let widest_cell = groups
                .iter()
                .filter_map(|group| self.table.get(group, test))
                .map(|tally| format_tally(tally).width());
            widths.push(Constraint::Length(column_width(
                widest_cell,
                test.chars().count(),
            )));
        }

        let header = Row::new(
            std::iter::once("group".to_string())
                .chain(tests.iter().cloned())
                .map(Cell::from),
        )
        .style(
            Style::default()
                .fg(HEADER_COLOR)
                .add_modifier(Modifier::BOLD),
        );

        Table::new(rows, widths)
            .header(header)
            .column_spacing(2)
            .block(block)
            .render(area, buf);
    }
}

fn column_width(cells: impl Iterator<Item = usize>, title: usize) -> u16 {
    let widest = cells.fold(title, usize::max);
    u16::try_from(widest).unwrap_or(u16::MAX)
}
