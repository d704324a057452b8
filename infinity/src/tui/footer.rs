use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use super::app::Tab;
use super::theme::{HEADER_COLOR, MUTED_COLOR};

/// Key hints for the active tab.
pub struct Footer {
    pub tab: Tab,
}

impl Footer {
    fn hints(&self) -> &'static [(&'static str, &'static str)] {
        match self.tab {
            Tab::Run => &[("q", "quit"), ("tab", "next tab"), ("1-4", "jump")],
            Tab::Output | Tab::Log => &[
                ("q", "quit"),
                ("tab", "next tab"),
                ("↑↓/PgUp/PgDn", "scroll"),
                ("home/end", "top/follow"),
            ],
            Tab::Files => &[
                ("q", "quit"),
                ("tab", "next tab"),
                ("↑↓", "move"),
                ("enter", "open"),
                ("PgUp/PgDn", "scroll preview"),
            ],
        }
    }
}

impl Widget for Footer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let hints = self.hints();
        let mut spans = Vec::with_capacity(hints.len() * 3);
        for (i, (key, action)) in hints.iter().enumerate() {
            spans.push(Span::styled(*key, Style::default().fg(HEADER_COLOR)));
            spans.push(Span::styled(format!(" {action}"), Style::default().fg(MUTED_COLOR)));
            if i < hints.len() - 1 {
                spans.push(Span::raw("  "));
            }
        }

        let line = Line::from(spans);
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(1));
    }
}

/// Footer widget height
pub const FOOTER_HEIGHT: u16 = 1;
