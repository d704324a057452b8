use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use ratatui::{Frame, Terminal};
use tracing::warn;

use super::app::{App, Preview, Tab};
use super::events::{EventHandler, TuiEvent};
use super::exit_modal::ExitModal;
use super::footer::{Footer, FOOTER_HEIGHT};
use super::header::{Header, HEADER_HEIGHT};
use super::run_table::RunTable;
use super::theme::{
    BORDER_COLOR, HEADER_COLOR, MUTED_COLOR, NORD0, NORD11, SELECTED_BG, TEXT_COLOR,
};

/// How long the loop waits for an event before redrawing anyway.
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Queued events applied between two redraws, so a burst of results cannot
/// starve the screen.
const MAX_EVENTS_PER_FRAME: usize = 256;

const TABS_HEIGHT: u16 = 1;

/// Raw mode plus alternate screen for as long as the value lives.
pub struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err);
        }
        let session = Self {
            terminal: Terminal::new(CrosstermBackend::new(stdout))?,
        };
        Ok(session)
    }

    pub fn terminal(&mut self) -> &mut Terminal<CrosstermBackend<Stdout>> {
        &mut self.terminal
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(err) = disable_raw_mode() {
            warn!(%err, "failed to leave raw mode");
        }
        if let Err(err) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen) {
            warn!(%err, "failed to leave alternate screen");
        }
        let _ = self.terminal.show_cursor();
    }
}

/// Run the dashboard until the operator quits or `shutdown` is raised.
///
/// This loop is the only place `App` is mutated once producers are running.
pub fn run_dashboard<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &EventHandler,
    shutdown: &AtomicBool,
) -> io::Result<()> {
    terminal.clear()?;

    loop {
        let completed = terminal.draw(|frame| render_dashboard(frame, app))?;
        app.viewport_height = body_height(completed.area);

        if app.should_quit || shutdown.load(Ordering::Acquire) {
            break;
        }

        if let Some(event) = events.next(FRAME_INTERVAL) {
            handle_event(app, event);
            for _ in 1..MAX_EVENTS_PER_FRAME {
                match events.try_next() {
                    Some(event) => handle_event(app, event),
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn handle_event(app: &mut App, event: TuiEvent) {
    match event {
        TuiEvent::Key(key) => handle_key_event(app, key),
        TuiEvent::Command(command) => app.apply(command),
        // Redraw only, for the elapsed time.
        TuiEvent::Tick => {}
    }
}

pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Handle exit modal first
    if app.show_exit_modal {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.confirm_exit();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.cancel_exit();
            }
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.on_quit_key(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.on_quit_key();
        }
        KeyCode::Tab => app.next_tab(),
        KeyCode::BackTab => app.prev_tab(),
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            if let Some(tab) = Tab::from_index(index) {
                app.select_tab(tab);
            }
        }
        _ if app.active_tab == Tab::Files => handle_files_key(app, key),
        _ => handle_scroll_key(app, key),
    }
}

fn handle_files_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up => app.files_up(),
        KeyCode::Down => app.files_down(),
        KeyCode::Enter | KeyCode::Char(' ') => app.files_select(),
        // The preview pane scrolls with the page keys.
        _ => handle_scroll_key(app, key),
    }
}

fn handle_scroll_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(app.page()),
        KeyCode::PageDown => app.scroll_down(app.page()),
        KeyCode::Home => app.scroll_home(),
        KeyCode::End => app.scroll_end(),
        _ => {}
    }
}

struct Areas {
    header: Rect,
    tabs: Rect,
    body: Rect,
    footer: Rect,
}

fn split(area: Rect) -> Areas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Length(TABS_HEIGHT),
            Constraint::Min(3),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(area);
    Areas {
        header: chunks[0],
        tabs: chunks[1],
        body: chunks[2],
        footer: chunks[3],
    }
}

/// Lines of text that fit inside the bordered body panel.
fn body_height(area: Rect) -> u16 {
    split(area).body.height.saturating_sub(2)
}

fn panel(title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_COLOR))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(HEADER_COLOR),
        ))
}

pub fn render_dashboard(frame: &mut Frame, app: &App) {
    let size = frame.area();

    let bg_block = Block::default().style(Style::default().bg(NORD0));
    frame.render_widget(bg_block, size);

    let areas = split(size);

    let header = Header {
        scratch_dir: &app.scratch_dir,
        elapsed_ms: app.elapsed_ms(),
        runner: app.runner,
        totals: app.tally.totals(),
    };
    frame.render_widget(header, areas.header);

    let titles = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, tab)| format!("{} {}", i + 1, tab.title()));
    let tabs = Tabs::new(titles)
        .select(app.active_tab.index())
        .style(Style::default().fg(MUTED_COLOR))
        .highlight_style(
            Style::default()
                .fg(HEADER_COLOR)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, areas.tabs);

    let text_height = usize::from(areas.body.height.saturating_sub(2));
    match app.active_tab {
        Tab::Run => frame.render_widget(RunTable { table: &app.tally }, areas.body),
        Tab::Output => {
            let lines = app.visible_lines(Tab::Output, text_height).to_vec();
            frame.render_widget(Paragraph::new(lines).block(panel("Output")), areas.body);
        }
        Tab::Log => {
            let lines = app.visible_lines(Tab::Log, text_height).to_vec();
            frame.render_widget(Paragraph::new(lines).block(panel("Log")), areas.body);
        }
        Tab::Files => render_files(frame, app, areas.body, text_height),
    }

    frame.render_widget(Footer { tab: app.active_tab }, areas.footer);

    // Render exit modal on top (last, so it overlays everything)
    if app.show_exit_modal {
        let modal = ExitModal {
            totals: app.tally.totals(),
            elapsed_ms: app.elapsed_ms(),
        };
        frame.render_widget(modal, size);
    }
}

fn render_files(frame: &mut Frame, app: &App, area: Rect, text_height: usize) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    let rows = app.files.visible();
    let cursor = app.files.cursor();
    let first = cursor.saturating_sub(text_height.saturating_sub(1));
    let tree: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(first)
        .take(text_height)
        .map(|(i, row)| {
            let marker = match (row.node.is_dir, row.node.expanded) {
                (true, true) => "▾ ",
                (true, false) => "▸ ",
                (false, _) => "  ",
            };
            let mut style = Style::default().fg(if row.node.is_dir {
                HEADER_COLOR
            } else {
                TEXT_COLOR
            });
            if i == cursor {
                style = style.bg(SELECTED_BG).add_modifier(Modifier::BOLD);
            }
            Line::styled(
                format!("{}{}{}", "  ".repeat(row.depth), marker, row.node.name),
                style,
            )
        })
        .collect();
    frame.render_widget(Paragraph::new(tree).block(panel("Files")), chunks[0]);

    match &app.preview {
        Preview::Empty => {
            let hint = Line::styled("Select a file to preview it", Style::default().fg(MUTED_COLOR));
            frame.render_widget(Paragraph::new(hint).block(panel("Preview")), chunks[1]);
        }
        Preview::File { path, .. } => {
            let title = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let lines = app.visible_lines(Tab::Files, text_height).to_vec();
            frame.render_widget(Paragraph::new(lines).block(panel(&title)), chunks[1]);
        }
        Preview::Error { message, .. } => {
            let error = Line::styled(message.clone(), Style::default().fg(NORD11));
            frame.render_widget(Paragraph::new(error).block(panel("Preview")), chunks[1]);
        }
    }
}
