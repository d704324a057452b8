use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ratatui::text::Line;
use tracing::{debug, warn};

use crate::types::{ResultEvent, Tally, TallyTable};

use super::ansi;
use super::events::DashboardCommand;
use super::file_tree::{FileTree, Selection};

/// Dashboard tabs, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Run,
    Output,
    Log,
    Files,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Run, Tab::Output, Tab::Log, Tab::Files];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Run => "RUN",
            Tab::Output => "OUTPUT",
            Tab::Log => "LOG",
            Tab::Files => "FILES",
        }
    }

    pub fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Option<Tab> {
        Tab::ALL.get(index).copied()
    }

    pub fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn prev(self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Running,
    Exited(Option<i32>),
}

/// Content of the FILES preview pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Empty,
    File { path: PathBuf, content: String },
    Error { path: PathBuf, message: String },
}

/// Vertical scroll position of a text panel.
///
/// While `follow` is set the panel sticks to the last line as text grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scroll {
    offset: usize,
    follow: bool,
}

impl Scroll {
    pub fn following() -> Self {
        Self {
            offset: 0,
            follow: true,
        }
    }

    pub fn top() -> Self {
        Self {
            offset: 0,
            follow: false,
        }
    }

    /// First visible line for `total` lines in a `height`-line viewport.
    pub fn resolve(&self, total: usize, height: usize) -> usize {
        let max = total.saturating_sub(height);
        if self.follow {
            max
        } else {
            self.offset.min(max)
        }
    }

    pub fn up(&mut self, lines: usize, total: usize, height: usize) {
        self.offset = self.resolve(total, height).saturating_sub(lines);
        self.follow = false;
    }

    pub fn down(&mut self, lines: usize, total: usize, height: usize) {
        let max = total.saturating_sub(height);
        self.offset = (self.resolve(total, height) + lines).min(max);
    }

    pub fn home(&mut self) {
        *self = Self::top();
    }

    pub fn end(&mut self) {
        *self = Self::following();
    }
}

/// State owned by the dashboard loop. Producers never touch it directly;
/// everything they report arrives through [`App::apply`].
pub struct App {
    pub scratch_dir: PathBuf,
    pub tally: TallyTable,
    pub files: FileTree,
    pub preview: Preview,
    pub active_tab: Tab,
    pub runner: RunnerStatus,
    pub start_time: Instant,
    pub show_exit_modal: bool,
    pub should_quit: bool,
    /// Height of the tab body, updated after every frame.
    pub viewport_height: u16,
    output: String,
    output_lines: Vec<Line<'static>>,
    log: String,
    log_lines: Vec<Line<'static>>,
    output_scroll: Scroll,
    log_scroll: Scroll,
    preview_lines: Vec<Line<'static>>,
    preview_scroll: Scroll,
}

impl App {
    pub fn new(scratch_dir: PathBuf) -> Self {
        let mut files = FileTree::new(scratch_dir.clone());
        let listed = files.reload(&scratch_dir);
        let mut app = Self {
            files,
            scratch_dir,
            tally: TallyTable::new(),
            preview: Preview::Empty,
            active_tab: Tab::Run,
            runner: RunnerStatus::Running,
            start_time: Instant::now(),
            show_exit_modal: false,
            should_quit: false,
            viewport_height: 0,
            output: String::new(),
            output_lines: Vec::new(),
            log: String::new(),
            log_lines: Vec::new(),
            output_scroll: Scroll::following(),
            log_scroll: Scroll::following(),
            preview_lines: Vec::new(),
            preview_scroll: Scroll::top(),
        };
        if let Err(err) = listed {
            warn!(path = %app.scratch_dir.display(), %err, "failed to list scratch directory");
            app.append_log(&format!("cannot list {}: {err}", app.scratch_dir.display()));
        }
        app
    }

    /// Apply one producer command. The only way producer data reaches the view.
    pub fn apply(&mut self, command: DashboardCommand) {
        match command {
            DashboardCommand::RecordResult { event, ack } => {
                self.record_result(&event);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            DashboardCommand::ReplaceOutput(text) => self.replace_output(text),
            DashboardCommand::AppendLog(line) => self.append_log(&line),
            DashboardCommand::RunnerExited(code) => self.runner_exited(code),
        }
    }

    /// Count one result and surface its artifact path in the file tree.
    pub fn record_result(&mut self, event: &ResultEvent) -> Tally {
        self.append_log(&format!(
            "result {} / {}: {}",
            event.xdist_scope, event.name, event.result
        ));
        let tally = self
            .tally
            .record(&event.xdist_scope, &event.name, event.result);

        if let Some(path) = &event.pubdir_path {
            match self.files.reveal(Path::new(path)) {
                Ok(Some(dir)) => debug!(dir = %dir.display(), "reloaded artifact directory"),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %path, %err, "cannot show artifact");
                    self.append_log(&format!("cannot show artifact {path}: {err}"));
                }
            }
        }
        tally
    }

    /// Show `text` as the whole transcript.
    ///
    /// The runner always sends everything captured so far, so a repeated
    /// text is a no-op and a shorter one can only be stale.
    pub fn replace_output(&mut self, text: String) {
        if text.len() < self.output.len() || text == self.output {
            return;
        }
        self.output_lines = ansi::to_text(&text).lines;
        self.output = text;
    }

    /// Append one line to the diagnostic log.
    pub fn append_log(&mut self, line: &str) {
        let stamped = format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), line);
        debug!(target: "infinity::dashboard", "{line}");
        self.log_lines.extend(ansi::to_text(&stamped).lines);
        self.log.push_str(&stamped);
        self.log.push('\n');
    }

    /// The supervisor already logged the exit status; only the header changes.
    pub fn runner_exited(&mut self, code: Option<i32>) {
        self.runner = RunnerStatus::Exited(code);
    }

    pub fn is_running(&self) -> bool {
        self.runner == RunnerStatus::Running
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    /// Lines of the panel for `tab` that fit in `height`, after scrolling.
    pub fn visible_lines(&self, tab: Tab, height: usize) -> &[Line<'static>] {
        let (lines, scroll) = match tab {
            Tab::Output => (&self.output_lines, &self.output_scroll),
            Tab::Log => (&self.log_lines, &self.log_scroll),
            Tab::Files => (&self.preview_lines, &self.preview_scroll),
            Tab::Run => return &[],
        };
        let start = scroll.resolve(lines.len(), height);
        let end = (start + height).min(lines.len());
        &lines[start..end]
    }

    /// Get the elapsed time since dashboard start in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
    }

    pub fn next_tab(&mut self) {
        self.active_tab = self.active_tab.next();
    }

    pub fn prev_tab(&mut self) {
        self.active_tab = self.active_tab.prev();
    }

    pub fn scroll_up(&mut self, lines: usize) {
        let height = self.body_height();
        if let Some((total, scroll)) = self.active_scroll() {
            scroll.up(lines, total, height);
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let height = self.body_height();
        if let Some((total, scroll)) = self.active_scroll() {
            scroll.down(lines, total, height);
        }
    }

    pub fn scroll_home(&mut self) {
        if let Some((_, scroll)) = self.active_scroll() {
            scroll.home();
        }
    }

    pub fn scroll_end(&mut self) {
        if let Some((_, scroll)) = self.active_scroll() {
            scroll.end();
        }
    }

    pub fn page(&self) -> usize {
        self.body_height().max(1)
    }

    pub fn files_up(&mut self) {
        self.files.cursor_up();
    }

    pub fn files_down(&mut self) {
        self.files.cursor_down();
    }

    /// Toggle the directory or preview the file under the cursor.
    pub fn files_select(&mut self) {
        match self.files.select() {
            Ok(Some(Selection::File(path))) => self.open_preview(&path),
            Ok(Some(Selection::Directory { path, expanded })) => {
                debug!(dir = %path.display(), expanded, "toggled directory");
            }
            Ok(None) => {}
            Err(err) => self.append_log(&format!("cannot list directory: {err}")),
        }
    }

    /// Load a file into the preview pane. Failures are shown in the pane.
    pub fn open_preview(&mut self, path: &Path) {
        self.preview = match read_preview(path) {
            Ok(content) => Preview::File {
                path: path.to_path_buf(),
                content,
            },
            Err(message) => Preview::Error {
                path: path.to_path_buf(),
                message,
            },
        };
        self.preview_lines = match &self.preview {
            Preview::File { content, .. } => ansi::to_text(content).lines,
            Preview::Error { .. } | Preview::Empty => Vec::new(),
        };
        self.preview_scroll = Scroll::top();
    }

    /// Handle 'q' key press.
    pub fn on_quit_key(&mut self) {
        if self.is_running() {
            self.show_exit_modal = true;
        } else {
            self.should_quit = true;
        }
    }

    /// Handle exit confirmation from modal.
    pub fn confirm_exit(&mut self) {
        self.show_exit_modal = false;
        self.should_quit = true;
    }

    /// Cancel exit modal.
    pub fn cancel_exit(&mut self) {
        self.show_exit_modal = false;
    }

    fn body_height(&self) -> usize {
        usize::from(self.viewport_height)
    }

    fn active_scroll(&mut self) -> Option<(usize, &mut Scroll)> {
        match self.active_tab {
            Tab::Output => Some((self.output_lines.len(), &mut self.output_scroll)),
            Tab::Log => Some((self.log_lines.len(), &mut self.log_scroll)),
            Tab::Files => Some((self.preview_lines.len(), &mut self.preview_scroll)),
            Tab::Run => None,
        }
    }
}

fn read_preview(path: &Path) -> Result<String, String> {
    let bytes = fs::read(path).map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    String::from_utf8(bytes)
        .map_err(|_| format!("{} is not a text file", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::tui::events::{EventHandler, TuiEvent};
    use crate::types::TestOutcome;

    fn make_app() -> (tempfile::TempDir, App) {
        let tmp = tempfile::tempdir().unwrap();
        let app = App::new(tmp.path().to_path_buf());
        (tmp, app)
    }

    #[test]
    fn test_unlistable_scratch_dir_is_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("removed");
        let app = App::new(missing.clone());

        assert!(app.log().contains(&format!("cannot list {}", missing.display())));
        assert_eq!(app.files.visible().len(), 1);
    }

    #[test]
    fn test_record_result_success_then_fail() {
        let (_tmp, mut app) = make_app();
        app.record_result(&ResultEvent::new("test_a", "android", TestOutcome::from_wire("success")));
        app.record_result(&ResultEvent::new("test_a", "android", TestOutcome::from_wire("fail")));

        assert_eq!(app.tally.get("android", "test_a"), Some(&Tally::new(1, 1, 0)));
        assert!(app.log().contains("result android / test_a: fail"));
    }

    #[test]
    fn test_concurrent_producers_are_applied_one_at_a_time() {
        let (_tmp, mut app) = make_app();
        let events = EventHandler::new();

        let producers: Vec<_> = (0..50)
            .map(|i| {
                let handle = events.handle();
                std::thread::spawn(move || {
                    let outcome = if i < 30 {
                        TestOutcome::Success
                    } else {
                        TestOutcome::Fail
                    };
                    handle.record_result_blocking(ResultEvent::new("test_a", "android", outcome));
                })
            })
            .collect();

        while app.tally.totals().total() < 50 {
            match events.next(Duration::from_secs(5)) {
                Some(TuiEvent::Command(command)) => app.apply(command),
                Some(_) => {}
                None => panic!("producers stalled"),
            }
        }
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(app.tally.get("android", "test_a"), Some(&Tally::new(30, 20, 0)));
    }

    #[test]
    fn test_replace_output_is_idempotent_and_monotonic() {
        let (_tmp, mut app) = make_app();
        app.replace_output("A".to_string());
        app.replace_output("AB".to_string());
        app.replace_output("AB".to_string());
        assert_eq!(app.output(), "AB");

        app.replace_output("A".to_string());
        assert_eq!(app.output(), "AB");

        app.replace_output("AB\nC".to_string());
        assert_eq!(app.output(), "AB\nC");
        assert_eq!(app.visible_lines(Tab::Output, 10).len(), 2);
    }

    #[test]
    fn test_apply_acks_recorded_result() {
        let (_tmp, mut app) = make_app();
        let (ack, mut applied) = tokio::sync::oneshot::channel();
        app.apply(DashboardCommand::RecordResult {
            event: ResultEvent::new("test_d", "ios", TestOutcome::Skip),
            ack: Some(ack),
        });
        assert!(applied.try_recv().is_ok());
        assert_eq!(app.tally.get("ios", "test_d"), Some(&Tally::new(0, 0, 1)));
    }

    #[test]
    fn test_artifact_path_reloads_file_tree() {
        let (tmp, mut app) = make_app();
        let artifact = tmp.path().join("test_b").join("stdout.log");
        fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        fs::write(&artifact, "log").unwrap();

        app.record_result(
            &ResultEvent::new("test_b", "ios", TestOutcome::Fail)
                .with_artifact(artifact.to_string_lossy()),
        );
        assert!(app.files.contains(&tmp.path().join("test_b")));
    }

    #[test]
    fn test_artifact_outside_scratch_dir_is_logged() {
        let (_tmp, mut app) = make_app();
        app.record_result(
            &ResultEvent::new("test_b", "ios", TestOutcome::Success)
                .with_artifact("/nowhere/near/scratch.log"),
        );
        assert_eq!(app.tally.get("ios", "test_b"), Some(&Tally::new(1, 0, 0)));
        assert!(app.log().contains("cannot show artifact /nowhere/near/scratch.log"));
    }

    #[test]
    fn test_runner_exit_updates_status() {
        let (_tmp, mut app) = make_app();
        assert!(app.is_running());
        app.apply(DashboardCommand::RunnerExited(Some(1)));
        assert_eq!(app.runner, RunnerStatus::Exited(Some(1)));
        assert!(!app.is_running());
    }

    #[test]
    fn test_quit_asks_for_confirmation_while_running() {
        let (_tmp, mut app) = make_app();
        app.on_quit_key();
        assert!(app.show_exit_modal);
        assert!(!app.should_quit);
        app.cancel_exit();
        assert!(!app.show_exit_modal);

        app.on_quit_key();
        app.confirm_exit();
        assert!(app.should_quit);

        let (_tmp, mut app) = make_app();
        app.runner_exited(Some(0));
        app.on_quit_key();
        assert!(app.should_quit);
        assert!(!app.show_exit_modal);
    }

    #[test]
    fn test_preview_reports_unreadable_files_inline() {
        let (tmp, mut app) = make_app();
        let binary = tmp.path().join("blob.bin");
        fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();
        app.open_preview(&binary);
        assert!(matches!(&app.preview, Preview::Error { message, .. } if message.contains("not a text file")));

        app.open_preview(&tmp.path().join("missing.txt"));
        assert!(matches!(&app.preview, Preview::Error { message, .. } if message.contains("cannot read")));

        let text = tmp.path().join("out.txt");
        fs::write(&text, "\u{1b}[31mred\u{1b}[0m\nplain\n").unwrap();
        app.open_preview(&text);
        assert!(matches!(&app.preview, Preview::File { content, .. } if content.contains("plain")));
        assert_eq!(app.visible_lines(Tab::Files, 10).len(), 2);
    }

    #[test]
    fn test_files_select_opens_preview() {
        let (tmp, mut app) = make_app();
        fs::write(tmp.path().join("report.txt"), "summary").unwrap();
        app.files.reload(tmp.path()).unwrap();

        app.files_down();
        app.files_select();
        assert_eq!(
            app.preview,
            Preview::File {
                path: tmp.path().join("report.txt"),
                content: "summary".to_string()
            }
        );
    }

    #[test]
    fn test_scroll_follows_tail_until_scrolled_up() {
        let (_tmp, mut app) = make_app();
        app.viewport_height = 3;
        app.select_tab(Tab::Output);
        let text: String = (1..=10).map(|i| format!("line {i}\n")).collect();
        app.replace_output(text);

        let plain = |app: &App| -> Vec<String> {
            app.visible_lines(Tab::Output, 3)
                .iter()
                .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
                .collect()
        };
        assert_eq!(plain(&app), ["line 8", "line 9", "line 10"]);

        app.scroll_up(2);
        assert_eq!(plain(&app), ["line 6", "line 7", "line 8"]);

        // New output does not yank the view while scrolled up.
        app.replace_output((1..=12).map(|i| format!("line {i}\n")).collect());
        assert_eq!(plain(&app), ["line 6", "line 7", "line 8"]);

        app.scroll_home();
        assert_eq!(plain(&app)[0], "line 1");
        app.scroll_end();
        assert_eq!(plain(&app), ["line 10", "line 11", "line 12"]);
    }

    #[test]
    fn test_tab_cycling() {
        assert_eq!(Tab::Run.next(), Tab::Output);
        assert_eq!(Tab::Files.next(), Tab::Run);
        assert_eq!(Tab::Run.prev(), Tab::Files);
        assert_eq!(Tab::from_index(2), Some(Tab::Log));
        assert_eq!(Tab::from_index(7), None);
    }
}
