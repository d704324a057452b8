use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tokio::sync::oneshot;

use crate::types::ResultEvent;

/// Work submitted by a producer for the dashboard loop to apply.
#[derive(Debug)]
pub enum DashboardCommand {
    /// A test finished. `ack` fires once the tally has been updated.
    RecordResult {
        event: ResultEvent,
        ack: Option<oneshot::Sender<()>>,
    },
    /// The full transcript captured from the runner so far.
    ReplaceOutput(String),
    /// One line for the diagnostic log.
    AppendLog(String),
    /// The runner process was reaped.
    RunnerExited(Option<i32>),
}

/// Events that the TUI event loop processes.
#[derive(Debug)]
pub enum TuiEvent {
    /// Keyboard input event
    Key(KeyEvent),
    /// Producer request
    Command(DashboardCommand),
    /// 1-second tick for elapsed time updates
    Tick,
}

/// Producer side of the dashboard queue.
///
/// Cloned into the supervisor's reader thread and every HTTP handler. Sends
/// never block; once the dashboard loop is gone they are silently dropped.
#[derive(Debug, Clone)]
pub struct DashboardHandle {
    tx: mpsc::Sender<TuiEvent>,
}

impl DashboardHandle {
    /// Submit a result and wait until the dashboard has applied it.
    pub async fn record_result(&self, event: ResultEvent) {
        let (ack, applied) = oneshot::channel();
        if self.send(DashboardCommand::RecordResult {
            event,
            ack: Some(ack),
        }) {
            // Err means the loop dropped the command during shutdown.
            let _ = applied.await;
        }
    }

    /// Blocking variant of [`record_result`](Self::record_result) for plain threads.
    /// Must not be called from inside an async context.
    #[cfg(test)]
    pub fn record_result_blocking(&self, event: ResultEvent) {
        let (ack, applied) = oneshot::channel();
        if self.send(DashboardCommand::RecordResult {
            event,
            ack: Some(ack),
        }) {
            let _ = applied.blocking_recv();
        }
    }

    pub fn replace_output(&self, text: impl Into<String>) {
        self.send(DashboardCommand::ReplaceOutput(text.into()));
    }

    pub fn log(&self, line: impl Into<String>) {
        self.send(DashboardCommand::AppendLog(line.into()));
    }

    pub fn runner_exited(&self, code: Option<i32>) {
        self.send(DashboardCommand::RunnerExited(code));
    }

    fn send(&self, command: DashboardCommand) -> bool {
        self.tx.send(TuiEvent::Command(command)).is_ok()
    }
}

/// Owns the one receiver every producer feeds: keyboard, tick timer and
/// [`DashboardHandle`] clones.
pub struct EventHandler {
    tx: mpsc::Sender<TuiEvent>,
    rx: mpsc::Receiver<TuiEvent>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl EventHandler {
    /// Queue without terminal input, fed only through handles.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            running: Arc::new(AtomicBool::new(true)),
            threads: Vec::new(),
        }
    }

    /// Queue plus keyboard and tick threads for the interactive dashboard.
    pub fn with_terminal_input(tick_interval: Duration) -> Self {
        let mut handler = Self::new();

        // Keyboard event thread
        let tx_key = handler.tx.clone();
        let running = Arc::clone(&handler.running);
        handler.threads.push(std::thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                    if let Ok(Event::Key(key)) = event::read() {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if tx_key.send(TuiEvent::Key(key)).is_err() {
                            break;
                        }
                    }
                }
            }
        }));

        // Tick timer thread, unparked early on stop
        let tx_tick = handler.tx.clone();
        let running = Arc::clone(&handler.running);
        handler.threads.push(std::thread::spawn(move || loop {
            std::thread::park_timeout(tick_interval);
            if !running.load(Ordering::Acquire) || tx_tick.send(TuiEvent::Tick).is_err() {
                break;
            }
        }));

        handler
    }

    pub fn handle(&self) -> DashboardHandle {
        DashboardHandle {
            tx: self.tx.clone(),
        }
    }

    /// Try to receive the next event, blocking up to the given timeout.
    pub fn next(&self, timeout: Duration) -> Option<TuiEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Receive an already queued event without waiting.
    pub fn try_next(&self) -> Option<TuiEvent> {
        self.rx.try_recv().ok()
    }

    /// Stop the input threads and drop the receiver.
    ///
    /// Commands still queued are discarded, which releases any producer
    /// waiting on an acknowledgement.
    pub fn stop(mut self) {
        self.halt_threads();
    }

    fn halt_threads(&mut self) {
        self.running.store(false, Ordering::Release);
        for thread in self.threads.drain(..) {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.halt_threads();
    }
}
