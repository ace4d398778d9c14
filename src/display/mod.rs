use log::debug;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Where the engine publishes what a user should see.
///
/// Calls for one scheduler tick are bracketed by `begin_frame` and
/// `end_frame`. Implementations swallow their own output failures; the
/// engine never waits on or retries a publish.
pub trait DisplaySink: Send + Sync {
    /// A new tick is about to publish `entries` rows.
    fn begin_frame(&self, _entries: usize) {}

    fn set_label(&self, _index: usize, _label: &str) {}

    fn set_code(&self, index: usize, code: &str);

    fn set_remaining(&self, seconds: u64);

    fn set_progress(&self, fraction: f64);

    /// Show `message` until `clear_after` has passed.
    fn set_status(&self, message: &str, clear_after: Duration);

    fn end_frame(&self) {}
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

const BAR_WIDTH: usize = 30;

#[derive(Default)]
struct Board {
    labels: Vec<String>,
    codes: Vec<String>,
    rendered: Vec<String>,
    rendered_labels: Vec<String>,
    remaining: u64,
    progress: f64,
    status: Option<(String, Instant)>,
    status_shown: bool,
}

impl Board {
    fn render(&mut self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "  {:<24} OTP", "Label")?;
        for (i, code) in self.codes.iter().enumerate() {
            let label = self.labels.get(i).map(String::as_str).unwrap_or("");
            writeln!(out, "  {:<24} {}", label, code)?;
        }
        let filled = ((self.progress * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
        writeln!(
            out,
            "  [{}{}] {} second(s) remaining",
            "#".repeat(filled),
            ".".repeat(BAR_WIDTH - filled),
            self.remaining
        )?;
        if let Some((message, _)) = &self.status {
            writeln!(out, "  {}", message)?;
        }
        out.flush()?;

        self.rendered = self.codes.clone();
        self.rendered_labels = self.labels.clone();
        self.status_shown = self.status.is_some();
        Ok(())
    }
}

/// Multi-key board for the interactive session.
///
/// The board is redrawn only when a code or label changes, a new status
/// message arrives, or a shown status expires, so the prompt is not buried
/// under a redraw every second.
/// [`TerminalSink::show`] forces a redraw.
pub struct TerminalSink<W: Write + Send = io::Stdout> {
    board: Mutex<Board>,
    out: Mutex<W>,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        TerminalSink {
            board: Mutex::new(Board::default()),
            out: Mutex::new(out),
        }
    }

    pub fn show(&self) {
        let mut board = lock(&self.board);
        self.draw(&mut board);
    }

    fn draw(&self, board: &mut Board) {
        let mut out = lock(&self.out);
        if let Err(e) = board.render(&mut *out) {
            debug!("failed to draw board: {}", e);
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> DisplaySink for TerminalSink<W> {
    fn begin_frame(&self, entries: usize) {
        let mut board = lock(&self.board);
        board.labels.resize(entries, String::new());
        board.codes.resize(entries, String::new());
    }

    fn set_label(&self, index: usize, label: &str) {
        let mut board = lock(&self.board);
        if let Some(slot) = board.labels.get_mut(index) {
            *slot = label.to_owned();
        }
    }

    fn set_code(&self, index: usize, code: &str) {
        let mut board = lock(&self.board);
        if let Some(slot) = board.codes.get_mut(index) {
            *slot = code.to_owned();
        }
    }

    fn set_remaining(&self, seconds: u64) {
        lock(&self.board).remaining = seconds;
    }

    fn set_progress(&self, fraction: f64) {
        lock(&self.board).progress = fraction;
    }

    fn set_status(&self, message: &str, clear_after: Duration) {
        let mut board = lock(&self.board);
        board.status = Some((message.to_owned(), Instant::now() + clear_after));
        self.draw(&mut board);
    }

    fn end_frame(&self) {
        let mut board = lock(&self.board);
        let expired = matches!(&board.status, Some((_, deadline)) if *deadline <= Instant::now());
        if expired {
            board.status = None;
        }
        let stale = board.codes != board.rendered
            || board.labels != board.rendered_labels
            || (expired && board.status_shown);
        if stale {
            self.draw(&mut board);
        }
    }
}

/// Single line output for watching one key, rewritten in place each tick.
pub struct InlineSink<W: Write + Send = io::Stdout> {
    state: Mutex<(String, u64)>,
    out: Mutex<W>,
}

impl InlineSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> InlineSink<W> {
    pub fn new(out: W) -> Self {
        InlineSink {
            state: Mutex::new((String::new(), 0)),
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> DisplaySink for InlineSink<W> {
    fn set_code(&self, _index: usize, code: &str) {
        lock(&self.state).0 = code.to_owned();
    }

    fn set_remaining(&self, seconds: u64) {
        lock(&self.state).1 = seconds;
    }

    fn set_progress(&self, _fraction: f64) {}

    fn set_status(&self, message: &str, _clear_after: Duration) {
        let mut out = lock(&self.out);
        let _ = writeln!(out, "\r{}", message);
    }

    fn end_frame(&self) {
        let (code, remaining) = lock(&self.state).clone();
        let mut out = lock(&self.out);
        let res = write!(out, "\rkey: {}   (remaining time : {})", code, remaining)
            .and_then(|_| out.flush());
        if let Err(e) = res {
            debug!("failed to write code: {}", e);
        }
    }
}

/// Sink that remembers every call, for assertions in tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Begin(usize),
    Label(usize, String),
    Code(usize, String),
    Remaining(u64),
    Progress(f64),
    Status(String, Duration),
    End,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *lock(&self.events))
    }

    /// Codes published per frame, in order.
    pub fn frames(&self) -> Vec<Vec<String>> {
        let mut frames = Vec::new();
        for event in self.events() {
            match event {
                Event::Begin(_) => frames.push(Vec::new()),
                Event::Code(_, code) => {
                    if let Some(frame) = frames.last_mut() {
                        frame.push(code);
                    }
                }
                _ => {}
            }
        }
        frames
    }

    pub fn remaining(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Remaining(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Status(m, _) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn push(&self, e: Event) {
        lock(&self.events).push(e);
    }
}

#[cfg(test)]
impl DisplaySink for RecordingSink {
    fn begin_frame(&self, entries: usize) {
        self.push(Event::Begin(entries));
    }

    fn set_label(&self, index: usize, label: &str) {
        self.push(Event::Label(index, label.to_owned()));
    }

    fn set_code(&self, index: usize, code: &str) {
        self.push(Event::Code(index, code.to_owned()));
    }

    fn set_remaining(&self, seconds: u64) {
        self.push(Event::Remaining(seconds));
    }

    fn set_progress(&self, fraction: f64) {
        self.push(Event::Progress(fraction));
    }

    fn set_status(&self, message: &str, clear_after: Duration) {
        self.push(Event::Status(message.to_owned(), clear_after));
    }

    fn end_frame(&self) {
        self.push(Event::End);
    }
}
