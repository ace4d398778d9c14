use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::display::DisplaySink;
use crate::store::{Entry, KeyStore};
use crate::totp::TimeStep;

/// Source of wall-clock time, as a duration since the unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// Hand-off side of the scheduler's inbound queue.
pub type EntrySender = mpsc::UnboundedSender<Entry>;

/// Recomputes every code in the store once per second.
///
/// Newly accepted keys arrive through the queue returned by
/// [`Scheduler::new`] and join the store at the start of the next tick, so
/// the interactive side never contends with a recompute pass.
pub struct Scheduler {
    store: KeyStore,
    inbox: mpsc::UnboundedReceiver<Entry>,
    sink: Arc<dyn DisplaySink>,
    clock: Arc<dyn Clock>,
    last_counter: Option<u64>,
}

impl Scheduler {
    pub fn new(store: KeyStore, sink: Arc<dyn DisplaySink>) -> (Self, EntrySender) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let scheduler = Scheduler {
            store,
            inbox,
            sink,
            clock: Arc::new(SystemClock),
            last_counter: None,
        };
        (scheduler, tx)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Move every queued entry into the store without waiting.
    /// Returns how many entries were added.
    pub fn drain(&mut self) -> usize {
        let mut added = 0;
        loop {
            match self.inbox.try_recv() {
                Ok(entry) => {
                    let index = self.store.append(entry);
                    debug!("queued key joined rotation at position {}", index + 1);
                    added += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        added
    }

    /// One pass: absorb queued keys, then publish codes for the current
    /// time step.
    pub fn tick(&mut self) -> TimeStep {
        self.drain();

        let step = TimeStep::at(self.clock.now().as_secs());
        match self.last_counter {
            Some(last) if step.counter < last => {
                warn!("clock moved backwards (time step {} -> {})", last, step.counter)
            }
            Some(last) if step.counter > last => {
                debug!("time step rolled over to {}", step.counter)
            }
            _ => {}
        }
        self.last_counter = Some(step.counter);

        let entries = self.store.snapshot();
        publish_frame(&*self.sink, &entries, &step);
        step
    }

    /// Tick once per second for as long as the process lives.
    pub async fn run(mut self) {
        let clock = Arc::clone(&self.clock);
        every_second(&*clock, || {
            self.tick();
        })
        .await
    }
}

/// Keeps a single key's code on screen, without a store or a queue.
pub struct Watcher {
    entry: Entry,
    sink: Arc<dyn DisplaySink>,
    clock: Arc<dyn Clock>,
}

impl Watcher {
    pub fn new(entry: Entry, sink: Arc<dyn DisplaySink>) -> Self {
        Watcher {
            entry,
            sink,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn tick(&self) -> TimeStep {
        let step = TimeStep::at(self.clock.now().as_secs());
        publish_frame(&*self.sink, std::slice::from_ref(&self.entry), &step);
        step
    }

    pub async fn run(self) {
        every_second(&*self.clock, || {
            self.tick();
        })
        .await
    }
}

fn publish_frame(sink: &dyn DisplaySink, entries: &[Entry], step: &TimeStep) {
    sink.begin_frame(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        sink.set_label(i, &entry.display_label(i));
        sink.set_code(i, &step.code_for(entry.secret()));
    }
    sink.set_remaining(step.remaining);
    sink.set_progress(step.progress());
    sink.end_frame();
}

/// Time left until the clock reaches its next whole second.
fn until_next_second(now: Duration) -> Duration {
    Duration::from_secs(1) - Duration::from_nanos(u64::from(now.subsec_nanos()))
}

async fn every_second(clock: &dyn Clock, mut tick: impl FnMut()) {
    loop {
        tick();
        tokio::time::sleep(until_next_second(clock.now())).await;
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Default)]
pub struct ManualClock {
    millis: std::sync::atomic::AtomicU64,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(secs: u64) -> Self {
        let clock = Self::default();
        clock.set(secs);
        clock
    }

    pub fn set(&self, secs: u64) {
        self.millis
            .store(secs * 1000, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(std::sync::atomic::Ordering::SeqCst))
    }
}
