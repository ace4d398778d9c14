//! The operations a front end calls into.
//!
//! A [`Session`] owns the interactive side of the engine: accepting keys,
//! dropping the last one, and saving or deleting the key file. The
//! per-second recompute lives in the [`Scheduler`] returned alongside it.

use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendError;

use crate::config::Config;
use crate::display::DisplaySink;
use crate::persist::{KeyFile, PersistenceError};
use crate::scheduler::{EntrySender, Scheduler};
use crate::secret::{self, DecodeError};
use crate::store::{Entry, KeyStore};

pub const INVALID_KEY: &str = "Invalid key: Not a compatible Google secret key.";
pub const SAVE_FAILED: &str = "Can't save keys.";
pub const DELETE_FAILED: &str = "Can't delete saved keys.";

pub struct Session {
    store: KeyStore,
    queue: EntrySender,
    key_file: KeyFile,
    sink: Arc<dyn DisplaySink>,
    status_ttl: Duration,
}

impl Session {
    /// Load the saved keys and wire up a scheduler over them.
    pub fn open(
        config: &Config,
        sink: Arc<dyn DisplaySink>,
    ) -> Result<(Session, Scheduler), PersistenceError> {
        let key_file = KeyFile::new(&config.store_path);
        let store = key_file.load_store()?;
        let (scheduler, queue) = Scheduler::new(store.clone(), Arc::clone(&sink));

        let session = Session {
            store,
            queue,
            key_file,
            sink,
            status_ttl: config.status_ttl,
        };
        Ok((session, scheduler))
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    /// Decode `raw` and hand the key to the scheduler. It shows up on the
    /// next tick. A rejected key is reported on the status line.
    pub fn submit_secret(&self, raw: &str, label: &str) -> Result<(), DecodeError> {
        let accepted =
            secret::accept(raw).and_then(|key| Entry::new(label, key).map_err(DecodeError::from));
        let entry = match accepted {
            Ok(entry) => entry,
            Err(e) => {
                warn!("rejected key {:?}: {}", label, e);
                self.sink.set_status(INVALID_KEY, self.status_ttl);
                return Err(e);
            }
        };

        info!("accepted key {:?}", label);
        if let Err(SendError(entry)) = self.queue.send(entry) {
            // scheduler is gone; keep the key anyway
            self.store.append(entry);
        }
        Ok(())
    }

    pub fn remove_last_entry(&self) -> Option<Entry> {
        let removed = self.store.remove_last();
        match &removed {
            Some(entry) => info!("removed key {:?}", entry.label()),
            None => info!("no key to remove"),
        }
        removed
    }

    /// Write every active key to the key file. Returns how many were saved.
    pub fn request_save(&self) -> Result<usize, PersistenceError> {
        self.key_file.save(&self.store).map_err(|e| {
            error!("{}", e);
            self.sink.set_status(SAVE_FAILED, self.status_ttl);
            e
        })
    }

    /// Remove the key file. The active keys are left alone.
    pub fn request_delete_persisted(&self) -> Result<bool, PersistenceError> {
        self.key_file.delete().map_err(|e| {
            error!("{}", e);
            self.sink.set_status(DELETE_FAILED, self.status_ttl);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::RecordingSink;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn open(path: &Path) -> (Session, Scheduler, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let config = Config {
            store_path: path.to_path_buf(),
            status_ttl: Duration::from_secs(3),
            ..Config::default()
        };
        let (session, scheduler) = Session::open(&config, sink.clone()).unwrap();
        (session, scheduler, sink)
    }

    #[test]
    fn submitted_keys_reach_the_store_through_the_scheduler() {
        let dir = tempdir().unwrap();
        let (session, mut scheduler, sink) = open(&dir.path().join("saved"));

        session.submit_secret("jbsw y3dp ehpk 3pxp", "demo").unwrap();
        assert!(session.store().is_empty());

        scheduler.tick();
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.store().snapshot()[0].label(), "demo");
        assert_eq!(sink.frames().last().map(Vec::len), Some(1));
    }

    #[test]
    fn rejected_key_sets_status_and_is_not_queued() {
        let dir = tempdir().unwrap();
        let (session, mut scheduler, sink) = open(&dir.path().join("saved"));

        assert_eq!(
            session.submit_secret("not-base32!", "x"),
            Err(DecodeError::InvalidEncoding)
        );
        assert_eq!(session.submit_secret("  ", "y"), Err(DecodeError::Empty));

        scheduler.tick();
        assert!(session.store().is_empty());
        assert_eq!(sink.statuses(), vec![INVALID_KEY.to_string(); 2]);
    }

    #[test]
    fn submit_without_scheduler_appends_directly() {
        let dir = tempdir().unwrap();
        let (session, scheduler, _sink) = open(&dir.path().join("saved"));
        drop(scheduler);

        session.submit_secret("JBSWY3DPEHPK3PXP", "").unwrap();
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn save_reload_and_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved");
        let (session, mut scheduler, _sink) = open(&path);

        session.submit_secret("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ", "rfc").unwrap();
        session.submit_secret("JBSWY3DPEHPK3PXP", "").unwrap();
        scheduler.tick();
        assert_eq!(session.request_save().unwrap(), 2);

        let (reopened, _scheduler, _sink) = open(&path);
        assert_eq!(reopened.store().snapshot(), session.store().snapshot());

        assert!(session.request_delete_persisted().unwrap());
        assert!(!session.request_delete_persisted().unwrap());
        assert_eq!(session.store().len(), 2);

        let (fresh, _scheduler, _sink) = open(&path);
        assert!(fresh.store().is_empty());
    }

    #[test]
    fn remove_last_entry_pops_newest() {
        let dir = tempdir().unwrap();
        let (session, mut scheduler, _sink) = open(&dir.path().join("saved"));
        assert!(session.remove_last_entry().is_none());

        session.submit_secret("JBSWY3DPEHPK3PXP", "one").unwrap();
        session.submit_secret("GEZDGNBVGY3TQOJQ", "two").unwrap();
        scheduler.tick();

        assert_eq!(session.remove_last_entry().unwrap().label(), "two");
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn failed_save_reports_status() {
        let dir = tempdir().unwrap();
        let (session, _scheduler, sink) = open(&dir.path().join("missing").join("saved"));

        assert!(session.request_save().is_err());
        assert_eq!(sink.statuses(), vec![SAVE_FAILED.to_string()]);
    }

    #[test]
    fn open_fails_on_corrupt_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved");
        fs::write(&path, b"{not json").unwrap();

        let config = Config {
            store_path: path,
            ..Config::default()
        };
        let sink: Arc<dyn DisplaySink> = Arc::new(RecordingSink::default());
        assert!(matches!(
            Session::open(&config, sink),
            Err(PersistenceError::Parse { .. })
        ));
    }
}
