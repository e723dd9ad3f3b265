use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Begin {
        id: ProgressId,
        title: String,
        total: u64,
    },
    Report {
        id: ProgressId,
        message: Option<String>,
        percentage: u32,
    },
    End {
        id: ProgressId,
        message: Option<String>,
    },
}

pub type ProgressReceiver = broadcast::Receiver<ProgressEvent>;

/// Events buffered per subscriber before it starts lagging.
pub(crate) const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ProgressSender {
    tx: broadcast::Sender<ProgressEvent>,
    next_id: Arc<AtomicU64>,
}

impl ProgressSender {
    pub(crate) fn new(tx: broadcast::Sender<ProgressEvent>) -> Self {
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// A sender not tied to a scheduler. Callers may still subscribe to it.
    pub fn detached() -> Self {
        let (tx, _) = broadcast::channel(DEFAULT_PROGRESS_CHANNEL_CAPACITY);
        Self::new(tx)
    }

    pub fn subscribe(&self) -> ProgressReceiver {
        self.tx.subscribe()
    }

    pub fn start(&self, title: impl Into<String>, total: u64) -> Progress {
        let id = ProgressId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.tx.send(ProgressEvent::Begin {
            id,
            title: title.into(),
            total,
        });
        Progress {
            id,
            tx: self.tx.clone(),
            units: Arc::new(Mutex::new(Units { total, done: 0 })),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Units {
    total: u64,
    done: u64,
}

impl Units {
    fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        ((self.done.min(self.total) * 100) / self.total) as u32
    }
}

/// One running operation with a unit budget.
#[derive(Clone)]
pub struct Progress {
    id: ProgressId,
    tx: broadcast::Sender<ProgressEvent>,
    units: Arc<Mutex<Units>>,
    finished: Arc<AtomicBool>,
}

impl Progress {
    pub fn id(&self) -> ProgressId {
        self.id
    }

    /// Replaces the unit budget. Work already done is kept, so discovering more work mid-run
    /// lowers the reported percentage instead of overshooting 100.
    pub fn set_total(&self, total: u64) {
        let percentage = {
            let mut units = self.units.lock();
            units.total = total.max(units.done);
            units.percentage()
        };
        let _ = self.tx.send(ProgressEvent::Report {
            id: self.id,
            message: None,
            percentage,
        });
    }

    pub fn total(&self) -> u64 {
        self.units.lock().total
    }

    pub fn worked(&self, units: u64, message: impl Into<Option<String>>) {
        let percentage = {
            let mut state = self.units.lock();
            state.done = state.done.saturating_add(units);
            state.percentage()
        };
        let _ = self.tx.send(ProgressEvent::Report {
            id: self.id,
            message: message.into(),
            percentage,
        });
    }

    pub fn finish(&self, message: impl Into<Option<String>>) {
        let message = message.into();
        if self
            .finished
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let _ = self.tx.send(ProgressEvent::End {
                id: self.id,
                message,
            });
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        // Clones share the flag; only the last one standing closes the operation.
        if Arc::strong_count(&self.finished) == 1 {
            self.finish(None);
        }
    }
}
