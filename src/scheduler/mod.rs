// src/scheduler/mod.rs
pub mod digest;
pub mod poll;
pub mod status;

pub use digest::{DigestOutcome, DigestScheduler};
pub use poll::{PollOutcome, PollScheduler};
pub use status::StatusBoard;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::bridge::Bridge;

/// Re-entrancy guard: at most one cycle of a given scheduler runs at a time.
#[derive(Debug, Default)]
pub struct CycleGuard {
    running: AtomicBool,
}

/// Held for the duration of one cycle; releases the guard on drop, including
/// on early return or panic.
#[derive(Debug)]
pub struct CycleTicket<'a> {
    guard: &'a CycleGuard,
}

impl CycleGuard {
    pub fn try_enter(&self) -> Option<CycleTicket<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleTicket { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for CycleTicket<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

/// Handles of the background loops.
pub struct Schedulers {
    pub poll: Arc<PollScheduler>,
    pub digest: Arc<DigestScheduler>,
    pub status: Arc<StatusBoard>,
    pub handles: Vec<JoinHandle<()>>,
}

/// Start the poll, digest and status loops on the current runtime.
pub fn spawn_all(bridge: Arc<Bridge>) -> Schedulers {
    let poll = Arc::new(PollScheduler::new(Arc::clone(&bridge)));
    let digest = Arc::new(DigestScheduler::new(Arc::clone(&bridge)));
    let status = Arc::new(StatusBoard::new(bridge));
    let handles = vec![
        Arc::clone(&poll).spawn(),
        Arc::clone(&digest).spawn(),
        Arc::clone(&status).spawn(),
    ];
    Schedulers {
        poll,
        digest,
        status,
        handles,
    }
}
