use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {async_trait::async_trait, tokio::runtime::Handle, tracing::warn};

/// Atomic "draining" flag: at most one holder at a time.
#[derive(Debug, Default)]
pub(crate) struct SingleFlight {
    running: AtomicBool,
}

impl SingleFlight {
    pub(crate) fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(&self.running))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub(crate) struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A queue drainer run under a [`SingleFlight`] guard.
#[async_trait]
pub(crate) trait Drain: Send + Sync + 'static {
    fn flight(&self) -> &SingleFlight;

    /// Whether a drain started now would have anything to do.
    fn has_work(&self) -> bool;

    /// Process the queue until it is empty or the drainer has to stop.
    async fn drain(&self);
}

/// Spawn a drain unless one is already active.
///
/// After the guard is released the queue is checked again, so a request that
/// was dropped while the guard was held still gets served.
pub(crate) fn schedule_drain<D: Drain>(drainer: Arc<D>) {
    if drainer.flight().is_running() {
        return;
    }
    let Ok(handle) = Handle::try_current() else {
        warn!("drain requested outside a tokio runtime, ignoring");
        return;
    };
    handle.spawn(run_drain(drainer));
}

async fn run_drain<D: Drain>(drainer: Arc<D>) {
    loop {
        {
            let Some(_guard) = drainer.flight().try_acquire() else {
                return;
            };
            drainer.drain().await;
        }
        if !drainer.has_work() {
            return;
        }
    }
}
