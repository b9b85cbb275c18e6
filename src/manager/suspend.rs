//! Background scanners that yield to priority work.

use std::sync::Arc;

use tracing::debug;

/// A background collaborator (indexer, change watcher) that can pause.
///
/// [`IndexManager::priority_access`](super::IndexManager::priority_access)
/// suspends every registered suspender before running its action and resumes
/// them afterwards. Calls are paired: each `suspend` is followed by exactly
/// one `resume`.
pub trait ScanSuspender: Send + Sync + std::fmt::Debug {
    /// Pause scanning.
    fn suspend(&self);

    /// Resume scanning.
    fn resume(&self);

    /// Name used in logs.
    fn name(&self) -> &str {
        "scan-suspender"
    }
}

/// Keeps suspenders paused while alive; resumes them in reverse order on
/// drop, including during unwinding.
#[derive(Debug)]
pub struct SuspendGuard<'a> {
    suspended: &'a [Arc<dyn ScanSuspender>],
    count: usize,
}

impl<'a> SuspendGuard<'a> {
    /// Suspend `suspenders` in order.
    pub fn suspend(suspenders: &'a [Arc<dyn ScanSuspender>]) -> Self {
        let mut guard = SuspendGuard {
            suspended: suspenders,
            count: 0,
        };
        for suspender in suspenders {
            debug!(suspender = suspender.name(), "suspending scanner");
            suspender.suspend();
            guard.count += 1;
        }
        guard
    }
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        for suspender in self.suspended[..self.count].iter().rev() {
            debug!(suspender = suspender.name(), "resuming scanner");
            suspender.resume();
        }
    }
}
