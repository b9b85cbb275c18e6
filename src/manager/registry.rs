//! Location registry of open index handles.
//!
//! Each [`IndexHandle`] created for a location owns its registry entry and
//! removes it on drop, provided no newer handle has replaced it meanwhile.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::analysis::analyzer::Analyzer;
use crate::index::{Index, TransactionalIndex};

#[derive(Debug, Clone)]
struct RegistryEntry {
    index: Arc<dyn Index>,
    analyzer: Arc<dyn Analyzer>,
    id: u64,
}

/// Advisory map from storage location to the most recently created handle.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<HashMap<PathBuf, RegistryEntry>>,
    next_id: AtomicU64,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Registry::default())
    }

    /// Advertise `index` for `location`, replacing any earlier entry.
    pub fn register<I: ?Sized>(
        self: &Arc<Self>,
        location: &Path,
        index: Arc<I>,
        as_index: Arc<dyn Index>,
        analyzer: Arc<dyn Analyzer>,
    ) -> IndexHandle<I> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(
            location.to_path_buf(),
            RegistryEntry {
                index: as_index,
                analyzer,
                id,
            },
        );
        trace!(location = %location.display(), id, "registered index");

        IndexHandle {
            index,
            registration: Some(Registration {
                location: location.to_path_buf(),
                id,
                registry: Arc::downgrade(self),
            }),
        }
    }

    /// Registered indexes that are still open.
    pub fn open_indexes(&self) -> HashMap<PathBuf, Arc<dyn Index>> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| !entry.index.is_closed())
            .map(|(location, entry)| (location.clone(), Arc::clone(&entry.index)))
            .collect()
    }

    /// Analyzer of the handle registered for `location`.
    pub fn analyzer(&self, location: &Path) -> Option<Arc<dyn Analyzer>> {
        self.entries
            .lock()
            .get(location)
            .map(|entry| Arc::clone(&entry.analyzer))
    }

    /// Number of registered locations.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no location is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn release(&self, location: &Path, id: u64) {
        let mut entries = self.entries.lock();
        if entries.get(location).is_some_and(|entry| entry.id == id) {
            entries.remove(location);
            trace!(location = %location.display(), id, "released index");
        }
    }
}

struct Registration {
    location: PathBuf,
    id: u64,
    registry: Weak<Registry>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(&self.location, self.id);
        }
    }
}

/// An owned index handle.
///
/// Dereferences to the index. Dropping a handle returned for a location
/// removes that location from the registry unless a newer handle replaced
/// it. Dropping does not close the index.
pub struct IndexHandle<I: ?Sized> {
    index: Arc<I>,
    registration: Option<Registration>,
}

impl<I: ?Sized> IndexHandle<I> {
    /// A handle that is not tracked by any registry.
    pub fn unregistered(index: Arc<I>) -> Self {
        IndexHandle {
            index,
            registration: None,
        }
    }

    /// The shared index.
    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    /// The registered location, if any.
    pub fn location(&self) -> Option<&Path> {
        self.registration.as_ref().map(|r| r.location.as_path())
    }
}

impl IndexHandle<dyn TransactionalIndex> {
    /// View this handle as a plain index handle, keeping its registration.
    pub fn into_index(self) -> IndexHandle<dyn Index> {
        let IndexHandle {
            index,
            registration,
        } = self;
        IndexHandle {
            index,
            registration,
        }
    }
}

impl<I: ?Sized> Deref for IndexHandle<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.index
    }
}

impl<I: ?Sized + fmt::Debug> fmt::Debug for IndexHandle<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHandle")
            .field("index", &self.index)
            .field("location", &self.location())
            .finish()
    }
}
