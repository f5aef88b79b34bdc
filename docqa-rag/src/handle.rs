//! Shared, atomically swappable access to the current [`VectorIndex`].
//!
//! Readers clone an `Arc` snapshot under a short read lock and search without
//! holding it, so concurrent searches never wait on each other. A rebuild
//! constructs the new index off to the side and swaps it in under the write
//! lock; readers observe either the old index or the new one, never a mix.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::index::VectorIndex;

/// Lifecycle of the index behind an [`IndexHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Nothing has been built or loaded.
    Absent,
    /// A rebuild is in progress; readers still see the previous index, if any.
    Building,
    /// An index is available.
    Ready,
}

/// A cheap-to-clone handle to the current index.
#[derive(Debug, Clone, Default)]
pub struct IndexHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug, Default)]
struct HandleInner {
    current: RwLock<Option<Arc<VectorIndex>>>,
    building: AtomicBool,
    writer: Mutex<()>,
}

/// Held for the duration of a rebuild. Only one rebuild runs at a time.
#[derive(Debug)]
pub struct BuildGuard<'a> {
    handle: &'a IndexHandle,
    _writer: MutexGuard<'a, ()>,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.handle.inner.building.store(false, Ordering::Release);
    }
}

impl IndexHandle {
    /// Create a handle with no index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle that starts out serving `index`.
    pub fn with_index(index: VectorIndex) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                current: RwLock::new(Some(Arc::new(index))),
                ..HandleInner::default()
            }),
        }
    }

    /// The index readers currently see.
    pub async fn snapshot(&self) -> Option<Arc<VectorIndex>> {
        self.inner.current.read().await.clone()
    }

    /// Atomically make `index` the current index, returning the previous one.
    pub async fn replace(&self, index: VectorIndex) -> Option<Arc<VectorIndex>> {
        self.inner.current.write().await.replace(Arc::new(index))
    }

    /// Mark a rebuild as started, waiting for any rebuild already running.
    ///
    /// The state reads [`IndexState::Building`] until the guard is dropped.
    pub async fn begin_build(&self) -> BuildGuard<'_> {
        let writer = self.inner.writer.lock().await;
        self.inner.building.store(true, Ordering::Release);
        BuildGuard { handle: self, _writer: writer }
    }

    pub async fn state(&self) -> IndexState {
        if self.inner.building.load(Ordering::Acquire) {
            IndexState::Building
        } else if self.inner.current.read().await.is_some() {
            IndexState::Ready
        } else {
            IndexState::Absent
        }
    }
}
