use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

use futures::{
    FutureExt,
    future::{LocalBoxFuture, Shared},
};

use crate::{
    assets::source::{AssetHandle, AssetKey, AssetSource, CachedAsset},
    foundation::error::{VitrineError, VitrineResult},
    runtime::cancel::CancellationScope,
};

#[derive(Clone, Debug)]
enum LoadFailure {
    Failed(String),
    ShutDown,
}

type SharedLoad = Shared<LocalBoxFuture<'static, Result<AssetHandle, LoadFailure>>>;

enum Slot {
    Loading(SharedLoad),
    Ready(AssetHandle),
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<AssetKey, Slot>,
    closed: bool,
    loads_issued: u64,
}

/// Deduplicated, keyed asset cache. The cache is the sole owner of everything it loads and
/// releases all of it in [`ResourceCache::release_all`].
///
/// Loads are single-flight per key: the first caller issues the load and every concurrent
/// caller awaits the same in-flight result. The load commits its handle into the cache
/// itself, so a caller that gives up (cancellation) never orphans the handle.
pub struct ResourceCache {
    source: Rc<dyn AssetSource>,
    state: Rc<RefCell<CacheState>>,
}

impl ResourceCache {
    /// Empty cache loading through `source`.
    pub fn new(source: Rc<dyn AssetSource>) -> Self {
        Self {
            source,
            state: Rc::new(RefCell::new(CacheState::default())),
        }
    }

    /// Load a typed asset, reusing the cached handle for `key` when present.
    pub async fn load<T: CachedAsset>(
        &self,
        key: &str,
        scope: &CancellationScope,
    ) -> VitrineResult<Rc<T>> {
        let handle = self.load_handle(AssetKey::new(T::KIND, key), scope).await?;
        handle.downcast::<T>().ok_or_else(|| {
            VitrineError::resource_load_failed(format!(
                "asset '{key}' did not load as {:?}",
                T::KIND
            ))
        })
    }

    /// Load `key` once, sharing an in-flight load with concurrent callers.
    pub async fn load_handle(
        &self,
        key: AssetKey,
        scope: &CancellationScope,
    ) -> VitrineResult<AssetHandle> {
        if key.path.is_empty() {
            return Err(VitrineError::resource_load_failed("asset key is empty"));
        }
        scope.checkpoint()?;

        let pending = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return Err(VitrineError::ShutDown);
            }
            match state.slots.get(&key) {
                Some(Slot::Ready(handle)) => return Ok(handle.clone()),
                Some(Slot::Loading(pending)) => {
                    tracing::trace!(%key, "joining in-flight asset load");
                    pending.clone()
                }
                None => {
                    tracing::debug!(%key, "loading asset");
                    let pending = self.start_load(key.clone());
                    state.slots.insert(key, Slot::Loading(pending.clone()));
                    state.loads_issued += 1;
                    pending
                }
            }
        };

        let outcome = pending.await;
        scope.checkpoint()?;
        match outcome {
            Ok(handle) => Ok(handle),
            Err(LoadFailure::Failed(msg)) => Err(VitrineError::ResourceLoadFailed(msg)),
            Err(LoadFailure::ShutDown) => Err(VitrineError::ShutDown),
        }
    }

    fn start_load(&self, key: AssetKey) -> SharedLoad {
        let source = self.source.clone();
        let state: Weak<RefCell<CacheState>> = Rc::downgrade(&self.state);
        let load = source.load(&key);
        async move {
            let outcome = load.await;
            let Some(state) = state.upgrade() else {
                if let Ok(handle) = &outcome {
                    source.release(handle);
                }
                return Err(LoadFailure::ShutDown);
            };

            match outcome {
                Ok(handle) => {
                    let closed = {
                        let mut state = state.borrow_mut();
                        if !state.closed {
                            state.slots.insert(key.clone(), Slot::Ready(handle.clone()));
                        }
                        state.closed
                    };
                    if closed {
                        tracing::debug!(%key, "asset arrived after shutdown; releasing");
                        source.release(&handle);
                        return Err(LoadFailure::ShutDown);
                    }
                    Ok(handle)
                }
                Err(err) => {
                    state.borrow_mut().slots.remove(&key);
                    Err(LoadFailure::Failed(format!("{key}: {err:#}")))
                }
            }
        }
        .boxed_local()
        .shared()
    }

    /// Release every cached handle and close the cache. Only the first call does anything.
    /// Returns the number of handles released.
    pub fn release_all(&self) -> usize {
        let slots = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return 0;
            }
            state.closed = true;
            std::mem::take(&mut state.slots)
        };

        let mut released = 0;
        for (_, slot) in slots {
            if let Slot::Ready(handle) = slot {
                self.source.release(&handle);
                released += 1;
            }
        }
        tracing::debug!(released, "resource cache flushed");
        released
    }

    /// Whether `key` has finished loading and is held.
    pub fn contains(&self, key: &AssetKey) -> bool {
        matches!(self.state.borrow().slots.get(key), Some(Slot::Ready(_)))
    }

    /// Number of loaded handles currently held.
    pub fn len(&self) -> usize {
        self.state
            .borrow()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loads issued to the asset source since creation.
    pub fn loads_issued(&self) -> u64 {
        self.state.borrow().loads_issued
    }

    /// Whether [`release_all`](Self::release_all) has run.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ResourceCache")
            .field("slots", &state.slots.len())
            .field("closed", &state.closed)
            .field("loads_issued", &state.loads_issued)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
