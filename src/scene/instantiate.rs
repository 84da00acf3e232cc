use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::{
    foundation::{
        core::HostObject,
        error::{VitrineError, VitrineResult},
    },
    runtime::cancel::CancellationScope,
    scene::host::SceneHost,
};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Bookkeeping kept for every instance the instantiator produced.
pub(crate) struct SpawnHandle {
    pub(crate) template: String,
    pub(crate) sequence: u64,
}

#[derive(Debug, Default)]
/// Instances produced by template instantiation, in registration order. An object is
/// registered exactly once and released at most once.
pub(crate) struct TrackedInstanceRegistry {
    entries: Vec<(HostObject, SpawnHandle)>,
}

impl TrackedInstanceRegistry {
    fn register(&mut self, object: HostObject, handle: SpawnHandle) {
        debug_assert!(!self.contains(object));
        self.entries.push((object, handle));
    }

    fn take(&mut self, object: HostObject) -> Option<SpawnHandle> {
        let idx = self.entries.iter().position(|(o, _)| *o == object)?;
        Some(self.entries.remove(idx).1)
    }

    fn contains(&self, object: HostObject) -> bool {
        self.entries.iter().any(|(o, _)| *o == object)
    }

    fn drain_newest_first(&mut self) -> Vec<(HostObject, SpawnHandle)> {
        let mut out = std::mem::take(&mut self.entries);
        out.reverse();
        out
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Creates host objects from template keys and tracks every object it produced so that
/// each is released exactly once: individually on teardown or in bulk at shutdown.
pub(crate) struct TemplateInstantiator {
    host: Rc<dyn SceneHost>,
    registry: RefCell<TrackedInstanceRegistry>,
    next_sequence: Cell<u64>,
    closed: Cell<bool>,
}

impl TemplateInstantiator {
    pub(crate) fn new(host: Rc<dyn SceneHost>) -> Self {
        Self {
            host,
            registry: RefCell::new(TrackedInstanceRegistry::default()),
            next_sequence: Cell::new(0),
            closed: Cell::new(false),
        }
    }

    /// Instantiate `template` under `parent`. An instance that arrives after `scope` was
    /// cancelled, or after [`release_all`](Self::release_all), is released instead of returned.
    pub(crate) async fn spawn(
        &self,
        template: &str,
        parent: Option<HostObject>,
        scope: &CancellationScope,
    ) -> VitrineResult<HostObject> {
        scope.checkpoint()?;
        if self.closed.get() {
            return Err(VitrineError::ShutDown);
        }

        let outcome = self.host.instantiate(template, parent).await;
        let object = match outcome {
            Ok(object) => object,
            Err(err) => {
                if let Some(partial) = err.partial {
                    tracing::debug!(template, ?partial, "releasing partially created instance");
                    self.host.release_instance(partial);
                }
                return Err(VitrineError::resource_load_failed(format!(
                    "instantiate '{template}': {:#}",
                    err.source
                )));
            }
        };

        if self.closed.get() {
            self.host.release_instance(object);
            return Err(VitrineError::ShutDown);
        }
        if scope.is_cancelled() {
            tracing::trace!(template, ?object, "instance arrived after cancellation");
            self.host.release_instance(object);
            return Err(VitrineError::Cancelled);
        }

        let sequence = self.next_sequence.get();
        self.next_sequence.set(sequence + 1);
        self.registry.borrow_mut().register(
            object,
            SpawnHandle {
                template: template.to_string(),
                sequence,
            },
        );
        Ok(object)
    }

    /// Release one tracked instance. Returns `false` if `object` is not (or no longer) tracked.
    pub(crate) fn release_one(&self, object: HostObject) -> bool {
        let Some(handle) = self.registry.borrow_mut().take(object) else {
            return false;
        };
        tracing::trace!(?object, template = %handle.template, sequence = handle.sequence, "instance released");
        self.host.release_instance(object);
        true
    }

    /// Release every tracked instance, newest first, and refuse further spawns.
    pub(crate) fn release_all(&self) -> usize {
        self.closed.set(true);
        let entries = self.registry.borrow_mut().drain_newest_first();
        for (object, _) in &entries {
            self.host.release_instance(*object);
        }
        entries.len()
    }

    pub(crate) fn is_tracked(&self, object: HostObject) -> bool {
        self.registry.borrow().contains(object)
    }

    pub(crate) fn tracked_count(&self) -> usize {
        self.registry.borrow().len()
    }

    pub(crate) fn host(&self) -> &Rc<dyn SceneHost> {
        &self.host
    }
}

impl std::fmt::Debug for TemplateInstantiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateInstantiator")
            .field("tracked", &self.tracked_count())
            .field("closed", &self.closed.get())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/instantiate.rs"]
mod tests;
