//! Per-thread reentrancy on top of another pool.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use super::{AssemblyContext, AssemblyContextPool, ContextId};
use crate::error::PoolError;

#[derive(Default)]
struct ThreadState {
    /// Context held through `dequeue`, with its nesting depth.
    single: Option<(Arc<AssemblyContext>, usize)>,
    /// Contexts of an outstanding `dequeue_all` not yet returned.
    all: Option<FxHashSet<ContextId>>,
}

impl ThreadState {
    fn is_idle(&self) -> bool {
        self.single.is_none() && self.all.is_none()
    }
}

/// Makes `dequeue` reentrant per thread.
///
/// A thread that already holds a context gets the same context again
/// instead of blocking on the inner pool; the context goes back to the
/// inner pool only when the outermost hold is returned. This is what lets
/// a participant request another assembled type while its own type is
/// being generated.
pub struct ThreadLocalAssemblyContextPoolDecorator<P> {
    inner: P,
    threads: Mutex<FxHashMap<ThreadId, ThreadState>>,
}

impl<P: AssemblyContextPool> ThreadLocalAssemblyContextPoolDecorator<P> {
    pub fn new(inner: P) -> Self {
        ThreadLocalAssemblyContextPoolDecorator {
            inner,
            threads: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: AssemblyContextPool> AssemblyContextPool for ThreadLocalAssemblyContextPoolDecorator<P> {
    fn dequeue(&self) -> Result<Arc<AssemblyContext>, PoolError> {
        let thread = thread::current().id();
        {
            let mut threads = self.threads.lock();
            if let Some(state) = threads.get_mut(&thread) {
                if state.all.is_some() {
                    return Err(PoolError::DequeueAllOutstanding);
                }
                if let Some((context, depth)) = &mut state.single {
                    *depth += 1;
                    trace!(context = %context.id(), depth = *depth, "reentrant dequeue");
                    return Ok(Arc::clone(context));
                }
            }
        }

        // Blocking happens outside the bookkeeping lock.
        let context = self.inner.dequeue()?;
        self.threads.lock().entry(thread).or_default().single = Some((Arc::clone(&context), 1));
        Ok(context)
    }

    fn dequeue_all(&self) -> Result<Vec<Arc<AssemblyContext>>, PoolError> {
        let thread = thread::current().id();
        if let Some(state) = self.threads.lock().get(&thread) {
            if state.all.is_some() {
                return Err(PoolError::DequeueAllOutstanding);
            }
            if state.single.is_some() {
                return Err(PoolError::DequeueOutstanding);
            }
        }

        let contexts = self.inner.dequeue_all()?;
        self.threads.lock().entry(thread).or_default().all =
            Some(contexts.iter().map(|c| c.id()).collect());
        Ok(contexts)
    }

    fn enqueue(&self, context: Arc<AssemblyContext>) -> Result<(), PoolError> {
        let thread = thread::current().id();
        let id = context.id();
        {
            let mut threads = self.threads.lock();
            if let Some(state) = threads.get_mut(&thread) {
                if let Some((held, depth)) = &mut state.single {
                    if held.id() == id {
                        *depth -= 1;
                        if *depth > 0 {
                            trace!(context = %id, depth = *depth, "reentrant enqueue");
                            return Ok(());
                        }
                        state.single = None;
                    }
                } else if let Some(all) = &mut state.all {
                    if all.remove(&id) && all.is_empty() {
                        state.all = None;
                    }
                }
                if state.is_idle() {
                    threads.remove(&thread);
                }
            }
        }
        self.inner.enqueue(context)
    }
}

impl<P: fmt::Debug> fmt::Debug for ThreadLocalAssemblyContextPoolDecorator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocalAssemblyContextPoolDecorator")
            .field("inner", &self.inner)
            .field("threads", &self.threads.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
