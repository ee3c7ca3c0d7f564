//! Pooled assembly contexts.
//!
//! An [`AssemblyContext`] is one unit of code generation capacity: a code
//! backend behind its own synchronization point. Contexts are checked out
//! of an [`AssemblyContextPool`] for the duration of one assembly run and
//! returned afterwards; [`PooledContext`] does the returning on drop.

mod thread_local;

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;
use tpipe_model::CodeBackend;
use tracing::{error, trace};

use crate::error::PoolError;
use crate::sync::CodeGenerationSynchronizationPoint;

pub use thread_local::ThreadLocalAssemblyContextPoolDecorator;

/// Process-unique identity of an assembly context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

impl ContextId {
    fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A code backend plus the synchronization point guarding it.
pub struct AssemblyContext {
    id: ContextId,
    sync_point: CodeGenerationSynchronizationPoint,
}

impl AssemblyContext {
    pub fn new(backend: Box<dyn CodeBackend>) -> Self {
        AssemblyContext {
            id: ContextId::fresh(),
            sync_point: CodeGenerationSynchronizationPoint::new(backend),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn sync_point(&self) -> &CodeGenerationSynchronizationPoint {
        &self.sync_point
    }
}

impl fmt::Debug for AssemblyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyContext")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Checkout protocol for assembly contexts.
pub trait AssemblyContextPool: Send + Sync {
    /// Take one context, waiting until one is available.
    fn dequeue(&self) -> Result<Arc<AssemblyContext>, PoolError>;

    /// Take every context of the pool, waiting until all are available.
    fn dequeue_all(&self) -> Result<Vec<Arc<AssemblyContext>>, PoolError>;

    /// Return a context taken from this pool.
    fn enqueue(&self, context: Arc<AssemblyContext>) -> Result<(), PoolError>;
}

/// A fixed set of contexts guarded by a mutex and a condition variable.
///
/// Contexts are handed out most recently returned first.
pub struct BlockingAssemblyContextPool {
    registered: FxHashSet<ContextId>,
    available: Mutex<Vec<Arc<AssemblyContext>>>,
    returned: Condvar,
}

impl BlockingAssemblyContextPool {
    pub fn new(contexts: Vec<Arc<AssemblyContext>>) -> Result<Self, PoolError> {
        if contexts.is_empty() {
            return Err(PoolError::Empty);
        }
        Ok(BlockingAssemblyContextPool {
            registered: contexts.iter().map(|c| c.id()).collect(),
            available: Mutex::new(contexts),
            returned: Condvar::new(),
        })
    }

    /// Number of contexts the pool was created with.
    pub fn capacity(&self) -> usize {
        self.registered.len()
    }

    /// Number of contexts currently in the pool.
    pub fn available(&self) -> usize {
        self.available.lock().len()
    }
}

impl AssemblyContextPool for BlockingAssemblyContextPool {
    fn dequeue(&self) -> Result<Arc<AssemblyContext>, PoolError> {
        let mut available = self.available.lock();
        loop {
            if let Some(context) = available.pop() {
                trace!(context = %context.id(), "dequeued assembly context");
                return Ok(context);
            }
            self.returned.wait(&mut available);
        }
    }

    fn dequeue_all(&self) -> Result<Vec<Arc<AssemblyContext>>, PoolError> {
        let mut available = self.available.lock();
        while available.len() < self.registered.len() {
            self.returned.wait(&mut available);
        }
        trace!(count = available.len(), "dequeued all assembly contexts");
        Ok(std::mem::take(&mut *available))
    }

    fn enqueue(&self, context: Arc<AssemblyContext>) -> Result<(), PoolError> {
        let id = context.id();
        if !self.registered.contains(&id) {
            return Err(PoolError::NotRegistered(id));
        }
        let mut available = self.available.lock();
        if available.iter().any(|c| c.id() == id) {
            return Err(PoolError::AlreadyEnqueued(id));
        }
        available.push(context);
        trace!(context = %id, "enqueued assembly context");
        drop(available);
        // Wake everyone: a dequeue_all waiter may be waiting for this one.
        self.returned.notify_all();
        Ok(())
    }
}

impl fmt::Debug for BlockingAssemblyContextPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingAssemblyContextPool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}

/// A context checked out of a pool; returned to the pool on drop.
pub struct PooledContext<'p> {
    pool: &'p dyn AssemblyContextPool,
    context: Option<Arc<AssemblyContext>>,
}

impl<'p> PooledContext<'p> {
    pub fn dequeue(pool: &'p dyn AssemblyContextPool) -> Result<Self, PoolError> {
        let context = pool.dequeue()?;
        Ok(PooledContext {
            pool,
            context: Some(context),
        })
    }
}

impl Deref for PooledContext<'_> {
    type Target = AssemblyContext;

    fn deref(&self) -> &AssemblyContext {
        match &self.context {
            Some(context) => context,
            None => unreachable!("context is only taken on drop"),
        }
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            let id = context.id();
            if let Err(err) = self.pool.enqueue(context) {
                error!(
                    context = %id,
                    error = %err,
                    "failed to return assembly context to its pool"
                );
            }
        }
    }
}
