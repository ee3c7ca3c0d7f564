use super::*;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use tpipe_model::ModuleEmitter;

use crate::pool::BlockingAssemblyContextPool;

/// Counts calls reaching the wrapped pool.
struct CountingPool {
    inner: BlockingAssemblyContextPool,
    dequeues: AtomicUsize,
    enqueues: AtomicUsize,
    reject_next_enqueue: AtomicBool,
}

impl CountingPool {
    fn with_contexts(count: usize) -> Self {
        let contexts = (0..count)
            .map(|_| {
                Arc::new(AssemblyContext::new(Box::new(ModuleEmitter::new(
                    "ThreadLocal_{counter}",
                ))))
            })
            .collect();
        CountingPool {
            inner: BlockingAssemblyContextPool::new(contexts).unwrap(),
            dequeues: AtomicUsize::new(0),
            enqueues: AtomicUsize::new(0),
            reject_next_enqueue: AtomicBool::new(false),
        }
    }
}

impl AssemblyContextPool for CountingPool {
    fn dequeue(&self) -> Result<Arc<AssemblyContext>, PoolError> {
        self.dequeues.fetch_add(1, Ordering::SeqCst);
        self.inner.dequeue()
    }

    fn dequeue_all(&self) -> Result<Vec<Arc<AssemblyContext>>, PoolError> {
        self.inner.dequeue_all()
    }

    fn enqueue(&self, context: Arc<AssemblyContext>) -> Result<(), PoolError> {
        self.enqueues.fetch_add(1, Ordering::SeqCst);
        if self.reject_next_enqueue.swap(false, Ordering::SeqCst) {
            return Err(PoolError::NotRegistered(context.id()));
        }
        self.inner.enqueue(context)
    }
}

#[test]
fn test_nested_dequeue_returns_same_context() {
    let pool = ThreadLocalAssemblyContextPoolDecorator::new(CountingPool::with_contexts(2));
    let outer = pool.dequeue().unwrap();
    let inner = pool.dequeue().unwrap();
    assert_eq!(outer.id(), inner.id());
    assert_eq!(pool.inner().dequeues.load(Ordering::SeqCst), 1);

    pool.enqueue(inner).unwrap();
    assert_eq!(pool.inner().enqueues.load(Ordering::SeqCst), 0);
    assert_eq!(pool.inner().inner.available(), 1);

    pool.enqueue(outer).unwrap();
    assert_eq!(pool.inner().enqueues.load(Ordering::SeqCst), 1);
    assert_eq!(pool.inner().inner.available(), 2);
}

#[test]
fn test_other_threads_get_other_contexts() {
    let pool = ThreadLocalAssemblyContextPoolDecorator::new(CountingPool::with_contexts(2));
    let mine = pool.dequeue().unwrap();
    let theirs = std::thread::scope(|s| {
        s.spawn(|| {
            let context = pool.dequeue().unwrap();
            let id = context.id();
            pool.enqueue(context).unwrap();
            id
        })
        .join()
        .unwrap()
    });
    assert_ne!(mine.id(), theirs);
    pool.enqueue(mine).unwrap();
}

#[test]
fn test_dequeue_all_while_holding_a_context_fails() {
    let pool = ThreadLocalAssemblyContextPoolDecorator::new(CountingPool::with_contexts(1));
    let held = pool.dequeue().unwrap();
    assert_eq!(
        pool.dequeue_all().unwrap_err(),
        PoolError::DequeueOutstanding
    );

    pool.enqueue(held).unwrap();
    let all = pool.dequeue_all().unwrap();
    assert_eq!(all.len(), 1);
    for context in all {
        pool.enqueue(context).unwrap();
    }
}

#[test]
fn test_dequeue_after_dequeue_all_fails_until_all_returned() {
    let pool = ThreadLocalAssemblyContextPoolDecorator::new(CountingPool::with_contexts(2));
    let mut all = pool.dequeue_all().unwrap();
    assert_eq!(
        pool.dequeue().unwrap_err(),
        PoolError::DequeueAllOutstanding
    );
    assert_eq!(
        pool.dequeue_all().unwrap_err(),
        PoolError::DequeueAllOutstanding
    );

    let last = all.pop().unwrap();
    for context in all {
        pool.enqueue(context).unwrap();
    }
    assert_eq!(
        pool.dequeue().unwrap_err(),
        PoolError::DequeueAllOutstanding
    );

    pool.enqueue(last).unwrap();
    let context = pool.dequeue().unwrap();
    pool.enqueue(context).unwrap();
}

#[test]
fn test_untracked_context_passes_through() {
    let pool = ThreadLocalAssemblyContextPoolDecorator::new(CountingPool::with_contexts(1));
    let context = pool.inner().inner.dequeue().unwrap();
    pool.enqueue(context).unwrap();
    assert_eq!(pool.inner().enqueues.load(Ordering::SeqCst), 1);
    assert_eq!(pool.inner().inner.available(), 1);
}

#[test]
fn test_failed_inner_enqueue_still_releases_thread_state() {
    let pool = ThreadLocalAssemblyContextPoolDecorator::new(CountingPool::with_contexts(1));
    let context = pool.dequeue().unwrap();
    let id = context.id();

    let inner = pool.inner();
    inner.reject_next_enqueue.store(true, Ordering::SeqCst);
    assert_eq!(
        pool.enqueue(Arc::clone(&context)).unwrap_err(),
        PoolError::NotRegistered(id)
    );
    assert_eq!(pool.inner().inner.available(), 0);

    // The thread no longer holds anything, so the retry goes straight through.
    pool.enqueue(context).unwrap();
    assert_eq!(pool.inner().enqueues.load(Ordering::SeqCst), 2);
    assert_eq!(pool.inner().inner.available(), 1);

    let all = pool.dequeue_all().unwrap();
    assert_eq!(all.len(), 1);
    for context in all {
        pool.enqueue(context).unwrap();
    }
    let again = pool.dequeue().unwrap();
    assert_eq!(again.id(), id);
    pool.enqueue(again).unwrap();
}
