use std::future::Future;
use std::sync::Arc;

use rocket::futures::future::{join_all, select, Either};
use rocket::tokio::{
    self,
    sync::Semaphore,
    task::{JoinError, JoinHandle},
};

/// A group of spawned tasks, at most `limit` of which run at once.
/// The group can be awaited as a whole, or abandoned when a cancellation
/// signal fires first.
pub struct TaskGroup<T> {
    permits: Arc<Semaphore>,
    handles: Vec<JoinHandle<T>>,
}

impl<T> TaskGroup<T>
where
    T: Send + 'static,
{
    /// An empty group. A `limit` of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit.max(1))),
            handles: Vec::new(),
        }
    }

    /// Spawn a task into the group. It starts once a slot is free.
    pub fn spawn<Fut>(&mut self, task: Fut)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let permits = self.permits.clone();
        self.handles.push(tokio::spawn(async move {
            // The semaphore is never closed, so this only waits.
            let _permit = permits.acquire_owned().await.ok();
            task.await
        }));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task to finish, in spawn order.
    /// If `cancel` completes first, every unfinished task is aborted and
    /// reports a cancelled `JoinError`.
    pub async fn join_until<C>(self, cancel: C) -> Vec<Result<T, JoinError>>
    where
        C: Future<Output = ()>,
    {
        let aborts: Vec<_> = self.handles.iter().map(|h| h.abort_handle()).collect();
        let all = Box::pin(join_all(self.handles));
        match select(all, Box::pin(cancel)).await {
            Either::Left((results, _)) => results,
            Either::Right(((), pending)) => {
                for abort in &aborts {
                    abort.abort();
                }
                pending.await
            }
        }
    }
}
