//! Local mirrors of remote collections, updated optimistically.
//!
//! A mutation is applied to the local copy first, then sent to the store.
//! If the store rejects it the local copy is put back the way it was and
//! the error is returned. Nothing detects concurrent writers; the last
//! write to reach the store wins.

use std::future::Future;

use chrono::{DateTime, Utc};
use log::warn;
use rocket::futures::future::join_all;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    model::{
        auth::Session,
        fields::iso_time,
        notification::Notification,
        store::{Coll, Document, Id, Record},
        task::{Task, TaskStatus},
    },
};

/// A fetched list of records.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceList<T> {
    items: Vec<Record<T>>,
}

impl<T> ResourceList<T> {
    pub fn new(items: Vec<Record<T>>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Record<T>] {
        &self.items
    }

    fn position(&self, id: &Id) -> Result<usize> {
        self.items
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| Error::not_found(format!("Record {id}")))
    }
}

impl<T: Clone + Send + Sync> ResourceList<T> {
    /// Apply `change` to the record `id` locally, then `commit` the changed
    /// record. A failed commit restores the record.
    pub async fn mutate<C, F, Fut>(&mut self, id: &Id, change: C, commit: F) -> Result<&Record<T>>
    where
        C: FnOnce(&mut T) + Send,
        F: FnOnce(Record<T>) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let index = self.position(id)?;
        let prior = self.items[index].clone();
        change(&mut self.items[index].data);

        if let Err(err) = commit(self.items[index].clone()).await {
            warn!("Reverting local change to {id}: {err}");
            self.items[index] = prior;
            return Err(err);
        }
        Ok(&self.items[index])
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusPatch {
    status: TaskStatus,
    #[serde(with = "iso_time")]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct ReadPatch {
    read: bool,
}

impl ResourceList<Task> {
    /// Flip a task between pending and done.
    pub async fn toggle(
        &mut self,
        coll: &Coll<Task>,
        session: &Session,
        id: &Id,
        now: DateTime<Utc>,
    ) -> Result<&Record<Task>> {
        self.mutate(
            id,
            |task| task.status = task.status.toggled(),
            |record| async move {
                let patch = StatusPatch {
                    status: record.status,
                    updated_at: Some(now),
                };
                coll.update(session, &record.id, &patch).await
            },
        )
        .await
    }
}

impl ResourceList<Notification> {
    /// Mark one notification as read.
    pub async fn mark_read(
        &mut self,
        coll: &Coll<Notification>,
        session: &Session,
        id: &Id,
    ) -> Result<&Record<Notification>> {
        self.mutate(
            id,
            |n| n.read = true,
            |record| async move { coll.update(session, &record.id, &ReadPatch { read: true }).await },
        )
        .await
    }

    /// Mark every unread notification in the list as read. Updates are
    /// sent concurrently; those the store rejects are reverted and the
    /// first rejection is returned. Returns how many were marked.
    pub async fn mark_all_read(
        &mut self,
        coll: &Coll<Notification>,
        session: &Session,
    ) -> Result<usize> {
        let unread: Vec<usize> = (0..self.items.len())
            .filter(|&i| !self.items[i].read)
            .collect();
        for &i in &unread {
            self.items[i].read = true;
        }

        let updates = unread.iter().map(|&i| {
            let id = self.items[i].id.clone();
            async move { coll.update(session, &id, &ReadPatch { read: true }).await }
        });
        let results = join_all(updates).await;

        let mut first_error = None;
        for (&i, result) in unread.iter().zip(results) {
            if let Err(err) = result {
                warn!("Reverting read state of {}: {err}", self.items[i].id);
                self.items[i].read = false;
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(unread.len()),
        }
    }
}

/// Load a single record into a one-item list, ready for a mutation.
pub fn single<T: Document>(record: Record<T>) -> ResourceList<T> {
    ResourceList::new(vec![record])
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::serde::json::json;

    use super::*;
    use crate::model::{
        notification::NotificationKind,
        store::{MemoryStore, Store},
    };

    fn session() -> Session {
        Session::new("u1", None, "token")
    }

    async fn seeded_tasks(memory: &MemoryStore) -> (Coll<Task>, ResourceList<Task>) {
        let task = Task::example("u1", "u1", "Reunião", Duration::hours(2));
        memory.seed("tarefas/t1", rocket::serde::json::serde_json::to_value(&task).unwrap());
        let coll = Coll::<Task>::from_store(&Store::new(memory.clone()));
        let list = ResourceList::new(coll.find_all(&session()).await.unwrap());
        (coll, list)
    }

    #[rocket::async_test]
    async fn toggle_updates_local_and_remote_state() {
        let memory = MemoryStore::default();
        let (coll, mut list) = seeded_tasks(&memory).await;
        let id: Id = "t1".parse().unwrap();

        let toggled = list.toggle(&coll, &session(), &id, Utc::now()).await.unwrap();
        assert_eq!(toggled.status, TaskStatus::Done);
        assert_eq!(memory.snapshot("tarefas/t1/status"), Some(json!("done")));
    }

    #[rocket::async_test]
    async fn rejected_toggle_restores_the_prior_state() {
        let memory = MemoryStore::default();
        let (coll, mut list) = seeded_tasks(&memory).await;
        let before = list.clone();
        let id: Id = "t1".parse().unwrap();

        memory.reject_writes(true);
        let err = list.toggle(&coll, &session(), &id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, Error::Store { status: 401, .. }));
        assert_eq!(list, before);
        assert_eq!(memory.snapshot("tarefas/t1/status"), Some(json!("pending")));
    }

    #[rocket::async_test]
    async fn mark_all_read_counts_only_unread() {
        let memory = MemoryStore::default();
        let mut read = Notification::example(NotificationKind::System, "u1", "a");
        read.read = true;
        let unread = Notification::example(NotificationKind::Task, "u1", "b");
        memory.seed(
            "notificacoes",
            json!({
                "n1": rocket::serde::json::serde_json::to_value(&read).unwrap(),
                "n2": rocket::serde::json::serde_json::to_value(&unread).unwrap(),
            }),
        );
        let coll = Coll::<Notification>::from_store(&Store::new(memory.clone()));
        let mut list = ResourceList::new(coll.find_all(&session()).await.unwrap());

        assert_eq!(list.mark_all_read(&coll, &session()).await.unwrap(), 1);
        assert!(list.items().iter().all(|n| n.read));
        assert_eq!(memory.snapshot("notificacoes/n2/read"), Some(json!(true)));
    }

    #[rocket::async_test]
    async fn rejected_mark_all_read_reverts() {
        let memory = MemoryStore::default();
        let unread = Notification::example(NotificationKind::Task, "u1", "b");
        memory.seed(
            "notificacoes/n1",
            rocket::serde::json::serde_json::to_value(&unread).unwrap(),
        );
        let coll = Coll::<Notification>::from_store(&Store::new(memory.clone()));
        let mut list = ResourceList::new(coll.find_all(&session()).await.unwrap());

        memory.reject_writes(true);
        assert!(list.mark_all_read(&coll, &session()).await.is_err());
        assert!(list.items().iter().all(|n| !n.read));
    }

    #[rocket::async_test]
    async fn mutating_an_unknown_record_is_not_found() {
        let mut list: ResourceList<Task> = ResourceList::new(Vec::new());
        let coll = Coll::<Task>::from_store(&Store::new(MemoryStore::default()));
        let id: Id = "missing".parse().unwrap();
        let err = list.toggle(&coll, &session(), &id, Utc::now()).await.unwrap_err();
        assert_eq!(err.status(), rocket::http::Status::NotFound);
    }
}
