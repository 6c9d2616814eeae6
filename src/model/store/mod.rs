//! Access to the document-tree database.
//!
//! The database is a single JSON tree addressed by slash-separated paths.
//! Reads return whole subtrees, writes replace (`put`), merge (`patch`),
//! append under a fresh key (`post`) or remove (`delete`) them.

mod collection;
mod id;
mod memory;
mod rest;

use std::{ops::Deref, sync::Arc};

use rocket::serde::json::Value;

use crate::{error::Result, model::auth::Session};

pub use collection::{Coll, Document, Record};
pub use id::{Id, InvalidKey};
pub use memory::MemoryStore;
pub use rest::RestStore;

/// A backend holding the document tree. Every call is authorised by the
/// given session's token.
#[rocket::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the subtree at `path`. Absent and `null` nodes yield `None`.
    async fn get(&self, session: &Session, path: &str) -> Result<Option<Value>>;

    /// Append `body` as a new child of `path`, returning the generated key.
    async fn post(&self, session: &Session, path: &str, body: &Value) -> Result<Id>;

    /// Replace the node at `path` with `body`.
    async fn put(&self, session: &Session, path: &str, body: &Value) -> Result<()>;

    /// Merge the fields of `body` into the node at `path`. A `null` field
    /// removes the child of that name.
    async fn patch(&self, session: &Session, path: &str, body: &Value) -> Result<()>;

    /// Remove the node at `path` together with its subtree.
    async fn delete(&self, session: &Session, path: &str) -> Result<()>;
}

/// Handle on the configured document store, kept in managed state.
#[derive(Clone)]
pub struct Store(Arc<dyn DocumentStore>);

impl Store {
    pub fn new<S: DocumentStore + 'static>(store: S) -> Self {
        Self(Arc::new(store))
    }
}

impl Deref for Store {
    type Target = dyn DocumentStore;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

/// Join path segments, ignoring stray slashes at either end of each.
pub fn join(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_trims_separators() {
        assert_eq!(join(&["/tarefas/", "abc", "comentarios"]), "tarefas/abc/comentarios");
        assert_eq!(join(&["users", ""]), "users");
    }
}
