use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use rand::{distributions::Alphanumeric, Rng};
use rocket::serde::json::Value;

use super::{DocumentStore, Id};
use crate::{
    error::{Error, Result},
    model::auth::Session,
};

/// A volatile document tree held in process memory. Used by the `memory`
/// database setting and by tests.
///
/// Clones share the same tree.
#[derive(Clone, Default)]
pub struct MemoryStore {
    root: Arc<Mutex<Value>>,
    counter: Arc<AtomicU64>,
    reject_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Make every subsequent write fail the way the hosted database fails an
    /// unauthorised request.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// A copy of the node at `path`, bypassing authorisation.
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        let root = self.lock();
        node(&root, path).filter(|v| !v.is_null()).cloned()
    }

    /// Overwrite the node at `path`, bypassing authorisation.
    pub fn seed(&self, path: &str, value: Value) {
        set(&mut self.lock(), path, value);
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        // Every write leaves a complete tree behind, so poisoning is harmless.
        self.root.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            Err(Error::Store {
                status: 401,
                message: "Permission denied".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Keys sort in creation order, like the hosted database's push keys.
    fn next_key(&self) -> Id {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        Id(format!("-M{n:08}{suffix}"))
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn node<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    segments(path).try_fold(root, |node, key| match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `value` at `path`, creating parents as needed. `null` removes.
fn set(root: &mut Value, path: &str, value: Value) {
    let keys: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = keys.split_last() else {
        *root = value;
        return;
    };
    if value.is_null() {
        let parent = parents.iter().try_fold(root, |node, key| node.get_mut(*key));
        if let Some(Value::Object(map)) = parent {
            map.remove(*last);
        }
        return;
    }
    let mut node = root;
    for key in &keys {
        // Scalars on the way down are replaced by objects.
        if !node.is_object() {
            *node = Value::Null;
        }
        node = &mut node[*key];
    }
    *node = value;
}

#[rocket::async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, _session: &Session, path: &str) -> Result<Option<Value>> {
        Ok(self.snapshot(path))
    }

    async fn post(&self, _session: &Session, path: &str, body: &Value) -> Result<Id> {
        self.check_writable()?;
        let id = self.next_key();
        set(&mut self.lock(), &format!("{path}/{id}"), body.clone());
        Ok(id)
    }

    async fn put(&self, _session: &Session, path: &str, body: &Value) -> Result<()> {
        self.check_writable()?;
        set(&mut self.lock(), path, body.clone());
        Ok(())
    }

    async fn patch(&self, _session: &Session, path: &str, body: &Value) -> Result<()> {
        self.check_writable()?;
        let Value::Object(fields) = body else {
            return Err(Error::Store {
                status: 400,
                message: "Invalid data; patch body must be an object".to_string(),
            });
        };
        let mut root = self.lock();
        for (key, value) in fields {
            set(&mut root, &format!("{path}/{key}"), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, _session: &Session, path: &str) -> Result<()> {
        self.check_writable()?;
        set(&mut self.lock(), path, Value::Null);
        Ok(())
    }
}
