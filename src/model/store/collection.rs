use std::{
    marker::PhantomData,
    ops::{Deref, DerefMut},
};

use log::warn;
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    serde::json::{serde_json, Value},
    State,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{join, Id, Store};
use crate::{error::Result, model::auth::Session};

/// A type stored as the children of a fixed node of the document tree.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Path of the node holding every record of this type.
    const COLLECTION: &'static str;
}

/// A record together with the key it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    pub id: Id,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for Record<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

/// A typed view of one collection in the document store.
pub struct Coll<T> {
    store: Store,
    path: String,
    _marker: PhantomData<fn() -> T>,
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Coll<T> {
    /// The top-level collection of `T`.
    pub fn from_store(store: &Store) -> Self {
        Self {
            store: store.clone(),
            path: T::COLLECTION.to_string(),
            _marker: PhantomData,
        }
    }

    /// The collection of `T` nested under the record `parent` of `P`, e.g. a
    /// task's comments.
    pub fn nested<P: Document>(store: &Store, parent: &Id) -> Self {
        Self {
            store: store.clone(),
            path: join(&[P::COLLECTION, parent.as_str(), T::COLLECTION]),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn record_path(&self, id: &Id) -> String {
        join(&[self.path.as_str(), id.as_str()])
    }

    /// Every record of the collection, in key order. Records that do not
    /// decode are skipped.
    pub async fn find_all(&self, session: &Session) -> Result<Vec<Record<T>>> {
        let children = match self.store.get(session, &self.path).await? {
            None => return Ok(Vec::new()),
            Some(Value::Object(map)) => map.into_iter().collect::<Vec<_>>(),
            // Integer-like keys come back as an array with holes.
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            Some(other) => {
                warn!("Expected a collection at {}, found {other}", self.path);
                return Ok(Vec::new());
            }
        };

        let records = children
            .into_iter()
            .filter_map(|(key, value)| {
                let id = match key.parse::<Id>() {
                    Ok(id) => id,
                    Err(e) => {
                        warn!("Skipping record in {}: {e}", self.path);
                        return None;
                    }
                };
                match serde_json::from_value::<T>(value) {
                    Ok(data) => Some(Record { id, data }),
                    Err(e) => {
                        warn!("Skipping malformed record {}/{id}: {e}", self.path);
                        None
                    }
                }
            })
            .collect();
        Ok(records)
    }

    /// The matching records of the collection.
    pub async fn find<F>(&self, session: &Session, predicate: F) -> Result<Vec<Record<T>>>
    where
        F: Fn(&Record<T>) -> bool + Send,
    {
        let mut records = self.find_all(session).await?;
        records.retain(|r| predicate(r));
        Ok(records)
    }

    /// A single record, or `None` if the key is absent.
    pub async fn find_one(&self, session: &Session, id: &Id) -> Result<Option<Record<T>>> {
        match self.store.get(session, &self.record_path(id)).await? {
            Some(value) => Ok(Some(Record {
                id: id.clone(),
                data: serde_json::from_value(value)?,
            })),
            None => Ok(None),
        }
    }

    /// Store a new record under a generated key.
    pub async fn insert(&self, session: &Session, data: T) -> Result<Record<T>> {
        let body = serde_json::to_value(&data)?;
        let id = self.store.post(session, &self.path, &body).await?;
        Ok(Record { id, data })
    }

    /// Store a record under a chosen key, replacing anything already there.
    pub async fn put(&self, session: &Session, id: &Id, data: &T) -> Result<()> {
        let body = serde_json::to_value(data)?;
        self.store.put(session, &self.record_path(id), &body).await
    }

    /// Merge the fields of `changes` into an existing record.
    pub async fn update<U>(&self, session: &Session, id: &Id, changes: &U) -> Result<()>
    where
        U: Serialize + Sync + ?Sized,
    {
        let body = serde_json::to_value(changes)?;
        self.store.patch(session, &self.record_path(id), &body).await
    }

    /// Remove a record and everything nested under it.
    pub async fn delete(&self, session: &Session, id: &Id) -> Result<()> {
        self.store.delete(session, &self.record_path(id)).await
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: Document,
{
    type Error = ();

    /// Get the store from the managed state and wrap it in a collection.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<&State<Store>>().await {
            request::Outcome::Success(store) => request::Outcome::Success(Coll::from_store(store)),
            _ => request::Outcome::Error((Status::InternalServerError, ())),
        }
    }
}
