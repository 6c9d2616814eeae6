use log::debug;
use reqwest::{Client, RequestBuilder, Response, Url};
use rocket::{http::Status, serde::json::Value};
use serde::Deserialize;

use super::{DocumentStore, Id};
use crate::{
    error::{Error, Result},
    model::auth::Session,
};

/// The hosted database, reached through its REST interface:
/// `{base}/{path}.json?auth={token}`, with every path segment
/// percent-encoded.
pub struct RestStore {
    http: Client,
    base: Url,
}

/// Body returned by a successful POST.
#[derive(Deserialize)]
struct PushName {
    name: Id,
}

impl RestStore {
    pub fn new(http: Client, base: Url) -> Self {
        Self { http, base }
    }

    fn url(&self, path: &str) -> Result<Url> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let last = format!("{}.json", segments.pop().unwrap_or_default());

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::Status(
                    Status::InternalServerError,
                    format!("Database URL {} cannot hold a path", self.base),
                )
            })?
            .pop_if_empty()
            .extend(segments)
            .push(&last);
        Ok(url)
    }

    async fn send(&self, session: &Session, request: RequestBuilder) -> Result<Response> {
        let response = request.query(&[("auth", session.token())]).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Error::Store {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[rocket::async_trait]
impl DocumentStore for RestStore {
    async fn get(&self, session: &Session, path: &str) -> Result<Option<Value>> {
        debug!("GET {path}");
        let response = self.send(session, self.http.get(self.url(path)?)).await?;
        let value: Value = response.json().await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn post(&self, session: &Session, path: &str, body: &Value) -> Result<Id> {
        debug!("POST {path}");
        let request = self.http.post(self.url(path)?).json(body);
        let response = self.send(session, request).await?;
        let PushName { name } = response.json().await?;
        Ok(name)
    }

    async fn put(&self, session: &Session, path: &str, body: &Value) -> Result<()> {
        debug!("PUT {path}");
        let request = self.http.put(self.url(path)?).json(body);
        self.send(session, request).await?;
        Ok(())
    }

    async fn patch(&self, session: &Session, path: &str, body: &Value) -> Result<()> {
        debug!("PATCH {path}");
        let request = self.http.patch(self.url(path)?).json(body);
        self.send(session, request).await?;
        Ok(())
    }

    async fn delete(&self, session: &Session, path: &str) -> Result<()> {
        debug!("DELETE {path}");
        self.send(session, self.http.delete(self.url(path)?)).await?;
        Ok(())
    }
}
