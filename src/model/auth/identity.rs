use std::{ops::Deref, sync::Arc};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Who an ID token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
}

/// Verifies ID tokens issued to the mobile app.
#[rocket::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<Identity>;
}

/// Handle on the configured identity provider, kept in managed state.
#[derive(Clone)]
pub struct Identities(pub Arc<dyn IdentityProvider>);

impl Deref for Identities {
    type Target = dyn IdentityProvider;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

/// The hosted identity toolkit, queried through `accounts:lookup`.
pub struct FirebaseIdentity {
    http: Client,
    url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
}

impl FirebaseIdentity {
    pub fn new(http: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            url: format!("{}/accounts:lookup", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }
}

#[rocket::async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn verify(&self, id_token: &str) -> Result<Identity> {
        let response = self
            .http
            .post(&self.url)
            .query(&[("key", &self.api_key)])
            .json(&LookupRequest { id_token })
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::BAD_REQUEST => return Err(Error::unauthorized("Invalid ID token")),
            s => {
                return Err(Error::Status(
                    rocket::http::Status::BadGateway,
                    format!("Identity provider responded with {s}"),
                ))
            }
        }

        let lookup: LookupResponse = response.json().await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| Error::unauthorized("ID token has no matching account"))?;
        Ok(Identity {
            uid: user.local_id,
            email: user.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, serde::json::json};
    use wiremock::{
        matchers::{body_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    async fn provider(server: &MockServer) -> FirebaseIdentity {
        FirebaseIdentity::new(Client::new(), &format!("{}/v1", server.uri()), "api-key")
    }

    #[rocket::async_test]
    async fn verified_tokens_yield_the_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:lookup"))
            .and(query_param("key", "api-key"))
            .and(body_json(json!({"idToken": "good"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [{"localId": "uid-7", "email": "ana@example.com"}]
            })))
            .mount(&server)
            .await;

        let identity = provider(&server).await.verify("good").await.unwrap();
        assert_eq!(
            identity,
            Identity {
                uid: "uid-7".into(),
                email: Some("ana@example.com".into()),
            }
        );
    }

    #[rocket::async_test]
    async fn rejected_tokens_are_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "INVALID_ID_TOKEN"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server).await.verify("bad").await.unwrap_err();
        assert_eq!(err.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn empty_lookups_are_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = provider(&server).await.verify("orphan").await.unwrap_err();
        assert_eq!(err.status(), Status::Unauthorized);
    }
}
