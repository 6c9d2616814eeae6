use log::warn;
use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request, State,
};

use super::Identities;
use crate::error::Error;

/// The caller on whose behalf a data-access call is made. Its token
/// authorises every request to the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    uid: String,
    email: Option<String>,
    token: String,
}

impl Session {
    pub fn new(uid: &str, email: Option<&str>, token: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.map(str::to_string),
            token: token.to_string(),
        }
    }

    /// A session authorised by the database secret rather than a user.
    pub fn service(secret: &str) -> Self {
        Self::new("", None, secret)
    }

    /// The caller's auth uid; empty for service sessions.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// The token of an `Authorization: Bearer <token>` header.
fn bearer_token<'r>(req: &'r Request<'_>) -> Option<&'r str> {
    req.headers()
        .get_one("Authorization")?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = Error;

    /// Verify the bearer ID token with the identity provider.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Some(token) = bearer_token(req) else {
            return request::Outcome::Error((
                Status::Unauthorized,
                Error::unauthorized("Missing bearer token"),
            ));
        };
        let identities = match req.guard::<&State<Identities>>().await {
            request::Outcome::Success(identities) => identities,
            _ => {
                return request::Outcome::Error((
                    Status::InternalServerError,
                    Error::Status(Status::InternalServerError, "No identity provider".into()),
                ))
            }
        };

        match identities.verify(token).await {
            Ok(identity) => request::Outcome::Success(Session {
                uid: identity.uid,
                email: identity.email,
                token: token.to_string(),
            }),
            Err(err) => {
                warn!("Rejected ID token: {err}");
                let status = if err.status().code >= 500 {
                    err.status()
                } else {
                    Status::Unauthorized
                };
                request::Outcome::Error((status, err))
            }
        }
    }
}
