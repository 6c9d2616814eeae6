use std::fmt::Display;

use jsonwebtoken::errors::Error as JwtError;
use log::{error, warn};
use reqwest::Error as HttpError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::{serde_json, Json},
    Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Failed to deliver email: {0}")]
    Mail(String),
    #[error("Database rejected request ({status}): {message}")]
    Store { status: u16, message: String },
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found<S: Display>(what: S) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    pub fn bad_request<S: Display>(msg: S) -> Self {
        Self::Status(Status::BadRequest, msg.to_string())
    }

    pub fn forbidden<S: Display>(msg: S) -> Self {
        Self::Status(Status::Forbidden, msg.to_string())
    }

    pub fn unauthorized<S: Display>(msg: S) -> Self {
        Self::Status(Status::Unauthorized, msg.to_string())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Http(err) if err.is_timeout() => Status::GatewayTimeout,
            Self::Http(_) => Status::BadGateway,
            Self::Jwt(_) | Self::Mail(_) => Status::InternalServerError,
            Self::Json(_) => Status::BadGateway,
            Self::Store { status, .. } => match status {
                401 | 403 => Status::Forbidden,
                404 => Status::NotFound,
                _ => Status::BadGateway,
            },
            Self::Status(status, _) => *status,
        }
    }
}

/// Body of every error response.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{} {}: {self}", req.method(), req.uri());
        } else {
            warn!("{} {}: {self}", req.method(), req.uri());
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_rejections_map_to_client_statuses() {
        let denied = Error::Store {
            status: 401,
            message: "Permission denied".into(),
        };
        assert_eq!(denied.status(), Status::Forbidden);

        let missing = Error::Store {
            status: 404,
            message: String::new(),
        };
        assert_eq!(missing.status(), Status::NotFound);

        let broken = Error::Store {
            status: 500,
            message: String::new(),
        };
        assert_eq!(broken.status(), Status::BadGateway);
    }

    #[test]
    fn helpers_carry_their_status() {
        assert_eq!(Error::not_found("Voter abc").status(), Status::NotFound);
        assert_eq!(Error::not_found("Voter abc").to_string(), "Voter abc not found");
        assert_eq!(Error::bad_request("x").status(), Status::BadRequest);
        assert_eq!(Error::forbidden("x").status(), Status::Forbidden);
        assert_eq!(Error::unauthorized("x").status(), Status::Unauthorized);
    }
}
