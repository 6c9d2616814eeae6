use std::{
    fmt::{Display, Formatter},
    ops::Deref,
    str::FromStr,
};

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters the database refuses in keys.
const FORBIDDEN: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Longest key the database accepts, in bytes.
const MAX_KEY_LEN: usize = 768;

/// The key of a node in the document tree, e.g. a server-generated push key
/// or a user's auth uid.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub(super) String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid key {0:?}")]
pub struct InvalidKey(String);

impl Id {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Id {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Id {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.len() <= MAX_KEY_LEN
            && !s.chars().any(|c| c.is_control() || FORBIDDEN.contains(&c));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidKey(s.to_string()))
        }
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = InvalidKey;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<Id>()
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(&self.0)
    }
}

impl_from_uri_param_identity!([Path] Id);
