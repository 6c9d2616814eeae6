use log::debug;
use reqwest::Client;
use rocket::{http::Status, serde::json::Value};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::mask,
};

/// An address resolved from a postal code, named the way voter forms name
/// their address fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub cep: String,
    #[serde(rename = "endereco")]
    pub street: String,
    #[serde(rename = "bairro")]
    pub district: String,
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "estado")]
    pub state: String,
}

/// Response of the lookup service. Unknown codes answer `{"erro": true}`
/// (older deployments send the string `"true"`).
#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    cep: String,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    erro: Option<Value>,
}

impl LookupResponse {
    fn not_found(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

/// Client for the postal code lookup service.
#[derive(Clone)]
pub struct PostalCodes {
    http: Client,
    base: String,
}

impl PostalCodes {
    pub fn new(http: Client, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a postal code. Codes that are not 8 digits are rejected
    /// without a request; unknown codes yield `None`.
    pub async fn lookup(&self, cep: &str) -> Result<Option<Address>> {
        let digits = mask::digits(cep);
        if digits.len() != 8 {
            return Err(Error::bad_request(format!("CEP {cep:?} must have 8 digits")));
        }

        debug!("Looking up CEP {digits}");
        let response = self
            .http
            .get(format!("{}/{digits}/json/", self.base))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Status(
                Status::BadGateway,
                format!("Postal code service responded with {}", response.status()),
            ));
        }

        let found: LookupResponse = response.json().await?;
        if found.not_found() {
            return Ok(None);
        }
        Ok(Some(Address {
            cep: if found.cep.is_empty() {
                mask::cep(&digits)
            } else {
                found.cep
            },
            street: found.logradouro,
            district: found.bairro,
            city: found.localidade,
            state: found.uf,
        }))
    }
}
