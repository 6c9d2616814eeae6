use serde::{Deserialize, Serialize};

use crate::model::{fields::lenient_string, store::Document};

/// A polling station of an electoral zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingPlace {
    #[serde(rename = "zona", default, deserialize_with = "lenient_string")]
    pub zone: String,
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(rename = "endereco", default)]
    pub address: String,
    #[serde(rename = "bairro", default)]
    pub district: String,
}

impl Document for PollingPlace {
    const COLLECTION: &'static str = "localvotacao";
}

impl PollingPlace {
    /// Zones compare numerically, so `012` and `12` match.
    pub fn in_zone(&self, zone: &str) -> bool {
        let normalize = |z: &str| z.trim().trim_start_matches('0').to_string();
        normalize(&self.zone) == normalize(zone)
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::{json, serde_json};

    use super::*;

    #[test]
    fn zones_match_as_numbers() {
        let place: PollingPlace = serde_json::from_value(json!({
            "zona": 12,
            "nome": "E.E. Prof. Alves",
            "endereco": "Rua A, 10",
            "bairro": "Centro",
        }))
        .unwrap();
        assert!(place.in_zone("12"));
        assert!(place.in_zone("012"));
        assert!(!place.in_zone("120"));
    }
}
