use chrono::{DateTime, Utc};
use rocket::serde::json::{serde_json, Value};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        fields::{iso_time, lenient_string, Timestamps},
        mask,
        ownership::{Named, Owned, Ownership},
        store::Document,
        user::Role,
    },
};

/// Whether a staff member has accepted their invitation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessorStatus {
    #[default]
    #[serde(rename = "Convidado")]
    Invited,
    #[serde(rename = "active", other)]
    Active,
}

/// A member of a political user's staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessor {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "cargo", default)]
    pub position: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "telefone", default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(default)]
    pub status: AssessorStatus,
    #[serde(rename = "tipoUser", default = "Role::assessor")]
    pub role: Role,
    #[serde(flatten)]
    pub owner: Ownership,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

impl Document for Assessor {
    const COLLECTION: &'static str = "assessores";
}

impl Owned for Assessor {
    fn ownership(&self) -> &Ownership {
        &self.owner
    }
}

impl Named for Assessor {
    const NAME: &'static str = "Assessor";
}

/// Staff fields as submitted by the app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessorForm {
    #[serde(rename = "nome", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "cargo", skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "telefone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl AssessorForm {
    pub fn normalize(mut self) -> Result<Self> {
        for field in [&mut self.name, &mut self.position].into_iter().flatten() {
            *field = field.trim().to_string();
        }
        if let Some(email) = &mut self.email {
            *email = email.trim().to_lowercase();
        }
        if let Some(cpf) = &mut self.cpf {
            *cpf = mask::cpf(cpf);
        }
        if let Some(phone) = &mut self.phone {
            *phone = mask::phone(phone);
        }

        if matches!(&self.name, Some(n) if n.is_empty()) {
            return Err(Error::bad_request("Assessor name cannot be empty"));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(Error::bad_request(format!("Invalid email {email:?}")));
            }
        }
        if let Some(cpf) = self.cpf.as_deref().filter(|c| !c.is_empty()) {
            if mask::digits(cpf).len() != 11 {
                return Err(Error::bad_request(format!("CPF {cpf:?} is incomplete")));
            }
        }
        Ok(self)
    }

    /// A newly invited staff member. Name and email are required, since the
    /// invitation is sent by email.
    pub fn into_assessor(self, owner: Ownership, now: DateTime<Utc>) -> Result<Assessor> {
        let form = self.normalize()?;
        let name = form.name.filter(|n| !n.is_empty());
        let (Some(name), Some(email)) = (name, form.email) else {
            return Err(Error::bad_request("Name and email are required"));
        };
        Ok(Assessor {
            name,
            position: form.position.unwrap_or_default(),
            cpf: form.cpf.unwrap_or_default(),
            email,
            phone: form.phone.unwrap_or_default(),
            status: AssessorStatus::Invited,
            role: Role::Assessor,
            owner,
            stamps: Timestamps::created(now),
        })
    }

    /// The fields to merge into the staff record and the member's profile.
    pub fn into_patch(self, now: DateTime<Utc>) -> Result<Value> {
        let mut patch = serde_json::to_value(self.normalize()?)?;
        if let Value::Object(fields) = &mut patch {
            fields.insert("updatedAt".into(), Value::String(iso_time::format(&now)));
        }
        Ok(patch)
    }
}
