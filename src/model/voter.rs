use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rocket::{
    serde::json::{serde_json, Value},
    FromFormField,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        fields::{iso_time, lenient_string, Timestamps},
        mask,
        ownership::{Named, Owned, Ownership},
        store::Document,
    },
};

/// How a voter relates to the campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
pub enum VoterStatus {
    #[serde(rename = "Apoiador")]
    #[field(value = "Apoiador")]
    Supporter,
    #[serde(rename = "Indeciso")]
    #[field(value = "Indeciso")]
    Undecided,
    #[serde(rename = "Pendente")]
    #[field(value = "Pendente")]
    Pending,
    #[default]
    #[serde(rename = "Novo", other)]
    #[field(value = "Novo")]
    New,
}

/// A registered voter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(default)]
    pub cpf: String,
    /// `DD/MM/YYYY`
    #[serde(rename = "nascimento", default)]
    pub birth_date: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "telefone", default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cep: String,
    #[serde(rename = "endereco", default)]
    pub street: String,
    #[serde(rename = "numero", default, deserialize_with = "lenient_string")]
    pub number: String,
    #[serde(rename = "bairro", default)]
    pub district: String,
    #[serde(rename = "cidade", default)]
    pub city: String,
    #[serde(rename = "estado", default)]
    pub state: String,
    #[serde(rename = "titulo", default, deserialize_with = "lenient_string")]
    pub voter_card: String,
    #[serde(rename = "zona", default, deserialize_with = "lenient_string")]
    pub zone: String,
    #[serde(rename = "secao", default, deserialize_with = "lenient_string")]
    pub section: String,
    #[serde(default)]
    pub zona_secao: String,
    #[serde(default)]
    pub local_votacao: String,
    #[serde(default)]
    pub status: VoterStatus,
    #[serde(flatten)]
    pub owner: Ownership,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

impl Document for Voter {
    const COLLECTION: &'static str = "eleitores";
}

impl Owned for Voter {
    fn ownership(&self) -> &Ownership {
        &self.owner
    }
}

impl Named for Voter {
    const NAME: &'static str = "Voter";
}

impl Voter {
    /// Day and month of birth, if the birth date is readable.
    pub fn birthday(&self) -> Option<(u32, u32)> {
        let mut parts = self.birth_date.split('/');
        let day = parts.next()?.trim().parse::<u32>().ok()?;
        let month = parts.next()?.trim().parse::<u32>().ok()?;
        ((1..=31).contains(&day) && (1..=12).contains(&month)).then_some((day, month))
    }

    pub fn has_birthday_on(&self, date: NaiveDate) -> bool {
        self.birthday() == Some((date.day(), date.month()))
    }

    /// Does the name, CPF or phone contain `query`?
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let query_digits = mask::digits(&query);
        self.name.to_lowercase().contains(&query)
            || (!query_digits.is_empty()
                && (mask::digits(&self.cpf).contains(&query_digits)
                    || mask::digits(&self.phone).contains(&query_digits)))
    }
}

/// Voter fields as submitted by the app. Absent fields are left unchanged
/// by an update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterForm {
    #[serde(rename = "nome", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(rename = "nascimento", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "telefone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cep: Option<String>,
    #[serde(rename = "endereco", skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(rename = "numero", skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "bairro", skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(rename = "cidade", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "estado", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "titulo", skip_serializing_if = "Option::is_none")]
    pub voter_card: Option<String>,
    #[serde(rename = "zona", skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(rename = "secao", skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zona_secao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_votacao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VoterStatus>,
}

impl VoterForm {
    /// Trim every field, apply the input masks and check the masked values.
    pub fn normalize(mut self) -> Result<Self> {
        for field in [
            &mut self.name,
            &mut self.email,
            &mut self.street,
            &mut self.number,
            &mut self.district,
            &mut self.city,
            &mut self.state,
            &mut self.local_votacao,
        ]
        .into_iter()
        .flatten()
        {
            *field = field.trim().to_string();
        }
        apply(&mut self.cpf, mask::cpf);
        apply(&mut self.birth_date, mask::date);
        apply(&mut self.phone, mask::phone);
        apply(&mut self.cep, mask::cep);
        apply(&mut self.voter_card, mask::voter_card);
        apply(&mut self.zona_secao, mask::zone_section);
        if let Some(state) = &mut self.state {
            *state = state.to_uppercase();
        }

        if matches!(&self.name, Some(name) if name.is_empty()) {
            return Err(Error::bad_request("Voter name cannot be empty"));
        }
        check_digits("CPF", self.cpf.as_deref(), &[11])?;
        check_digits("Phone", self.phone.as_deref(), &[10, 11])?;
        check_digits("CEP", self.cep.as_deref(), &[8])?;
        check_digits("Voter card", self.voter_card.as_deref(), &[12])?;
        if let Some(date) = self.birth_date.as_deref().filter(|d| !d.is_empty()) {
            if NaiveDate::parse_from_str(date, "%d/%m/%Y").is_err() {
                return Err(Error::bad_request(format!("Invalid birth date {date:?}")));
            }
        }
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            if !email.contains('@') {
                return Err(Error::bad_request(format!("Invalid email {email:?}")));
            }
        }
        Ok(self)
    }

    /// A new voter. Name and CPF are required.
    pub fn into_voter(self, owner: Ownership, now: DateTime<Utc>) -> Result<Voter> {
        let form = self.normalize()?;
        let name = form.name.filter(|n| !n.is_empty());
        let cpf = form.cpf.filter(|c| !c.is_empty());
        let (Some(name), Some(cpf)) = (name, cpf) else {
            return Err(Error::bad_request("Name and CPF are required"));
        };
        Ok(Voter {
            name,
            cpf,
            birth_date: form.birth_date.unwrap_or_default(),
            email: form.email.unwrap_or_default(),
            phone: form.phone.unwrap_or_default(),
            cep: form.cep.unwrap_or_default(),
            street: form.street.unwrap_or_default(),
            number: form.number.unwrap_or_default(),
            district: form.district.unwrap_or_default(),
            city: form.city.unwrap_or_default(),
            state: form.state.unwrap_or_default(),
            voter_card: form.voter_card.unwrap_or_default(),
            zone: form.zone.unwrap_or_default(),
            section: form.section.unwrap_or_default(),
            zona_secao: form.zona_secao.unwrap_or_default(),
            local_votacao: form.local_votacao.unwrap_or_default(),
            status: form.status.unwrap_or_default(),
            owner,
            stamps: Timestamps::created(now),
        })
    }

    /// The fields to merge into an existing voter.
    pub fn into_patch(self, now: DateTime<Utc>) -> Result<Value> {
        let form = self.normalize()?;
        let mut patch = serde_json::to_value(form)?;
        if let Value::Object(fields) = &mut patch {
            fields.insert("updatedAt".into(), Value::String(iso_time::format(&now)));
        }
        Ok(patch)
    }
}

fn apply(field: &mut Option<String>, mask: fn(&str) -> String) {
    if let Some(value) = field {
        *value = mask(value);
    }
}

fn check_digits(what: &str, value: Option<&str>, lengths: &[usize]) -> Result<()> {
    match value {
        Some(v) if !v.is_empty() && !lengths.contains(&mask::digits(v).len()) => {
            Err(Error::bad_request(format!("{what} {v:?} is incomplete")))
        }
        _ => Ok(()),
    }
}
