use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{auth::Session, fields::lenient_string, mask, store::Document},
};

/// The kind of account a profile belongs to. Anything but staff signs in to
/// the political user's views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "assessor")]
    Assessor,
    #[serde(rename = "cidadao")]
    Citizen,
    #[default]
    #[serde(rename = "politico", other)]
    Politician,
}

impl Role {
    pub fn assessor() -> Self {
        Self::Assessor
    }
}

/// Subscription tier of a campaign, bounding how many voters it may hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Pro,
    Premium,
    #[default]
    #[serde(other)]
    Basic,
}

impl PlanTier {
    pub fn voter_limit(self) -> usize {
        match self {
            Self::Basic => 200,
            Self::Pro => 2000,
            Self::Premium => 10000,
        }
    }
}

/// The profile stored under `users/{uid}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "telefone", default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(rename = "tipoUser", default)]
    pub role: Role,
    #[serde(rename = "tipoPlano", default)]
    pub plan: PlanTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub admin_id: String,
}

impl Document for UserProfile {
    const COLLECTION: &'static str = "users";
}

impl UserProfile {
    /// The uid of the political user whose campaign this account works on.
    pub fn campaign_owner<'a>(&'a self, uid: &'a str) -> &'a str {
        if self.role == Role::Assessor && !self.admin_id.is_empty() {
            &self.admin_id
        } else {
            uid
        }
    }
}

/// The campaign owner for a caller with an optional stored profile.
pub fn campaign_owner<'a>(profile: Option<&'a UserProfile>, session: &'a Session) -> &'a str {
    match profile {
        Some(profile) => profile.campaign_owner(session.uid()),
        None => session.uid(),
    }
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    #[serde(rename = "nome", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "telefone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    /// Device token for push messages. An empty string unregisters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
}

impl ProfileForm {
    pub fn normalize(mut self) -> Result<Self> {
        if let Some(name) = &mut self.name {
            *name = name.trim().to_string();
            if name.is_empty() {
                return Err(Error::bad_request("Name cannot be empty"));
            }
        }
        if let Some(phone) = &mut self.phone {
            *phone = mask::phone(phone);
        }
        if let Some(cpf) = &mut self.cpf {
            *cpf = mask::cpf(cpf);
        }
        if let Some(token) = &mut self.push_token {
            *token = token.trim().to_string();
        }
        if self.name.is_none() && self.phone.is_none() && self.cpf.is_none() && self.push_token.is_none()
        {
            return Err(Error::bad_request("Nothing to update"));
        }
        Ok(self)
    }
}


#[cfg(test)]
mod tests {
    use rocket::serde::json::{json, serde_json};

    use super::*;

    #[test]
    fn unknown_plans_count_as_basic() {
        let profile: UserProfile =
            serde_json::from_value(json!({"nome": "Ana", "tipoPlano": "gold"})).unwrap();
        assert_eq!(profile.plan, PlanTier::Basic);
        assert_eq!(profile.plan.voter_limit(), 200);
        assert_eq!(PlanTier::Pro.voter_limit(), 2000);
        assert_eq!(PlanTier::Premium.voter_limit(), 10000);
    }

    #[test]
    fn unknown_or_missing_roles_are_political() {
        let profile: UserProfile =
            serde_json::from_value(json!({"nome": "Ana", "tipoUser": "vereador"})).unwrap();
        assert_eq!(profile.role, Role::Politician);
        let profile: UserProfile = serde_json::from_value(json!({"nome": "Ana"})).unwrap();
        assert_eq!(profile.role, Role::Politician);
        assert_eq!(profile.plan, PlanTier::Basic);
        assert_eq!(serde_json::to_value(Role::Politician).unwrap(), json!("politico"));
    }

    #[test]
    fn staff_work_on_their_admins_campaign() {
        let session = Session::new("a1", None, "t");
        let staff = UserProfile::assessor("Bia", "bia@example.com", "p1");
        assert_eq!(campaign_owner(Some(&staff), &session), "p1");

        let politician = UserProfile::politician("Caio", "caio@example.com", PlanTier::Pro);
        assert_eq!(campaign_owner(Some(&politician), &session), "a1");
        assert_eq!(campaign_owner(None, &session), "a1");
    }

    #[test]
    fn empty_profile_updates_are_rejected() {
        assert!(ProfileForm::default().normalize().is_err());
        let form = ProfileForm {
            push_token: Some(" ExponentPushToken[abc] ".into()),
            ..Default::default()
        };
        assert_eq!(
            form.normalize().unwrap().push_token.as_deref(),
            Some("ExponentPushToken[abc]")
        );
    }
}
