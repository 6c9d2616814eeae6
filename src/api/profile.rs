use rocket::{serde::json::Json, Route};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        auth::Session,
        store::{Coll, Id, Record},
        user::{campaign_owner, PlanTier, ProfileForm, Role, UserProfile},
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_profile, update_profile]
}

/// The caller's uid as a store key.
pub(super) fn uid_key(session: &Session) -> Result<Id> {
    session
        .uid()
        .parse()
        .map_err(|_| Error::unauthorized("Account id cannot be used as a key"))
}

/// The caller's stored profile, if they have one.
pub(super) async fn own_profile(
    profiles: &Coll<UserProfile>,
    session: &Session,
) -> Result<Option<Record<UserProfile>>> {
    profiles.find_one(session, &uid_key(session)?).await
}

/// The campaign a caller works on.
pub(super) struct Campaign {
    /// The political user owning the campaign.
    pub owner: String,
    pub role: Role,
    pub plan: PlanTier,
    /// Name to sign comments with.
    pub display_name: String,
}

impl Campaign {
    /// Resolve the caller's campaign. Staff work on their admin's campaign,
    /// whose profile is read with the service session.
    pub(super) async fn of(
        session: &Session,
        profiles: &Coll<UserProfile>,
        config: &Config,
    ) -> Result<Self> {
        let profile = own_profile(profiles, session).await?.map(|r| r.data);
        let owner = campaign_owner(profile.as_ref(), session).to_string();
        let plan = if owner == session.uid() {
            profile.as_ref().map(|p| p.plan)
        } else {
            match owner.parse::<Id>() {
                Ok(key) => profiles
                    .find_one(&config.service_session(), &key)
                    .await?
                    .map(|r| r.plan),
                Err(_) => None,
            }
        };
        let display_name = match &profile {
            Some(p) if !p.name.is_empty() => p.name.clone(),
            _ => session.email().unwrap_or_default().to_string(),
        };
        Ok(Self {
            owner,
            role: profile.map(|p| p.role).unwrap_or_default(),
            plan: plan.unwrap_or_default(),
            display_name,
        })
    }
}

#[get("/profile")]
async fn get_profile(
    session: Session,
    profiles: Coll<UserProfile>,
) -> Result<Json<Record<UserProfile>>> {
    own_profile(&profiles, &session)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("Profile {}", session.uid())))
}

/// Change the caller's own details, or register their device for push
/// messages.
#[patch("/profile", data = "<form>", format = "json")]
async fn update_profile(
    session: Session,
    form: Json<ProfileForm>,
    profiles: Coll<UserProfile>,
) -> Result<Json<Record<UserProfile>>> {
    let key = uid_key(&session)?;
    let form = form.into_inner().normalize()?;
    profiles.update(&session, &key, &form).await?;
    profiles
        .find_one(&session, &key)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("Profile {key}")))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, Value},
    };

    use super::*;
    use crate::{
        model::store::MemoryStore,
        testing::{self, bearer},
    };

    #[backend_test(profiles)]
    async fn callers_read_their_own_profile(client: Client) {
        let response = client
            .get(uri!(get_profile))
            .header(bearer(testing::ASSESSOR_TOKEN))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["id"], testing::ASSESSOR_UID);
        assert_eq!(body["tipoUser"], "assessor");
        assert_eq!(body["adminId"], testing::ADMIN_UID);
    }

    #[backend_test]
    async fn anonymous_callers_are_rejected(client: Client) {
        let response = client.get(uri!(get_profile)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body, json!({"error": "Unauthorized"}));

        let response = client
            .get(uri!(get_profile))
            .header(bearer("expired"))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(profiles)]
    async fn push_tokens_are_registered(client: Client, memory: MemoryStore) {
        let response = client
            .patch(uri!(update_profile))
            .header(bearer(testing::ADMIN_TOKEN))
            .header(ContentType::JSON)
            .body(json!({"pushToken": "ExponentPushToken[x]", "telefone": "11987654321"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            memory.snapshot("users/admin-1/pushToken"),
            Some(json!("ExponentPushToken[x]"))
        );
        assert_eq!(
            memory.snapshot("users/admin-1/telefone"),
            Some(json!("(11) 98765-4321"))
        );
        assert_eq!(memory.snapshot("users/admin-1/nome"), Some(json!("Ana Prefeita")));
    }
}
