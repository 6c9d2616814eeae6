use log::info;
use rocket::{
    http::Status,
    serde::json::{json, Json, Value},
    Route, State,
};
use serde::Deserialize;

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        auth::{mint_custom_token, Identities, Session},
        mail::{InviteRequest, Mailer},
        notification::Notification,
        push::{forward_notification, Delivery, Pusher},
        store::{Coll, Id, Store},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        send_invite,
        send_invite_wrong_method,
        web_auth_token,
        web_auth_token_wrong_method,
        push_notification,
    ]
}

fn method_not_allowed() -> Error {
    Error::Status(Status::MethodNotAllowed, "Method Not Allowed".to_string())
}

#[post("/invites", data = "<request>", format = "json")]
async fn send_invite(request: Json<InviteRequest>, mailer: &State<Mailer>) -> Result<Json<Value>> {
    let (email, name) = request.into_inner().into_parts()?;
    mailer.send_invite(&email, &name).await?;
    Ok(Json(json!({ "success": true })))
}

#[get("/invites")]
fn send_invite_wrong_method() -> Error {
    method_not_allowed()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest {
    #[serde(default)]
    id_token: Option<String>,
}

/// Exchange a mobile ID token for a custom token the web client can sign
/// in with.
#[post("/auth/token", data = "<request>", format = "json")]
async fn web_auth_token(
    request: Json<TokenRequest>,
    identities: &State<Identities>,
    config: &State<Config>,
) -> Result<Json<Value>> {
    let id_token = request
        .into_inner()
        .id_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::bad_request("Missing idToken"))?;

    let identity = identities.verify(&id_token).await.map_err(|err| {
        if err.status().code >= 500 {
            err
        } else {
            Error::unauthorized(err)
        }
    })?;
    let token = mint_custom_token(
        config.service_account_email(),
        config.service_account_key(),
        &identity.uid,
    )?;
    info!("Minted web sign-in token for {}", identity.uid);
    Ok(Json(json!({ "token": token })))
}

#[get("/auth/token")]
fn web_auth_token_wrong_method() -> Error {
    method_not_allowed()
}

/// Announce one of the caller's notifications on its recipient's device.
#[post("/notifications/<id>/push")]
async fn push_notification(
    id: Id,
    session: Session,
    notifications: Coll<Notification>,
    store: &State<Store>,
    pusher: &State<Pusher>,
    config: &State<Config>,
) -> Result<Json<Delivery>> {
    let notification = notifications
        .find_one(&session, &id)
        .await?
        .filter(|n| n.visible_to(&session))
        .ok_or_else(|| Error::not_found(format!("Notification {id}")))?;
    let delivery = forward_notification(
        store,
        &config.service_session(),
        &***pusher,
        &id,
        &notification,
    )
    .await?;
    Ok(Json(delivery))
}
