use std::{ops::Deref, sync::Arc};

use log::{info, warn};
use reqwest::Client;
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        auth::Session,
        notification::{Notification, NotificationKind},
        store::{Coll, Id, Store},
        user::UserProfile,
    },
};

const DEFAULT_TITLE: &str = "Nova Notificação";
const DEFAULT_BODY: &str = "Você tem uma nova mensagem no app.";

/// One message of a push API batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub sound: &'static str,
    pub title: String,
    pub body: String,
    pub data: PushData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushData {
    #[serde(rename = "notificationId")]
    pub notification_id: Id,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

impl PushMessage {
    /// The message announcing `notification` to the device `to`.
    pub fn for_notification(to: &str, id: &Id, notification: &Notification) -> Self {
        let or_default = |s: &str, default: &str| {
            if s.is_empty() {
                default.to_string()
            } else {
                s.to_string()
            }
        };
        Self {
            to: to.to_string(),
            sound: "default",
            title: or_default(&notification.title, DEFAULT_TITLE),
            body: or_default(&notification.description, DEFAULT_BODY),
            data: PushData {
                notification_id: id.clone(),
                kind: notification.kind,
            },
        }
    }
}

/// Delivers push messages to devices.
#[rocket::async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, messages: &[PushMessage]) -> Result<()>;
}

/// Handle on the configured push sender, kept in managed state.
#[derive(Clone)]
pub struct Pusher(pub Arc<dyn PushSender>);

impl Deref for Pusher {
    type Target = dyn PushSender;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

/// The Expo push API.
pub struct ExpoPush {
    http: Client,
    url: String,
}

#[derive(Deserialize)]
struct PushResponse {
    #[serde(default)]
    data: Vec<PushTicket>,
}

#[derive(Deserialize)]
struct PushTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl ExpoPush {
    pub fn new(http: Client, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
        }
    }
}

#[rocket::async_trait]
impl PushSender for ExpoPush {
    async fn send(&self, messages: &[PushMessage]) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .header("Accept", "application/json")
            .json(messages)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Status(
                Status::BadGateway,
                format!("Push API responded with {status}: {text}"),
            ));
        }

        let tickets: PushResponse = response.json().await?;
        for ticket in tickets.data.iter().filter(|t| t.status != "ok") {
            warn!(
                "Push ticket {}: {}",
                ticket.status,
                ticket.message.as_deref().unwrap_or("no details")
            );
        }
        Ok(())
    }
}

/// What became of a push forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Delivery {
    Sent,
    NoRecipient,
    NoPushToken,
}

/// Announce a stored notification on its recipient's device. Notifications
/// without a recipient uid, and recipients without a registered device, are
/// skipped.
///
/// The recipient's profile is read with `service`, as it usually belongs to
/// someone other than the caller.
pub async fn forward_notification(
    store: &Store,
    service: &Session,
    pusher: &dyn PushSender,
    id: &Id,
    notification: &Notification,
) -> Result<Delivery> {
    let Ok(recipient) = notification.user_id.parse::<Id>() else {
        info!("Notification {id} has no recipient, skipping push");
        return Ok(Delivery::NoRecipient);
    };

    let profile = Coll::<UserProfile>::from_store(store)
        .find_one(service, &recipient)
        .await?;
    let Some(token) = profile
        .and_then(|p| p.data.push_token)
        .filter(|t| !t.is_empty())
    else {
        info!("User {recipient} has no push token, skipping push");
        return Ok(Delivery::NoPushToken);
    };

    info!("Sending push for notification {id} to {recipient}");
    let message = PushMessage::for_notification(&token, id, notification);
    pusher.send(&[message]).await?;
    Ok(Delivery::Sent)
}
