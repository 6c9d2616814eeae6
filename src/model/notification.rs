use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    auth::Session,
    fields::{iso_time, lenient_string},
    ownership::Named,
    store::{Document, Id, InvalidKey},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Task,
    Success,
    Birthday,
    System,
    Overdue,
    #[default]
    #[serde(other)]
    Other,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Success => "success",
            Self::Birthday => "birthday",
            Self::System => "system",
            Self::Overdue => "overdue",
            Self::Other => "other",
        }
    }
}

/// A message shown in a user's notification list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub read: bool,
    #[serde(default, with = "iso_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Recipient uid. Empty together with `user_email` for broadcasts.
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_email: String,
}

impl Document for Notification {
    const COLLECTION: &'static str = "notificacoes";
}

impl Named for Notification {
    const NAME: &'static str = "Notification";
}

impl Notification {
    /// Addressed to the caller by uid or email, or broadcast to everyone.
    pub fn visible_to(&self, session: &Session) -> bool {
        let by_uid = !self.user_id.is_empty() && self.user_id == session.uid();
        let by_email = !self.user_email.is_empty()
            && session
                .email()
                .is_some_and(|email| email.eq_ignore_ascii_case(&self.user_email));
        let global = self.user_id.is_empty() && self.user_email.is_empty();
        by_uid || by_email || global
    }

    /// Created on `day` in the campaign timezone.
    pub fn created_on(&self, day: NaiveDate, tz: FixedOffset) -> bool {
        self.created_at
            .is_some_and(|at| at.with_timezone(&tz).date_naive() == day)
    }
}

/// The key a generated notification is stored under, so that generating it
/// twice on the same day for the same recipient writes the same node.
pub fn daily_key(
    kind: NotificationKind,
    entity: &Id,
    recipient: &str,
    day: NaiveDate,
) -> Result<Id, InvalidKey> {
    format!(
        "{}-{}-{}-{}",
        kind.as_str(),
        entity,
        recipient,
        day.format("%Y%m%d")
    )
    .parse()
}

/// Body of `POST /notifications/read`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkRead {
    /// Only these notifications; all visible ones when absent.
    #[serde(default)]
    pub ids: Option<Vec<Id>>,
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rocket::serde::json::{json, serde_json};

    use super::*;

    #[test]
    fn visibility_by_uid_email_or_broadcast() {
        let session = Session::new("u1", Some("Ana@Example.com"), "t");
        let mut n = Notification::example(NotificationKind::System, "u1", "");
        assert!(n.visible_to(&session));

        n.user_id = "u2".into();
        assert!(!n.visible_to(&session));

        n.user_email = "ana@example.com".into();
        assert!(n.visible_to(&session));

        n.user_id.clear();
        n.user_email.clear();
        assert!(n.visible_to(&session));
    }

    #[test]
    fn same_day_is_judged_in_the_campaign_timezone() {
        let tz = FixedOffset::west_opt(3 * 3600).unwrap();
        let mut n = Notification::example(NotificationKind::Birthday, "u1", "");
        n.created_at = Some(Utc.with_ymd_and_hms(2026, 4, 2, 2, 0, 0).unwrap());
        assert!(n.created_on(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(), tz));
        assert!(!n.created_on(NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(), tz));
    }

    #[test]
    fn daily_keys_combine_kind_entity_recipient_and_day() {
        let entity: Id = "-Nabc".parse().unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert_eq!(
            daily_key(NotificationKind::Birthday, &entity, "u1", day)
                .unwrap()
                .as_str(),
            "birthday--Nabc-u1-20260401"
        );
        assert_ne!(
            daily_key(NotificationKind::Birthday, &entity, "u1", day),
            daily_key(NotificationKind::Birthday, &entity, "u2", day)
        );
        assert!(daily_key(NotificationKind::Birthday, &entity, "a.b", day).is_err());
    }

    #[test]
    fn wire_names_are_preserved() {
        let n: Notification = serde_json::from_value(json!({
            "title": "Oi",
            "description": "",
            "type": "overdue",
            "read": true,
            "userEmail": "x@example.com",
        }))
        .unwrap();
        assert_eq!(n.kind, NotificationKind::Overdue);
        assert!(n.read);
        assert_eq!(n.user_id, "");
    }
}
