//! Server-side generation of birthday and overdue-task notifications.
//!
//! Each candidate is stored under a key derived from its type, the entity
//! it is about, its recipient and the day, so a repeated scan rewrites the
//! same nodes instead of adding duplicates. Notifications created by older
//! clients, which used generated keys, are recognised among the recipient's
//! own notifications by type, day and description.

use std::future::Future;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::{
    error::{Error, Result},
    model::{
        auth::Session,
        notification::{daily_key, Notification, NotificationKind},
        ownership::find_visible,
        push::{forward_notification, Delivery, Pusher},
        store::{Coll, Id, Record, Store},
        task::Task,
        voter::Voter,
    },
    task_group::TaskGroup,
};

/// A notification the scan would like to exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: Id,
    pub notification: Notification,
    /// Text that the description of an equivalent notification contains.
    pub mention: String,
}

impl Candidate {
    /// Already stored, either under its key or by an older client.
    pub fn is_known(&self, existing: &[Record<Notification>], today: NaiveDate, tz: FixedOffset) -> bool {
        existing.iter().any(|n| {
            n.id == self.key
                || (n.kind == self.notification.kind
                    && n.created_on(today, tz)
                    && n.description.contains(&self.mention))
        })
    }
}

fn notification_for(
    recipient: &Session,
    kind: NotificationKind,
    title: &str,
    description: String,
    now: DateTime<Utc>,
) -> Notification {
    Notification {
        title: title.to_string(),
        description,
        kind,
        read: false,
        created_at: Some(now),
        user_id: recipient.uid().to_string(),
        user_email: String::new(),
    }
}

fn keyed(kind: NotificationKind, entity: &Id, recipient: &Session, today: NaiveDate) -> Option<Id> {
    match daily_key(kind, entity, recipient.uid(), today) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("Not generating a {} notification for {entity}: {e}", kind.as_str());
            None
        }
    }
}

/// A reminder for each voter whose birthday is `today`.
pub fn birthday_candidates(
    voters: &[Record<Voter>],
    recipient: &Session,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    voters
        .iter()
        .filter(|v| v.has_birthday_on(today))
        .filter_map(|v| {
            let key = keyed(NotificationKind::Birthday, &v.id, recipient, today)?;
            Some((key, v))
        })
        .map(|(key, v)| Candidate {
            key,
            notification: notification_for(
                recipient,
                NotificationKind::Birthday,
                "Lembrete de Aniversário",
                format!("Hoje é aniversário do eleitor {}.", v.name),
                now,
            ),
            mention: v.name.clone(),
        })
        .collect()
}

/// A warning for each pending task scheduled before `now`.
pub fn overdue_candidates(
    tasks: &[Record<Task>],
    recipient: &Session,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    tasks
        .iter()
        .filter(|t| t.is_overdue(now))
        .filter_map(|t| {
            let key = keyed(NotificationKind::Overdue, &t.id, recipient, today)?;
            Some((key, t))
        })
        .map(|(key, t)| Candidate {
            key,
            notification: notification_for(
                recipient,
                NotificationKind::Overdue,
                "Tarefa atrasada",
                format!("A tarefa \"{}\" está atrasada.", t.title),
                now,
            ),
            mention: t.title.clone(),
        })
        .collect()
}

/// Everything a scan needs besides the caller.
#[derive(Clone)]
pub struct Scanner {
    pub store: Store,
    pub pusher: Pusher,
    /// Reads recipients' push tokens.
    pub service: Session,
    pub tz: FixedOffset,
    pub concurrency: usize,
}

/// What a scan did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub pushed: usize,
}

impl Scanner {
    /// Create the missing notifications for the caller's visible voters and
    /// tasks, and announce each on the caller's device. Writes stop, and
    /// are counted as cancelled, once `cancel` completes.
    pub async fn scan<C>(&self, caller: &Session, now: DateTime<Utc>, cancel: C) -> Result<ScanSummary>
    where
        C: Future<Output = ()>,
    {
        let today = now.with_timezone(&self.tz).date_naive();
        let voters = find_visible(&Coll::<Voter>::from_store(&self.store), caller).await?;
        let tasks = find_visible(&Coll::<Task>::from_store(&self.store), caller).await?;
        let notifications = Coll::<Notification>::from_store(&self.store);
        let uid = caller.uid().to_string();
        let existing = notifications
            .find(caller, move |n| n.user_id == uid)
            .await?;

        let mut candidates = birthday_candidates(&voters, caller, today, now);
        candidates.extend(overdue_candidates(&tasks, caller, today, now));

        let mut summary = ScanSummary::default();
        let mut group = TaskGroup::new(self.concurrency);
        for candidate in candidates {
            if candidate.is_known(&existing, today, self.tz) {
                summary.skipped += 1;
                continue;
            }
            let notifications = notifications.clone();
            let caller = caller.clone();
            let scanner = self.clone();
            group.spawn(async move {
                let Candidate {
                    key, notification, ..
                } = candidate;
                notifications.put(&caller, &key, &notification).await?;
                let delivery = forward_notification(
                    &scanner.store,
                    &scanner.service,
                    &*scanner.pusher,
                    &key,
                    &notification,
                )
                .await
                .unwrap_or_else(|e| {
                    warn!("Failed to push notification {key}: {e}");
                    Delivery::NoRecipient
                });
                Ok::<_, Error>(delivery == Delivery::Sent)
            });
        }

        for result in group.join_until(cancel).await {
            match result {
                Ok(Ok(pushed)) => {
                    summary.created += 1;
                    summary.pushed += usize::from(pushed);
                }
                Ok(Err(e)) => {
                    warn!("Failed to store notification: {e}");
                    summary.failed += 1;
                }
                Err(_) => summary.cancelled += 1,
            }
        }
        info!(
            "Notification scan for {}: {} created, {} already present, {} failed, {} cancelled",
            caller.uid(),
            summary.created,
            summary.skipped,
            summary.failed,
            summary.cancelled
        );
        Ok(summary)
    }
}
