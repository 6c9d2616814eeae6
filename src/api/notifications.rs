use chrono::Utc;
use rocket::{
    serde::json::{self, json, Json, Value},
    Route, Shutdown, State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        auth::Session,
        notification::{MarkRead, Notification},
        push::Pusher,
        scan::{ScanSummary, Scanner},
        store::{Coll, Id, Record, Store},
        sync::{self, ResourceList},
    },
};

pub fn routes() -> Vec<Route> {
    routes![list_notifications, mark_read, mark_all_read, scan]
}

async fn visible(coll: &Coll<Notification>, session: &Session) -> Result<Vec<Record<Notification>>> {
    let caller = session.clone();
    coll.find(session, move |n| n.visible_to(&caller)).await
}

/// The caller's notifications, newest first.
#[get("/notifications")]
async fn list_notifications(
    session: Session,
    notifications: Coll<Notification>,
) -> Result<Json<Vec<Record<Notification>>>> {
    let mut found = visible(&notifications, &session).await?;
    found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(found))
}

#[post("/notifications/<id>/read")]
async fn mark_read(
    id: Id,
    session: Session,
    notifications: Coll<Notification>,
) -> Result<Json<Record<Notification>>> {
    let record = notifications
        .find_one(&session, &id)
        .await?
        .filter(|n| n.visible_to(&session))
        .ok_or_else(|| Error::not_found(format!("Notification {id}")))?;
    let mut list = sync::single(record);
    let marked = list.mark_read(&notifications, &session, &id).await?;
    Ok(Json(marked.clone()))
}

/// Mark the given notifications, or all of the caller's when the body is
/// empty or names no ids, as read.
#[post("/notifications/read", data = "<request>")]
async fn mark_all_read(
    session: Session,
    request: std::result::Result<Json<MarkRead>, json::Error<'_>>,
    notifications: Coll<Notification>,
) -> Result<Json<Value>> {
    let request = match request {
        Ok(request) => request.into_inner(),
        Err(json::Error::Parse(body, _)) if body.trim().is_empty() => MarkRead::default(),
        Err(json::Error::Parse(_, e)) => {
            return Err(Error::bad_request(format!("Malformed request body: {e}")))
        }
        Err(json::Error::Io(e)) => {
            return Err(Error::bad_request(format!("Unreadable request body: {e}")))
        }
    };

    let mut found = visible(&notifications, &session).await?;
    if let Some(ids) = request.ids {
        found.retain(|n| ids.contains(&n.id));
    }
    let mut list = ResourceList::new(found);
    let marked = list.mark_all_read(&notifications, &session).await?;
    Ok(Json(json!({ "marked": marked })))
}

/// Generate today's birthday and overdue-task reminders for the caller.
/// Writes still in flight when the server shuts down are abandoned.
#[post("/notifications/scan")]
async fn scan(
    session: Session,
    store: &State<Store>,
    pusher: &State<Pusher>,
    config: &State<Config>,
    shutdown: Shutdown,
) -> Result<Json<ScanSummary>> {
    let scanner = Scanner {
        store: store.inner().clone(),
        pusher: pusher.inner().clone(),
        service: config.service_session(),
        tz: config.timezone(),
        concurrency: config.scan_concurrency(),
    };
    Ok(Json(scanner.scan(&session, Utc::now(), shutdown).await?))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use super::*;
    use crate::{
        model::{
            notification::NotificationKind,
            store::MemoryStore,
            task::Task,
        },
        testing::{self, bearer, PushLog},
    };

    fn seed(memory: &MemoryStore, key: &str, notification: &Notification) {
        memory.seed(
            &format!("notificacoes/{key}"),
            serde_json::to_value(notification).unwrap(),
        );
    }

    #[backend_test]
    async fn callers_see_their_own_and_broadcast_notifications(
        client: Client,
        memory: MemoryStore,
    ) {
        let mut older = Notification::example(NotificationKind::Task, testing::ADMIN_UID, "a");
        older.created_at = Some(Utc::now() - Duration::hours(2));
        let mut by_email = Notification::example(NotificationKind::System, "", "b");
        by_email.user_email = "ADMIN@example.com".into();
        let broadcast = Notification::example(NotificationKind::System, "", "c");
        seed(&memory, "n1", &older);
        seed(&memory, "n2", &by_email);
        seed(&memory, "n3", &broadcast);
        seed(
            &memory,
            "n4",
            &Notification::example(NotificationKind::Task, testing::OTHER_UID, "d"),
        );

        let response = client
            .get(uri!(list_notifications))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        let listed: Vec<Record<Notification>> = response.into_json().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids.last(), Some(&"n1"));
        assert!(!ids.contains(&"n4"));
    }

    #[backend_test]
    async fn notifications_are_marked_read(client: Client, memory: MemoryStore) {
        seed(
            &memory,
            "n1",
            &Notification::example(NotificationKind::Task, testing::ADMIN_UID, "a"),
        );
        seed(
            &memory,
            "n2",
            &Notification::example(NotificationKind::Task, testing::OTHER_UID, "b"),
        );

        let response = client
            .post(uri!(mark_read("n1".parse::<Id>().unwrap())))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(memory.snapshot("notificacoes/n1/read"), Some(json!(true)));

        let response = client
            .post(uri!(mark_read("n2".parse::<Id>().unwrap())))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(memory.snapshot("notificacoes/n2/read"), Some(json!(false)));
    }

    #[backend_test]
    async fn marking_all_read_touches_only_the_callers(client: Client, memory: MemoryStore) {
        for key in ["n1", "n2", "n3"] {
            seed(
                &memory,
                key,
                &Notification::example(NotificationKind::Task, testing::ADMIN_UID, key),
            );
        }
        seed(
            &memory,
            "n4",
            &Notification::example(NotificationKind::Task, testing::OTHER_UID, "x"),
        );

        let response = client
            .post(uri!(mark_all_read))
            .header(bearer(testing::ADMIN_TOKEN))
            .header(ContentType::JSON)
            .body(json!({"ids": ["n1", "n4"]}).to_string())
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body, json!({"marked": 1}));

        let response = client
            .post(uri!(mark_all_read))
            .header(bearer(testing::ADMIN_TOKEN))
            .header(ContentType::JSON)
            .body(json!({}).to_string())
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body, json!({"marked": 2}));
        assert_eq!(memory.snapshot("notificacoes/n4/read"), Some(json!(false)));
    }

    #[backend_test]
    async fn malformed_mark_read_bodies_change_nothing(client: Client, memory: MemoryStore) {
        for key in ["n1", "n2"] {
            seed(
                &memory,
                key,
                &Notification::example(NotificationKind::Task, testing::ADMIN_UID, key),
            );
        }

        let response = client
            .post(uri!(mark_all_read))
            .header(bearer(testing::ADMIN_TOKEN))
            .header(ContentType::JSON)
            .body(json!({"ids": "n1"}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(memory.snapshot("notificacoes/n1/read"), Some(json!(false)));
        assert_eq!(memory.snapshot("notificacoes/n2/read"), Some(json!(false)));

        // No body at all marks everything.
        let response = client
            .post(uri!(mark_all_read))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body, json!({"marked": 2}));
    }

    #[backend_test]
    async fn scans_remind_about_overdue_tasks_once(
        client: Client,
        memory: MemoryStore,
        push_log: PushLog,
    ) {
        memory.seed(
            "users/admin-1",
            json!({"nome": "Ana", "pushToken": "ExponentPushToken[a]"}),
        );
        let task = Task::example(testing::ADMIN_UID, testing::ADMIN_UID, "Reunião", -Duration::hours(1));
        memory.seed("tarefas/t1", serde_json::to_value(&task).unwrap());

        let response = client
            .post(uri!(scan))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let summary: Value = response.into_json().await.unwrap();
        assert_eq!(summary["created"], 1);
        assert_eq!(summary["pushed"], 1);
        assert_eq!(push_log.sent().len(), 1);

        let response = client
            .post(uri!(scan))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        let summary: Value = response.into_json().await.unwrap();
        assert_eq!(summary["created"], 0);
        assert_eq!(summary["skipped"], 1);

        let response = client
            .get(uri!(list_notifications))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        let listed: Vec<Record<Notification>> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].description, "A tarefa \"Reunião\" está atrasada.");
    }
}
