use chrono::Utc;
use log::info;
use rocket::{http::Status, serde::json::Json, Route, State};

use super::profile::Campaign;
use crate::{
    config::Config,
    error::Result,
    model::{
        auth::Session,
        ownership::{find_editable, find_visible, find_visible_one, Ownership},
        store::{Coll, Id, Record, Store},
        sync,
        task::{Comment, CommentForm, Task, TaskForm, TaskStatus},
        user::UserProfile,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        list_tasks,
        create_task,
        get_task,
        update_task,
        delete_task,
        toggle_task,
        list_comments,
        add_comment,
    ]
}

/// Visible tasks in schedule order, unscheduled ones last.
#[get("/tasks?<status>")]
async fn list_tasks(
    session: Session,
    tasks: Coll<Task>,
    status: Option<TaskStatus>,
) -> Result<Json<Vec<Record<Task>>>> {
    let mut found = find_visible(&tasks, &session).await?;
    if let Some(status) = status {
        found.retain(|t| t.status == status);
    }
    found.sort_by_key(|t| (t.full_date.is_none(), t.full_date));
    Ok(Json(found))
}

#[post("/tasks", data = "<form>", format = "json")]
async fn create_task(
    session: Session,
    form: Json<TaskForm>,
    tasks: Coll<Task>,
    profiles: Coll<UserProfile>,
    config: &State<Config>,
) -> Result<(Status, Json<Record<Task>>)> {
    let campaign = Campaign::of(&session, &profiles, config).await?;
    let task = form.into_inner().into_task(
        Ownership::new(session.uid(), &campaign.owner),
        config.timezone(),
        Utc::now(),
    )?;
    let record = tasks.insert(&session, task).await?;
    info!("Task {} created by {}", record.id, session.uid());
    Ok((Status::Created, Json(record)))
}

#[get("/tasks/<id>")]
async fn get_task(id: Id, session: Session, tasks: Coll<Task>) -> Result<Json<Record<Task>>> {
    Ok(Json(find_visible_one(&tasks, &session, &id).await?))
}

#[patch("/tasks/<id>", data = "<form>", format = "json")]
async fn update_task(
    id: Id,
    session: Session,
    form: Json<TaskForm>,
    tasks: Coll<Task>,
    config: &State<Config>,
) -> Result<Json<Record<Task>>> {
    find_editable(&tasks, &session, &id).await?;
    let patch = form.into_inner().into_patch(config.timezone(), Utc::now())?;
    tasks.update(&session, &id, &patch).await?;
    Ok(Json(find_visible_one(&tasks, &session, &id).await?))
}

/// Delete a task and its comments.
#[delete("/tasks/<id>")]
async fn delete_task(id: Id, session: Session, tasks: Coll<Task>) -> Result<()> {
    find_editable(&tasks, &session, &id).await?;
    tasks.delete(&session, &id).await?;
    info!("Task {id} deleted by {}", session.uid());
    Ok(())
}

/// Flip a task between pending and done.
#[post("/tasks/<id>/toggle")]
async fn toggle_task(id: Id, session: Session, tasks: Coll<Task>) -> Result<Json<Record<Task>>> {
    let record = find_editable(&tasks, &session, &id).await?;
    let mut list = sync::single(record);
    let toggled = list.toggle(&tasks, &session, &id, Utc::now()).await?;
    Ok(Json(toggled.clone()))
}

/// Comments on a visible task, oldest first.
#[get("/tasks/<id>/comments")]
async fn list_comments(
    id: Id,
    session: Session,
    tasks: Coll<Task>,
    store: &State<Store>,
) -> Result<Json<Vec<Record<Comment>>>> {
    find_visible_one(&tasks, &session, &id).await?;
    let mut comments = Coll::<Comment>::nested::<Task>(store, &id)
        .find_all(&session)
        .await?;
    comments.sort_by_key(|c| c.created_at);
    Ok(Json(comments))
}

#[post("/tasks/<id>/comments", data = "<form>", format = "json")]
async fn add_comment(
    id: Id,
    session: Session,
    form: Json<CommentForm>,
    tasks: Coll<Task>,
    profiles: Coll<UserProfile>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<(Status, Json<Record<Comment>>)> {
    find_visible_one(&tasks, &session, &id).await?;
    let campaign = Campaign::of(&session, &profiles, config).await?;
    let comment = form
        .into_inner()
        .into_comment(session.uid(), &campaign.display_name, Utc::now())?;
    let record = Coll::<Comment>::nested::<Task>(store, &id)
        .insert(&session, comment)
        .await?;
    Ok((Status::Created, Json(record)))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::{json, serde_json, Value},
    };

    use super::*;
    use crate::{
        model::store::MemoryStore,
        testing::{self, bearer},
    };

    fn seed(memory: &MemoryStore, key: &str, task: &Task) {
        memory.seed(&format!("tarefas/{key}"), serde_json::to_value(task).unwrap());
    }

    #[backend_test(profiles)]
    async fn tasks_are_scheduled_in_local_time(client: Client) {
        let response = client
            .post(uri!(create_task))
            .header(bearer(testing::ASSESSOR_TOKEN))
            .header(ContentType::JSON)
            .body(
                json!({
                    "titulo": "Visita à feira",
                    "tipo": "visit",
                    "fullDate": "2026-06-10T13:00:00.000Z",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let task: Value = response.into_json().await.unwrap();
        assert_eq!(task["data"], "10/06/2026");
        assert_eq!(task["time"], "10:00");
        assert_eq!(task["status"], "pending");
        assert_eq!(task["adminId"], testing::ADMIN_UID);
    }

    #[backend_test]
    async fn tasks_list_in_schedule_order(client: Client, memory: MemoryStore) {
        let admin = testing::ADMIN_UID;
        seed(&memory, "later", &Task::example(admin, admin, "Depois", Duration::days(2)));
        seed(&memory, "soon", &Task::example(admin, admin, "Antes", Duration::hours(1)));
        let mut done = Task::example(admin, admin, "Feita", Duration::hours(3));
        done.status = TaskStatus::Done;
        seed(&memory, "done", &done);

        let response = client
            .get("/tasks")
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        let listed: Vec<Record<Task>> = response.into_json().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["soon", "done", "later"]);

        let response = client
            .get("/tasks?status=done")
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        let listed: Vec<Record<Task>> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id.as_str(), "done");
    }

    #[backend_test]
    async fn toggling_flips_the_stored_status(client: Client, memory: MemoryStore) {
        let admin = testing::ADMIN_UID;
        seed(&memory, "t1", &Task::example(admin, admin, "Reunião", Duration::hours(1)));
        let id: Id = "t1".parse().unwrap();

        let response = client
            .post(uri!(toggle_task(id.clone())))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let task: Value = response.into_json().await.unwrap();
        assert_eq!(task["status"], "done");
        assert_eq!(memory.snapshot("tarefas/t1/status"), Some(json!("done")));

        client
            .post(uri!(toggle_task(id)))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        assert_eq!(memory.snapshot("tarefas/t1/status"), Some(json!("pending")));
    }

    #[backend_test]
    async fn rejected_toggles_report_the_store_error(client: Client, memory: MemoryStore) {
        let admin = testing::ADMIN_UID;
        seed(&memory, "t1", &Task::example(admin, admin, "Reunião", Duration::hours(1)));
        memory.reject_writes(true);

        let response = client
            .post(uri!(toggle_task("t1".parse::<Id>().unwrap())))
            .header(bearer(testing::ADMIN_TOKEN))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        assert_eq!(memory.snapshot("tarefas/t1/status"), Some(json!("pending")));
    }

    #[backend_test(profiles)]
    async fn comments_live_under_their_task(client: Client, memory: MemoryStore) {
        let admin = testing::ADMIN_UID;
        seed(
            &memory,
            "t1",
            &Task::example(testing::ASSESSOR_UID, admin, "Panfletagem", Duration::hours(1)),
        );
        let id: Id = "t1".parse().unwrap();

        for text in ["Primeiro", "Segundo"] {
            let response = client
                .post(uri!(add_comment(id.clone())))
                .header(bearer(testing::ADMIN_TOKEN))
                .header(ContentType::JSON)
                .body(json!({ "text": text }).to_string())
                .dispatch()
                .await;
            assert_eq!(Status::Created, response.status());
        }

        let response = client
            .get(uri!(list_comments(id.clone())))
            .header(bearer(testing::ASSESSOR_TOKEN))
            .dispatch()
            .await;
        let comments: Vec<Record<Comment>> = response.into_json().await.unwrap();
        let texts: Vec<_> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["Primeiro", "Segundo"]);
        assert_eq!(comments[0].user_name, "Ana Prefeita");

        // Deleting the task takes its comments with it.
        let response = client
            .delete(uri!(delete_task(id)))
            .header(bearer(testing::ASSESSOR_TOKEN))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(memory.snapshot("tarefas/t1"), None);
    }
}
