use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::Result,
    model::{
        assessor::Assessor,
        auth::Session,
        metrics::DashboardMetrics,
        notification::Notification,
        ownership::find_visible,
        store::Coll,
        task::Task,
        voter::Voter,
    },
};

pub fn routes() -> Vec<Route> {
    routes![dashboard]
}

/// Campaign figures over everything the caller can see.
#[get("/dashboard")]
async fn dashboard(
    session: Session,
    voters: Coll<Voter>,
    tasks: Coll<Task>,
    assessors: Coll<Assessor>,
    notifications: Coll<Notification>,
    config: &State<Config>,
) -> Result<Json<DashboardMetrics>> {
    let voters = find_visible(&voters, &session).await?;
    let tasks = find_visible(&tasks, &session).await?;
    let team = find_visible(&assessors, &session).await?;
    let caller = session.clone();
    let notifications = notifications
        .find(&session, move |n| n.visible_to(&caller))
        .await?;

    Ok(Json(DashboardMetrics::compute(
        &voters,
        &tasks,
        &team,
        &notifications,
        Utc::now(),
        config.timezone(),
    )))
}
