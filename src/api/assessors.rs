use chrono::Utc;
use log::{error, info};
use rocket::{http::Status, serde::json::Json, Route, State};
use serde::Serialize;

use super::profile::Campaign;
use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        assessor::{Assessor, AssessorForm, AssessorStatus},
        auth::Session,
        mail::Mailer,
        ownership::{find_editable, find_visible, find_visible_one, Ownership},
        store::{Coll, Id, Record},
        user::{Role, UserProfile},
    },
};

pub fn routes() -> Vec<Route> {
    routes![list_assessors, create_assessor, update_assessor, delete_assessor]
}

/// A staff record, and whether an invitation went out with this change.
#[derive(Debug, Serialize)]
struct StaffResponse {
    #[serde(flatten)]
    record: Record<Assessor>,
    invited: bool,
}

/// Send an invitation, logging rather than failing when delivery fails.
async fn invite(mailer: &Mailer, assessor: &Record<Assessor>) -> bool {
    match mailer.send_invite(&assessor.email, &assessor.name).await {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to invite assessor {}: {e}", assessor.id);
            false
        }
    }
}

#[get("/assessors")]
async fn list_assessors(
    session: Session,
    assessors: Coll<Assessor>,
) -> Result<Json<Vec<Record<Assessor>>>> {
    let mut found = find_visible(&assessors, &session).await?;
    found.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(Json(found))
}

/// Add a member to the caller's staff and email them an invitation.
/// Staff cannot add staff of their own.
#[post("/assessors", data = "<form>", format = "json")]
async fn create_assessor(
    session: Session,
    form: Json<AssessorForm>,
    assessors: Coll<Assessor>,
    profiles: Coll<UserProfile>,
    mailer: &State<Mailer>,
    config: &State<Config>,
) -> Result<(Status, Json<StaffResponse>)> {
    let campaign = Campaign::of(&session, &profiles, config).await?;
    if campaign.role == Role::Assessor {
        return Err(Error::forbidden("Only political users may add staff"));
    }

    let assessor = form
        .into_inner()
        .into_assessor(Ownership::new(session.uid(), session.uid()), Utc::now())?;
    let record = assessors.insert(&session, assessor).await?;
    info!("Assessor {} added by {}", record.id, session.uid());
    let invited = invite(mailer, &record).await;
    Ok((Status::Created, Json(StaffResponse { record, invited })))
}

/// Change a staff member's details, mirroring them into their profile.
/// A still-pending invitation is re-sent when the email changes.
#[patch("/assessors/<id>", data = "<form>", format = "json")]
async fn update_assessor(
    id: Id,
    session: Session,
    form: Json<AssessorForm>,
    assessors: Coll<Assessor>,
    profiles: Coll<UserProfile>,
    mailer: &State<Mailer>,
) -> Result<Json<StaffResponse>> {
    let before = find_editable(&assessors, &session, &id).await?;
    let patch = form.into_inner().into_patch(Utc::now())?;
    assessors.update(&session, &id, &patch).await?;
    if profiles.find_one(&session, &id).await?.is_some() {
        profiles.update(&session, &id, &patch).await?;
    }

    let record = find_visible_one(&assessors, &session, &id).await?;
    let invited = if record.status == AssessorStatus::Invited && record.email != before.email {
        invite(mailer, &record).await
    } else {
        false
    };
    Ok(Json(StaffResponse { record, invited }))
}

/// Remove a staff member together with their profile.
#[delete("/assessors/<id>")]
async fn delete_assessor(
    id: Id,
    session: Session,
    assessors: Coll<Assessor>,
    profiles: Coll<UserProfile>,
) -> Result<()> {
    find_editable(&assessors, &session, &id).await?;
    assessors.delete(&session, &id).await?;
    profiles.delete(&session, &id).await?;
    info!("Assessor {id} removed by {}", session.uid());
    Ok(())
}
