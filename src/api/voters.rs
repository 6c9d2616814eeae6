use chrono::Utc;
use log::info;
use rocket::{http::Status, serde::json::Json, Route, State};

use super::profile::Campaign;
use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        auth::Session,
        greeting::Greeting,
        ownership::{find_editable, find_visible, find_visible_one, Ownership},
        store::{Coll, Id, Record},
        user::UserProfile,
        voter::{Voter, VoterForm, VoterStatus},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        list_voters,
        create_voter,
        get_voter,
        update_voter,
        delete_voter,
        birthdays,
        greeting,
    ]
}

/// Visible voters, optionally narrowed by a name/CPF/phone search and a
/// status.
#[get("/voters?<search>&<status>")]
async fn list_voters(
    session: Session,
    voters: Coll<Voter>,
    search: Option<&str>,
    status: Option<VoterStatus>,
) -> Result<Json<Vec<Record<Voter>>>> {
    let mut found = find_visible(&voters, &session).await?;
    found.retain(|v| {
        search.map_or(true, |q| v.matches(q)) && status.map_or(true, |s| v.status == s)
    });
    found.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(Json(found))
}

/// Register a voter in the caller's campaign, within the campaign plan's
/// voter limit.
#[post("/voters", data = "<form>", format = "json")]
async fn create_voter(
    session: Session,
    form: Json<VoterForm>,
    voters: Coll<Voter>,
    profiles: Coll<UserProfile>,
    config: &State<Config>,
) -> Result<(Status, Json<Record<Voter>>)> {
    let campaign = Campaign::of(&session, &profiles, config).await?;

    let limit = campaign.plan.voter_limit();
    let owner = campaign.owner.clone();
    let registered = voters
        .find(&session, move |v| v.owner.admin_id == owner)
        .await?
        .len();
    if registered >= limit {
        return Err(Error::forbidden(format!(
            "The campaign plan allows at most {limit} voters"
        )));
    }

    let voter = form
        .into_inner()
        .into_voter(Ownership::new(session.uid(), &campaign.owner), Utc::now())?;
    let record = voters.insert(&session, voter).await?;
    info!("Voter {} registered by {}", record.id, session.uid());
    Ok((Status::Created, Json(record)))
}

#[get("/voters/<id>")]
async fn get_voter(id: Id, session: Session, voters: Coll<Voter>) -> Result<Json<Record<Voter>>> {
    Ok(Json(find_visible_one(&voters, &session, &id).await?))
}

#[patch("/voters/<id>", data = "<form>", format = "json")]
async fn update_voter(
    id: Id,
    session: Session,
    form: Json<VoterForm>,
    voters: Coll<Voter>,
) -> Result<Json<Record<Voter>>> {
    find_editable(&voters, &session, &id).await?;
    let patch = form.into_inner().into_patch(Utc::now())?;
    voters.update(&session, &id, &patch).await?;
    Ok(Json(find_visible_one(&voters, &session, &id).await?))
}

#[delete("/voters/<id>")]
async fn delete_voter(id: Id, session: Session, voters: Coll<Voter>) -> Result<()> {
    find_editable(&voters, &session, &id).await?;
    voters.delete(&session, &id).await?;
    info!("Voter {id} deleted by {}", session.uid());
    Ok(())
}

/// Visible voters whose birthday is today in the campaign timezone.
#[get("/voters/birthdays")]
async fn birthdays(
    session: Session,
    voters: Coll<Voter>,
    config: &State<Config>,
) -> Result<Json<Vec<Record<Voter>>>> {
    let today = Utc::now().with_timezone(&config.timezone()).date_naive();
    let mut found = find_visible(&voters, &session).await?;
    found.retain(|v| v.has_birthday_on(today));
    Ok(Json(found))
}

#[get("/voters/<id>/greeting")]
async fn greeting(id: Id, session: Session, voters: Coll<Voter>) -> Result<Json<Greeting>> {
    let voter = find_visible_one(&voters, &session, &id).await?;
    Ok(Json(Greeting::birthday(&voter)?))
}
