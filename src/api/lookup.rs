use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        auth::Session,
        polling_place::PollingPlace,
        postal::{Address, PostalCodes},
        store::Coll,
    },
};

pub fn routes() -> Vec<Route> {
    routes![postal_code, polling_places]
}

/// Address of a postal code, for pre-filling voter forms.
#[get("/postal-codes/<cep>")]
async fn postal_code(
    cep: &str,
    _session: Session,
    postal_codes: &State<PostalCodes>,
) -> Result<Json<Address>> {
    postal_codes
        .lookup(cep)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("CEP {cep}")))
}

/// Reference list of polling places, optionally of one electoral zone.
#[get("/polling-places?<zone>")]
async fn polling_places(
    session: Session,
    places: Coll<PollingPlace>,
    zone: Option<&str>,
) -> Result<Json<Vec<PollingPlace>>> {
    let places = places
        .find_all(&session)
        .await?
        .into_iter()
        .map(|r| r.data)
        .filter(|p| zone.map_or(true, |z| p.in_zone(z)))
        .collect();
    Ok(Json(places))
}
