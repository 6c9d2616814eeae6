use rocket::{
    http::Status,
    serde::json::{json, Json, Value},
    Catcher, Request, Route,
};

mod assessors;
mod dashboard;
mod functions;
mod lookup;
mod notifications;
mod profile;
mod tasks;
mod voters;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(functions::routes());
    routes.extend(voters::routes());
    routes.extend(assessors::routes());
    routes.extend(tasks::routes());
    routes.extend(notifications::routes());
    routes.extend(dashboard::routes());
    routes.extend(profile::routes());
    routes.extend(lookup::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![json_error]
}

/// Guard and routing failures get the same body shape as handler errors.
#[catch(default)]
fn json_error(status: Status, _req: &Request) -> (Status, Json<Value>) {
    let reason = status.reason().unwrap_or("Unknown error");
    (status, Json(json!({ "error": reason })))
}
