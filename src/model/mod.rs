//! Records, forms and the services that read and write them.

pub mod assessor;
pub mod auth;
pub mod fields;
pub mod greeting;
pub mod mail;
pub mod mask;
pub mod metrics;
pub mod notification;
pub mod ownership;
pub mod polling_place;
pub mod postal;
pub mod push;
pub mod scan;
pub mod store;
pub mod sync;
pub mod task;
pub mod user;
pub mod voter;
