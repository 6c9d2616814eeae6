//! Fixtures shared by the unit and route tests: a test configuration, and
//! in-process stand-ins for the identity provider, mailer and push API.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use rocket::{figment::Figment, http::Header, Build, Rocket};

use crate::{
    config::ConfigFairing,
    error::{Error, Result},
    logging::LoggerFairing,
    model::{
        auth::{Identities, Identity, IdentityProvider},
        mail::{InviteMailer, Mailer},
        postal::PostalCodes,
        push::{PushMessage, PushSender, Pusher},
        store::{MemoryStore, Store},
        user::{PlanTier, UserProfile},
    },
};

pub const DB_SECRET: &str = "test-database-secret";
pub const SERVICE_ACCOUNT_EMAIL: &str = "tests@assessor-test.iam.gserviceaccount.com";
pub const SERVICE_ACCOUNT_KEY: &str = include_str!("service_account_test.pem");
pub const SERVICE_ACCOUNT_PUBLIC_KEY: &str = include_str!("service_account_test.pub.pem");

pub const ADMIN_TOKEN: &str = "admin-token";
pub const ADMIN_UID: &str = "admin-1";
pub const ASSESSOR_TOKEN: &str = "assessor-token";
pub const ASSESSOR_UID: &str = "assessor-1";
pub const OTHER_TOKEN: &str = "other-token";
pub const OTHER_UID: &str = "other-1";

/// Postal lookups in route tests go nowhere unless a test mounts a server.
const UNREACHABLE: &str = "http://127.0.0.1:9";

/// `Rocket.toml` (debug profile, hence the in-memory store) plus the
/// settings normally supplied through the environment.
pub fn figment() -> Figment {
    rocket::Config::figment()
        .merge(("db_url", "memory"))
        .merge(("scan_concurrency", 2))
        .merge(("log_level", "off"))
        .merge(("service_account_email", SERVICE_ACCOUNT_EMAIL))
        .merge(("db_secret", DB_SECRET))
        .merge(("identity_api_key", "test-api-key"))
        .merge(("service_account_key", SERVICE_ACCOUNT_KEY))
}

/// Enable logging for tests that exercise enough of the server to make
/// log output useful.
pub fn init_logging() {
    log4rs_test_utils::test_logging::init_logging_once_for(["assessor_backend"], None, None);
}

/// An `Authorization` header carrying `token`.
pub fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {token}"))
}

/// Accepts the three fixed test tokens.
pub struct StaticIdentities;

#[rocket::async_trait]
impl IdentityProvider for StaticIdentities {
    async fn verify(&self, id_token: &str) -> Result<Identity> {
        let (uid, email) = match id_token {
            ADMIN_TOKEN => (ADMIN_UID, "admin@example.com"),
            ASSESSOR_TOKEN => (ASSESSOR_UID, "assessor@example.com"),
            OTHER_TOKEN => (OTHER_UID, "other@example.com"),
            _ => return Err(Error::unauthorized("Invalid ID token")),
        };
        Ok(Identity {
            uid: uid.to_string(),
            email: Some(email.to_string()),
        })
    }
}

/// Records invitations instead of emailing them.
#[derive(Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    failing: Arc<AtomicBool>,
}

impl Outbox {
    /// `(email, name)` of every invitation sent so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Make every following delivery fail.
    pub fn fail_deliveries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[rocket::async_trait]
impl InviteMailer for Outbox {
    async fn send_invite(&self, email: &str, name: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Mail("mailbox unavailable".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((email.to_string(), name.to_string()));
        }
        Ok(())
    }
}

/// Records push messages instead of sending them.
#[derive(Clone, Default)]
pub struct PushLog {
    sent: Arc<Mutex<Vec<PushMessage>>>,
}

impl PushLog {
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[rocket::async_trait]
impl PushSender for PushLog {
    async fn send(&self, messages: &[PushMessage]) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.extend_from_slice(messages);
        }
        Ok(())
    }
}

/// The fake services behind a test server, kept so tests can inspect them.
#[derive(Clone, Default)]
pub struct Fakes {
    pub memory: MemoryStore,
    pub outbox: Outbox,
    pub push_log: PushLog,
}

impl Fakes {
    /// Profiles for the test accounts: a basic-plan politician, one of
    /// their staff, and an unrelated politician.
    pub fn seed_profiles(&self) {
        let admin = UserProfile::politician("Ana Prefeita", "admin@example.com", PlanTier::Basic);
        let staff = UserProfile::assessor("Bruno Assessor", "assessor@example.com", ADMIN_UID);
        let other = UserProfile::politician("Otávio", "other@example.com", PlanTier::Pro);
        for (uid, profile) in [(ADMIN_UID, admin), (ASSESSOR_UID, staff), (OTHER_UID, other)] {
            if let Ok(value) = rocket::serde::json::serde_json::to_value(profile) {
                self.memory.seed(&format!("users/{uid}"), value);
            }
        }
    }

    /// The full server, with the fakes standing in for external services.
    pub fn rocket(&self) -> Rocket<Build> {
        rocket::custom(figment())
            .attach(ConfigFairing)
            .attach(LoggerFairing)
            .manage(Store::new(self.memory.clone()))
            .manage(Identities(Arc::new(StaticIdentities)))
            .manage(Mailer(Arc::new(self.outbox.clone())))
            .manage(Pusher(Arc::new(self.push_log.clone())))
            .manage(PostalCodes::new(reqwest::Client::new(), UNREACHABLE))
            .mount("/", crate::api::routes())
            .register("/", crate::api::catchers())
    }
}
