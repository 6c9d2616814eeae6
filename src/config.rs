use std::{sync::Arc, time::Duration};

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sesv2::{
    config::{Credentials, Region},
    Client as SesClient,
};
use chrono::{FixedOffset, Offset, Utc};
use log::{error, info, warn};
use reqwest::Url;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    auth::{FirebaseIdentity, Identities, Session},
    mail::{Mailer, SesMailer},
    postal::PostalCodes,
    push::{ExpoPush, Pusher},
    store::{MemoryStore, RestStore, Store},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_identity_url")]
    identity_url: String,
    #[serde(default = "default_push_url")]
    push_url: String,
    #[serde(default = "default_postal_url")]
    postal_url: String,
    invite_url: String,
    invite_sender: String,
    service_account_email: String,
    #[serde(default = "default_utc_offset_hours")]
    utc_offset_hours: i32,
    #[serde(default = "default_scan_concurrency")]
    scan_concurrency: usize,
    #[serde(default = "default_http_timeout")]
    http_timeout: u64,
    // secrets
    db_secret: String,
    identity_api_key: String,
    service_account_key: String,
}

fn default_identity_url() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

fn default_push_url() -> String {
    "https://exp.host/--/api/v2/push/send".to_string()
}

fn default_postal_url() -> String {
    "https://viacep.com.br/ws".to_string()
}

fn default_utc_offset_hours() -> i32 {
    -3
}

fn default_scan_concurrency() -> usize {
    4
}

fn default_http_timeout() -> u64 {
    15
}

impl Config {
    /// Base URL of the identity provider's REST API.
    pub fn identity_url(&self) -> &str {
        &self.identity_url
    }

    /// Endpoint accepting batches of push messages.
    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    /// Base URL of the postal code lookup service.
    pub fn postal_url(&self) -> &str {
        &self.postal_url
    }

    /// Sign-up page linked from invitation emails.
    pub fn invite_url(&self) -> &str {
        &self.invite_url
    }

    /// `From` header of invitation emails.
    pub fn invite_sender(&self) -> &str {
        &self.invite_sender
    }

    /// Issuer of minted custom tokens.
    pub fn service_account_email(&self) -> &str {
        &self.service_account_email
    }

    /// Timezone the campaign operates in; birthdays, "today" and month
    /// boundaries are evaluated here.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Maximum number of concurrent writes issued by a notification scan.
    pub fn scan_concurrency(&self) -> usize {
        self.scan_concurrency.max(1)
    }

    /// Timeout applied to every outbound HTTP request.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// API key for the identity provider.
    pub fn identity_api_key(&self) -> &str {
        &self.identity_api_key
    }

    /// PEM-encoded RSA key used to sign custom tokens.
    pub fn service_account_key(&self) -> &[u8] {
        self.service_account_key.as_bytes()
    }

    /// Session carrying the database secret, for work the server performs
    /// on its own behalf (push lookups, cross-account profile reads).
    pub fn service_session(&self) -> Session {
        Session::service(&self.db_secret)
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the document store.
#[derive(Deserialize)]
struct StoreConfig {
    db_url: String,
}

/// A fairing that places the document store into managed state. A `db_url`
/// of `memory` selects the volatile in-process store.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Document store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store = if config.db_url == "memory" {
            warn!("Using the in-memory document store; data will not survive a restart");
            Store::new(MemoryStore::default())
        } else {
            let Some(app_config) = rocket.state::<Config>() else {
                error!("The document store requires the application config to be loaded first");
                return Err(rocket);
            };
            let http = match http_client(app_config) {
                Ok(http) => http,
                Err(e) => {
                    error!("Failed to build HTTP client: {e}");
                    return Err(rocket);
                }
            };
            let base = match Url::parse(&config.db_url) {
                Ok(base) => base,
                Err(e) => {
                    error!("Invalid database URL {}: {e}", config.db_url);
                    return Err(rocket);
                }
            };
            info!("Using document store at {base}");
            Store::new(RestStore::new(http, base))
        };

        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// A fairing that builds the outbound HTTP services (identity provider,
/// push API, postal code lookup) around one shared client.
pub struct ServicesFairing;

#[rocket::async_trait]
impl Fairing for ServicesFairing {
    fn info(&self) -> Info {
        Info {
            name: "HTTP services",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = rocket.state::<Config>() else {
            error!("HTTP services require the application config to be loaded first");
            return Err(rocket);
        };
        let http = match http_client(config) {
            Ok(http) => http,
            Err(e) => {
                error!("Failed to build HTTP client: {e}");
                return Err(rocket);
            }
        };

        let identities = Identities(Arc::new(FirebaseIdentity::new(
            http.clone(),
            config.identity_url(),
            config.identity_api_key(),
        )));
        let pusher = Pusher(Arc::new(ExpoPush::new(http.clone(), config.push_url())));
        let postal = PostalCodes::new(http, config.postal_url());
        info!("Loaded HTTP service clients");

        rocket = rocket.manage(identities).manage(pusher).manage(postal);
        Ok(rocket)
    }
}

/// Build the shared HTTP client.
fn http_client(config: &Config) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
}

/// Configuration for the AWS connection.
#[derive(Deserialize)]
struct AwsConfig {
    // non-secrets
    aws_region: String,
    aws_access_key_id: String,
    // secrets
    aws_secret_access_key: String,
}

/// A fairing that loads the AWS config and places an SES-backed invite
/// mailer into managed state.
pub struct AwsFairing;

#[rocket::async_trait]
impl Fairing for AwsFairing {
    fn info(&self) -> Info {
        Info {
            name: "AWS SES",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<AwsConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load AWS config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let Some(app_config) = rocket.state::<Config>() else {
            error!("The mailer requires the application config to be loaded first");
            return Err(rocket);
        };

        // Construct the connection.
        let aws_config = SdkConfig::builder()
            .region(Region::new(config.aws_region))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                config.aws_access_key_id,
                config.aws_secret_access_key,
                None,
                None,
                "rocket config",
            )))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let client = SesClient::new(&aws_config);
        let mailer = Mailer(Arc::new(SesMailer::new(
            client,
            app_config.invite_sender(),
            app_config.invite_url(),
        )));
        info!("Loaded Amazon SES config");

        // Manage the state.
        rocket = rocket.manage(mailer);
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;
    use crate::testing;

    #[test]
    fn test_config_loads_with_defaults() {
        let config: Config = testing::figment().extract().unwrap();
        assert_eq!(config.scan_concurrency(), 2);
        assert_eq!(config.http_timeout(), Duration::from_secs(15));
        assert!(http_client(&config).is_ok());
        assert_eq!(config.push_url(), "https://exp.host/--/api/v2/push/send");
    }

    #[test]
    fn timezone_follows_the_configured_offset() {
        let config: Config = testing::figment().extract().unwrap();
        let tz = config.timezone();
        let midnight_utc = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(midnight_utc.with_timezone(&tz).hour(), 21);
    }

    #[test]
    fn service_session_carries_the_database_secret() {
        let config: Config = testing::figment().extract().unwrap();
        assert_eq!(config.service_session().token(), testing::DB_SECRET);
    }
}
