mod custom_token;
mod identity;
mod session;

pub use custom_token::{mint_custom_token, CustomTokenClaims, CUSTOM_TOKEN_AUDIENCE};
pub use identity::{FirebaseIdentity, Identities, Identity, IdentityProvider};
pub use session::Session;
