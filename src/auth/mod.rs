//! Credential verification and the authentication gate.

pub mod account;
pub mod delegated;
pub mod extractors;
pub mod local;
pub mod middleware;
pub mod password;
pub mod principal;
pub mod provider;
pub mod routes;

pub use account::{Account, AccountStore, FederatedIdentity, InMemoryAccountStore};
pub use delegated::{DelegatedProviderConfig, DelegatedProviderVerifier, HttpUserInfoExchange, TokenExchange};
pub use extractors::{CurrentPrincipal, OptionalPrincipal};
pub use local::LocalPasswordVerifier;
pub use middleware::RequireAuth;
pub use password::{PasswordConfig, PasswordHasher};
pub use principal::{Principal, PrincipalId, PrincipalSummary, ProviderLink};
pub use provider::{AuthFailure, CredentialVerifier, Credentials};
pub use routes::{UserModule, auth_routes};
