use super::account::AccountStore;
use super::password::PasswordHasher;
use super::principal::Principal;
use super::provider::{AuthFailure, CredentialVerifier, Credentials};
use async_trait::async_trait;
use std::sync::Arc;

/// Verifies local email/password credentials against stored Argon2 hashes
///
/// Unknown accounts still pay for one hash verification so response time
/// does not reveal whether an email is registered.
pub struct LocalPasswordVerifier {
    accounts: Arc<dyn AccountStore>,
    hasher: PasswordHasher,
    dummy_hash: String,
}

impl LocalPasswordVerifier {
    pub fn new(accounts: Arc<dyn AccountStore>, hasher: PasswordHasher) -> crate::error::Result<Self> {
        let dummy_hash = hasher.hash("dummy-password-for-timing")?;
        Ok(Self {
            accounts,
            hasher,
            dummy_hash,
        })
    }

    async fn verify_hash(&self, password: String, hash: String) -> Result<bool, AuthFailure> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthFailure::ProviderError(format!("Password check failed: {}", e)))?
            .map_err(|e| {
                tracing::error!(error = %e, "Stored password hash is unreadable");
                AuthFailure::InvalidCredentials
            })
    }
}

#[async_trait]
impl CredentialVerifier for LocalPasswordVerifier {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthFailure> {
        let Credentials::Password { email, password } = credentials else {
            return Err(AuthFailure::UnsupportedCredentials);
        };

        let account = self
            .accounts
            .find_by_email(email)
            .await
            .map_err(|e| AuthFailure::ProviderError(e.to_string()))?;

        match account {
            Some(account) => {
                let Some(hash) = account.password_hash else {
                    // Federated-only account; still burn the same time
                    let _ = self.verify_hash(password.clone(), self.dummy_hash.clone()).await;
                    return Err(AuthFailure::InvalidCredentials);
                };
                if self.verify_hash(password.clone(), hash).await? {
                    Ok(account.principal)
                } else {
                    Err(AuthFailure::InvalidCredentials)
                }
            }
            None => {
                let _ = self.verify_hash(password.clone(), self.dummy_hash.clone()).await;
                Err(AuthFailure::AccountNotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::account::InMemoryAccountStore;
    use crate::auth::password::PasswordConfig;

    async fn verifier() -> LocalPasswordVerifier {
        let hasher = PasswordHasher::new(PasswordConfig::fast());
        let accounts = InMemoryAccountStore::new();
        accounts
            .add_local("ada@example.com", Some("Ada".into()), hasher.hash("correct horse").unwrap())
            .await;
        LocalPasswordVerifier::new(Arc::new(accounts), hasher).unwrap()
    }

    fn password(email: &str, password: &str) -> Credentials {
        Credentials::Password {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_valid_password() {
        let principal = verifier()
            .await
            .authenticate(&password("ada@example.com", "correct horse"))
            .await
            .unwrap();
        assert_eq!(principal.email, "ada@example.com");
        assert_eq!(principal.provider.provider, "local");
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let err = verifier()
            .await
            .authenticate(&password("ada@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFailure::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let err = verifier()
            .await
            .authenticate(&password("nobody@example.com", "correct horse"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFailure::AccountNotFound));
    }

    #[tokio::test]
    async fn test_rejects_provider_tokens() {
        let err = verifier()
            .await
            .authenticate(&Credentials::ProviderToken {
                provider: "google".into(),
                access_token: "t".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFailure::UnsupportedCredentials));
    }
}
