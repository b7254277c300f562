use super::principal::{Principal, PrincipalId, ProviderLink};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A stored account: the principal plus its local password hash, if any
#[derive(Debug, Clone)]
pub struct Account {
    pub principal: Principal,
    pub password_hash: Option<String>,
}

/// Identity asserted by a delegated provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub provider: String,
    pub subject: String,
    pub email: String,
    /// Whether the provider asserts the user proved ownership of `email`
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Lookup of accounts for the credential verifiers
///
/// Owned by the identity subsystem; the session core only ever holds the
/// resulting principal id.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Principal>>;

    /// Map a federated identity to a stable local principal
    ///
    /// Matches by provider subject, then by email when the provider has
    /// verified it; otherwise creates a new account. Display attributes are
    /// refreshed from the provider.
    async fn link_federated(&self, identity: FederatedIdentity) -> Result<Principal>;
}

#[derive(Default)]
struct Accounts {
    by_id: HashMap<PrincipalId, Account>,
    by_email: HashMap<String, PrincipalId>,
    by_subject: HashMap<(String, String), PrincipalId>,
}

/// In-memory account store for tests and single-process demos
#[derive(Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<Accounts>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local password account
    pub async fn add_local(
        &self,
        email: impl Into<String>,
        display_name: Option<String>,
        password_hash: String,
    ) -> Principal {
        let email = email.into();
        let id = PrincipalId::new(uuid::Uuid::new_v4().to_string());
        let principal = Principal {
            id: id.clone(),
            email: email.clone(),
            display_name,
            avatar_url: None,
            provider: ProviderLink::local(id.to_string()),
        };

        let mut accounts = self.accounts.write().await;
        accounts.by_email.insert(normalize(&email), id.clone());
        accounts.by_id.insert(
            id,
            Account {
                principal: principal.clone(),
                password_hash: Some(password_hash),
            },
        );
        principal
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .by_email
            .get(&normalize(email))
            .and_then(|id| accounts.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Principal>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.by_id.get(id).map(|a| a.principal.clone()))
    }

    async fn link_federated(&self, identity: FederatedIdentity) -> Result<Principal> {
        let mut accounts = self.accounts.write().await;
        let subject_key = (identity.provider.clone(), identity.subject.clone());
        let email_key = normalize(&identity.email);

        let existing = accounts
            .by_subject
            .get(&subject_key)
            .or_else(|| {
                identity
                    .email_verified
                    .then(|| accounts.by_email.get(&email_key))
                    .flatten()
            })
            .cloned();

        let id = match existing {
            Some(id) => id,
            None => {
                let id = PrincipalId::new(uuid::Uuid::new_v4().to_string());
                let principal = Principal {
                    id: id.clone(),
                    email: identity.email.clone(),
                    display_name: None,
                    avatar_url: None,
                    provider: ProviderLink {
                        provider: identity.provider.clone(),
                        subject: identity.subject.clone(),
                    },
                };
                accounts.by_id.insert(
                    id.clone(),
                    Account {
                        principal,
                        password_hash: None,
                    },
                );
                // An unverified address never takes over the email index
                accounts.by_email.entry(email_key).or_insert_with(|| id.clone());
                id
            }
        };

        accounts.by_subject.insert(subject_key, id.clone());

        let account = accounts
            .by_id
            .get_mut(&id)
            .ok_or_else(|| crate::error::AppError::internal("Account index out of sync"))?;
        if identity.display_name.is_some() {
            account.principal.display_name = identity.display_name;
        }
        if identity.avatar_url.is_some() {
            account.principal.avatar_url = identity.avatar_url;
        }
        Ok(account.principal.clone())
    }
}
