use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an authenticated principal
///
/// This is the only piece of identity the session layer holds on to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PrincipalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Link between a principal and the identity provider that vouched for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLink {
    /// `local` for password accounts, otherwise the provider name
    pub provider: String,
    /// Subject identifier issued by the provider
    pub subject: String,
}

impl ProviderLink {
    pub fn local(subject: impl Into<String>) -> Self {
        Self {
            provider: "local".to_string(),
            subject: subject.into(),
        }
    }
}

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: ProviderLink,
}

impl Principal {
    /// Public view returned to the browser client
    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSummary {
    pub id: PrincipalId,
    pub email: String,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}
