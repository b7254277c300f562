use crate::config::DeploymentEnvironment;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// SameSite attribute of the session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl From<SameSitePolicy> for cookie::SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => cookie::SameSite::Strict,
            SameSitePolicy::Lax => cookie::SameSite::Lax,
            SameSitePolicy::None => cookie::SameSite::None,
        }
    }
}

/// Attributes attached to every session cookie the process emits
///
/// Resolved once at startup from the deployment environment and never
/// changed per request. `HttpOnly` is always set. `Max-Age` is not part of
/// the policy: it always tracks the session record's expiry. A policy pairing
/// `SameSite=None` with `Secure=false` cannot be constructed: browsers drop
/// such cookies without telling anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    secure: bool,
    same_site: SameSitePolicy,
}

impl CookiePolicy {
    /// Create a policy, rejecting `SameSite=None` without `Secure`
    pub fn new(secure: bool, same_site: SameSitePolicy) -> Result<Self> {
        if same_site == SameSitePolicy::None && !secure {
            return Err(AppError::misconfigured(
                "Session cookie with SameSite=None must also be Secure",
            ));
        }
        Ok(Self { secure, same_site })
    }

    /// The one policy for a deployment environment
    ///
    /// | environment | Secure | SameSite |
    /// |---|---|---|
    /// | development (same origin, plain HTTP) | no | Lax |
    /// | production (API and client on different sites) | yes | None |
    pub fn for_environment(environment: DeploymentEnvironment) -> Self {
        match environment {
            DeploymentEnvironment::Development => Self {
                secure: false,
                same_site: SameSitePolicy::Lax,
            },
            DeploymentEnvironment::Production => Self {
                secure: true,
                same_site: SameSitePolicy::None,
            },
        }
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn same_site(&self) -> SameSitePolicy {
        self.same_site
    }

    pub fn http_only(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_policy() {
        let policy = CookiePolicy::for_environment(DeploymentEnvironment::Development);
        assert!(!policy.secure());
        assert_eq!(policy.same_site(), SameSitePolicy::Lax);
        assert!(policy.http_only());
    }

    #[test]
    fn test_production_policy_is_cross_site() {
        let policy = CookiePolicy::for_environment(DeploymentEnvironment::Production);
        assert!(policy.secure());
        assert_eq!(policy.same_site(), SameSitePolicy::None);
        assert!(policy.http_only());
    }

    #[test]
    fn test_same_site_none_requires_secure() {
        let err = CookiePolicy::new(false, SameSitePolicy::None).unwrap_err();
        assert!(matches!(err, AppError::MisconfiguredPolicy(_)));

        assert!(CookiePolicy::new(true, SameSitePolicy::None).is_ok());
        assert!(CookiePolicy::new(false, SameSitePolicy::Strict).is_ok());
    }

    #[test]
    fn test_no_environment_produces_insecure_none() {
        for env in [DeploymentEnvironment::Development, DeploymentEnvironment::Production] {
            let policy = CookiePolicy::for_environment(env);
            assert!(!(policy.same_site() == SameSitePolicy::None && !policy.secure()));
        }
    }
}
