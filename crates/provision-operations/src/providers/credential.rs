//! Bearer tokens for the resource manager API.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use crate::{OperationError, Result};

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Upper bound on how long a token is cached, whatever the endpoint claims.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

pub trait TokenCredential: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if no token can be obtained.
    fn token(&self) -> Result<String>;
}

/// A pre-acquired token, e.g. from `az account get-access-token`.
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenCredential for StaticToken {
    fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// OAuth2 client-credentials flow for a service principal.
pub struct ClientSecretCredential {
    client: reqwest::blocking::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientSecretCredential {
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }

    fn request_token(&self) -> Result<CachedToken> {
        let url = self.token_url();
        let token_error = |source| OperationError::TokenRequest {
            url: url.clone(),
            source,
        };
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", MANAGEMENT_SCOPE),
            ])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(token_error)?;
        let body = response.text().map_err(token_error)?;
        let token = parse_token_response(&body)?;
        debug!(tenant = %self.tenant_id, expires_in = token.expires_in, "acquired access token");
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now()
                + Duration::from_secs(token.expires_in).min(MAX_TOKEN_LIFETIME),
        })
    }
}

impl TokenCredential for ClientSecretCredential {
    fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cached
            .as_ref()
            .filter(|t| t.expires_at.saturating_duration_since(Instant::now()) > EXPIRY_MARGIN)
        {
            return Ok(token.value.clone());
        }
        let fresh = self.request_token()?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

fn parse_token_response(body: &str) -> Result<TokenResponse> {
    serde_json::from_str(body).map_err(|_| OperationError::MalformedResponse {
        context: "reading the token endpoint response".to_string(),
    })
}

/// Credential chosen from environment variables.
///
/// `AZURE_ACCESS_TOKEN` wins; otherwise `AZURE_TENANT_ID`,
/// `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET` select the client-credentials flow.
pub enum EnvironmentCredential {
    Static(StaticToken),
    ClientSecret(ClientSecretCredential),
}

impl EnvironmentCredential {
    /// # Errors
    ///
    /// Returns [`OperationError::CredentialUnavailable`] if no supported
    /// combination of variables is set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// # Errors
    ///
    /// Returns [`OperationError::CredentialUnavailable`] if no supported
    /// combination of variables is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("AZURE_ACCESS_TOKEN") {
            return Ok(Self::Static(StaticToken::new(token)));
        }

        match (
            get("AZURE_TENANT_ID"),
            get("AZURE_CLIENT_ID"),
            get("AZURE_CLIENT_SECRET"),
        ) {
            (Some(tenant), Some(client), Some(secret)) => {
                let mut credential = ClientSecretCredential::new(tenant, client, secret);
                if let Some(authority) = get("AZURE_AUTHORITY_HOST") {
                    credential = credential.with_authority(authority);
                }
                Ok(Self::ClientSecret(credential))
            }
            (tenant, client, secret) => {
                let missing: Vec<_> = [
                    ("AZURE_TENANT_ID", tenant.is_none()),
                    ("AZURE_CLIENT_ID", client.is_none()),
                    ("AZURE_CLIENT_SECRET", secret.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(OperationError::CredentialUnavailable {
                    reason: format!(
                        "set AZURE_ACCESS_TOKEN, or set {}",
                        missing.join(", ")
                    ),
                })
            }
        }
    }
}

impl TokenCredential for EnvironmentCredential {
    fn token(&self) -> Result<String> {
        match self {
            Self::Static(token) => token.token(),
            Self::ClientSecret(credential) => credential.token(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn access_token_takes_precedence() -> anyhow::Result<()> {
        let credential = EnvironmentCredential::from_lookup(lookup(&[
            ("AZURE_ACCESS_TOKEN", "eyJ0eXAi"),
            ("AZURE_TENANT_ID", "tenant"),
        ]))?;

        assert!(matches!(credential, EnvironmentCredential::Static(_)));
        assert_eq!(credential.token()?, "eyJ0eXAi");
        Ok(())
    }

    #[test]
    fn service_principal_variables_select_client_secret() -> anyhow::Result<()> {
        let credential = EnvironmentCredential::from_lookup(lookup(&[
            ("AZURE_TENANT_ID", "tenant"),
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_CLIENT_SECRET", "secret"),
        ]))?;

        let EnvironmentCredential::ClientSecret(inner) = credential else {
            panic!("expected client secret credential");
        };
        assert_eq!(
            inner.token_url(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token"
        );
        Ok(())
    }

    #[test]
    fn authority_override_is_trimmed() {
        let credential =
            ClientSecretCredential::new("t", "c", "s").with_authority("https://login.example/");

        assert_eq!(credential.token_url(), "https://login.example/t/oauth2/v2.0/token");
    }

    #[test]
    fn partial_service_principal_lists_missing_variables() {
        let result = EnvironmentCredential::from_lookup(lookup(&[("AZURE_TENANT_ID", "tenant")]));

        let Err(OperationError::CredentialUnavailable { reason }) = result else {
            panic!("expected CredentialUnavailable");
        };
        assert!(reason.contains("AZURE_CLIENT_ID"));
        assert!(reason.contains("AZURE_CLIENT_SECRET"));
        assert!(!reason.contains("AZURE_TENANT_ID,"));
    }

    #[test]
    fn token_response_parses_access_token_and_expiry() -> anyhow::Result<()> {
        let token = parse_token_response(
            r#"{"token_type":"Bearer","expires_in":3599,"access_token":"abc.def"}"#,
        )?;

        assert_eq!(token.access_token, "abc.def");
        assert_eq!(token.expires_in, 3599);
        Ok(())
    }

    #[test]
    fn malformed_token_response_is_rejected() {
        let result = parse_token_response("<html>error</html>");

        assert!(matches!(result, Err(OperationError::MalformedResponse { .. })));
    }

    #[test]
    fn cached_token_is_reused_until_margin() -> anyhow::Result<()> {
        let credential = ClientSecretCredential::new("t", "c", "s");
        *credential.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedToken {
            value: "cached".to_string(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        });

        assert_eq!(credential.token()?, "cached");
        Ok(())
    }
}
