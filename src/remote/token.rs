//! Short-lived service-account tokens for the metrics-query adapter.

use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::{Api, PostParams};
use kube::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::PmError;

pub const TOKEN_AUDIENCE: &str = "https://kubernetes.default.svc";

/// Service account a token is minted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceAccountRef {
    pub namespace: String,
    pub name: String,
}

impl Default for ServiceAccountRef {
    fn default() -> Self {
        Self {
            namespace: "openshift-monitoring".into(),
            name: "prometheus-k8s".into(),
        }
    }
}

fn token_request() -> TokenRequest {
    TokenRequest {
        spec: TokenRequestSpec {
            audiences: vec![TOKEN_AUDIENCE.to_string()],
            ..TokenRequestSpec::default()
        },
        ..TokenRequest::default()
    }
}

/// Mints a token through the TokenRequest API. An empty token is an error.
#[instrument(skip(client))]
pub async fn mint_token(client: &Client, account: &ServiceAccountRef) -> Result<String, PmError> {
    let accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), &account.namespace);
    let response = accounts
        .create_token_request(&account.name, &PostParams::default(), &token_request())
        .await
        .map_err(|e| PmError::remote(&account.name, e))?;

    let token = response.status.map(|s| s.token).unwrap_or_default();
    if token.is_empty() {
        return Err(PmError::remote(&account.name, "no service account token returned"));
    }
    debug!("Service account token minted");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_request_audience() {
        let request = token_request();
        assert_eq!(request.spec.audiences, vec![TOKEN_AUDIENCE.to_string()]);
        assert!(request.status.is_none());
    }

    #[test]
    fn test_default_account() {
        let account = ServiceAccountRef::default();
        assert_eq!(account.namespace, "openshift-monitoring");
        assert_eq!(account.name, "prometheus-k8s");
    }
}
