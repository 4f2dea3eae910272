use provision_core::{ResourceAddress, ResourceId, ResourceKind};
use reqwest::blocking::{Client, Response};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::credential::TokenCredential;
use crate::poll::{LongRunningOperation, PollContext, PollStatus, await_completion};
use crate::traits::{ProvisionedResource, ResourceProvider, ResourceRequest};
use crate::{OperationError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Resource provider backed by the Azure Resource Manager REST API.
pub struct ArmProvider<C> {
    client: Client,
    endpoint: String,
    subscription_id: String,
    credential: C,
}

impl<C: TokenCredential> ArmProvider<C> {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new(subscription_id: impl Into<String>, credential: C) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("arm-provision/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(OperationError::ClientInit)?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription_id: subscription_id.into(),
            credential,
        })
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn resource_url(&self, address: &ResourceAddress, force_delete: bool) -> String {
        let mut url = format!(
            "{}{}?api-version={}",
            self.endpoint,
            address.path(&self.subscription_id),
            address.kind.api_version()
        );
        if force_delete && address.kind == ResourceKind::VirtualMachine {
            url.push_str("&forceDeletion=true");
        }
        url
    }

    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let token = self.credential.token()?;
        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(|source| OperationError::Http {
            method: method.to_string(),
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        debug!(%method, url, status = status.as_u16(), "resource manager response");

        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().unwrap_or_default();
        Err(provider_error(status.as_u16(), &text))
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        self.send(Method::GET, url, None)?
            .json::<Value>()
            .map_err(|source| OperationError::Http {
                method: Method::GET.to_string(),
                url: url.to_string(),
                source,
            })
    }

    fn wait_for(&self, response: &Response, description: String, poll: &PollContext) -> Result<()> {
        match tracker_from(response.headers()) {
            Some(tracker) => {
                let mut operation = ArmOperation {
                    provider: self,
                    tracker,
                    description,
                };
                await_completion(&mut operation, poll)
            }
            None => Ok(()),
        }
    }
}

impl<C: TokenCredential> ResourceProvider for ArmProvider<C> {
    fn create(
        &self,
        request: &ResourceRequest,
        poll: &PollContext,
    ) -> Result<ProvisionedResource> {
        let address = &request.address;
        let url = self.resource_url(address, false);
        info!(resource = %address, "creating");

        let response = self.send(Method::PUT, &url, Some(&request.body))?;
        self.wait_for(&response, format!("create {address}"), poll)?;

        // The PUT response does not always carry the final representation,
        // so the resource is read back once the operation has finished.
        let snapshot = self.get_json(&url)?;
        let id = snapshot
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| OperationError::MalformedResponse {
                context: format!("reading the id of {address}"),
            })?;

        Ok(ProvisionedResource {
            kind: address.kind,
            id: ResourceId::new(id),
            name: address.name.clone(),
            snapshot,
        })
    }

    fn delete(&self, address: &ResourceAddress, poll: &PollContext) -> Result<()> {
        let url = self.resource_url(address, true);
        info!(resource = %address, "deleting");

        let response = match self.send(Method::DELETE, &url, None) {
            Ok(response) => response,
            Err(OperationError::Provider { status: 404, .. }) => {
                debug!(resource = %address, "already deleted");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.wait_for(&response, format!("delete {address}"), poll)
    }
}

/// Where the status of a long-running operation can be read.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Tracker {
    /// Status document with a `status` field.
    AsyncOperation(String),
    /// Returns 202 while running and a final status once done.
    Location(String),
}

fn tracker_from(headers: &HeaderMap) -> Option<Tracker> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    header("azure-asyncoperation")
        .map(Tracker::AsyncOperation)
        .or_else(|| header("location").map(Tracker::Location))
}

struct ArmOperation<'a, C> {
    provider: &'a ArmProvider<C>,
    tracker: Tracker,
    description: String,
}

impl<C: TokenCredential> LongRunningOperation for ArmOperation<'_, C> {
    type Output = ();

    fn description(&self) -> String {
        self.description.clone()
    }

    fn poll(&mut self) -> Result<PollStatus<()>> {
        match &self.tracker {
            Tracker::AsyncOperation(url) => {
                let body = self.provider.get_json(url)?;
                operation_status(&body, &self.description)
            }
            Tracker::Location(url) => {
                let response = self.provider.send(Method::GET, url, None)?;
                if response.status() == StatusCode::ACCEPTED {
                    Ok(PollStatus::Pending)
                } else {
                    Ok(PollStatus::Done(()))
                }
            }
        }
    }
}

fn operation_status(body: &Value, description: &str) -> Result<PollStatus<()>> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| OperationError::MalformedResponse {
            context: format!("polling {description}"),
        })?;

    match status {
        "Succeeded" => Ok(PollStatus::Done(())),
        "Failed" | "Canceled" => Err(OperationError::OperationFailed {
            operation: description.to_string(),
            status: status.to_string(),
            message: body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("no error details")
                .to_string(),
        }),
        _ => Ok(PollStatus::Pending),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn provider_error(status: u16, body: &str) -> OperationError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let code = if envelope.error.code.is_empty() {
        "Unknown".to_string()
    } else {
        envelope.error.code
    };
    let message = if envelope.error.message.is_empty() {
        body.trim().chars().take(200).collect()
    } else {
        envelope.error.message
    };
    OperationError::Provider {
        status,
        code,
        message,
    }
}
