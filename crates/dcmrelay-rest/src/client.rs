use std::time::Duration;

use dcmrelay_types::ValidationOutcome;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::RestError;
use crate::types::InstanceQuery;

/// Per-request timeout for instance lookups (spec §6: "20-second timeout").
const QUERY_TIMEOUT: Duration = Duration::from_secs(20);

/// A client for the archive's QIDO-RS instance index.
///
/// One instance is built per run and shared across every lookup; `reqwest`
/// pools connections internally so repeated `query_instance` calls reuse the
/// same TCP/TLS session to the archive host.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
}

impl RestClient {
    /// Build a client backed by rustls, with no retry policy: a failed
    /// lookup surfaces as [`ValidationOutcome::ApiError`] on the returned
    /// [`InstanceQuery`] rather than as an `Err`, so callers never need to
    /// retry by hand (spec §7: archive errors are data, not failures).
    pub fn new() -> Result<Self, RestError> {
        let client = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(RestError::ClientBuild)?;
        Ok(Self { client })
    }

    /// Query `GET http://{rest_host}/dcm4chee-arc/aets/{aet}/rs/instances?SOPInstanceUID={iuid}`.
    pub async fn query_instance(&self, rest_host: &str, aet: &str, iuid: &str) -> InstanceQuery {
        let url = format!(
            "http://{rest_host}/dcm4chee-arc/aets/{aet}/rs/instances?SOPInstanceUID={iuid}"
        );
        debug!(url = %url, "querying archive instance index");

        let response = match self.client.get(&url).timeout(QUERY_TIMEOUT).send().await {
            Ok(response) => response,
            Err(err) => {
                return InstanceQuery {
                    outcome: ValidationOutcome::ApiError,
                    http_status: "ERR".to_string(),
                    detail: err.to_string(),
                    dataset: Value::Null,
                };
            }
        };

        let status = response.status();
        let http_status = status.as_u16().to_string();

        if !status.is_success() {
            return InstanceQuery {
                outcome: ValidationOutcome::NotFound,
                http_status,
                detail: format!("archive returned {status}"),
                dataset: Value::Null,
            };
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                return InstanceQuery {
                    outcome: ValidationOutcome::ApiError,
                    http_status: "ERR".to_string(),
                    detail: err.to_string(),
                    dataset: Value::Null,
                };
            }
        };

        if body.trim().is_empty() {
            return InstanceQuery {
                outcome: ValidationOutcome::NotFound,
                http_status,
                detail: String::new(),
                dataset: Value::Null,
            };
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(items)) if !items.is_empty() && items[0].is_object() => InstanceQuery {
                outcome: ValidationOutcome::Ok,
                http_status,
                detail: String::new(),
                dataset: items.into_iter().next().unwrap_or(Value::Null),
            },
            Ok(_) => InstanceQuery {
                outcome: ValidationOutcome::NotFound,
                http_status,
                detail: String::new(),
                dataset: Value::Null,
            },
            Err(err) => InstanceQuery {
                outcome: ValidationOutcome::ApiError,
                http_status: "ERR".to_string(),
                detail: err.to_string(),
                dataset: Value::Null,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_constructs() {
        assert!(RestClient::new().is_ok());
    }

    #[tokio::test]
    async fn unreachable_host_yields_api_error_outcome() {
        let client = RestClient::new().unwrap();
        let result = client
            .query_instance("127.0.0.1:1", "HMD_IMPORTED", "1.2.3")
            .await;
        assert_eq!(result.outcome, ValidationOutcome::ApiError);
        assert_eq!(result.http_status, "ERR");
    }
}
