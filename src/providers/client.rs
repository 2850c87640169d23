//! Shared HTTP plumbing for catalog providers.
//!
//! [`ProviderClient`] composes a `reqwest` client with the provider's
//! [`RequestBudget`] and [`RetryPolicy`]: every attempt waits for a rate
//! token first, and transient failures are retried with backoff. Providers
//! only deal in URLs and decoded response types.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::limiter::RequestBudget;
use crate::retry::RetryPolicy;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one provider's throttle and retry discipline.
pub struct ProviderClient {
    name: &'static str,
    http: reqwest::Client,
    budget: RequestBudget,
    retry: RetryPolicy,
}

impl ProviderClient {
    /// Build the client from the provider's configuration.
    ///
    /// `user_agent` is set for providers that require one (MusicBrainz
    /// rejects anonymous clients).
    pub fn new(name: &'static str, config: &ProviderConfig, user_agent: Option<&str>) -> Self {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }
        let http = builder.build().expect("failed to build reqwest client");

        let budget = RequestBudget::new(
            name,
            config.rate_limit.requests,
            Duration::from_millis(config.rate_limit.window_ms),
            config.rate_limit.max_wait_ms.map(Duration::from_millis),
        );

        Self {
            name,
            http,
            budget,
            retry: config.retry.to_policy(),
        }
    }

    /// GET `url` and decode the JSON body.
    ///
    /// Each attempt acquires a rate token before sending; the whole call is
    /// wrapped in the provider's retry policy. 404 maps to
    /// [`Error::NotFound`], other non-success statuses to [`Error::Http`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<T> {
        self.retry
            .run(self.name, || async {
                self.budget.acquire().await?;
                debug!(provider = self.name, url, "issuing catalog request");

                let mut request = self.http.get(url);
                if let Some(token) = bearer {
                    request = request.bearer_auth(token);
                }
                let response = request.send().await?;
                let status = response.status();

                if status == StatusCode::NOT_FOUND {
                    return Err(Error::not_found(format!("{}: {url}", self.name)));
                }
                if !status.is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(Error::http(status.as_u16(), message));
                }

                response
                    .json::<T>()
                    .await
                    .map_err(|e| Error::decode(format!("{}: {e}", self.name)))
            })
            .await
    }
}
