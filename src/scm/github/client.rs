use graphql_client::{GraphQLQuery, Response as GraphQLResponse};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

use super::queries::{rate_limit_query, RateLimitQuery};
use super::ratelimit::RateLimit;
use crate::auth::Token;
use crate::error::{BumplineError, Result};

/// Retries granted to a request failing on the rate limit.
pub const MAX_RETRY: usize = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PUBLIC_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Prefixes `url` with `https://` unless it already has an http(s) scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("https://") || url.starts_with("http://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// GraphQL endpoint for a GitHub instance. GitHub Enterprise serves it under
/// `/api/graphql`.
pub fn graphql_endpoint(url: &str) -> Result<Url> {
    let url = normalize_url(url);
    let endpoint = if url.ends_with("github.com") {
        PUBLIC_GRAPHQL_URL.to_string()
    } else {
        format!("{url}/api/graphql")
    };
    Url::parse(&endpoint).map_err(|e| BumplineError::Config(format!("Invalid GraphQL URL: {e}")))
}

/// GitHub v4 API client.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    graphql_url: Url,
    token: Token,
}

impl GitHubClient {
    /// Client for the GitHub instance at `url` (`github.com` or an Enterprise host).
    pub fn new(url: &str, token: Token) -> Result<Self> {
        Self::with_endpoint(graphql_endpoint(url)?, token)
    }

    pub fn with_endpoint(graphql_url: Url, token: Token) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("bumpline/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BumplineError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            graphql_url,
            token,
        })
    }

    pub fn graphql_url(&self) -> &Url {
        &self.graphql_url
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(self.token.as_str())
        }
    }

    /// Sends `Q` once and checks the response for errors.
    async fn send<Q>(&self, variables: Q::Variables) -> Result<Q::ResponseData>
    where
        Q: GraphQLQuery,
    {
        let body = Q::build_query(variables);
        let operation = body.operation_name;
        debug!("GitHub API: {operation}");

        let response = self
            .auth_request(self.client.post(self.graphql_url.clone()).json(&body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            let limited = matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
                && message.to_lowercase().contains("rate limit");
            if limited {
                return Err(BumplineError::RateLimited(message));
            }
            return Err(BumplineError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let response_body: GraphQLResponse<Q::ResponseData> = response.json().await?;

        if let Some(errors) = response_body.errors.filter(|errors| !errors.is_empty()) {
            let errors = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(", ");

            if errors.to_lowercase().contains("rate limit") {
                return Err(BumplineError::RateLimited(errors));
            }
            return Err(BumplineError::GraphQL {
                operation: operation.to_string(),
                errors,
            });
        }

        response_body.data.ok_or(BumplineError::NoResponseData)
    }

    /// Sends `Q`, retrying up to [`MAX_RETRY`] times while GitHub reports the
    /// rate limit. Each retry waits for the quota reset first, unless the
    /// quota itself cannot be read. Other errors are returned immediately.
    pub async fn execute<Q>(&self, variables: Q::Variables) -> Result<Q::ResponseData>
    where
        Q: GraphQLQuery,
        Q::Variables: Clone,
    {
        let mut retry = 0;
        loop {
            match self.send::<Q>(variables.clone()).await {
                Err(e) if e.is_rate_limited() => {
                    if retry >= MAX_RETRY {
                        return Err(BumplineError::RateLimitFinalAttempt);
                    }
                    retry += 1;
                    warn!("GitHub API rate limit exceeded. Retrying... ({retry}/{MAX_RETRY})");

                    match self.rate_limit().await {
                        Ok(rate_limit) => rate_limit.show().await,
                        Err(e) => warn!("unable to query GitHub rate limit: {e}"),
                    }
                }
                result => return result,
            }
        }
    }

    /// Current quota.
    pub async fn rate_limit(&self) -> Result<RateLimit> {
        self.send::<RateLimitQuery>(rate_limit_query::Variables)
            .await?
            .into_rate_limit()
            .ok_or(BumplineError::NoResponseData)
    }
}
