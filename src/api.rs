//! HTTP client for the chat REST API.
//!
//! Endpoint methods live next to their domain: auth in [`crate::auth`],
//! rooms and the message backlog in [`crate::rooms`].

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, SyncError};
use crate::session::Session;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    /// Example: `ApiClient::new("http://localhost:8080/api")`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    /// Attach the session's bearer token, or fail if signed out.
    pub(crate) fn authorized(request: RequestBuilder, session: &Session) -> Result<RequestBuilder> {
        let token = session.token().ok_or(SyncError::NotSignedIn)?;
        Ok(request.bearer_auth(token))
    }

    pub(crate) async fn json_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::parse_error(response).await)
        }
    }

    async fn parse_error(response: Response) -> SyncError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => "Request failed".to_string(),
        };
        SyncError::Api { status, message }
    }
}
