//! The slice of the platform's REST API the webhook relies on.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    model::{AttachmentActions, Message, Person},
    registration::{WebhookRegistration, WebhookSpec},
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no access token configured")]
    MissingToken,
    #[error("access token rejected (401)")]
    Unauthorized,
    #[error("{0} not found (404)")]
    NotFound(String),
    #[error("unexpected status {status} for {path}")]
    Status { status: u16, path: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait SparkApi: Send + Sync {
    /// The account the access token belongs to.
    async fn me(&self) -> Result<Person, ApiError>;
    async fn message(&self, id: &str) -> Result<Message, ApiError>;
    async fn attachment_actions(&self, id: &str) -> Result<AttachmentActions, ApiError>;
    async fn list_webhooks(&self) -> Result<Vec<WebhookRegistration>, ApiError>;
    async fn create_webhook(&self, spec: &WebhookSpec) -> Result<WebhookRegistration, ApiError>;
    async fn delete_webhook(&self, id: &str) -> Result<(), ApiError>;
}

/// Bearer-token client over `reqwest`. One attempt per call, no retries.
#[derive(Clone)]
pub struct WebexClient {
    http: Client,
    base_url: String,
    token: String,
}

impl core::fmt::Debug for WebexClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebexClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct Items<T> {
    items: Option<Vec<T>>,
}

impl WebexClient {
    #[must_use]
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, req: RequestBuilder, path: &str) -> Result<reqwest::Response, ApiError> {
        let response = req.bearer_auth(&self.token).send().await?;
        let status = response.status();
        debug!(path, status = status.as_u16(), "api response");
        match status {
            s if s.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => {
                warn!(path, "access token rejected, check the configured token");
                Err(ApiError::Unauthorized)
            }
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(path.to_owned())),
            s => Err(ApiError::Status {
                status: s.as_u16(),
                path: path.to_owned(),
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.http.get(self.url(path)), path).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Malformed(format!("{path}: {e}")))
    }
}

#[async_trait]
impl SparkApi for WebexClient {
    async fn me(&self) -> Result<Person, ApiError> {
        let person: Person = self.get_json("/people/me").await?;
        if person.emails.is_empty() {
            return Err(ApiError::Malformed("/people/me: no email".to_owned()));
        }
        Ok(person)
    }

    async fn message(&self, id: &str) -> Result<Message, ApiError> {
        if id.is_empty() {
            return Err(ApiError::Malformed("empty message id".to_owned()));
        }
        let path = format!("/messages/{id}");
        let message: Message = self.get_json(&path).await.inspect_err(|e| {
            if matches!(e, ApiError::NotFound(_)) {
                debug!(
                    message_id = id,
                    "message not readable: deleted already, or webhook created with another token"
                );
            }
        })?;
        if !message.has_content() {
            return Err(ApiError::Malformed(format!("{path}: neither text nor files")));
        }
        Ok(message)
    }

    async fn attachment_actions(&self, id: &str) -> Result<AttachmentActions, ApiError> {
        if id.is_empty() {
            return Err(ApiError::Malformed("empty attachment action id".to_owned()));
        }
        let path = format!("/attachment/actions/{id}");
        let actions: AttachmentActions = self.get_json(&path).await?;
        if actions.inputs.is_empty() {
            return Err(ApiError::Malformed(format!("{path}: no inputs")));
        }
        Ok(actions)
    }

    async fn list_webhooks(&self) -> Result<Vec<WebhookRegistration>, ApiError> {
        let page: Items<WebhookRegistration> = self.get_json("/webhooks").await?;
        page.items
            .ok_or_else(|| ApiError::Malformed("/webhooks: no items".to_owned()))
    }

    async fn create_webhook(&self, spec: &WebhookSpec) -> Result<WebhookRegistration, ApiError> {
        let path = "/webhooks";
        let response = self
            .send(self.http.post(self.url(path)).json(spec), path)
            .await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Malformed(format!("{path}: {e}")))
    }

    async fn delete_webhook(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/webhooks/{id}");
        self.send(self.http.delete(self.url(&path)), &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = WebexClient::new("https://webexapis.com/v1/", "token");
        assert_eq!(client.url("/people/me"), "https://webexapis.com/v1/people/me");
    }

    #[test]
    fn debug_hides_token() {
        let client = WebexClient::new("https://webexapis.com/v1", "tok-abc123");
        let printed = format!("{client:?}");
        assert!(!printed.contains("tok-abc123"));
        assert!(printed.contains("webexapis.com"));
    }

    #[tokio::test]
    async fn empty_ids_are_rejected_locally() {
        let client = WebexClient::new("http://127.0.0.1:9", "token");
        assert!(matches!(client.message("").await, Err(ApiError::Malformed(_))));
        assert!(matches!(
            client.attachment_actions("").await,
            Err(ApiError::Malformed(_))
        ));
    }
}
