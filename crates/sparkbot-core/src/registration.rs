//! Keeps a remote webhook registration in line with a desired one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{ApiError, SparkApi};

/// Desired state of a webhook, also the body of `POST /webhooks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSpec {
    pub name: String,
    #[serde(alias = "target_url")]
    pub target_url: String,
    /// A resource name, or `all`.
    pub resource: String,
    /// An event name, or `all`.
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// A webhook as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRegistration {
    pub id: String,
    pub name: String,
    pub target_url: String,
    pub resource: String,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

impl WebhookRegistration {
    /// Field-by-field comparison; an empty filter or secret is no filter or
    /// secret at all.
    #[must_use]
    pub fn matches(&self, spec: &WebhookSpec) -> bool {
        self.name == spec.name
            && self.target_url == spec.target_url
            && self.resource == spec.resource
            && self.event == spec.event
            && same_constraint(self.filter.as_deref(), spec.filter.as_deref())
            && same_constraint(self.secret.as_deref(), spec.secret.as_deref())
    }
}

fn same_constraint(a: Option<&str>, b: Option<&str>) -> bool {
    a.filter(|s| !s.is_empty()) == b.filter(|s| !s.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The outdated webhook was deleted but its replacement could not be
    /// created; reconciling again recreates it.
    #[error("webhook {previous_id} was deleted but could not be recreated: {source}")]
    Recreate {
        previous_id: String,
        #[source]
        source: ApiError,
    },
}

#[derive(Clone)]
pub struct WebhookRegistrar {
    api: Arc<dyn SparkApi>,
}

impl core::fmt::Debug for WebhookRegistrar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebhookRegistrar").finish_non_exhaustive()
    }
}

impl WebhookRegistrar {
    #[must_use]
    pub fn new(api: Arc<dyn SparkApi>) -> Self {
        Self { api }
    }

    /// Creates the webhook named `desired.name`, replaces it when it differs,
    /// or leaves it alone when it already matches.
    ///
    /// Replacement deletes before it creates: the platform offers no atomic
    /// update, so a failed create leaves the name unregistered.
    ///
    /// # Errors
    ///
    /// Returns an error when listing, deleting or creating fails.
    pub async fn reconcile(
        &self,
        desired: &WebhookSpec,
    ) -> Result<WebhookRegistration, RegistrationError> {
        let existing = self.api.list_webhooks().await?;
        let Some(current) = existing.into_iter().find(|w| w.name == desired.name) else {
            let created = self.api.create_webhook(desired).await?;
            info!(name = %created.name, id = %created.id, "webhook created");
            return Ok(created);
        };

        if current.matches(desired) {
            info!(name = %current.name, id = %current.id, "webhook already up to date");
            return Ok(current);
        }

        info!(name = %current.name, id = %current.id, "webhook outdated, replacing");
        self.api.delete_webhook(&current.id).await?;
        match self.api.create_webhook(desired).await {
            Ok(created) => {
                info!(name = %created.name, id = %created.id, previous = %current.id, "webhook replaced");
                Ok(created)
            }
            Err(source) => {
                warn!(name = %desired.name, previous = %current.id, error = %source, "webhook deleted but not recreated");
                Err(RegistrationError::Recreate {
                    previous_id: current.id,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ApiCall, FakeApi};

    fn spec(target_url: &str) -> WebhookSpec {
        WebhookSpec {
            name: "register-bot".to_owned(),
            target_url: target_url.to_owned(),
            resource: "attachmentActions".to_owned(),
            event: "created".to_owned(),
            filter: None,
            secret: Some("not THAT secret".to_owned()),
        }
    }

    fn mutations(api: &FakeApi) -> Vec<ApiCall> {
        api.calls()
            .into_iter()
            .filter(|c| matches!(c, ApiCall::Create(_) | ApiCall::Delete(_)))
            .collect()
    }

    #[tokio::test]
    async fn creates_when_missing() {
        let api = Arc::new(FakeApi::default());
        let registrar = WebhookRegistrar::new(Arc::clone(&api) as Arc<dyn SparkApi>);
        let created = registrar.reconcile(&spec("https://a.example")).await.unwrap();
        assert_eq!(created.target_url, "https://a.example");
        assert_eq!(mutations(&api), vec![ApiCall::Create("register-bot".to_owned())]);
        assert_eq!(api.webhooks().len(), 1);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let api = Arc::new(FakeApi::default());
        let registrar = WebhookRegistrar::new(Arc::clone(&api) as Arc<dyn SparkApi>);
        let first = registrar.reconcile(&spec("https://a.example")).await.unwrap();
        let second = registrar.reconcile(&spec("https://a.example")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(mutations(&api).len(), 1);
        assert_eq!(api.webhooks().len(), 1);
    }

    #[tokio::test]
    async fn replaces_on_target_change() {
        let api = Arc::new(FakeApi::default());
        let registrar = WebhookRegistrar::new(Arc::clone(&api) as Arc<dyn SparkApi>);
        let first = registrar.reconcile(&spec("https://a.example")).await.unwrap();
        api.clear_calls();

        let second = registrar.reconcile(&spec("https://b.example")).await.unwrap();
        assert_eq!(second.target_url, "https://b.example");
        assert_ne!(second.id, first.id);
        assert_eq!(
            mutations(&api),
            vec![
                ApiCall::Delete(first.id),
                ApiCall::Create("register-bot".to_owned())
            ]
        );
        assert_eq!(api.webhooks(), vec![second]);
    }

    #[tokio::test]
    async fn empty_and_absent_constraints_are_equal() {
        let api = Arc::new(FakeApi::default());
        let registrar = WebhookRegistrar::new(Arc::clone(&api) as Arc<dyn SparkApi>);
        let mut desired = spec("https://a.example");
        desired.secret = None;
        registrar.reconcile(&desired).await.unwrap();

        desired.secret = Some(String::new());
        desired.filter = Some(String::new());
        registrar.reconcile(&desired).await.unwrap();
        assert_eq!(mutations(&api).len(), 1);
    }

    #[tokio::test]
    async fn first_same_named_entry_wins() {
        let api = Arc::new(FakeApi::default());
        let registrar = WebhookRegistrar::new(Arc::clone(&api) as Arc<dyn SparkApi>);
        let kept = registrar.reconcile(&spec("https://a.example")).await.unwrap();
        api.push_webhook(WebhookRegistration {
            id: "duplicate".to_owned(),
            target_url: "https://elsewhere.example".to_owned(),
            ..kept.clone()
        });
        api.clear_calls();

        let result = registrar.reconcile(&spec("https://a.example")).await.unwrap();
        assert_eq!(result, kept);
        assert!(mutations(&api).is_empty());
    }

    #[tokio::test]
    async fn failed_recreate_leaves_name_unregistered() {
        let api = Arc::new(FakeApi::default());
        let registrar = WebhookRegistrar::new(Arc::clone(&api) as Arc<dyn SparkApi>);
        let first = registrar.reconcile(&spec("https://a.example")).await.unwrap();

        api.fail_creates(true);
        let err = registrar
            .reconcile(&spec("https://b.example"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, RegistrationError::Recreate { ref previous_id, .. } if *previous_id == first.id)
        );
        assert!(api.webhooks().is_empty());

        api.fail_creates(false);
        let again = registrar.reconcile(&spec("https://b.example")).await.unwrap();
        assert_eq!(api.webhooks(), vec![again]);
    }

    #[tokio::test]
    async fn list_failure_is_surfaced() {
        let api = Arc::new(FakeApi::default());
        api.set_unauthorized(true);
        let registrar = WebhookRegistrar::new(Arc::clone(&api) as Arc<dyn SparkApi>);
        let err = registrar.reconcile(&spec("https://a.example")).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Api(ApiError::Unauthorized)));
    }

    #[test]
    fn spec_body_skips_absent_fields() {
        let body = serde_json::to_value(WebhookSpec {
            secret: None,
            ..spec("https://a.example")
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "name": "register-bot",
                "targetUrl": "https://a.example",
                "resource": "attachmentActions",
                "event": "created"
            })
        );
    }
}
