use core::{fmt, future::Future};
use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::trigger::{Event, EventKey, Resource, Trigger};

/// Wildcard accepted in place of a resource or an event name.
pub const ALL: &str = "all";

#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, trigger: &Trigger) -> Result<()>;
}

/// Adapts an async closure into an [`EventListener`].
pub struct FnListener<F>(F);

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnListener")
    }
}

#[async_trait]
impl<F, Fut> EventListener for FnListener<F>
where
    F: Fn(Trigger) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn on_event(&self, trigger: &Trigger) -> Result<()> {
        (self.0)(trigger.clone()).await
    }
}

pub fn listener_fn<F, Fut>(f: F) -> Arc<dyn EventListener>
where
    F: Fn(Trigger) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnListener(f))
}

/// One listener per `resource/event` pair; registering again replaces it.
#[derive(Default, Clone)]
pub struct EventRouter {
    listeners: HashMap<EventKey, Arc<dyn EventListener>>,
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("listeners", &self.keys())
            .finish()
    }
}

impl EventRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for a resource/event pair, either of which may be
    /// `all`. Returns how many pairs it now listens to; an unknown name or an
    /// illegal pair registers nothing.
    pub fn on(&mut self, resource: &str, event: &str, listener: Arc<dyn EventListener>) -> usize {
        let keys = expand(resource, event);
        if keys.is_empty() {
            warn!(
                resource,
                event, "listener not registered: resource/event is not emitted by the platform"
            );
            return 0;
        }
        for key in &keys {
            self.insert(*key, Arc::clone(&listener));
        }
        keys.len()
    }

    pub fn insert(&mut self, key: EventKey, listener: Arc<dyn EventListener>) {
        if !key.is_legal() {
            warn!(%key, "listener not registered: resource/event is not emitted by the platform");
            return;
        }
        if self.listeners.insert(key, listener).is_some() {
            debug!(%key, "replaced listener");
        } else {
            debug!(%key, "registered listener");
        }
    }

    /// Registered pairs as `resource/event` strings, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.listeners.keys().map(ToString::to_string).collect();
        keys.sort();
        keys
    }

    /// Hands `trigger` to its listener. Returns whether one was registered.
    pub async fn fire(&self, trigger: &Trigger) -> bool {
        let key = trigger.key();
        let Some(listener) = self.listeners.get(&key) else {
            debug!(%key, "no listener for resource/event");
            return false;
        };
        debug!(%key, data_id = ?trigger.data_id(), "calling listener");
        if let Err(e) = listener.on_event(trigger).await {
            warn!(%key, trigger_id = %trigger.id, error = %e, "listener failed");
        }
        true
    }
}

fn expand(resource: &str, event: &str) -> Vec<EventKey> {
    let resources: Vec<Resource> = if resource == ALL {
        Resource::ALL.to_vec()
    } else {
        match resource.parse() {
            Ok(r) => vec![r],
            Err(_) => return Vec::new(),
        }
    };
    let only: Option<Event> = if event == ALL {
        None
    } else {
        match event.parse() {
            Ok(e) => Some(e),
            Err(_) => return Vec::new(),
        }
    };
    resources
        .into_iter()
        .flat_map(|r| {
            r.events()
                .iter()
                .copied()
                .filter(move |e| only.is_none_or(|o| o == *e))
                .map(move |e| EventKey::new(r, e))
        })
        .collect()
}
