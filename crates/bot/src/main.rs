mod logging;
mod wiring;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, Result};
use clap::Parser;
use serde::Deserialize;
use sparkbot_core::{
    DEFAULT_API_BASE_URL, SparkApi, WebexClient, Webhook, WebhookConfig, WebhookRegistrar,
    WebhookSpec,
};
use tracing::{info, warn};

use crate::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(
    name = "sparkbot",
    version,
    about = "Webhook endpoint for Webex bots"
)]
struct Args {
    /// Local port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Path the platform POSTs events to
    #[arg(long, env = "WEBHOOK_PATH", default_value = "/")]
    path: String,

    /// Bot access token. Without one, commands are not interpreted.
    #[arg(long, env = "ACCESS_TOKEN")]
    token: Option<String>,

    /// Secret the platform signs payloads with
    #[arg(long, env = "WEBHOOK_SECRET")]
    secret: Option<String>,

    /// Keep processing events whose signature does not match
    #[arg(long, env = "SOFT_SECRET_CHECK")]
    soft_secret_check: bool,

    /// Prefix messages must start with to be read as commands
    #[arg(long, env = "COMMAND_PREFIX", default_value = "/")]
    prefix: String,

    /// Keep bot mentions in group room messages
    #[arg(long)]
    no_trim_mention: bool,

    /// Also interpret messages posted by the bot itself
    #[arg(long)]
    read_self: bool,

    /// Platform API base URL
    #[arg(long, env = "WEBEX_API", default_value = DEFAULT_API_BASE_URL)]
    api: String,

    /// Public URL of this endpoint; registers a catch-all webhook when set
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,

    /// Name of the catch-all webhook
    #[arg(long, env = "WEBHOOK_NAME", default_value = "sparkbot")]
    webhook_name: String,

    /// YAML file listing extra webhooks to register
    #[arg(long, env = "SPARKBOT_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,
}

impl Args {
    fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            port: self.port,
            path: self.path.clone(),
            token: self.token.clone(),
            secret: self.secret.clone(),
            soft_secret_check: self.soft_secret_check,
            command_prefix: self.prefix.clone(),
            trim_mention: !self.no_trim_mention,
            ignore_self: !self.read_self,
            api_base_url: self.api.clone(),
        }
    }

    /// Webhooks to reconcile at startup: the catch-all one, then the
    /// configured ones.
    fn desired_webhooks(&self, config: &BotConfig) -> Vec<WebhookSpec> {
        let catch_all = self.public_url.as_ref().map(|url| WebhookSpec {
            name: self.webhook_name.clone(),
            target_url: url.clone(),
            resource: "all".to_owned(),
            event: "all".to_owned(),
            filter: None,
            secret: self.secret.clone().filter(|s| !s.is_empty()),
        });
        catch_all
            .into_iter()
            .chain(config.webhooks.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct BotConfig {
    #[serde(default)]
    webhooks: Vec<WebhookSpec>,
}

fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        info!(path = %path.display(), "no config file, using defaults");
        return Ok(BotConfig::default());
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    // An empty file parses as YAML null.
    if yaml.trim().is_empty() {
        return Ok(BotConfig::default());
    }
    serde_yaml::from_str(&yaml).context("parsing YAML config")
}

async fn register_webhooks(api: Arc<dyn SparkApi>, specs: Vec<WebhookSpec>) {
    let registrar = WebhookRegistrar::new(api);
    for spec in specs {
        match registrar.reconcile(&spec).await {
            Ok(registration) => {
                info!(name = %registration.name, id = %registration.id, target = %registration.target_url, "webhook ready");
            }
            Err(e) => warn!(name = %spec.name, error = %e, "could not register webhook"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    init_tracing()?;
    let args = Args::parse();

    let config = load_config(&args.config)?;

    let mut webhook = Webhook::new(args.webhook_config());
    wiring::wire(&mut webhook).await;
    info!(listeners = ?webhook.events().keys(), "webhook wired");

    let specs = args.desired_webhooks(&config);
    if let Some(token) = webhook.config().token() {
        if !specs.is_empty() {
            let api: Arc<dyn SparkApi> =
                Arc::new(WebexClient::new(&webhook.config().api_base_url, token));
            tokio::spawn(register_webhooks(api, specs));
        }
    } else if !specs.is_empty() {
        warn!("no access token: webhooks will not be registered");
    }

    webhook.serve().await
}
