use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api;
use crate::config;
use crate::data::{self, AuthService, ChannelService, MediaService};
use crate::log;
use crate::session;
use crate::storage;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    pub base_url: Option<String>,
    pub demo: bool,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let mut cfg = config::load(config::LoadOptions {
        config_file: opts.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    if let Some(base_url) = opts.base_url.as_deref() {
        cfg.api.base_url = config::normalize_base_url(base_url);
    }

    log::setup(&cfg.log).context("initialise logging")?;

    let config_path = opts.config_file.clone().or_else(config::default_path);
    let display_path = friendly_path(config_path.as_ref());
    info!(config = %display_path, base_url = %cfg.api.base_url, demo = opts.demo, "starting");

    let store = Arc::new(
        storage::Store::open(storage::Options {
            path: cfg.storage.path.clone(),
        })
        .context("open storage")?,
    );

    let auth: Arc<dyn AuthService>;
    let channels: Arc<dyn ChannelService>;
    let media: Arc<dyn MediaService>;
    let status: String;

    if opts.demo {
        auth = Arc::new(data::MockAuthService);
        channels = Arc::new(data::MockChannelService);
        media = Arc::new(data::MockMediaService);
        status = "Demo mode: any username and password will sign you in.".to_string();
    } else {
        let client = api::Client::new(api::ClientConfig {
            base_url: cfg.api.base_url.clone(),
            user_agent: cfg.api.user_agent.clone(),
            timeout: Some(cfg.api.timeout),
            http_client: None,
        })
        .context("create API client")?;
        let client = Arc::new(client);
        auth = Arc::new(data::ApiAuthService::new(client.clone()));
        channels = Arc::new(data::ApiChannelService::new(
            client.clone(),
            cfg.feed.search_limit,
        ));
        media = Arc::new(data::ApiMediaService::new(client));
        status = format!("Connected to {}", cfg.api.base_url);
    }

    let session_manager = Arc::new(session::Manager::new(store.clone(), auth));
    if let Err(err) = session_manager.hydrate() {
        warn!(error = %format!("{err:#}"), "failed to restore session");
    }

    let settings = vec![
        ("Config file".to_string(), display_path),
        ("API base URL".to_string(), cfg.api.base_url.clone()),
        (
            "Request timeout".to_string(),
            humantime::format_duration(cfg.api.timeout).to_string(),
        ),
        ("Channels per batch".to_string(), cfg.feed.batch_size.to_string()),
        (
            "Batch delay".to_string(),
            humantime::format_duration(cfg.feed.batch_delay).to_string(),
        ),
        (
            "Default time frame".to_string(),
            cfg.browser.default_time_frame.label().to_string(),
        ),
        (
            "Default limit".to_string(),
            cfg.browser.default_limit.to_string(),
        ),
        ("Theme".to_string(), cfg.ui.theme.clone()),
        (
            "Log file".to_string(),
            friendly_path(cfg.log.file.as_ref()),
        ),
        ("Demo mode".to_string(), if opts.demo { "on" } else { "off" }.to_string()),
    ];

    let options = ui::Options {
        session: session_manager,
        channels,
        media,
        feed: cfg.feed.clone(),
        browser: cfg.browser.clone(),
        ui: cfg.ui.clone(),
        status_message: status,
        settings,
    };

    let mut model = ui::Model::new(options);
    let result = model.run();
    drop(model);

    match Arc::try_unwrap(store) {
        Ok(store) => {
            if let Err(err) = store.close() {
                warn!(error = %format!("{err:#}"), "failed to close storage");
            }
        }
        Err(_) => warn!("storage still referenced at shutdown"),
    }
    info!("exiting");

    result
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    let Some(path) = path else {
        return "(none)".to_string();
    };
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            let mut display = String::from("~");
            if !stripped.as_os_str().is_empty() {
                display.push_str(&format!("/{}", stripped.display()));
            }
            return display;
        }
    }
    path.display().to_string()
}
