use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::config;
use crate::credentials::{self, Credential, Store};
use crate::data::{self, DemoBackend, Services};
use crate::dispatch::{Connector, CredentialSource, Dispatcher};
use crate::session::Session;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Serve everything from an in-memory backend; nothing touches the
    /// network or the credential file.
    pub demo: bool,
    pub config_file: Option<PathBuf>,
    pub credentials_path: Option<PathBuf>,
}

pub fn run(options: Options) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    if let Some(log_file) = cfg.log.file.as_deref() {
        if let Err(err) = crate::logging::init(log_file, &cfg.log.level) {
            eprintln!("Warning: logging disabled: {err}");
        }
    }
    tracing::info!(version = crate::VERSION, demo = options.demo, "starting");

    let (tx, rx) = crossbeam_channel::unbounded();
    let dispatcher = if options.demo {
        demo_dispatcher(tx)
    } else {
        let store = match options.credentials_path {
            Some(path) => Store::new(path),
            None => Store::at_default_path().context("locate home directory for credentials")?,
        };
        tracing::debug!(path = %store.path().display(), "credential store");

        let client = api::Client::new(cfg.client_config(None)).context("build api client")?;
        let services = Services::from_client(Arc::new(client));
        let connect_cfg = cfg.clone();
        let connector: Arc<dyn Connector> = Arc::new(move |api_key: &str| -> Result<Services> {
            let client = api::Client::new(connect_cfg.client_config(Some(api_key.to_string())))?;
            Ok(Services::from_client(Arc::new(client)))
        });
        Dispatcher::new(tx, services, connector, CredentialSource::File(store))
    };

    let session = Session::new(cfg.session_settings());
    dispatcher.dispatch_all(session.init());
    ui::run(session, &dispatcher, &rx, cfg.ui.tick_rate)
}

fn demo_dispatcher(tx: crossbeam_channel::Sender<crate::event::Event>) -> Dispatcher {
    let backend = Arc::new(DemoBackend::default());
    let services = Services::from_demo(backend.clone());
    let connector: Arc<dyn Connector> =
        Arc::new(move |_: &str| -> Result<Services> { Ok(Services::from_demo(backend.clone())) });
    let credential = Credential {
        api_key: "moltbook_demo".into(),
        agent_name: data::DEMO_AGENT.into(),
    };
    Dispatcher::new(tx, services, connector, CredentialSource::Fixed(credential))
}

/// Where credentials are read from unless `--credentials-path` is given.
pub fn credentials_display_path() -> String {
    credentials::default_path()
        .map(|path| friendly_path(&path))
        .unwrap_or_else(|| "~/.config/moltbook/credentials.json".to_string())
}

fn friendly_path(path: &std::path::Path) -> String {
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
