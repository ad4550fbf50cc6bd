use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mongolink::config::Settings;
use mongolink::metrics::MetricsSnapshot;
use mongolink::{ConfigStore, Host, MongoConnector};

/// One line of the JSON summary printed per prefix.
#[derive(Serialize)]
struct Binding {
    prefix: String,
    uri: Option<String>,
    host: String,
    port: u16,
    database: String,
    document_class: String,
    pinged: Option<bool>,
}

#[derive(Serialize)]
struct Summary {
    bindings: Vec<Binding>,
    metrics: MetricsSnapshot,
}

#[tokio::main]
async fn main() {
    let settings = Settings::load();

    // Set up tracing with the configured log level
    let filter =
        EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(settings).await {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Config file (optional), 2. environment on top
    let path = Path::new(&settings.config_path);
    let mut store = if path.exists() {
        info!(path = %settings.config_path, "loading config file");
        ConfigStore::load_file(path)?
    } else {
        ConfigStore::new()
    };
    store.apply_env(&settings.prefixes);

    let connector = MongoConnector::new(settings.app_name.clone());
    let mut host = Host::new(settings.app_name.as_deref(), store, connector);

    let mut bindings = Vec::with_capacity(settings.prefixes.len());
    for prefix in &settings.prefixes {
        let mongo = host.bind(prefix).await?;

        let pinged = if settings.ping {
            match mongo.database().ping().await {
                Ok(()) => Some(true),
                Err(e) => {
                    warn!(prefix = %prefix, error = %e, "ping failed");
                    Some(false)
                }
            }
        } else {
            None
        };

        let spec = mongo.spec();
        bindings.push(Binding {
            prefix: spec.prefix().to_string(),
            uri: spec.redacted_uri(),
            host: spec.host().to_string(),
            port: spec.port(),
            database: spec.database().to_string(),
            document_class: spec.document_class().to_string(),
            pinged,
        });
    }

    let summary = Summary {
        bindings,
        metrics: host.metrics().snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    host.close_all().await;

    if summary.bindings.iter().any(|b| b.pinged == Some(false)) {
        error!("one or more connections failed to respond");
        return Err("ping failed".into());
    }
    Ok(())
}
