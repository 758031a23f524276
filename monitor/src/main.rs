//! artmon - Entry Point
//!
//! Monitors an Artifactory deploy-request repository and rolls new
//! application versions out to a cluster.

use std::collections::HashMap;
use std::env;

use artmon::app::options::AppOptions;
use artmon::app::run::run;
use artmon::filesys::file::File;
use artmon::logs::{init_logging, LogOptions};
use artmon::storage::settings::{Settings, DEFAULT_SETTINGS_PATH};
use artmon::utils::version_info;

use tracing::{error, info};

const USAGE: &str = "\
Usage: artmon [options...]

Every settings key can be given as --key=value and overrides the settings file.

Server options:
    --config=PATH                     Settings file (default: /etc/artmon/settings.json)
    --name=NAME                       NAME of the server, sent in the Server header
    --hostname=HOSTNAME               HOSTNAME to listen on (default: localhost)
    --port=PORT                       PORT to listen on (default: 8080)
    --domain=DOMAIN                   DOMAIN of the cluster being managed
    --environment=ENVIRONMENT         ENVIRONMENT (development, qa, staging, production)
    --deploy_url=URL                  URL of the cluster deploy service
    --deploy_token=TOKEN              Bearer TOKEN for the deploy service
    --art_api_endpoint=URL            Artifactory API endpoint
    --art_raw_endpoint=URL            Artifactory raw content endpoint (default: API endpoint without /api)
    --art_user_id=USER                Artifactory USER
    --art_password=PASSWORD           Artifactory PASSWORD
    --art_polling_interval_secs=SECS  Seconds between repository checks (default: 300)
    --art_deploy_repo=REPO            REPO holding the deploy request files
    --art_payload_repo=REPO           REPO holding the .tar.gz payloads
    --dsn=DSN                         Ledger database, ex: sqlite:///var/lib/artmon/ledger.db
    --tmp_dir=DIR                     Staging directory (default: /tmp/artmon)
    --log_dir=DIR                     Write daily rolling log files to DIR
    --debug                           Enable debugging output

Common options:
    --help                            Show this message
    --version                         Show version
";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    if cli_args.contains_key("help") {
        println!("{}", USAGE);
        return;
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    // Retrieve the settings file
    let settings_path = cli_args
        .get("config")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let settings = match Settings::load(&File::new(&settings_path), &cli_args).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if let Err(e) = settings.validate() {
        eprintln!("{}\n\n{}", e, USAGE);
        std::process::exit(2);
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.effective_log_level(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    info!("Running artmon {} ({})", version.version, version.git_hash);
    let options = AppOptions::from(settings);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the monitor: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, shutting down...");
                    }
                    _ = sigint.recv() => {
                        info!("SIGINT received, shutting down...");
                    }
                }
            }
            _ => {
                error!("Unable to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
