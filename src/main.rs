use r_jellyshim::config::Settings;
use r_jellyshim::init_app_dirs;
use r_jellyshim::jellyfin::JellyfinClient;
use r_jellyshim::session::ShimSession;
use r_jellyshim::ui::{Args, Cli};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MAIN_LOG_TARGET: &str = "r_jellyshim::main";

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::new();
    let args = &cli.args;
    init_tracing(args);

    init_app_dirs()?;

    let config_path = match &args.config {
        Some(path) => PathBuf::from(path),
        None => Settings::default_path(),
    };
    let mut settings = Settings::load(&config_path)?;
    let mut dirty = args.apply_to(&mut settings);
    dirty |= settings.ensure_device_id();
    settings.validate()?;

    let mut jellyfin = JellyfinClient::new(&settings.server_url, settings.device_identity());

    // A password always triggers a fresh login; otherwise the stored token is reused.
    let wants_login = args.password.is_some() || settings.api_key.is_none();
    if wants_login {
        let username = match &settings.username {
            Some(username) => username.clone(),
            None => return Err("Cannot authenticate: no username or API key provided.".into()),
        };
        let password = cli.get_password(&username)?;
        info!(target: MAIN_LOG_TARGET, "Authenticating as {}", username);
        let auth_response = jellyfin.authenticate(&username, &password).await?;

        settings.user_id = Some(auth_response.user.id.clone());
        settings.api_key = Some(auth_response.access_token.clone());
        dirty = true;
        info!(target: MAIN_LOG_TARGET, "Authentication successful");
    } else if let Some(api_key) = &settings.api_key {
        info!(target: MAIN_LOG_TARGET, "Using stored API key");
        jellyfin = jellyfin.with_api_key(api_key);
        match &settings.user_id {
            Some(user_id) => jellyfin = jellyfin.with_user_id(user_id),
            None => warn!(target: MAIN_LOG_TARGET, "No user id stored, item lookups may fail"),
        }
    }

    if dirty {
        settings.save(&config_path)?;
    }

    let session = Arc::new(ShimSession::new(settings.session_config(), Arc::new(jellyfin)));

    let ctrl_c_session = session.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(target: MAIN_LOG_TARGET, "Ctrl-C received, shutting down");
                ctrl_c_session.shutdown();
            }
            Err(e) => error!(target: MAIN_LOG_TARGET, "Failed to listen for Ctrl-C: {}", e),
        }
    });

    info!(target: MAIN_LOG_TARGET, "Waiting for casts as '{}'", settings.device_name);
    if let Err(e) = session.run().await {
        cli.display_error(&e);
        return Err(e.into());
    }
    Ok(())
}
