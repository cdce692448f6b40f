//! Command-line interface implementation

use clap::Parser;
use std::error::Error;
use std::io::{self, Write};

use crate::config::Settings;

/// Command-line arguments for r-jellyshim
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Cast target that relays Jellyfin remote control to mpv", long_about = None)]
pub struct Args {
    /// Jellyfin server URL
    #[arg(short, long, env = "JELLYFIN_URL")]
    pub server_url: Option<String>,

    /// Jellyfin API key
    #[arg(short, long, env = "JELLYFIN_API_KEY")]
    pub api_key: Option<String>,

    /// Username for Jellyfin login
    #[arg(short, long, env = "JELLYFIN_USERNAME")]
    pub username: Option<String>,

    /// Password for Jellyfin login
    #[arg(short, long, env = "JELLYFIN_PASSWORD")]
    pub password: Option<String>,

    /// Config file path
    #[arg(short, long, env = "JELLYSHIM_CONFIG")]
    pub config: Option<String>,

    /// Name shown in the Jellyfin cast menu
    #[arg(short = 'n', long, env = "JELLYSHIM_DEVICE_NAME")]
    pub device_name: Option<String>,

    /// Path to the mpv binary
    #[arg(short, long, env = "JELLYSHIM_MPV_PATH")]
    pub mpv_path: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Applies command-line values on top of the loaded settings.
    /// Returns true when anything that belongs in the config file changed.
    pub fn apply_to(&self, settings: &mut Settings) -> bool {
        let before = settings.clone();
        if let Some(server_url) = &self.server_url {
            settings.server_url = server_url.clone();
        }
        if let Some(api_key) = &self.api_key {
            settings.api_key = Some(api_key.clone());
        }
        if let Some(username) = &self.username {
            settings.username = Some(username.clone());
        }
        if let Some(device_name) = &self.device_name {
            settings.device_name = device_name.clone();
        }
        if let Some(mpv_path) = &self.mpv_path {
            settings.mpv_path = mpv_path.clone();
        }
        *settings != before
    }
}

/// CLI user interface for interacting with the application
pub struct Cli {
    pub args: Args,
}

impl Cli {
    /// Create a new CLI instance
    pub fn new() -> Self {
        Cli { args: Args::parse() }
    }

    /// Password from the command line, or prompted for on stdin
    pub fn get_password(&self, username: &str) -> Result<String, Box<dyn Error>> {
        if let Some(password) = &self.args.password {
            return Ok(password.clone());
        }

        print!("Enter Jellyfin password for {}: ", username);
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    /// Display error messages
    pub fn display_error(&self, error: &dyn Error) {
        eprintln!("Error: {}", error);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
