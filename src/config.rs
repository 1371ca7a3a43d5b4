use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// AgroMart realtime backend
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "agromart-server", version, about = "AgroMart marketplace realtime backend")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "AGROMART_PORT", default_value = "5000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "AGROMART_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./agromart.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "AGROMART_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (SQLite database)
    #[arg(long, env = "AGROMART_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Outbound SMTP configuration (loaded from [smtp] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

/// Configuration for the outbound mail client used as the offline
/// notification fallback. Disabled by default; when disabled, offline
/// recipients simply see their notifications on next fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Whether outbound email is enabled (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// SMTP relay hostname
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// SMTP relay port (default: 587, STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// SMTP username (empty = no authentication)
    #[serde(default)]
    pub username: String,

    /// SMTP password
    #[serde(default)]
    pub password: String,

    /// From address for notification emails
    #[serde(default = "default_smtp_from")]
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from: default_smtp_from(),
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "no-reply@agromart.local".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_address: "0.0.0.0".to_string(),
            config: "./agromart.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            smtp: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence: defaults < TOML file < env < CLI.
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("AGROMART_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Commented TOML template printed by --generate-config.
pub fn generate_config_template() -> String {
    r#"# AgroMart server configuration

# Port to listen on
port = 5000

# Bind address
bind_address = "0.0.0.0"

# Data directory for the SQLite database
data_dir = "./data"

# Structured JSON logging
json_logs = false

# Outbound email fallback for offline notification recipients.
# Disabled by default; notifications are always persisted regardless.
[smtp]
enabled = false
host = "localhost"
port = 587
username = ""
password = ""
from = "no-reply@agromart.local"
"#
    .to_string()
}
