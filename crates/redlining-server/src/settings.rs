use clap::Parser;
use redlining_lib::{Config, DEFAULT_CACHE_CAPACITY};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Redlining Map Server - serves historical redlining zones as GeoJSON
pub struct Settings {
    /// GeoJSON feature collection to load on startup
    #[clap(
        long,
        env = "REDLINING_DATASET",
        value_name = "FILE",
        default_value = "data/fullDownload.json"
    )]
    pub dataset: PathBuf,

    /// Address to listen on
    #[clap(long, env = "REDLINING_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[clap(short, long, env = "REDLINING_PORT", default_value_t = 3232)]
    pub port: u16,

    /// Maximum number of cached box queries
    #[clap(long, env = "REDLINING_CACHE_CAPACITY", default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,

    /// JSON file holding user pins (defaults to the per-user config directory)
    #[clap(long, env = "REDLINING_PINS_FILE", value_name = "FILE")]
    pub pins_file: Option<PathBuf>,
}

impl Settings {
    /// Parse settings from the command line and environment, exiting on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// `host:port` as a string suitable for binding
    pub fn bind_address(&self) -> String {
        match self.host.parse::<std::net::IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.port).to_string(),
            Err(_) => format!("{}:{}", self.host, self.port),
        }
    }

    /// Collection configuration derived from these settings
    pub fn collection_config(&self) -> Config {
        Config {
            cache_capacity: self.cache_capacity,
        }
    }
}
