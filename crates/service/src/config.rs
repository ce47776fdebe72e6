use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

/// 5 MiB
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    /// address for the HTTP server to listen on.
    ///  defaults to 0.0.0.0:8080
    pub listen_addr: SocketAddr,

    // data store configuration
    /// directory holding one sub-directory per feed
    ///  plus the server-wide `config.toml`. Created
    ///  on start-up if missing
    pub data_dir: PathBuf,
    /// largest item accepted by an upload, in bytes
    pub max_upload_size: u64,

    // misc
    pub log_level: tracing::Level,
    /// when set, logs are also written to a daily
    ///  rolling file in this directory
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8080),
            data_dir: PathBuf::from("./data"),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}
