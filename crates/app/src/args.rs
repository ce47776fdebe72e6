use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};

use service::config::DEFAULT_MAX_UPLOAD_SIZE;
use service::ServiceConfig;

#[derive(Parser, Debug)]
#[command(name = "ybfeed")]
#[command(about = "Share pasted text, images and files between devices")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: Serve,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print build information and exit
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct Serve {
    /// TCP port to listen on
    #[arg(short, long, env = "YBF_HTTP_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "YBF_LISTEN_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub listen: IpAddr,

    /// Directory holding the feeds and server settings
    #[arg(short, long, env = "YBF_DATA_DIR", default_value = "./data")]
    pub dir: PathBuf,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "YBF_MAX_UPLOAD_SIZE", default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    pub max_upload_size: u64,

    /// Log at debug level
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, env = "YBF_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Serve {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            listen_addr: SocketAddr::new(self.listen, self.port),
            data_dir: self.dir.clone(),
            max_upload_size: self.max_upload_size,
            log_level: if self.debug {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            },
            log_dir: self.log_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["ybfeed"]).unwrap();
        assert!(args.command.is_none());

        let config = args.serve.service_config();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.max_upload_size, DEFAULT_MAX_UPLOAD_SIZE);
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "ybfeed",
            "-p",
            "9000",
            "--listen",
            "127.0.0.1",
            "-d",
            "/srv/feeds",
            "--max-upload-size",
            "1024",
            "--debug",
        ])
        .unwrap();

        let config = args.serve.service_config();
        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("/srv/feeds"));
        assert_eq!(config.max_upload_size, 1024);
        assert_eq!(config.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn test_version_subcommand() {
        let args = Args::try_parse_from(["ybfeed", "version"]).unwrap();
        assert!(matches!(args.command, Some(Command::Version)));
    }
}
