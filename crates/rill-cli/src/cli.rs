use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rill", about = "Rill: file-backed event notification pipeline", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP ingress server and the pipeline behind it
    Serve(ServeArgs),
    /// List the records of a table file
    Table(TableArgs),
    /// List the entries of a queue log
    Log(LogArgs),
    /// Expire live records under a prefix that are older than a cutoff
    Sync(SyncArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Override the configured data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct TableArgs {
    pub file: PathBuf,
    /// Show only this record
    #[arg(long)]
    pub id: Option<String>,
    /// Hide tombstones
    #[arg(long)]
    pub live: bool,
}

#[derive(Args)]
pub struct LogArgs {
    pub file: PathBuf,
    /// Show only the last N entries
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct SyncArgs {
    pub file: PathBuf,
    pub prefix: String,
    /// RFC 3339 timestamp, e.g. 2024-05-01T12:00:00Z
    pub cutoff: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::try_parse_from(["rill", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(args.config.is_none());
            assert!(args.bind.is_none());
        } else {
            panic!("wrong command");
        }
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "rill", "serve", "-c", "rill.toml", "--bind", "0.0.0.0:9000", "--data-dir", "/tmp/rill",
        ])
        .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("rill.toml")));
            assert_eq!(args.bind.unwrap().port(), 9000);
            assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/rill")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_serve_bad_bind() {
        assert!(Cli::try_parse_from(["rill", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn parse_table_json() {
        let cli =
            Cli::try_parse_from(["rill", "table", "data/raw/movie.json", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Table(_)));
    }

    #[test]
    fn parse_log_limit() {
        let cli = Cli::try_parse_from(["rill", "log", "data/raw.log", "-n", "5"]).unwrap();
        if let Command::Log(args) = cli.command {
            assert_eq!(args.limit, Some(5));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_sync() {
        let cli = Cli::try_parse_from([
            "rill",
            "sync",
            "data/raw/episodes.json",
            "s1_",
            "2024-05-01T12:00:00Z",
        ])
        .unwrap();
        if let Command::Sync(args) = cli.command {
            assert_eq!(args.prefix, "s1_");
            assert_eq!(args.cutoff.to_rfc3339(), "2024-05-01T12:00:00+00:00");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_sync_bad_cutoff() {
        assert!(Cli::try_parse_from(["rill", "sync", "t.json", "s1_", "yesterday"]).is_err());
    }
}
