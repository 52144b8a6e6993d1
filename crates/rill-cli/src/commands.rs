use std::path::Path;

use anyhow::Context as _;
use colored::Colorize;
use rill_server::{RillServer, ServerConfig};
use rill_store::{Queue, Table, TableRecord};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Table(args) => cmd_table(args, format),
        Command::Log(args) => cmd_log(args, format),
        Command::Sync(args) => cmd_sync(args, format),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = args.data_dir {
        config.pipeline.data_dir = dir;
    }
    tracing::debug!(?config, "resolved server configuration");

    println!(
        "{} Rill server on {} (data: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        config.pipeline.data_dir.display()
    );
    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(RillServer::new(config).serve())?;
    Ok(())
}

fn cmd_table(args: TableArgs, format: OutputFormat) -> anyhow::Result<()> {
    let table = open_table(&args.file);
    let records: Vec<TableRecord> = table
        .records()?
        .into_iter()
        .filter(|r| args.id.as_ref().map_or(true, |id| &r.id == id))
        .filter(|r| !(args.live && r.deleted))
        .collect();
    print!("{}", render_records(&records, format)?);
    Ok(())
}

fn cmd_log(args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let queue = Queue::new(file_stem(&args.file), &args.file);
    let mut entries = queue.entries()?;
    if let Some(limit) = args.limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }

    match format {
        OutputFormat::Json => {
            for entry in &entries {
                println!("{}", serde_json::to_string(entry)?);
            }
        }
        OutputFormat::Text => {
            for entry in &entries {
                let ctx = &entry.context;
                println!(
                    "{} {:<8} {:<20} {} {}",
                    ctx.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
                    status_label(ctx.status.is_deleted()),
                    ctx.source.as_str().cyan(),
                    ctx.id.yellow(),
                    entry.data
                );
            }
            println!("{} entries", entries.len().to_string().bold());
        }
    }
    Ok(())
}

fn cmd_sync(args: SyncArgs, format: OutputFormat) -> anyhow::Result<()> {
    let table = open_table(&args.file);
    let expired = table.sync(&args.prefix, args.cutoff)?;
    match format {
        OutputFormat::Json => print!("{}", render_records(&expired, format)?),
        OutputFormat::Text => {
            for record in &expired {
                println!("  {} {}", "expired:".red(), record.id.yellow());
            }
            println!(
                "{} {} record(s) under {:?} expired at {}",
                "✓".green().bold(),
                expired.len(),
                args.prefix,
                args.cutoff.to_rfc3339()
            );
        }
    }
    Ok(())
}

fn open_table(file: &Path) -> Table {
    Table::new(file_stem(file), file)
}

fn file_stem(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn status_label(deleted: bool) -> colored::ColoredString {
    if deleted {
        "deleted".red()
    } else {
        "active".green()
    }
}

fn render_records(records: &[TableRecord], format: OutputFormat) -> anyhow::Result<String> {
    let mut out = String::new();
    match format {
        OutputFormat::Json => {
            out.push_str(&serde_json::to_string_pretty(records)?);
            out.push('\n');
        }
        OutputFormat::Text => {
            for r in records {
                out.push_str(&format!(
                    "{:<20} {:<8} {} {}\n",
                    r.id.yellow(),
                    status_label(r.deleted),
                    r.timestamp.to_rfc3339().dimmed(),
                    r.data
                ));
            }
            out.push_str(&format!("{} records\n", records.len().to_string().bold()));
        }
    }
    Ok(out)
}
