//! ddl-sync command line entry point.

use anyhow::{ensure, Context};
use clap::Parser;
use std::path::PathBuf;

use ddl_sync::config::{self, Config};
use ddl_sync::utils::init_logging;
use ddl_sync::DdlSyncClient;

/// Regenerate DDL files for the objects touched by new migration scripts
#[derive(Parser, Debug)]
#[command(name = "ddl-sync", version, about)]
struct Cli {
    /// Owner connection string: <user>/<password>@<host>:<port>/<service>
    #[arg(long, value_name = "CONNECTION")]
    owner_schema: Option<String>,

    /// Directory holding the migration scripts
    #[arg(long, value_name = "DIR")]
    scripts_dir: Option<PathBuf>,

    /// Only scripts sorting after this file name are scanned
    #[arg(long, value_name = "SCRIPT")]
    since: Option<String>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable colored log output
    #[arg(short = 'n', long)]
    no_color: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Generate DDL for the new scripts; this is the only mode
    #[arg(short = 'd', long)]
    gen_ddl: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(Config, bool)> {
        let mut config = match &self.config {
            Some(path) => config::load_from_file(path)
                .with_context(|| format!("Can't load configuration [{}]", path.display()))?,
            None => Config::default(),
        };

        if let Some(connection) = self.owner_schema {
            config.database.connection = Some(connection);
            config.database.url = None;
        }
        if let Some(dir) = self.scripts_dir {
            config.scripts.directory = Some(dir);
        }
        if self.since.is_some() {
            config.scripts.since = self.since;
        }
        if self.no_color {
            config.logging.color = false;
        }

        Ok((config, self.json))
    }
}

fn validate_locations(config: &Config) -> anyhow::Result<()> {
    let scripts_dir = config
        .scripts
        .directory
        .as_ref()
        .context("Scripts directory is required: pass --scripts-dir or set scripts.directory")?;
    ensure!(
        scripts_dir.is_dir(),
        "Path [{}] doesn't exist or isn't a directory",
        scripts_dir.display()
    );

    let ddl_dir = config.ddl_directory()?;
    ensure!(
        ddl_dir.is_dir(),
        "DDL directory [{}] doesn't exist or isn't a directory",
        ddl_dir.display()
    );

    ensure!(
        config.database.connection.is_some() || config.database.url.is_some(),
        "Owner connection is required: pass --owner-schema or set database.connection"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let gen_ddl = cli.gen_ddl;
    let (config, json) = cli.into_config()?;

    init_logging(&config.logging).context("Can't initialize logging")?;
    tracing::debug!(explicit = gen_ddl, "Running in DDL generation mode");
    validate_locations(&config)?;

    let client = DdlSyncClient::new(config)
        .await
        .context("Can't connect to the owner schema")?;
    let report = client.sync().await;
    client.close().await;
    let report = report.context("DDL generation failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_empty() {
        tracing::info!(scripts = report.scripts.len(), "DDL tree is up to date");
    } else {
        tracing::info!(
            written = report.written.len(),
            deleted = report.deleted.len(),
            skipped = report.skipped.len(),
            orphans = report.orphans.len(),
            "DDL generation finished"
        );
    }

    Ok(())
}
