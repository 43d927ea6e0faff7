//! Command-line and environment configuration.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Send one request to the WinterCleanup entity endpoints
#[derive(Debug, Parser)]
#[command(name = "wintercleanup")]
#[command(about = "Run one entity request against a WinterCleanup database", long_about = None)]
#[command(version)]
pub struct Cli {
    /// HTTP method: GET, POST or DELETE
    pub method: String,

    /// Request target, e.g. `/entities/task/1` or `/entities/task?limit=10`
    pub target: String,

    /// JSON request body
    #[arg(long)]
    pub body: Option<String>,

    /// SQLite database file
    #[arg(long, env = "WINTERCLEANUP_DATABASE", default_value = "wintercleanup.sqlite3")]
    pub database: PathBuf,

    /// Use a throwaway in-memory database; overrides `--database`
    #[arg(long)]
    pub in_memory: bool,

    /// Log level (trace|debug|info|warn|error); defaults per build mode
    #[arg(long, env = "WINTERCLEANUP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute log directory; logging stays off when unset
    #[arg(long, env = "WINTERCLEANUP_LOG_DIR")]
    pub log_dir: Option<String>,
}

impl Cli {
    /// Database file to open, or `None` for an in-memory database.
    pub fn database_file(&self) -> Option<&Path> {
        (!self.in_memory).then_some(self.database.as_path())
    }

    /// Parsed JSON body, if one was given.
    pub fn parsed_body(&self) -> anyhow::Result<Option<serde_json::Value>> {
        match self.body.as_deref() {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_json::from_str(raw).map_err(|err| {
                anyhow::anyhow!("request body is not valid JSON: {err}")
            })?)),
        }
    }
}
