//! `wintercleanup` request driver.
//!
//! # Responsibility
//! - Open the configured database and start logging.
//! - Route one request through the entity registry and print the response.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use http::Method;
use log::info;
use wintercleanup_core::{
    default_log_level, init_logging, open_db, open_db_in_memory, task_registry, EntityResponse,
};

mod config;
mod router;

use config::Cli;
use router::Router;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        init_logging(level, log_dir).map_err(|err| anyhow!("failed to start logging: {err}"))?;
    }

    let method = Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method `{}`", cli.method))?;
    let body = cli.parsed_body()?;

    let conn = match cli.database_file() {
        Some(path) => open_db(path)
            .with_context(|| format!("failed to open database `{}`", path.display()))?,
        None => open_db_in_memory().context("failed to open in-memory database")?,
    };

    let Some(mut resolved) = Router::new()?.resolve(&cli.target)? else {
        print_response(&EntityResponse::not_found())?;
        return Ok(());
    };
    resolved.request.body = body;

    let registry = task_registry(&conn)?;
    let response = registry
        .dispatch(&method, &resolved.entity, &resolved.request)
        .context("request failed")?;
    info!(
        "event=cli_request module=cli status=ok method={} entity={} http_status={}",
        method,
        resolved.entity,
        response.status.as_u16()
    );
    print_response(&response)
}

fn print_response(response: &EntityResponse) -> Result<()> {
    println!(
        "HTTP/1.1 {} {}",
        response.status.as_u16(),
        response.reason_phrase()
    );
    for (name, value) in &response.headers {
        println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    if let Some(body) = &response.body {
        println!();
        println!("{}", serde_json::to_string_pretty(body)?);
    }
    Ok(())
}
