use std::time::Duration;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use humantime_serde::re::humantime;

use super::Runtime;
use crate::cli::SweepArgs;
use crate::config::AppConfig;
use crate::output::{print_cleanup, print_json, print_stats, print_success};

pub async fn migrate(runtime: &Runtime) -> Result<()> {
    let Some(storage) = &runtime.storage else {
        bail!("migrations only apply to the postgres backend");
    };
    storage.migrate().await.context("migration failed")?;
    print_success("Migrations applied");
    Ok(())
}

pub async fn cleanup(runtime: &Runtime, json: bool) -> Result<()> {
    let report = runtime.service.cleanup().await?;
    if json {
        print_json(&report)
    } else {
        print_cleanup(&report);
        Ok(())
    }
}

pub fn parse_interval(raw: &str) -> Result<Duration> {
    let every = humantime::parse_duration(raw)
        .with_context(|| format!("invalid interval: {raw}"))?;
    if every.is_zero() {
        bail!("interval must be greater than zero");
    }
    Ok(every)
}

pub async fn sweep(runtime: &Runtime, args: &SweepArgs) -> Result<()> {
    let (every, shutdown) = match args.interval.as_deref() {
        Some(raw) => {
            let every = parse_interval(raw)?;
            (every, runtime.service.start_sweeper_every(every))
        }
        None => (
            runtime.service.config().cleanup_interval,
            runtime.service.start_sweeper(),
        ),
    };

    println!(
        "{} every {} (Ctrl-C to stop)",
        "Sweeping".cyan(),
        humantime::format_duration(every)
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    let _ = shutdown.send(true);
    print_success("Sweeper stopped");
    Ok(())
}

pub async fn stats(runtime: &Runtime, json: bool) -> Result<()> {
    let stats = runtime.service.stats().await?;
    if json {
        print_json(&stats)
    } else {
        print_stats(&stats);
        Ok(())
    }
}

pub fn show_config(config: &AppConfig, json: bool) -> Result<()> {
    let mut shown = config.clone();
    if shown.storage.postgres.url.is_some() {
        shown.storage.postgres.url = Some("<redacted>".to_string());
    }
    if json {
        return print_json(&shown);
    }
    let rendered = toml::to_string_pretty(&shown).context("failed to render config")?;
    print!("{rendered}");
    Ok(())
}
