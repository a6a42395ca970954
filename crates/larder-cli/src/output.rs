use anyhow::Result;
use colored::Colorize;
use larder_auth::{CleanupReport, LedgerStats, RefreshTokenRecord};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn format_time(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub fn print_sessions(records: &[RefreshTokenRecord]) {
    if records.is_empty() {
        println!("No active sessions.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["JTI", "Created", "Expires", "IP", "User-Agent"]);
    for r in records {
        builder.push_record([
            r.jti.clone(),
            format_time(r.created_at),
            format_time(r.expires_at),
            or_dash(r.client_ip.as_deref()).to_string(),
            or_dash(r.user_agent.as_deref()).to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
    println!("Total: {}", records.len());
}

pub fn print_lineage(chain: &[RefreshTokenRecord]) {
    let mut builder = Builder::default();
    builder.push_record(["#", "JTI", "Parent", "Used", "Created", "Expires"]);
    for (depth, r) in chain.iter().enumerate() {
        let used = match r.used_at {
            Some(at) => format_time(at),
            None if r.used => "yes".to_string(),
            None => "no".to_string(),
        };
        builder.push_record([
            depth.to_string(),
            r.jti.clone(),
            or_dash(r.parent_jti.as_deref()).to_string(),
            used,
            format_time(r.created_at),
            format_time(r.expires_at),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));

    if chain.last().is_some_and(|r| !r.is_chain_root()) {
        print_warning("Chain continues: parent already cleaned up or depth limit reached");
    }
}

pub fn print_stats(stats: &LedgerStats) {
    let mut builder = Builder::default();
    builder.push_record(["Metric", "Count"]);
    for (metric, count) in [
        ("Blacklist entries", stats.blacklist_entries),
        ("Tracked refresh tokens", stats.tracked_tokens),
        ("Active refresh tokens", stats.active_tokens),
    ] {
        builder.push_record([metric.to_string(), count.to_string()]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

pub fn print_cleanup(report: &CleanupReport) {
    print_success(&format!(
        "Removed {} blacklist and {} tracking rows",
        report.blacklist_removed.to_string().cyan(),
        report.tracking_removed.to_string().cyan()
    ));
}
