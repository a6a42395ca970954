use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::Runtime;
use crate::cli::{CheckArgs, LineageArgs, RevokeAllArgs, SessionsArgs};
use crate::output::{print_json, print_lineage, print_sessions, print_success, print_warning};

pub async fn revoke_all(runtime: &Runtime, args: &RevokeAllArgs, json: bool) -> Result<()> {
    let revoked = runtime.service.revoke_all(&args.user, args.reason).await?;
    if json {
        return print_json(&json!({
            "user_id": args.user,
            "reason": args.reason,
            "revoked": revoked,
        }));
    }
    if revoked == 0 {
        print_warning(&format!("No active sessions for {}", args.user));
    } else {
        print_success(&format!(
            "Revoked {} session(s) for {} ({})",
            revoked.to_string().cyan(),
            args.user,
            args.reason
        ));
    }
    Ok(())
}

/// Prints the revocation status of a jti. Store failures report as revoked.
pub async fn check(runtime: &Runtime, args: &CheckArgs, json: bool) -> Result<()> {
    let revoked = runtime.service.is_revoked(Some(&args.jti)).await;
    if json {
        return print_json(&json!({ "jti": args.jti, "revoked": revoked }));
    }
    if revoked {
        println!("{} {}", args.jti, "revoked".red());
    } else {
        println!("{} {}", args.jti, "valid".green());
    }
    Ok(())
}

pub async fn sessions(runtime: &Runtime, args: &SessionsArgs, json: bool) -> Result<()> {
    let records = runtime.service.active_sessions(&args.user).await?;
    if json {
        print_json(&records)
    } else {
        print_sessions(&records);
        Ok(())
    }
}

pub async fn lineage(runtime: &Runtime, args: &LineageArgs, json: bool) -> Result<()> {
    let chain = runtime.service.lineage(&args.jti).await?;
    if json {
        print_json(&chain)
    } else {
        print_lineage(&chain);
        Ok(())
    }
}
