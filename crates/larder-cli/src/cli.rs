use clap::{Parser, Subcommand};
use larder_auth::RevocationReason;

#[derive(Parser)]
#[command(name = "larder-tokens")]
#[command(about = "Larder token ledger: migrations, cleanup and incident response")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./larder-tokens.toml if present)
    #[arg(short, long, global = true, env = "LARDER_CONFIG")]
    pub config: Option<String>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Delete expired blacklist and tracking rows once
    Cleanup,
    /// Run cleanup periodically until interrupted
    Sweep(SweepArgs),
    /// Revoke every active session of a user
    RevokeAll(RevokeAllArgs),
    /// Check whether a token id is revoked
    Check(CheckArgs),
    /// List a user's active refresh tokens
    Sessions(SessionsArgs),
    /// Show the rotation chain ending at a refresh token
    Lineage(LineageArgs),
    /// Show ledger row counts
    Stats,
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(clap::Args)]
pub struct SweepArgs {
    /// Override the configured interval (e.g. "10m")
    #[arg(long)]
    pub interval: Option<String>,
}

#[derive(clap::Args)]
pub struct RevokeAllArgs {
    /// User whose sessions are revoked
    #[arg(short, long)]
    pub user: String,
    /// Reason recorded on each blacklist entry
    #[arg(short, long, default_value = "manual")]
    pub reason: RevocationReason,
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Token id (jti)
    #[arg(long)]
    pub jti: String,
}

#[derive(clap::Args)]
pub struct SessionsArgs {
    /// User id
    #[arg(short, long)]
    pub user: String,
}

#[derive(clap::Args)]
pub struct LineageArgs {
    /// Refresh token id (jti) at the newest end of the chain
    #[arg(long)]
    pub jti: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_revoke_all() {
        let cli = Cli::try_parse_from([
            "larder-tokens",
            "revoke-all",
            "--user",
            "user-1",
            "--reason",
            "admin_sweep",
        ])
        .unwrap();
        match cli.command {
            Commands::RevokeAll(args) => {
                assert_eq!(args.user, "user-1");
                assert_eq!(args.reason, RevocationReason::AdminSweep);
            }
            _ => panic!("expected revoke-all"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_reason() {
        let result = Cli::try_parse_from([
            "larder-tokens",
            "revoke-all",
            "--user",
            "user-1",
            "--reason",
            "because",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_json_flag() {
        let cli = Cli::try_parse_from(["larder-tokens", "stats", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Stats));
    }
}
