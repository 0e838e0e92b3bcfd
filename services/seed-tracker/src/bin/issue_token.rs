//! Mint a bearer token for local development and manual testing.
//!
//! Secret and lifetime default to the server configuration (`JWT_SECRET`,
//! `SEED_TRACKER__AUTH__TOKEN_TTL_HOURS`, config file).
//!
//! ```text
//! JWT_SECRET=dev issue-token --role staff --subject staff
//! ```

use anyhow::Context;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use seed_tracker::security_middleware::{issue_token, Role};
use seed_tracker::Config;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Staff,
    Auditor,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Staff => Role::Staff,
            RoleArg::Auditor => Role::Auditor,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "issue-token", about = "Issue a signed seed-tracker bearer token")]
struct Args {
    /// Role granted by the token
    #[arg(long, value_enum)]
    role: RoleArg,

    /// Subject recorded in the token; defaults to the role name
    #[arg(long)]
    subject: Option<String>,

    /// HS256 signing secret; overrides the configured one
    #[arg(long)]
    secret: Option<String>,

    /// Token lifetime in hours; overrides the configured one
    #[arg(long)]
    ttl_hours: Option<i64>,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let secret = args.secret.unwrap_or(config.auth.jwt_secret);
    if secret.is_empty() {
        anyhow::bail!("No signing secret: set JWT_SECRET or pass --secret");
    }
    let ttl_hours = args.ttl_hours.unwrap_or(config.auth.token_ttl_hours);
    if ttl_hours <= 0 {
        anyhow::bail!("Token lifetime must be positive, got {} hours", ttl_hours);
    }

    let role = Role::from(args.role);
    let subject = args.subject.unwrap_or_else(|| role.to_string());
    let token = issue_token(&secret, &subject, role, ttl_hours).context("Failed to sign token")?;

    println!("{}", token);
    Ok(())
}
