//! CLI argument parsing, validation, and startup helpers.

use crate::auth::IdentitySource;
use crate::db::Database;
use crate::{DEFAULT_ACCESS_TOKEN_TTL, DEFAULT_REFRESH_TOKEN_TTL, ServerConfig};
use clap::Parser;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Upper bound for either token lifetime (ten years).
pub const MAX_TOKEN_TTL: u64 = 315_360_000;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "HeartPlan",
    about = "Stateless token authentication for the HeartPlan API"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "heartplan.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = DEFAULT_ACCESS_TOKEN_TTL,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds, must exceed the access token lifetime
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = DEFAULT_REFRESH_TOKEN_TTL,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL))]
    pub refresh_token_ttl: u64,

    /// Where protected requests take the caller's identity from
    #[arg(long, env = "IDENTITY_SOURCE", default_value = "store")]
    pub identity_source: IdentitySource,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(secret)
}

fn validate_jwt_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Check that refresh tokens outlive access tokens.
/// Returns false and logs an error otherwise.
pub fn validate_token_lifetimes(access_ttl: u64, refresh_ttl: u64) -> bool {
    if refresh_ttl <= access_ttl {
        error!(
            access_ttl,
            refresh_ttl, "Refresh token lifetime must be longer than access token lifetime"
        );
        return false;
    }
    true
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_token_ttl: args.access_token_ttl,
        refresh_token_ttl: args.refresh_token_ttl,
        identity_source: args.identity_source,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["heartplan"]).unwrap();
        assert_eq!(args.access_token_ttl, 86_400);
        assert_eq!(args.refresh_token_ttl, 604_800);
        assert_eq!(args.identity_source, IdentitySource::Store);
    }

    #[test]
    fn test_identity_source_flag() {
        let args =
            Args::try_parse_from(["heartplan", "--identity-source", "embedded"]).unwrap();
        assert_eq!(args.identity_source, IdentitySource::Embedded);

        assert!(Args::try_parse_from(["heartplan", "--identity-source", "cache"]).is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(Args::try_parse_from(["heartplan", "--access-token-ttl", "0"]).is_err());
    }

    #[test]
    fn test_ttl_upper_bound() {
        assert!(Args::try_parse_from([
            "heartplan",
            "--access-token-ttl",
            "60",
            "--refresh-token-ttl",
            "18446744073709551615",
        ])
        .is_err());

        let max = MAX_TOKEN_TTL.to_string();
        let args = Args::try_parse_from([
            "heartplan",
            "--access-token-ttl",
            "60",
            "--refresh-token-ttl",
            max.as_str(),
        ])
        .unwrap();
        assert_eq!(args.refresh_token_ttl, MAX_TOKEN_TTL);
    }

    #[test]
    fn test_token_lifetimes() {
        assert!(validate_token_lifetimes(60, 600));
        assert!(!validate_token_lifetimes(600, 600));
        assert!(!validate_token_lifetimes(600, 60));
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(validate_jwt_secret("too-short".to_string()).is_none());
        assert!(validate_jwt_secret("x".repeat(32)).is_some());
    }
}
