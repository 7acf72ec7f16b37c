// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 12;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory containing pre-built frontend files to serve.
    pub static_dir: Option<PathBuf>,
    /// Plaintext admin password; hashed once at startup.
    pub admin_password: Option<String>,
    /// Pre-hashed admin password (argon2 PHC string). Wins over `admin_password`.
    pub admin_password_hash: Option<String>,
    /// Lifetime of issued admin tokens.
    pub token_ttl_hours: i64,
    /// Hide storage error details from API responses.
    pub production: bool,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:chess_club.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `STATIC_DIR` - Path to frontend dist directory for static file serving
    /// - `ADMIN_PASSWORD` / `ADMIN_PASSWORD_HASH` - admin credential
    /// - `TOKEN_TTL_HOURS` - admin token lifetime (default: 12)
    /// - `APP_ENV` - `production` hides internal error details
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--production` - Same as `APP_ENV=production`
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:chess_club.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(&args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| std::env::var("PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let static_dir = std::env::var("STATIC_DIR").ok().map(PathBuf::from);

        let admin_password = non_empty_env("ADMIN_PASSWORD");
        let admin_password_hash = non_empty_env("ADMIN_PASSWORD_HASH");

        let token_ttl_hours = std::env::var("TOKEN_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|h: &i64| *h > 0)
            .unwrap_or(DEFAULT_TOKEN_TTL_HOURS);

        let production = args.contains(&"--production".to_string())
            || std::env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false);

        Config {
            database_url,
            port,
            static_dir,
            admin_password,
            admin_password_hash,
            token_ttl_hours,
            production,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Global flag indicating production mode is active.
/// This is set once at startup and read when rendering error responses.
static PRODUCTION: AtomicBool = AtomicBool::new(false);

/// Set the production flag (called once at startup).
pub fn set_production(enabled: bool) {
    PRODUCTION.store(enabled, Ordering::Relaxed);
}

/// Check if production mode is active.
pub fn is_production() -> bool {
    PRODUCTION.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_value() {
        let args: Vec<String> = ["bin", "--port", "8080", "--production"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            Config::parse_cli_value(&args, "--port").as_deref(),
            Some("8080")
        );
        assert_eq!(Config::parse_cli_value(&args, "--missing"), None);
    }
}
