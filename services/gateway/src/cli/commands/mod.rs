pub mod logging;
pub mod oauth;
pub mod ratelimit;
pub mod tokens;

use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_ENV: &str = "env";
pub const ARG_DATABASE_URL: &str = "database-url";
pub const ARG_REDIS_URL: &str = "redis-url";
pub const ARG_CORS_ALLOWED_ORIGINS: &str = "cors-allowed-origins";
pub const ARG_LEGACY_FALLBACK: &str = "legacy-fallback";
pub const ARG_VERIFY_DIRECTORY_UID: &str = "verify-directory-uid";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("gateway")
        .about("Authentication gateway for the Boddle platform")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .env("PORT")
                .default_value("8080")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ENV)
                .long(ARG_ENV)
                .help("Deployment environment tag")
                .env("ENV")
                .default_value("development"),
        )
        .arg(
            Arg::new(ARG_DATABASE_URL)
                .short('d')
                .long(ARG_DATABASE_URL)
                .help("PostgreSQL connection string for the shared user directory")
                .env("DATABASE_URL")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_REDIS_URL)
                .long(ARG_REDIS_URL)
                .help("Key-value store URL for rate limits, revocations, and OAuth state")
                .env("REDIS_URL")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_CORS_ALLOWED_ORIGINS)
                .long(ARG_CORS_ALLOWED_ORIGINS)
                .help("Comma-separated list of allowed origins, or *")
                .env("CORS_ALLOWED_ORIGINS")
                .default_value("*"),
        )
        .arg(
            Arg::new(ARG_LEGACY_FALLBACK)
                .long(ARG_LEGACY_FALLBACK)
                .help("Dual-mode: consult the legacy session mechanism when no bearer token is present")
                .env("LEGACY_FALLBACK")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_VERIFY_DIRECTORY_UID)
                .long(ARG_VERIFY_DIRECTORY_UID)
                .help("Cross-check the token's subject identifier against the directory on validation")
                .env("VERIFY_DIRECTORY_UID")
                .action(ArgAction::SetTrue),
        );

    let command = tokens::with_args(command);
    let command = oauth::with_args(command);
    let command = ratelimit::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "gateway",
            "--database-url",
            "postgres://localhost/boddle",
            "--redis-url",
            "redis://localhost:6379",
            "--jwt-secret-key",
            "access-secret",
            "--jwt-refresh-secret-key",
            "refresh-secret",
        ]
    }

    #[test]
    fn command_metadata() {
        let command = new();
        assert_eq!(command.get_name(), "gateway");
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn defaults_apply() {
        let matches = new().get_matches_from(base_args());
        assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
        assert_eq!(
            matches.get_one::<String>(ARG_ENV).map(String::as_str),
            Some("development")
        );
        assert_eq!(
            matches
                .get_one::<String>(ARG_CORS_ALLOWED_ORIGINS)
                .map(String::as_str),
            Some("*")
        );
        assert_eq!(matches.get_flag(ARG_LEGACY_FALLBACK), false);
    }

    #[test]
    fn overrides_apply() {
        let mut args = base_args();
        args.extend(["--port", "9090", "--env", "production", "--legacy-fallback"]);
        let matches = new().get_matches_from(args);
        assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(9090));
        assert!(matches.get_flag(ARG_LEGACY_FALLBACK));
    }
}
