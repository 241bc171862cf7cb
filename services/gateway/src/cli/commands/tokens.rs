use clap::{Arg, Command};

pub const ARG_JWT_SECRET_KEY: &str = "jwt-secret-key";
pub const ARG_JWT_REFRESH_SECRET_KEY: &str = "jwt-refresh-secret-key";
pub const ARG_ACCESS_TOKEN_TTL: &str = "jwt-access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL: &str = "jwt-refresh-token-ttl-seconds";
pub const ARG_AUDIENCE: &str = "jwt-audience";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET_KEY)
                .long(ARG_JWT_SECRET_KEY)
                .help("Secret key for signing access tokens")
                .env("JWT_SECRET_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_REFRESH_SECRET_KEY)
                .long(ARG_JWT_REFRESH_SECRET_KEY)
                .help("Independent secret key for signing refresh tokens")
                .env("JWT_REFRESH_SECRET_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token lifetime in seconds")
                .env("JWT_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("21600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token lifetime in seconds")
                .env("JWT_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_AUDIENCE)
                .long(ARG_AUDIENCE)
                .help("Audience claim stamped into issued tokens")
                .env("JWT_AUDIENCE")
                .default_value("boddle-platform"),
        )
}
