use clap::{Arg, Command};

pub const ARG_WINDOW_SECONDS: &str = "rate-limit-window-seconds";
pub const ARG_MAX_ATTEMPTS: &str = "rate-limit-max-attempts";
pub const ARG_LOCKOUT_SECONDS: &str = "rate-limit-lockout-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_WINDOW_SECONDS)
                .long(ARG_WINDOW_SECONDS)
                .help("Attempt-counting window in seconds")
                .env("RATE_LIMIT_WINDOW_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_MAX_ATTEMPTS)
                .long(ARG_MAX_ATTEMPTS)
                .help("Failed attempts allowed inside the window")
                .env("RATE_LIMIT_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_SECONDS)
                .long(ARG_LOCKOUT_SECONDS)
                .help("Lockout duration in seconds once the window is exhausted")
                .env("RATE_LIMIT_LOCKOUT_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
}
