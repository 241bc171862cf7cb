use clap::{Arg, Command};

pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_GOOGLE_REDIRECT_URL: &str = "google-redirect-url";

pub const ARG_CLEVER_CLIENT_ID: &str = "clever-client-id";
pub const ARG_CLEVER_CLIENT_SECRET: &str = "clever-client-secret";
pub const ARG_CLEVER_REDIRECT_URL: &str = "clever-redirect-url";

pub const ARG_CLASSLINK_CLIENT_ID: &str = "classlink-client-id";
pub const ARG_CLASSLINK_CLIENT_SECRET: &str = "classlink-client-secret";
pub const ARG_CLASSLINK_REDIRECT_URL: &str = "classlink-redirect-url";

pub const ARG_ICLOUD_SERVICE_ID: &str = "icloud-service-id";
pub const ARG_ICLOUD_TEAM_ID: &str = "icloud-team-id";
pub const ARG_ICLOUD_KEY_ID: &str = "icloud-key-id";
pub const ARG_ICLOUD_PRIVATE_KEY_PATH: &str = "icloud-private-key-path";
pub const ARG_ICLOUD_REDIRECT_URL: &str = "icloud-redirect-url";

/// Provider credentials are optional; a provider without credentials is
/// simply not mounted.
#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command
        .arg(secret_arg(ARG_GOOGLE_CLIENT_ID, "GOOGLE_CLIENT_ID", false))
        .arg(secret_arg(ARG_GOOGLE_CLIENT_SECRET, "GOOGLE_CLIENT_SECRET", true))
        .arg(secret_arg(ARG_GOOGLE_REDIRECT_URL, "GOOGLE_REDIRECT_URL", false))
        .arg(secret_arg(ARG_CLEVER_CLIENT_ID, "CLEVER_CLIENT_ID", false))
        .arg(secret_arg(ARG_CLEVER_CLIENT_SECRET, "CLEVER_CLIENT_SECRET", true))
        .arg(secret_arg(ARG_CLEVER_REDIRECT_URL, "CLEVER_REDIRECT_URL", false));

    command
        .arg(secret_arg(ARG_CLASSLINK_CLIENT_ID, "CLASSLINK_CLIENT_ID", false))
        .arg(secret_arg(
            ARG_CLASSLINK_CLIENT_SECRET,
            "CLASSLINK_CLIENT_SECRET",
            true,
        ))
        .arg(secret_arg(
            ARG_CLASSLINK_REDIRECT_URL,
            "CLASSLINK_REDIRECT_URL",
            false,
        ))
        .arg(secret_arg(ARG_ICLOUD_SERVICE_ID, "ICLOUD_SERVICE_ID", false))
        .arg(secret_arg(ARG_ICLOUD_TEAM_ID, "ICLOUD_TEAM_ID", false))
        .arg(secret_arg(ARG_ICLOUD_KEY_ID, "ICLOUD_KEY_ID", false))
        .arg(secret_arg(
            ARG_ICLOUD_PRIVATE_KEY_PATH,
            "ICLOUD_PRIVATE_KEY_PATH",
            false,
        ))
        .arg(secret_arg(ARG_ICLOUD_REDIRECT_URL, "ICLOUD_REDIRECT_URL", false))
}

fn secret_arg(name: &'static str, env: &'static str, hide: bool) -> Arg {
    let arg = Arg::new(name).long(name).env(env);
    if hide { arg.hide_env_values(true) } else { arg }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_args_are_optional() {
        let command = with_args(Command::new("test"));
        let matches = command.get_matches_from(vec!["test"]);
        assert!(matches.get_one::<String>(ARG_GOOGLE_CLIENT_ID).is_none());
        assert!(matches.get_one::<String>(ARG_ICLOUD_SERVICE_ID).is_none());
    }

    #[test]
    fn provider_args_parse() {
        let command = with_args(Command::new("test"));
        let matches = command.get_matches_from(vec![
            "test",
            "--google-client-id",
            "id-1",
            "--google-client-secret",
            "secret-1",
            "--google-redirect-url",
            "https://gateway/auth/google/callback",
        ]);
        assert_eq!(
            matches.get_one::<String>(ARG_GOOGLE_CLIENT_ID).map(String::as_str),
            Some("id-1")
        );
    }
}
