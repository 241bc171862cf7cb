use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::cli::actions::{
    Action,
    server::{Args, IcloudArgs, OAuthClientArgs},
};
use crate::cli::commands::{self, oauth, ratelimit, tokens};

fn required(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn optional(matches: &clap::ArgMatches, name: &str) -> Option<String> {
    matches
        .get_one::<String>(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Assemble a provider credential triple; `None` when none of the three
/// pieces is set, an error when only some are.
fn oauth_client(
    matches: &clap::ArgMatches,
    provider: &str,
    id_arg: &str,
    secret_arg: &str,
    redirect_arg: &str,
) -> Result<Option<OAuthClientArgs>> {
    let client_id = optional(matches, id_arg);
    let client_secret = optional(matches, secret_arg);
    let redirect_url = optional(matches, redirect_arg);

    match (client_id, client_secret, redirect_url) {
        (Some(client_id), Some(client_secret), Some(redirect_url)) => Ok(Some(OAuthClientArgs {
            client_id,
            client_secret: SecretString::from(client_secret),
            redirect_url,
        })),
        (None, None, None) => Ok(None),
        _ => anyhow::bail!(
            "incomplete {provider} configuration: client id, client secret, and redirect URL are all required"
        ),
    }
}

fn icloud_args(matches: &clap::ArgMatches) -> Result<Option<IcloudArgs>> {
    let service_id = optional(matches, oauth::ARG_ICLOUD_SERVICE_ID);
    let team_id = optional(matches, oauth::ARG_ICLOUD_TEAM_ID);
    let key_id = optional(matches, oauth::ARG_ICLOUD_KEY_ID);
    let private_key_path = optional(matches, oauth::ARG_ICLOUD_PRIVATE_KEY_PATH);
    let redirect_url = optional(matches, oauth::ARG_ICLOUD_REDIRECT_URL);

    match (service_id, team_id, key_id, private_key_path, redirect_url) {
        (
            Some(service_id),
            Some(team_id),
            Some(key_id),
            Some(private_key_path),
            Some(redirect_url),
        ) => Ok(Some(IcloudArgs {
            service_id,
            team_id,
            key_id,
            private_key_path,
            redirect_url,
        })),
        (None, None, None, None, None) => Ok(None),
        _ => anyhow::bail!(
            "incomplete icloud configuration: service id, team id, key id, private key path, and redirect URL are all required"
        ),
    }
}

/// Map parsed CLI matches onto the server action.
///
/// # Errors
///
/// Returns an error when required arguments are missing or a provider is
/// only partially configured.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let args = Args {
        port: matches
            .get_one::<u16>(commands::ARG_PORT)
            .copied()
            .unwrap_or(8080),
        env: required(matches, commands::ARG_ENV)?,
        database_url: required(matches, commands::ARG_DATABASE_URL)?,
        redis_url: required(matches, commands::ARG_REDIS_URL)?,
        cors_allowed_origins: required(matches, commands::ARG_CORS_ALLOWED_ORIGINS)?,
        jwt_secret_key: SecretString::from(required(matches, tokens::ARG_JWT_SECRET_KEY)?),
        jwt_refresh_secret_key: SecretString::from(required(
            matches,
            tokens::ARG_JWT_REFRESH_SECRET_KEY,
        )?),
        access_token_ttl_seconds: matches
            .get_one::<u64>(tokens::ARG_ACCESS_TOKEN_TTL)
            .copied()
            .unwrap_or(21_600),
        refresh_token_ttl_seconds: matches
            .get_one::<u64>(tokens::ARG_REFRESH_TOKEN_TTL)
            .copied()
            .unwrap_or(2_592_000),
        audience: required(matches, tokens::ARG_AUDIENCE)?,
        google: oauth_client(
            matches,
            "google",
            oauth::ARG_GOOGLE_CLIENT_ID,
            oauth::ARG_GOOGLE_CLIENT_SECRET,
            oauth::ARG_GOOGLE_REDIRECT_URL,
        )?,
        clever: oauth_client(
            matches,
            "clever",
            oauth::ARG_CLEVER_CLIENT_ID,
            oauth::ARG_CLEVER_CLIENT_SECRET,
            oauth::ARG_CLEVER_REDIRECT_URL,
        )?,
        classlink: oauth_client(
            matches,
            "classlink",
            oauth::ARG_CLASSLINK_CLIENT_ID,
            oauth::ARG_CLASSLINK_CLIENT_SECRET,
            oauth::ARG_CLASSLINK_REDIRECT_URL,
        )?,
        icloud: icloud_args(matches)?,
        rate_limit_window_seconds: matches
            .get_one::<u64>(ratelimit::ARG_WINDOW_SECONDS)
            .copied()
            .unwrap_or(600),
        rate_limit_max_attempts: matches
            .get_one::<i64>(ratelimit::ARG_MAX_ATTEMPTS)
            .copied()
            .unwrap_or(5),
        rate_limit_lockout_seconds: matches
            .get_one::<u64>(ratelimit::ARG_LOCKOUT_SECONDS)
            .copied()
            .unwrap_or(900),
        legacy_fallback: matches.get_flag(commands::ARG_LEGACY_FALLBACK),
        verify_directory_uid: matches.get_flag(commands::ARG_VERIFY_DIRECTORY_UID),
    };

    Ok(Action::Server(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn matches(extra: &[&str]) -> clap::ArgMatches {
        let mut args = vec![
            "gateway",
            "--database-url",
            "postgres://localhost/boddle",
            "--redis-url",
            "redis://localhost:6379",
            "--jwt-secret-key",
            "access-secret",
            "--jwt-refresh-secret-key",
            "refresh-secret",
        ];
        args.extend(extra);
        commands::new().get_matches_from(args)
    }

    #[test]
    fn minimal_configuration_dispatches() -> Result<()> {
        let Action::Server(args) = handler(&matches(&[]))?;
        assert_eq!(args.port, 8080);
        assert_eq!(args.jwt_secret_key.expose_secret(), "access-secret");
        assert_eq!(args.access_token_ttl_seconds, 21_600);
        assert_eq!(args.refresh_token_ttl_seconds, 2_592_000);
        assert!(args.google.is_none());
        assert!(args.icloud.is_none());
        assert!(!args.legacy_fallback);
        Ok(())
    }

    #[test]
    fn full_provider_triple_is_accepted() -> Result<()> {
        let Action::Server(args) = handler(&matches(&[
            "--google-client-id",
            "id-1",
            "--google-client-secret",
            "secret-1",
            "--google-redirect-url",
            "https://gateway/auth/google/callback",
        ]))?;
        let google = args.google.expect("google configured");
        assert_eq!(google.client_id, "id-1");
        assert_eq!(
            google.redirect_url,
            "https://gateway/auth/google/callback"
        );
        Ok(())
    }

    #[test]
    fn partial_provider_triple_is_rejected() {
        let result = handler(&matches(&["--clever-client-id", "id-only"]));
        assert!(result.is_err());
    }

    #[test]
    fn partial_icloud_configuration_is_rejected() {
        let result = handler(&matches(&["--icloud-service-id", "com.boddle.gateway"]));
        assert!(result.is_err());
    }
}
