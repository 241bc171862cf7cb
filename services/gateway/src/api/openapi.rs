use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::handlers::{auth, health, metrics};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the router wiring and only return the generated spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both
/// served and documented. The Apple GET-callback test route is registered
/// outside, in `api::serve`, and intentionally undocumented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(metrics::metrics))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::magic_link::login_with_token))
        .routes(routes!(auth::logout::logout))
        .routes(routes!(auth::me::me))
        .routes(routes!(auth::oauth::begin))
        .routes(routes!(auth::oauth::callback))
        .routes(routes!(auth::oauth::icloud_callback));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Credential and token endpoints".to_string());
    let mut oauth_tag = Tag::new("oauth");
    oauth_tag.description = Some("Federated sign-in".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, oauth_tag]);
    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    OpenApiBuilder::new().info(info).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn normative_paths_are_documented() {
        let spec = openapi();
        for path in [
            "/health",
            "/metrics",
            "/auth/login",
            "/auth/token",
            "/auth/logout",
            "/auth/me",
            "/auth/{provider}",
            "/auth/{provider}/callback",
            "/auth/icloud/callback",
        ] {
            assert!(
                spec.paths.paths.contains_key(path),
                "missing path {path} in OpenAPI document"
            );
        }
    }
}
