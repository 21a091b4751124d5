use gymgate::auth::AuthContext;
use gymgate::config::{Config, ConfigError};
use gymgate::guard::AccessGuard;
use gymgate::navigation::{Dispatcher, NavigationRequest, TitleApplier};
use gymgate::routes::{RouteError, RouteTable};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

const CUSTOM_ROUTES: &str = r#"
[[routes]]
path = "/sign-in"
name = "SignIn"
title = "Sign In"
requires_unauth = true

[[routes]]
path = "/members"
requires_auth = true

[[routes.children]]
path = "home"
name = "Home"

[[routes.children]]
path = "/:rest(.*)*"
name = "Missing"
title = "Nothing here"
"#;

#[test]
fn test_custom_routes_file_with_matching_config() {
    let dir = tempdir().unwrap();
    let routes = dir.path().join("routes.toml");
    let config_path = dir.path().join("config.toml");
    fs::write(&routes, CUSTOM_ROUTES).unwrap();
    fs::write(
        &config_path,
        format!(
            "routes_file = {:?}\nlogin_route = \"SignIn\"\nfallback_route = \"Missing\"\ndefault_title = \"Members\"\n",
            routes.display().to_string()
        ),
    )
    .unwrap();

    let config = Config::load_from_path(&config_path);
    let table = RouteTable::load(config.routes_file.as_deref().unwrap()).unwrap();
    assert!(config.validate(&table).is_ok());
}

#[test]
fn test_default_redirect_targets_fail_against_custom_routes() {
    let table = RouteTable::from_toml_str(CUSTOM_ROUTES).unwrap();
    let err = Config::default().validate(&table).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::UnknownRoute {
            key: "login_route",
            ..
        }
    ));
}

#[test]
fn test_missing_routes_file_is_a_load_error() {
    let dir = tempdir().unwrap();
    let result = RouteTable::load(&dir.path().join("nope.toml"));
    assert!(matches!(result, Err(RouteError::Load(msg)) if msg.contains("nope.toml")));
}

#[tokio::test]
async fn test_configured_targets_drive_the_guard() {
    let table = Arc::new(RouteTable::from_toml_str(CUSTOM_ROUTES).unwrap());
    let config = Config {
        login_route: "SignIn".into(),
        fallback_route: "Missing".into(),
        default_title: "Members".into(),
        ..Config::default()
    };
    config.validate(&table).unwrap();

    let dispatcher = Dispatcher::new(table)
        .with_guard(AccessGuard::new(&config.login_route, &config.fallback_route))
        .with_titles(TitleApplier::new(&config.default_title))
        .with_max_redirects(config.max_redirects)
        .with_hook_timeout(config.hook_timeout());

    let outcome = dispatcher
        .navigate(&NavigationRequest::path("/members/home"), &AuthContext::anonymous())
        .await
        .unwrap();
    assert_eq!(outcome.destination.name(), Some("SignIn"));
    assert_eq!(outcome.title, "Sign In");

    // Home declares no title
    let outcome = dispatcher
        .navigate(
            &NavigationRequest::path("/members/home"),
            &AuthContext::from_raw(Some("{}")),
        )
        .await
        .unwrap();
    assert_eq!(outcome.destination.name(), Some("Home"));
    assert_eq!(outcome.title, "Members");
}
