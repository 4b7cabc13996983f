//! Environment and configuration tests
//!
//! Tests touching process environment variables run serially.

use ferrous_context::{
    ApplicationContext, BeanDefinition, BeanFactoryExt, ContextError, ContextSettings, Environment,
    EnvironmentAware, EnvironmentPropertySource, JsonPropertySource, MapPropertySource,
};
use parking_lot::Mutex;
use serial_test::serial;
use std::sync::Arc;

#[derive(Default)]
struct ServerConfig {
    url: Mutex<String>,
}

impl EnvironmentAware for ServerConfig {
    fn set_environment(&self, environment: Arc<Environment>) {
        *self.url.lock() = environment.get_string_or("server.url", "unset");
    }
}

#[test]
#[serial]
fn test_environment_variables_override_defaults() {
    std::env::set_var("FCTX_SERVER_PORT", "9090");

    let ctx = ApplicationContext::builder()
        .property_source(Arc::new(EnvironmentPropertySource::with_prefix("fctx")))
        .property_source(Arc::new(
            MapPropertySource::new("defaults")
                .with("server.port", 8080i64)
                .with("server.url", "http://localhost:${server.port}"),
        ))
        .bean(
            BeanDefinition::builder::<ServerConfig>("config")
                .supplier(ServerConfig::default)
                .environment_aware()
                .build(),
        )
        .build()
        .unwrap();

    let config = ctx.get_bean_as::<ServerConfig>("config").unwrap();
    assert_eq!(*config.url.lock(), "http://localhost:9090");
    assert_eq!(ctx.environment().get_i64("server.port").unwrap(), Some(9090));

    std::env::remove_var("FCTX_SERVER_PORT");
}

#[test]
#[serial]
fn test_active_profiles_from_environment_variable() {
    std::env::set_var("FCTX_PROFILES_ACTIVE", "dev, cloud");

    let ctx = ApplicationContext::builder()
        .property_source(Arc::new(EnvironmentPropertySource::with_prefix("fctx")))
        .build()
        .unwrap();

    let env = ctx.environment();
    assert_eq!(env.active_profiles(), ["dev", "cloud"]);
    assert!(env.accepts_profiles(&["cloud"]));
    assert!(!env.accepts_profiles(&["default"]));

    std::env::remove_var("FCTX_PROFILES_ACTIVE");
}

#[test]
fn test_explicit_profiles_take_precedence() {
    let ctx = ApplicationContext::builder()
        .property_source(Arc::new(MapPropertySource::new("p").with("profiles.active", "ignored")))
        .active_profile("prod")
        .build()
        .unwrap();

    assert_eq!(ctx.environment().active_profiles(), ["prod"]);
    assert!(ctx.environment().accepts_profiles(&["!dev"]));
}

#[test]
fn test_json_properties_are_flattened() {
    let source = JsonPropertySource::parse(
        "app.json",
        r#"{ "cache": { "ttl_ms": 1500, "enabled": true }, "name": "orders" }"#,
    )
    .unwrap();
    let env = Environment::new(vec![Arc::new(source)], Vec::new());

    assert_eq!(env.get_bool("cache.enabled").unwrap(), Some(true));
    assert_eq!(
        env.get_duration_ms("cache.ttl_ms").unwrap(),
        Some(std::time::Duration::from_millis(1500))
    );
    assert_eq!(env.get_string("name").unwrap().as_deref(), Some("orders"));
    assert_eq!(env.default_profiles(), ["default"]);
    assert!(env.accepts_profiles(&["default"]));
}

#[test]
fn test_unresolvable_placeholder_is_config_error() {
    let env = Environment::new(
        vec![Arc::new(MapPropertySource::new("p").with("url", "${missing.host}/path"))],
        Vec::new(),
    );
    assert!(matches!(env.get_string("url"), Err(ContextError::Config(_))));
    assert!(matches!(env.required_property("absent"), Err(ContextError::Config(_))));
}

#[test]
fn test_settings_drive_context_identity() {
    let settings = ContextSettings::from_json_str(
        r#"{ "id": "orders-ctx", "display_name": "Orders", "application_name": "orders", "active_profiles": ["test"] }"#,
    )
    .unwrap();

    let ctx = ApplicationContext::builder().settings(settings).build().unwrap();
    assert_eq!(ctx.id(), "orders-ctx");
    assert_eq!(ctx.display_name(), "Orders");
    assert_eq!(ctx.application_name(), "orders");
    assert!(ctx.environment().accepts_profiles(&["test"]));
}
