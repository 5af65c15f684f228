use std::io::Write;

use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cache_settings_use_documented_defaults() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    let cache = settings.cache;
    assert!(cache.enabled);
    assert_eq!(cache.freshness_seconds, 60);
    assert_eq!(cache.stale_seconds, 120);
    assert_eq!(cache.refresh_lock_seconds.get(), 5);
    assert_eq!(cache.refresh_timeout_seconds.get(), 5);
    assert_eq!(cache.store_capacity.get(), 10_000);
    assert_eq!(cache.max_body_bytes.get(), 1024 * 1024);
}

#[test]
fn refresh_timeout_must_not_exceed_lock() {
    let mut raw = RawSettings::default();
    raw.cache.refresh_lock_seconds = Some(3);
    raw.cache.refresh_timeout_seconds = Some(4);

    let err = Settings::from_raw(raw).expect_err("timeout above lock");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.refresh_timeout_seconds",
            ..
        }
    ));
}

#[test]
fn zero_store_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.store_capacity = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero capacity");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.store_capacity",
            ..
        }
    ));
}

#[test]
fn default_per_page_cannot_exceed_max() {
    let mut raw = RawSettings::default();
    raw.catalog.default_per_page = Some(80);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_admin_token_disables_admin_routes() {
    let mut raw = RawSettings::default();
    raw.admin.token = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.admin.token.is_none());
}

#[test]
fn admin_token_is_redacted_in_debug_output() {
    let admin = AdminSettings {
        token: Some("s3cret".to_string()),
    };
    let rendered = format!("{admin:?}");
    assert!(!rendered.contains("s3cret"));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["showroom"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "showroom",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--cache-enabled",
        "false",
        "--cache-freshness-seconds",
        "15",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.cache_enabled, Some(false));
            assert_eq!(serve.overrides.cache_freshness_seconds, Some(15));
        }
    }
}

#[test]
fn config_file_is_loaded() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        r#"
[server]
port = 4100

[cache]
freshness_seconds = 30
stale_seconds = 45

[admin]
token = "file-token"

[catalog]
seed_demo_data = false
"#
    )
    .expect("write config");

    let cli = CliArgs {
        config_file: Some(file.path().to_path_buf()),
        command: None,
    };
    let settings = load(&cli).expect("settings load");

    assert_eq!(settings.server.addr.port(), 4100);
    assert_eq!(settings.cache.freshness_seconds, 30);
    assert_eq!(settings.cache.stale_seconds, 45);
    assert_eq!(settings.admin.token.as_deref(), Some("file-token"));
    assert!(!settings.catalog.seed_demo_data);
}

#[test]
fn invalid_file_values_surface_as_load_errors() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(file, "[cache]\nrefresh_lock_seconds = 0").expect("write config");

    let cli = CliArgs {
        config_file: Some(file.path().to_path_buf()),
        command: None,
    };
    let err = load(&cli).expect_err("zero lock ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.refresh_lock_seconds",
            ..
        }
    ));
}
