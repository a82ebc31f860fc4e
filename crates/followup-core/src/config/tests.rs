use super::*;
use std::collections::HashMap;

#[test]
fn test_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.followup.log_level, "info");
    assert!(cfg.email.enabled);
    assert_eq!(cfg.email.base_url, "https://api.resend.com");
    assert_eq!(cfg.scheduler.poll_interval_secs, 300);
    assert!(!cfg.api.enabled);
    assert_eq!(cfg.desktop.permission, NotificationPermission::Unset);
    assert_eq!(cfg.desktop.open_url, None);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let toml_str = r#"
        [email]
        api_key = "re_test"

        [scheduler]
        poll_interval_secs = 60

        [desktop]
        permission = "denied"
        open_url = "http://localhost:3000"
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.email.api_key, "re_test");
    assert_eq!(cfg.email.timeout_secs, 30);
    assert_eq!(cfg.scheduler.poll_interval_secs, 60);
    assert_eq!(cfg.scheduler.delivery_timeout_secs, 60);
    assert_eq!(cfg.desktop.permission, NotificationPermission::Denied);
    assert_eq!(cfg.desktop.open_url.as_deref(), Some("http://localhost:3000"));
    assert_eq!(cfg.store.db_path, "~/.followup/data/followup.db");
}

#[test]
fn test_env_overrides_replace_secrets() {
    let env: HashMap<&str, &str> = [
        ("RESEND_API_KEY", "re_env"),
        ("CRON_SECRET", "tick"),
        ("FOLLOWUP_API_KEY", "  "),
    ]
    .into_iter()
    .collect();

    let mut cfg = Config::default();
    cfg.api.api_key = "from-file".to_string();
    cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

    assert_eq!(cfg.email.api_key, "re_env");
    assert_eq!(cfg.api.cron_secret, "tick");
    assert_eq!(cfg.api.api_key, "from-file", "blank env value must not override");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let cfg = load(path.to_str().unwrap()).unwrap();
    assert_eq!(cfg.followup.name, "followup");
}

#[test]
fn test_load_rejects_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[scheduler\npoll_interval_secs = ").unwrap();
    let err = load(path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, FollowupError::Config(_)));
}

#[test]
fn test_shellexpand_leaves_plain_paths() {
    assert_eq!(shellexpand("/var/lib/followup.db"), "/var/lib/followup.db");
    assert_eq!(shellexpand(":memory:"), ":memory:");
}
