//! Profile loading and overlay tests.

use std::io::Write;
use std::time::Duration;

use diradmin_cli::config::{ConnectionArgs, Profile};
use diradmin_cli::error::CliError;
use tempfile::NamedTempFile;

fn profile_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = Profile::load(&dir.path().join("profile.json")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_load_empty_file_is_none() {
    let file = profile_file("  \n");
    assert!(Profile::load(file.path()).unwrap().is_none());
}

#[test]
fn test_load_legacy_file() {
    let file = profile_file(
        r#"{
            "Addr": "192.168.1.20",
            "Port": "389",
            "Username": "cn=Manager,dc=example,dc=com",
            "Password": "secret",
            "Limit": 50
        }"#,
    );

    let profile = Profile::load(file.path()).unwrap().unwrap();
    assert_eq!(profile.pool.address(), "192.168.1.20:389");
    assert_eq!(profile.pool.username, "cn=Manager,dc=example,dc=com");
    assert_eq!(profile.page_size, Some(50));
}

#[test]
fn test_load_malformed_file_names_path() {
    let file = profile_file("{ not json");
    let err = Profile::load(file.path()).unwrap_err();

    assert!(matches!(err, CliError::Config(_)));
    assert!(err
        .to_string()
        .contains(&file.path().display().to_string()));
}

#[test]
fn test_resolve_reads_explicit_config() {
    let file = profile_file(
        r#"{"server":"ldap.example.com","base_dn":"dc=example,dc=com","timeout_secs":12}"#,
    );
    let args = ConnectionArgs {
        config: Some(file.path().to_path_buf()),
        username: Some("cn=reader,dc=example,dc=com".to_string()),
        password: Some("pw".to_string()),
        ..Default::default()
    };

    let profile = args.resolve().unwrap();
    assert_eq!(profile.pool.server, "ldap.example.com");
    assert_eq!(profile.pool.username, "cn=reader,dc=example,dc=com");
    assert_eq!(profile.pool.password.as_deref(), Some("pw"));
    assert_eq!(profile.pool.checkout_timeout(), Duration::from_secs(12));
    assert_eq!(profile.base_dn.as_deref(), Some("dc=example,dc=com"));
}

#[test]
fn test_resolve_missing_explicit_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let args = ConnectionArgs {
        config: Some(dir.path().join("nope.json")),
        server: Some("ldap.example.com".to_string()),
        ..Default::default()
    };

    let err = args.resolve().unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn test_ssl_flag_then_port_override() {
    let args = ConnectionArgs {
        server: Some("ldap.example.com".to_string()),
        ssl: true,
        port: Some(3269),
        ..Default::default()
    };

    let profile = args.apply(None).unwrap();
    assert!(profile.pool.tls.enabled);
    assert_eq!(profile.pool.port, 3269);
}

#[test]
fn test_insecure_flag_disables_verification() {
    let args = ConnectionArgs {
        server: Some("ldap.example.com".to_string()),
        starttls: true,
        insecure_skip_verify: true,
        ..Default::default()
    };

    let profile = args.apply(None).unwrap();
    assert!(profile.pool.tls.starttls);
    assert!(!profile.pool.tls.verify_certificate);
}

#[test]
fn test_native_profile_round_trips_through_json() {
    let mut profile = Profile::new("ldap.example.com");
    profile.base_dn = Some("dc=example,dc=com".to_string());
    profile.page_size = Some(500);

    let text = serde_json::to_string(&profile).unwrap();
    let parsed = Profile::from_json(&text).unwrap();

    assert_eq!(parsed.pool.server, "ldap.example.com");
    assert_eq!(parsed.base_dn, profile.base_dn);
    assert_eq!(parsed.page_size, Some(500));
}
