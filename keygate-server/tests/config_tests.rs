use std::io::Write;

use keygate_server::ServerConfig;

fn load_json(json: &str) -> anyhow::Result<ServerConfig> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{json}").unwrap();
    ServerConfig::load(file.path())
}

#[test]
fn defaults_apply_for_an_empty_config() {
    let config = load_json("{}").unwrap();
    assert_eq!(config.grace_hours, None);
    assert_eq!(config.revalidate_hours, 6);
    assert!(config.data_dir.is_none());
}

#[test]
fn positive_grace_override_is_accepted() {
    let config = load_json(r#"{"grace_hours": 24}"#).unwrap();
    assert_eq!(config.grace_hours, Some(24));
}

#[test]
fn non_positive_grace_hours_are_rejected() {
    // Zero or negative would open sessions with grace already lapsed.
    for json in [r#"{"grace_hours": 0}"#, r#"{"grace_hours": -72}"#] {
        let err = load_json(json).unwrap_err();
        assert!(err.to_string().contains("grace_hours"), "{json}");
    }
}

#[test]
fn authority_base_url_trailing_slash_is_stripped() {
    let config = load_json(
        r#"{"authority": {"base_url": "https://licenses.example.com/", "consumer_key": "ck", "consumer_secret": "cs"}}"#,
    )
    .unwrap();
    assert_eq!(config.authority.base_url, "https://licenses.example.com");
}
