//! DreamHost API key lookup.
//!
//! A key passed directly always wins. Otherwise the key is read from a
//! credentials file of `key = value` lines.

use std::path::Path;

use tracing::{debug, warn};

use crate::config::{EnvConfig, parse_key_values};
use crate::error::AppError;

/// Names accepted for the API key inside a credentials file, by priority
pub const CREDENTIAL_KEYS: [&str; 3] = ["dns_dreamhost_key", "dreamhost_key", "key"];

/// API key from the direct setting or, failing that, the credentials file
pub fn resolve_api_key(config: &EnvConfig) -> Result<String, AppError> {
    if let Some(key) = &config.dreamhost_api_key {
        debug!("Using DreamHost API key from environment");
        return Ok(key.clone());
    }

    match &config.credentials_path {
        Some(path) => load_api_key(path),
        None => Err(AppError::Config(
            "No DreamHost API key: set DREAMHOST_API_KEY or DREAMHOST_CREDENTIALS".into(),
        )),
    }
}

/// Read the API key from a credentials file
pub fn load_api_key(path: &Path) -> Result<String, AppError> {
    if !path.is_absolute() {
        warn!(path = %path.display(), "Credentials file path is relative");
    }

    let content = std::fs::read_to_string(path).map_err(|e| AppError::Credentials {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    check_permissions(path);

    let pairs = parse_key_values(&content);
    CREDENTIAL_KEYS
        .iter()
        .find_map(|wanted| {
            pairs
                .iter()
                .find(|(key, value)| key.eq_ignore_ascii_case(wanted) && !value.is_empty())
                .map(|(_, value)| value.clone())
        })
        .ok_or_else(|| AppError::Credentials {
            path: path.to_path_buf(),
            reason: format!("missing {}", CREDENTIAL_KEYS[0]),
        })
}

/// Warn when the credentials file is readable by group or others
#[cfg(unix)]
fn check_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                mode = format!("{:o}", mode & 0o777),
                "Unsafe permissions on credentials file, should not be accessible by group or others"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn credentials_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_direct_key_wins() {
        let config = EnvConfig {
            dreamhost_api_key: Some("direct".into()),
            credentials_path: Some(PathBuf::from("/nonexistent/credentials.ini")),
            ..EnvConfig::default()
        };
        assert_eq!(resolve_api_key(&config).unwrap(), "direct");
    }

    #[test]
    fn test_key_from_file() {
        let file = credentials_file("# DreamHost\ndns_dreamhost_key = 6SHU5P2HLDAYECUM\n");
        let config = EnvConfig {
            credentials_path: Some(file.path().to_path_buf()),
            ..EnvConfig::default()
        };
        assert_eq!(resolve_api_key(&config).unwrap(), "6SHU5P2HLDAYECUM");
    }

    #[test]
    fn test_key_priority_in_file() {
        let file = credentials_file("key=fallback\nDNS_DREAMHOST_KEY=preferred\n");
        assert_eq!(load_api_key(file.path()).unwrap(), "preferred");
    }

    #[test]
    fn test_missing_key_in_file() {
        let file = credentials_file("dns_dreamhost_key =\nother=1\n");
        let err = load_api_key(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Credentials { .. }));
        assert!(err.to_string().contains("dns_dreamhost_key"));
    }

    #[test]
    fn test_unreadable_file() {
        let err = load_api_key(Path::new("/nonexistent/credentials.ini")).unwrap_err();
        assert!(matches!(err, AppError::Credentials { .. }));
    }

    #[test]
    fn test_no_key_configured() {
        let err = resolve_api_key(&EnvConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
