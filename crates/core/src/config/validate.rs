use super::{
    types::{Config, StoreBackend},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Repository identity, remote and branch are set
/// - Store prefixes are directory-like (end with `/`)
/// - The selected store backend has its section
/// - The scratch directory is not inside the working copy
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let repo = &config.repository;
    for (name, value) in [
        ("repository.remote", &repo.remote),
        ("repository.branch", &repo.branch),
        ("repository.user_name", &repo.user_name),
        ("repository.user_email", &repo.user_email),
        ("repository.recovery_message", &repo.recovery_message),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                name
            )));
        }
    }

    if repo.data_dir.is_absolute() {
        return Err(ConfigError::ValidationError(
            "repository.data_dir must be relative to the working copy".to_string(),
        ));
    }

    let store = &config.store;
    for (name, value) in [
        ("store.commit_prefix", &store.commit_prefix),
        ("store.release_prefix", &store.release_prefix),
    ] {
        if !value.ends_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "{} must end with '/'",
                name
            )));
        }
    }

    if store.marker_name.is_empty() || store.marker_name.contains('/') {
        return Err(ConfigError::ValidationError(
            "store.marker_name must be a plain object name".to_string(),
        ));
    }

    match store.backend {
        StoreBackend::Local if store.local.is_none() => {
            return Err(ConfigError::ValidationError(
                "store.backend = \"local\" requires a [store.local] section".to_string(),
            ));
        }
        StoreBackend::S3 => match &store.s3 {
            Some(s3) if !s3.bucket.is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "store.backend = \"s3\" requires [store.s3] with a bucket".to_string(),
                ));
            }
        },
        _ => {}
    }

    if config.pipeline.scratch_dir.starts_with(&repo.path) {
        return Err(ConfigError::ValidationError(
            "pipeline.scratch_dir must be outside the repository working copy".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use std::path::PathBuf;

    fn valid_config() -> Config {
        load_config_from_str(
            r#"
[repository]
path = "/srv/judger-data"
user_name = "oj-bot"
user_email = "oj-bot@example.com"

[store]
backend = "local"

[store.local]
root = "/srv/store"

[pipeline]
scratch_dir = "/tmp/oj3-judger-data-commit"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_empty_identity_fails() {
        let mut config = valid_config();
        config.repository.user_email = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("repository.user_email"));
    }

    #[test]
    fn test_validate_prefix_without_slash_fails() {
        let mut config = valid_config();
        config.store.commit_prefix = "judger/data-commit".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_s3_without_section_fails() {
        let mut config = valid_config();
        config.store.backend = StoreBackend::S3;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_scratch_inside_repository_fails() {
        let mut config = valid_config();
        config.pipeline.scratch_dir = PathBuf::from("/srv/judger-data/tmp");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_absolute_data_dir_fails() {
        let mut config = valid_config();
        config.repository.data_dir = PathBuf::from("/data");
        assert!(validate_config(&config).is_err());
    }
}
