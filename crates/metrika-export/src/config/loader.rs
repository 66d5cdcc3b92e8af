use std::path::Path;

use reqwest::Url;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Validation { message });

    let db = &config.database;
    let has_url = db.url.as_deref().is_some_and(|u| !u.is_empty());
    let has_parts = db.host.is_some() && db.database.is_some() && db.username.is_some();
    if !has_url && !has_parts {
        return invalid(
            "database needs either url or host, database and username".to_string(),
        );
    }
    if db.max_connections == 0 {
        return invalid("database.max_connections must be at least 1".to_string());
    }

    let metrika = &config.metrika;
    if metrika.counter == 0 {
        return invalid("metrika.counter must be a positive counter id".to_string());
    }
    if !metrika.token.is_configured() {
        return invalid("metrika.token needs one of value, file or envVar".to_string());
    }
    if let Err(e) = Url::parse(&metrika.base_url) {
        return invalid(format!("metrika.base_url is not a URL: {e}"));
    }
    metrika.utc_offset()?;
    if metrika.request_timeout_secs == 0 {
        return invalid("metrika.request_timeout_secs must be positive".to_string());
    }

    let schedule = &config.schedule;
    for (name, secs) in [
        ("create_interval_secs", schedule.create_interval_secs),
        ("refresh_interval_secs", schedule.refresh_interval_secs),
        ("process_interval_secs", schedule.process_interval_secs),
    ] {
        if secs == 0 {
            return invalid(format!("schedule.{name} must be positive"));
        }
    }

    Ok(())
}
