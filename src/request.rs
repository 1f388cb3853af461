use crate::settings::{
    Settings, KEY_CONNECTION_STRING, KEY_DROP_BEFORE_RUN, KEY_ENVIRONMENT, KEY_SCRIPT_ROOT,
    KEY_TIMEOUT_SECOND,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置校验错误，在连接数据库之前终止运行
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("The configuration value {key} is missing")]
    Missing { key: &'static str },

    #[error("The configuration value {key} is invalid: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl ConfigError {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Missing { key } | Self::Invalid { key, .. } => key,
        }
    }
}

/// 交给迁移引擎的请求
///
/// 只能由 [`validate`] 从完整校验过的配置构造，构造后不可修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    connection_string: String,
    version: Option<String>,
    repository_path: String,
    sql_files_directory: PathBuf,
    silent: bool,
    command_timeout: i32,
    environment_names: BTreeSet<String>,
    warn_on_one_time_script_changes: bool,
    drop_before_run: bool,
}

impl MigrationRequest {
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn repository_path(&self) -> &str {
        &self.repository_path
    }

    pub fn sql_files_directory(&self) -> &Path {
        &self.sql_files_directory
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    /// 命令超时（秒），原样转交引擎，本地不做范围检查
    pub fn command_timeout(&self) -> i32 {
        self.command_timeout
    }

    pub fn environment_names(&self) -> &BTreeSet<String> {
        &self.environment_names
    }

    pub fn warn_on_one_time_script_changes(&self) -> bool {
        self.warn_on_one_time_script_changes
    }

    pub fn drop_before_run(&self) -> bool {
        self.drop_before_run
    }
}

/// 校验原始配置并构造迁移请求
///
/// 按固定顺序检查，遇到第一个错误立即返回。
pub fn validate(settings: &Settings) -> Result<MigrationRequest, ConfigError> {
    let connection_string = required(&settings.connection_string, KEY_CONNECTION_STRING)?;
    let script_root = required(&settings.script_root, KEY_SCRIPT_ROOT)?;
    let environment = required(&settings.environment, KEY_ENVIRONMENT)?;
    let timeout_second = required(&settings.timeout_second, KEY_TIMEOUT_SECOND)?;
    let drop_before_run = required(&settings.drop_before_run, KEY_DROP_BEFORE_RUN)?;

    let command_timeout = parse_timeout(timeout_second)?;
    let drop_before_run = parse_flag(drop_before_run)?;

    Ok(MigrationRequest {
        connection_string: connection_string.to_owned(),
        version: crate::VERSION.map(str::to_owned),
        repository_path: String::new(),
        sql_files_directory: PathBuf::from(script_root),
        silent: true,
        command_timeout,
        environment_names: BTreeSet::from([environment.to_owned()]),
        warn_on_one_time_script_changes: true,
        drop_before_run,
    })
}

fn required<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, ConfigError> {
    match value.as_deref() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ConfigError::Missing { key }),
    }
}

fn parse_timeout(text: &str) -> Result<i32, ConfigError> {
    text.trim().parse().map_err(|_| ConfigError::Invalid {
        key: KEY_TIMEOUT_SECOND,
        value: text.to_owned(),
    })
}

fn parse_flag(text: &str) -> Result<bool, ConfigError> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigError::Invalid {
            key: KEY_DROP_BEFORE_RUN,
            value: text.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging() -> Settings {
        Settings {
            connection_string: Some("Server=x".to_owned()),
            script_root: Some("/scripts".to_owned()),
            environment: Some("staging".to_owned()),
            timeout_second: Some("30".to_owned()),
            drop_before_run: Some("false".to_owned()),
        }
    }

    fn slot<'a>(settings: &'a mut Settings, key: &str) -> &'a mut Option<String> {
        match key {
            KEY_CONNECTION_STRING => &mut settings.connection_string,
            KEY_SCRIPT_ROOT => &mut settings.script_root,
            KEY_ENVIRONMENT => &mut settings.environment,
            KEY_TIMEOUT_SECOND => &mut settings.timeout_second,
            KEY_DROP_BEFORE_RUN => &mut settings.drop_before_run,
            other => panic!("unknown key {other}"),
        }
    }

    const KEYS: [&str; 5] = [
        KEY_CONNECTION_STRING,
        KEY_SCRIPT_ROOT,
        KEY_ENVIRONMENT,
        KEY_TIMEOUT_SECOND,
        KEY_DROP_BEFORE_RUN,
    ];

    #[test]
    fn builds_request_from_valid_settings() {
        let request = validate(&staging()).unwrap();

        assert_eq!(request.connection_string(), "Server=x");
        assert_eq!(request.sql_files_directory(), Path::new("/scripts"));
        assert_eq!(request.command_timeout(), 30);
        assert_eq!(
            request.environment_names(),
            &BTreeSet::from(["staging".to_owned()])
        );
        assert!(!request.drop_before_run());
        assert!(request.silent());
        assert!(request.warn_on_one_time_script_changes());
        assert_eq!(request.repository_path(), "");
        assert_eq!(request.version(), Some(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn absent_key_is_reported_as_missing() {
        for key in KEYS {
            let mut settings = staging();
            *slot(&mut settings, key) = None;

            let err = validate(&settings).unwrap_err();
            assert_eq!(err, ConfigError::Missing { key });
            assert_eq!(err.to_string(), format!("The configuration value {key} is missing"));
        }
    }

    #[test]
    fn blank_key_is_reported_as_missing() {
        for key in KEYS {
            for blank in ["", "   ", "\t\n"] {
                let mut settings = staging();
                *slot(&mut settings, key) = Some(blank.to_owned());

                assert_eq!(validate(&settings).unwrap_err(), ConfigError::Missing { key });
            }
        }
    }

    #[test]
    fn first_failure_wins() {
        let settings = Settings {
            script_root: None,
            timeout_second: Some("abc".to_owned()),
            ..staging()
        };

        assert_eq!(validate(&settings).unwrap_err().key(), KEY_SCRIPT_ROOT);
        assert_eq!(validate(&Settings::default()).unwrap_err().key(), KEY_CONNECTION_STRING);
    }

    #[test]
    fn missing_drop_flag_beats_invalid_timeout() {
        let settings = Settings {
            timeout_second: Some("abc".to_owned()),
            drop_before_run: None,
            ..staging()
        };

        assert_eq!(
            validate(&settings).unwrap_err(),
            ConfigError::Missing { key: KEY_DROP_BEFORE_RUN }
        );
    }

    #[test]
    fn non_integer_timeout_is_invalid() {
        for raw in ["abc", "1.5", "30s", "99999999999"] {
            let settings = Settings {
                timeout_second: Some(raw.to_owned()),
                ..staging()
            };

            let err = validate(&settings).unwrap_err();
            assert_eq!(
                err,
                ConfigError::Invalid { key: KEY_TIMEOUT_SECOND, value: raw.to_owned() }
            );
            assert!(err.to_string().contains("TimeoutSecond is invalid"));
        }
    }

    #[test]
    fn zero_and_negative_timeouts_pass_through() {
        for (raw, expected) in [("0", 0), ("-5", -5), (" 45 ", 45), ("+7", 7)] {
            let settings = Settings {
                timeout_second: Some(raw.to_owned()),
                ..staging()
            };

            assert_eq!(validate(&settings).unwrap().command_timeout(), expected);
        }
    }

    #[test]
    fn drop_flag_accepts_any_case() {
        for (raw, expected) in [("true", true), ("TRUE", true), (" False ", false), ("false", false)] {
            let settings = Settings {
                drop_before_run: Some(raw.to_owned()),
                ..staging()
            };

            assert_eq!(validate(&settings).unwrap().drop_before_run(), expected);
        }
    }

    #[test]
    fn unrecognized_drop_flag_is_invalid() {
        for raw in ["maybe", "yes", "1"] {
            let settings = Settings {
                drop_before_run: Some(raw.to_owned()),
                ..staging()
            };

            assert_eq!(
                validate(&settings).unwrap_err(),
                ConfigError::Invalid { key: KEY_DROP_BEFORE_RUN, value: raw.to_owned() }
            );
        }
    }

    #[test]
    fn validation_is_repeatable() {
        let settings = staging();
        assert_eq!(validate(&settings).unwrap(), validate(&settings).unwrap());
    }
}
