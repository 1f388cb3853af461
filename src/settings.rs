use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

pub const KEY_CONNECTION_STRING: &str = "ConnectionString:Design";
pub const KEY_SCRIPT_ROOT: &str = "ScriptRoot";
pub const KEY_ENVIRONMENT: &str = "Environment";
pub const KEY_TIMEOUT_SECOND: &str = "TimeoutSecond";
pub const KEY_DROP_BEFORE_RUN: &str = "DropBeforeRun";

/// 默认配置文件
pub const SETTINGS_FILE: &str = "appsettings.json";

/// 环境变量覆盖前缀，例如 `DESIGNDB_ConnectionString__Design`
pub const ENV_PREFIX: &str = "DESIGNDB";

/// 配置来源：按键读取原始字符串值
///
/// 键不存在返回 `Ok(None)`；只有读取本身失败才返回 `Err`。
pub trait ConfigurationSource {
    fn get(&self, key: &str) -> Result<Option<String>>;
}

/// `appsettings.json` 之上叠加环境变量层，后添加的层优先
pub fn builder(settings_file: &Path, environment: Environment) -> ConfigBuilder<DefaultState> {
    Config::builder()
        .add_source(File::from(settings_file).format(FileFormat::Json).required(true))
        .add_source(environment)
}

/// `DESIGNDB_` 前缀的环境变量，`__` 对应键中的 `:`
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

/// 分层配置来源
///
/// 构建失败只在构建时记录一次，之后所有键都视为不存在。
/// 键使用 `:` 分隔的嵌套路径，大小写不敏感。
#[derive(Debug)]
pub struct LayeredSource {
    document: Option<Value>,
}

impl LayeredSource {
    /// 默认配置栈（先加载 `.env`，如果文件存在的话）
    pub fn standard(settings_file: impl AsRef<Path>) -> Self {
        dotenv::dotenv().ok();
        Self::from_builder(builder(settings_file.as_ref(), environment()))
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Self {
        let document = builder
            .build()
            .and_then(|config| config.try_deserialize::<Value>())
            .context("failed to load configuration")
            .map_err(|e| warn!("⚠️  Error reading configuration: {:#}", e))
            .ok();

        Self { document }
    }
}

impl ConfigurationSource for LayeredSource {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.document.as_ref().and_then(|root| lookup(root, key)))
    }
}

fn lookup(root: &Value, key: &str) -> Option<String> {
    let mut node = root;
    for segment in key.split(':') {
        node = node
            .as_object()?
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(segment))
            .map(|(_, value)| value)?;
    }

    match node {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some(String::new()),
        // 对象和数组是节，没有值
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// 读取单个配置值；来源错误降级为"不存在"并记录日志
pub fn read(source: &dyn ConfigurationSource, key: &str) -> Option<String> {
    match source.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!("⚠️  Error reading configuration {}: {:#}", key, e);
            None
        }
    }
}

/// 启动时读取的五个原始配置值
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub connection_string: Option<String>,
    pub script_root: Option<String>,
    pub environment: Option<String>,
    pub timeout_second: Option<String>,
    pub drop_before_run: Option<String>,
}

impl Settings {
    pub fn load(source: &dyn ConfigurationSource) -> Self {
        Self {
            connection_string: read(source, KEY_CONNECTION_STRING),
            script_root: read(source, KEY_SCRIPT_ROOT),
            environment: read(source, KEY_ENVIRONMENT),
            timeout_second: read(source, KEY_TIMEOUT_SECOND),
            drop_before_run: read(source, KEY_DROP_BEFORE_RUN),
        }
    }
}
