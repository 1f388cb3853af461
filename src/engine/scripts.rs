use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// 脚本目录中的一个迁移文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub file_name: String,
    /// refinery 格式的迁移名，例如 `V3__add_orders`
    pub migration_name: String,
    /// `<env>.ENV.` 前缀标记的环境，没有则对所有环境生效
    pub environment: Option<String>,
    pub sql: String,
}

/// 扫描脚本目录，按环境过滤并按文件名排序
///
/// 文件名格式：`V001__create_users.sql`，或者只在某个环境执行的
/// `staging.ENV.V002__seed_users.sql`。
pub fn discover_scripts(dir: &Path, environments: &BTreeSet<String>) -> Result<Vec<Script>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read script directory {}", dir.display()))?;

    let name_regex = Regex::new(r"^(?:(?P<env>[^.]+)\.ENV\.)?(?P<name>[UV]\d+__\w+)$")?;
    let mut scripts = Vec::new();

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension() != Some(OsStr::new("sql")) {
            continue;
        }

        let (Some(file_name), Some(stem)) = (
            path.file_name().and_then(OsStr::to_str),
            path.file_stem().and_then(OsStr::to_str),
        ) else {
            warn!("⚠️  Skipping script with non UTF-8 name: {:?}", path);
            continue;
        };

        let Some(captures) = name_regex.captures(stem) else {
            warn!("⚠️  Skipping script with unrecognized name: {}", file_name);
            continue;
        };

        let environment = captures.name("env").map(|m| m.as_str().to_owned());
        if let Some(env) = &environment {
            if !environments.iter().any(|name| name.eq_ignore_ascii_case(env)) {
                debug!("跳过其他环境的脚本: {}", file_name);
                continue;
            }
        }

        let sql = fs::read_to_string(&path)
            .with_context(|| format!("failed to read script {}", path.display()))?;

        scripts.push(Script {
            file_name: file_name.to_owned(),
            migration_name: captures["name"].to_owned(),
            environment,
            sql,
        });
    }

    scripts.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    info!("📋 Found {} script(s) in {}", scripts.len(), dir.display());
    Ok(scripts)
}
