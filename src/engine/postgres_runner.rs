use super::{discover_scripts, AppliedScript, MigrationEngine, RunReport};
use crate::request::MigrationRequest;
use anyhow::{anyhow, Context, Result};
use refinery::{Migration, Runner};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 当前用户拥有的 schema，以及 `public`
const OWNED_SCHEMAS_SQL: &str = "SELECT n.nspname FROM pg_namespace n \
     WHERE n.nspname = 'public' OR pg_get_userbyid(n.nspowner) = current_user";

/// PostgreSQL `statement_timeout` 的上限（毫秒）
const MAX_STATEMENT_TIMEOUT_MS: i64 = i32::MAX as i64;

/// 基于 Refinery 的 PostgreSQL 迁移引擎
///
/// Refinery 只能使用同步连接，所以整个运行都是同步的。
#[derive(Debug, Default)]
pub struct RefineryEngine;

impl RefineryEngine {
    pub fn new() -> Self {
        Self
    }

    fn load_migrations(request: &MigrationRequest) -> Result<Vec<Migration>> {
        let scripts = discover_scripts(
            request.sql_files_directory(),
            request.environment_names(),
        )?;

        scripts
            .iter()
            .map(|script| {
                Migration::unapplied(&script.migration_name, &script.sql)
                    .map_err(|e| anyhow!("invalid migration {}: {}", script.file_name, e))
            })
            .collect()
    }

    fn connect(request: &MigrationRequest) -> Result<postgres::Client> {
        let mut config = postgres::Config::from_str(request.connection_string())
            .context("解析数据库连接字符串失败")?;
        apply_command_timeout(&mut config, request.command_timeout());

        info!("🔌 Connecting to database...");
        config
            .connect(postgres::NoTls)
            .context("无法连接到数据库")
    }

    /// 删除当前用户的所有 schema（系统 schema 除外），再重建空的 `public`
    fn drop_schemas(client: &mut postgres::Client) -> Result<()> {
        let mut transaction = client.transaction().context("开启事务失败")?;

        let schemas: Vec<String> = transaction
            .query(OWNED_SCHEMAS_SQL, &[])
            .context("查询 schema 列表失败")?
            .iter()
            .map(|row| row.get(0))
            .collect();

        let sql = drop_schemas_sql(&schemas);
        warn!("🗑️  Dropping schemas: {}", sql);
        transaction
            .batch_execute(&sql)
            .context("删除数据库结构失败")?;
        transaction.commit().context("提交删除事务失败")
    }

    fn apply(
        client: &mut postgres::Client,
        request: &MigrationRequest,
        migrations: &[Migration],
    ) -> Result<RunReport> {
        // 开启 warn_on_one_time_script_changes 时，已执行脚本被修改只告警不中止
        let report = Runner::new(migrations)
            .set_abort_divergent(!request.warn_on_one_time_script_changes())
            .run(client)
            .map_err(|e| anyhow!("Refinery迁移执行失败: {}", e))?;

        let applied: Vec<AppliedScript> = report
            .applied_migrations()
            .iter()
            .map(|migration| AppliedScript {
                version: i64::from(migration.version()),
                name: migration.name().to_owned(),
            })
            .collect();

        for script in &applied {
            if request.silent() {
                debug!("  ✅ V{}: {}", script.version, script.name);
            } else {
                info!("  ✅ V{}: {}", script.version, script.name);
            }
        }

        if applied.is_empty() {
            info!("📊 数据库已是最新版本，无需迁移");
        } else {
            info!("📊 Applied {} migration(s)", applied.len());
        }

        Ok(RunReport { applied })
    }

    fn log_start(request: &MigrationRequest, what: &str) {
        info!(
            "🚀 Starting {} (version {}, environments {:?})",
            what,
            request.version().unwrap_or("unknown"),
            request.environment_names()
        );
        if request.command_timeout() <= 0 {
            warn!(
                "⚠️  Command timeout is {}s, statements run without a time limit",
                request.command_timeout()
            );
        }
    }
}

impl MigrationEngine for RefineryEngine {
    fn run(&mut self, request: &MigrationRequest) -> Result<RunReport> {
        Self::log_start(request, "incremental migration");

        let migrations = Self::load_migrations(request)?;
        let mut client = Self::connect(request)?;
        Self::apply(&mut client, request, &migrations)
    }

    fn drop_create(&mut self, request: &MigrationRequest) -> Result<RunReport> {
        Self::log_start(request, "drop and rebuild");

        let migrations = Self::load_migrations(request)?;
        let mut client = Self::connect(request)?;
        Self::drop_schemas(&mut client)?;
        Self::apply(&mut client, request, &migrations)
    }
}

/// 把命令超时叠加到连接配置上，保留连接字符串里已有的 `options` 和 `connect_timeout`
fn apply_command_timeout(config: &mut postgres::Config, timeout_seconds: i32) {
    let Some(option) = statement_timeout_option(timeout_seconds) else {
        return;
    };

    let options = match config.get_options() {
        Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), option),
        _ => option,
    };
    config.options(&options);

    if config.get_connect_timeout().is_none() {
        config.connect_timeout(Duration::from_secs(u64::from(timeout_seconds.unsigned_abs())));
    }
}

/// 将命令超时转换为 PostgreSQL 的 `statement_timeout` 连接选项；0 或负数表示不限制
fn statement_timeout_option(timeout_seconds: i32) -> Option<String> {
    if timeout_seconds <= 0 {
        return None;
    }

    let mut millis = i64::from(timeout_seconds) * 1000;
    if millis > MAX_STATEMENT_TIMEOUT_MS {
        warn!(
            "⚠️  Command timeout {}s exceeds the PostgreSQL limit, using {}ms",
            timeout_seconds, MAX_STATEMENT_TIMEOUT_MS
        );
        millis = MAX_STATEMENT_TIMEOUT_MS;
    }
    Some(format!("-c statement_timeout={millis}"))
}

fn is_system_schema(name: &str) -> bool {
    name.starts_with("pg_") || name == "information_schema"
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn drop_schemas_sql(schemas: &[String]) -> String {
    schemas
        .iter()
        .filter(|name| !is_system_schema(name))
        .map(|name| format!("DROP SCHEMA IF EXISTS {} CASCADE;", quote_ident(name)))
        .chain(std::iter::once("CREATE SCHEMA IF NOT EXISTS public;".to_owned()))
        .collect::<Vec<_>>()
        .join(" ")
}
