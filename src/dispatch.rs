use crate::engine::{MigrationEngine, RunReport};
use crate::request::{validate, ConfigError, MigrationRequest};
use crate::settings::Settings;
use anyhow::Result;
use tracing::info;

/// 本次运行选择的执行路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DropAndRun,
    IncrementalRun,
}

impl RunMode {
    pub fn for_request(request: &MigrationRequest) -> Self {
        if request.drop_before_run() {
            Self::DropAndRun
        } else {
            Self::IncrementalRun
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub mode: RunMode,
    pub report: RunReport,
}

/// 按 `drop_before_run` 调用引擎的两个操作之一，且只调用一次
///
/// 引擎错误原样向上传播，这里不做任何恢复。
pub fn dispatch<E>(request: MigrationRequest, engine: &mut E) -> Result<RunOutcome>
where
    E: MigrationEngine + ?Sized,
{
    let mode = RunMode::for_request(&request);
    info!("📋 Run mode: {:?}", mode);

    let report = match mode {
        RunMode::DropAndRun => engine.drop_create(&request)?,
        RunMode::IncrementalRun => engine.run(&request)?,
    };

    Ok(RunOutcome { mode, report })
}

/// 一次启动的结果：配置被拒绝（未调用引擎），或者引擎执行完成
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    Rejected(ConfigError),
    Completed(RunOutcome),
}

/// 校验配置，通过后再交给 [`dispatch`]；校验失败时引擎一次都不会被调用
pub fn launch<E>(settings: &Settings, engine: &mut E) -> Result<Launch>
where
    E: MigrationEngine + ?Sized,
{
    let request = match validate(settings) {
        Ok(request) => request,
        Err(e) => return Ok(Launch::Rejected(e)),
    };

    dispatch(request, engine).map(Launch::Completed)
}
