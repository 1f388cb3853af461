pub mod postgres_runner;
pub mod scripts;

pub use postgres_runner::RefineryEngine;
pub use scripts::{discover_scripts, Script};

use crate::request::MigrationRequest;
use anyhow::Result;

/// 迁移引擎：增量执行，或者先删除再全部重建
///
/// 两个操作都是同步的，要么完成要么返回错误。
pub trait MigrationEngine {
    /// 执行所有未执行（或已变更）的脚本
    fn run(&mut self, request: &MigrationRequest) -> Result<RunReport>;

    /// 删除数据库结构后从头执行全部脚本
    fn drop_create(&mut self, request: &MigrationRequest) -> Result<RunReport>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedScript {
    pub version: i64,
    pub name: String,
}

/// 一次引擎调用实际执行的脚本
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub applied: Vec<AppliedScript>,
}

impl RunReport {
    pub fn is_up_to_date(&self) -> bool {
        self.applied.is_empty()
    }
}
