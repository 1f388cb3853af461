use anyhow::Result;
use design_database::settings::SETTINGS_FILE;
use design_database::{launch, Launch, LayeredSource, RefineryEngine, Settings};
use std::process::ExitCode;
use tracing::{error, info};

/// 配置错误的退出码，此时还没有连接数据库
const EXIT_CONFIGURATION: u8 = 2;

fn main() -> Result<ExitCode> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("🚀 Design database migration starting");

    let source = LayeredSource::standard(SETTINGS_FILE);
    let settings = Settings::load(&source);

    // 引擎错误不在这里处理，直接以失败状态退出
    let outcome = match launch(&settings, &mut RefineryEngine::new())? {
        Launch::Completed(outcome) => outcome,
        Launch::Rejected(e) => {
            error!("❌ {}", e);
            return Ok(ExitCode::from(EXIT_CONFIGURATION));
        }
    };

    if outcome.report.is_up_to_date() {
        info!("✅ Migration finished ({:?}), nothing to apply", outcome.mode);
    } else {
        info!(
            "✅ Migration finished ({:?}, {} script(s) applied)",
            outcome.mode,
            outcome.report.applied.len()
        );
    }
    Ok(ExitCode::SUCCESS)
}
