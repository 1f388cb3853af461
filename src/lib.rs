pub mod dispatch;
pub mod engine;
pub mod request;
pub mod settings;

pub use dispatch::{dispatch, launch, Launch, RunMode, RunOutcome};
pub use engine::{AppliedScript, MigrationEngine, RefineryEngine, RunReport};
pub use request::{validate, ConfigError, MigrationRequest};
pub use settings::{ConfigurationSource, LayeredSource, Settings};

// 版本信息
pub const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");
