pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod logging;
pub mod rule_set;
pub mod script;
mod task_group;
pub mod unit;

pub use config::{EngineConfig, ExecutionModel, LoggingConfig};
pub use control::{ControlStore, ControlValue, MemoryControlStore, StopTag};
pub use engine::RuleEngine;
pub use error::{ControlError, Result, RuleError};
pub use logging::init_logging;
pub use rule_set::RuleSet;
pub use script::{ScriptRule, ScriptRuleFactory, ScriptRuleFactoryBuilder};
pub use unit::{FnRule, RuleUnit, SharedRule};
