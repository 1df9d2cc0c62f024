use thiserror::Error;

/// 规则调度错误
#[derive(Error, Debug)]
pub enum RuleError {
    /// 规则执行失败（中止模式下作为整次运行的结果返回）
    #[error("rule: {rule} executed, error: {cause}")]
    Execution { rule: String, cause: anyhow::Error },

    #[error("Invalid rule set: {0}")]
    InvalidRuleSet(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Control store error: {0}")]
    Control(#[from] ControlError),
}

/// 控制存储读写错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("stop tag not found: {0}")]
    NotFound(String),

    #[error("stop tag {name} is not a boolean (found {found})")]
    TypeMismatch { name: String, found: &'static str },

    #[error("control store lock poisoned")]
    Poisoned,
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    /// 失败规则名称（仅执行错误携带）
    pub fn rule_name(&self) -> Option<&str> {
        match self {
            RuleError::Execution { rule, .. } => Some(rule),
            _ => None,
        }
    }
}
