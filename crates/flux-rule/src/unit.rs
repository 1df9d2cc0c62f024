use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// 可执行规则单元
///
/// 由规则构建方产生，调度器只负责调用，从不构造或修改规则单元。
#[async_trait]
pub trait RuleUnit: Send + Sync {
    /// 规则名称（仅用于诊断日志）
    fn name(&self) -> &str;

    /// 优先级，数字越大优先级越高
    fn priority(&self) -> i64 {
        0
    }

    /// 执行规则
    async fn execute(&self) -> anyhow::Result<()>;
}

/// 共享的规则单元
pub type SharedRule = Arc<dyn RuleUnit>;

type RuleFn = dyn Fn() -> anyhow::Result<()> + Send + Sync;

/// 基于闭包的规则单元
pub struct FnRule {
    name: String,
    priority: i64,
    action: Box<RuleFn>,
}

impl FnRule {
    pub fn new<F>(name: impl Into<String>, priority: i64, action: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority,
            action: Box::new(action),
        }
    }

    pub fn shared<F>(name: impl Into<String>, priority: i64, action: F) -> SharedRule
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, priority, action))
    }
}

impl fmt::Debug for FnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

#[async_trait]
impl RuleUnit for FnRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    async fn execute(&self) -> anyhow::Result<()> {
        (self.action)()
    }
}
