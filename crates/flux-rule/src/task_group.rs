use crate::unit::SharedRule;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// 并发规则任务组
///
/// 每条规则一个任务，失败只记录日志；`wait_all` 是唯一的同步点。任务组不提供中止通道，
/// 需要取消语义的执行模式应在这里扩展，而不是改动调度策略本身。
pub(crate) struct RuleTaskGroup {
    tasks: JoinSet<()>,
}

impl RuleTaskGroup {
    pub(crate) fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
        }
    }

    /// 启动一条规则
    pub(crate) fn spawn(&mut self, rule: SharedRule) {
        self.tasks.spawn(async move {
            debug!(rule = %rule.name(), "Executing rule concurrently");
            if let Err(e) = rule.execute().await {
                error!(rule = %rule.name(), error = %e, "Rule execution failed");
            }
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// 等待全部任务结束，返回结束的任务数
    pub(crate) async fn wait_all(mut self) -> usize {
        let mut finished = 0;

        while let Some(result) = self.tasks.join_next().await {
            finished += 1;
            if let Err(e) = result {
                error!(error = %e, "Rule task join error");
            }
        }

        finished
    }
}

impl Extend<SharedRule> for RuleTaskGroup {
    fn extend<I: IntoIterator<Item = SharedRule>>(&mut self, rules: I) {
        for rule in rules {
            self.spawn(rule);
        }
    }
}
