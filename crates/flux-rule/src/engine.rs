use crate::config::{EngineConfig, ExecutionModel};
use crate::control::{ControlStore, StopTag};
use crate::error::{Result, RuleError};
use crate::rule_set::RuleSet;
use crate::task_group::RuleTaskGroup;
use crate::unit::SharedRule;
use tracing::{debug, error, info};

/// 规则调度引擎
///
/// 按不同的执行模式调度已排序的规则：
///
/// - 顺序模式：按优先级依次执行，可选择出错时中止或继续
/// - 并发模式：全部规则并发执行，忽略优先级
/// - 混合模式：先执行最高优先级规则，其余规则并发执行
///
/// 停止标记的极性在两类模式中相反：顺序模式在标记为 `false` 时停止，
/// 混合模式在标记为 `true` 时停止。
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    config: EngineConfig,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 顺序执行模式
    ///
    /// `continue_on_error` 为 true 时，某条规则出错只记录日志并继续执行后续规则；
    /// 否则立即返回该错误，后续规则不再执行。
    pub async fn execute(&self, rules: &RuleSet, continue_on_error: bool) -> Result<()> {
        if rules.is_empty() {
            return Ok(());
        }

        for rule in rules.sorted_rules() {
            run_in_order(rule, continue_on_error).await?;
        }

        Ok(())
    }

    /// 顺序执行模式，带命名停止标记
    ///
    /// 运行开始前在控制存储中创建 `stop_tag = false`。每条规则执行后读取该标记，
    /// 标记为 `false` 时停止，只有规则写入 `true` 才会继续执行下一条。
    /// 读取失败时记录日志并继续（退化为普通顺序模式）。
    pub async fn execute_with_stop_tag(
        &self,
        rules: &RuleSet,
        continue_on_error: bool,
        store: &dyn ControlStore,
        stop_tag: &str,
    ) -> Result<()> {
        store.add(stop_tag, false.into());
        if rules.is_empty() {
            return Ok(());
        }

        for rule in rules.sorted_rules() {
            run_in_order(rule, continue_on_error).await?;

            match store.get_bool(stop_tag) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(rule = %rule.name(), stop_tag = %stop_tag, "Stop tag is false, skipping remaining rules");
                    break;
                }
                Err(e) => {
                    error!(stop_tag = %stop_tag, error = %e, "Failed to read stop tag");
                }
            }
        }

        Ok(())
    }

    /// 顺序执行模式，带直接停止标记
    ///
    /// 语义同 [`execute_with_stop_tag`](Self::execute_with_stop_tag)，标记由调用方持有。
    pub async fn execute_with_stop_tag_direct(
        &self,
        rules: &RuleSet,
        continue_on_error: bool,
        stop_tag: &StopTag,
    ) -> Result<()> {
        if rules.is_empty() {
            return Ok(());
        }

        for rule in rules.sorted_rules() {
            run_in_order(rule, continue_on_error).await?;

            if !stop_tag.get() {
                debug!(rule = %rule.name(), "Stop tag is false, skipping remaining rules");
                break;
            }
        }

        Ok(())
    }

    /// 并发执行模式
    ///
    /// 不考虑优先级，每条规则一个任务，失败只记录日志。等待全部任务结束后返回。
    pub async fn execute_concurrent(&self, rules: &RuleSet) {
        if rules.is_empty() {
            return;
        }

        let mut group = RuleTaskGroup::new();
        group.extend(rules.entities().values().cloned());
        debug!(rules = group.len(), "Rules launched concurrently");

        let finished = group.wait_all().await;
        debug!(rules = finished, "Concurrent execution finished");
    }

    /// 混合执行模式
    ///
    /// 先同步执行最高优先级规则，再并发执行其余规则。
    pub async fn execute_mix_model(&self, rules: &RuleSet) {
        let Some((first, rest)) = rules.sorted_rules().split_first() else {
            return;
        };

        run_first(first).await;
        run_rest(rest).await;
    }

    /// 混合执行模式，带命名停止标记
    ///
    /// 运行开始前创建 `stop_tag = false`。最高优先级规则执行后读取标记，
    /// 标记为 `true` 时跳过其余全部规则。读取失败时记录日志，其余规则照常执行。
    pub async fn execute_mix_model_with_stop_tag(
        &self,
        rules: &RuleSet,
        store: &dyn ControlStore,
        stop_tag: &str,
    ) {
        store.add(stop_tag, false.into());
        let Some((first, rest)) = rules.sorted_rules().split_first() else {
            return;
        };

        run_first(first).await;

        match store.get_bool(stop_tag) {
            Ok(true) => {
                debug!(rule = %first.name(), stop_tag = %stop_tag, skipped = rest.len(), "Stop tag is true, skipping remaining rules");
            }
            Ok(false) => run_rest(rest).await,
            Err(e) => {
                error!(stop_tag = %stop_tag, error = %e, "Failed to read stop tag");
                run_rest(rest).await;
            }
        }
    }

    /// 混合执行模式，带直接停止标记
    pub async fn execute_mix_model_with_stop_tag_direct(&self, rules: &RuleSet, stop_tag: &StopTag) {
        let Some((first, rest)) = rules.sorted_rules().split_first() else {
            return;
        };

        run_first(first).await;

        if stop_tag.get() {
            debug!(rule = %first.name(), skipped = rest.len(), "Stop tag is true, skipping remaining rules");
            return;
        }

        run_rest(rest).await;
    }

    /// 按配置的执行模式运行
    pub async fn run(&self, rules: &RuleSet, store: Option<&dyn ControlStore>) -> Result<()> {
        let model = self.config.model;
        info!(model = %model, rules = rules.len(), "Running rule set");

        match model {
            ExecutionModel::Sort => self.execute(rules, self.config.continue_on_error).await,
            ExecutionModel::SortWithStopTag => {
                let (store, tag) = self.stop_tag_source(store)?;
                self.execute_with_stop_tag(rules, self.config.continue_on_error, store, tag)
                    .await
            }
            ExecutionModel::Concurrent => {
                self.execute_concurrent(rules).await;
                Ok(())
            }
            ExecutionModel::Mix => {
                self.execute_mix_model(rules).await;
                Ok(())
            }
            ExecutionModel::MixWithStopTag => {
                let (store, tag) = self.stop_tag_source(store)?;
                self.execute_mix_model_with_stop_tag(rules, store, tag).await;
                Ok(())
            }
        }
    }

    fn stop_tag_source<'a>(
        &'a self,
        store: Option<&'a dyn ControlStore>,
    ) -> Result<(&'a dyn ControlStore, &'a str)> {
        let store = store.ok_or_else(|| {
            RuleError::Config(format!("model {} requires a control store", self.config.model))
        })?;
        let tag = self
            .config
            .stop_tag
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                RuleError::Config(format!("model {} requires a stop_tag", self.config.model))
            })?;

        Ok((store, tag))
    }
}

/// 顺序模式下执行单条规则，按错误策略决定是否中止
async fn run_in_order(rule: &SharedRule, continue_on_error: bool) -> Result<()> {
    match rule.execute().await {
        Ok(()) => Ok(()),
        Err(e) if continue_on_error => {
            error!(rule = %rule.name(), error = %e, "Rule execution failed, continuing");
            Ok(())
        }
        Err(e) => Err(RuleError::Execution {
            rule: rule.name().to_string(),
            cause: e,
        }),
    }
}

/// 混合模式第一阶段：同步执行最高优先级规则，失败只记录日志
async fn run_first(rule: &SharedRule) {
    if let Err(e) = rule.execute().await {
        error!(rule = %rule.name(), error = %e, "Highest priority rule execution failed");
    }
}

/// 混合模式第二阶段：其余规则并发执行
async fn run_rest(rules: &[SharedRule]) {
    if rules.is_empty() {
        return;
    }

    let mut group = RuleTaskGroup::new();
    group.extend(rules.iter().cloned());
    group.wait_all().await;
}
