use crate::control::{ControlStore, StopTag};
use crate::error::{Result, RuleError};
use crate::unit::RuleUnit;
use async_trait::async_trait;
use rhai::{Engine, Scope, AST};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

const DEFAULT_MAX_OPERATIONS: u64 = 100_000;

/// Rhai 脚本规则
///
/// 脚本中可以读取常量 `RULE_NAME`；若工厂绑定了控制存储或停止标记，
/// 还可以调用 `set_flag` / `get_flag` / `set_stop` / `stop_tag`。
///
/// Rhai 求值是同步的。在多线程运行时上通过 `block_in_place` 让出工作线程；
/// 在单线程运行时上脚本直接在当前线程执行，并发阶段中的脚本规则会依次完成。
pub struct ScriptRule {
    name: String,
    priority: i64,
    engine: Arc<Engine>,
    ast: AST,
}

impl fmt::Debug for ScriptRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

#[async_trait]
impl RuleUnit for ScriptRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    async fn execute(&self) -> anyhow::Result<()> {
        if on_multi_thread_runtime() {
            tokio::task::block_in_place(|| self.run())
        } else {
            self.run()
        }
    }
}

impl ScriptRule {
    fn run(&self) -> anyhow::Result<()> {
        let mut scope = Scope::new();
        scope.push_constant("RULE_NAME", self.name.clone());

        self.engine
            .run_ast_with_scope(&mut scope, &self.ast)
            .map_err(|e| anyhow::anyhow!("script error: {}", e))
    }
}

fn on_multi_thread_runtime() -> bool {
    Handle::try_current()
        .map(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
        .unwrap_or(false)
}

/// 脚本规则工厂
///
/// 所有由同一工厂编译的规则共享一个 Rhai 引擎及其绑定。
#[derive(Clone)]
pub struct ScriptRuleFactory {
    engine: Arc<Engine>,
}

impl ScriptRuleFactory {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ScriptRuleFactoryBuilder {
        ScriptRuleFactoryBuilder::new()
    }

    /// 编译脚本为规则单元
    pub fn compile(&self, name: impl Into<String>, priority: i64, source: &str) -> Result<ScriptRule> {
        let name = name.into();
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| RuleError::Script(format!("rule {}: {}", name, e)))?;

        debug!(rule = %name, priority = priority, "Script rule compiled");

        Ok(ScriptRule {
            name,
            priority,
            engine: self.engine.clone(),
            ast,
        })
    }
}

impl Default for ScriptRuleFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// 脚本规则工厂构建器
pub struct ScriptRuleFactoryBuilder {
    store: Option<Arc<dyn ControlStore>>,
    stop_tag: Option<StopTag>,
    max_operations: u64,
}

impl ScriptRuleFactoryBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            stop_tag: None,
            max_operations: DEFAULT_MAX_OPERATIONS,
        }
    }

    /// 绑定控制存储：`set_flag(name, bool)` / `get_flag(name)`
    pub fn with_control_store(mut self, store: Arc<dyn ControlStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 绑定直接停止标记：`set_stop(bool)` / `stop_tag()`
    pub fn with_stop_tag(mut self, stop_tag: StopTag) -> Self {
        self.stop_tag = Some(stop_tag);
        self
    }

    pub fn max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    pub fn build(self) -> ScriptRuleFactory {
        let mut engine = Engine::new();
        engine.set_max_operations(self.max_operations);

        engine.on_print(|x| {
            info!("SCRIPT: {}", x);
        });

        if let Some(store) = self.store {
            let writer = store.clone();
            engine.register_fn("set_flag", move |name: &str, value: bool| {
                writer.add(name, value.into());
            });

            // 不存在或不是布尔值时按 false 处理
            let reader = store;
            engine.register_fn("get_flag", move |name: &str| -> bool {
                reader.get_bool(name).unwrap_or(false)
            });
        }

        if let Some(stop_tag) = self.stop_tag {
            let writer = stop_tag.clone();
            engine.register_fn("set_stop", move |value: bool| {
                writer.set(value);
            });

            engine.register_fn("stop_tag", move || -> bool { stop_tag.get() });
        }

        ScriptRuleFactory {
            engine: Arc::new(engine),
        }
    }
}

impl Default for ScriptRuleFactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
