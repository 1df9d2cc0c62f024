use flux_rule::{ControlError, ControlStore, ControlValue, FnRule, RuleEngine, RuleSet, SharedRule};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// 收集日志输出的内存写入器
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
    }

    fn count(&self, message: &str) -> usize {
        self.lines().iter().filter(|line| line.contains(message)).count()
    }
}

/// 安装只对当前线程生效的日志订阅者
fn capture() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    (logs, tracing::subscriber::set_default(subscriber))
}

/// 读取总是失败的控制存储
struct BrokenStore;

impl ControlStore for BrokenStore {
    fn add(&self, _name: &str, _value: ControlValue) {}

    fn get(&self, _name: &str) -> Result<ControlValue, ControlError> {
        Err(ControlError::Poisoned)
    }
}

/// r0..r{n-1}，优先级递减，`failing` 中的下标执行失败
fn rules(count: usize, failing: &[usize]) -> RuleSet {
    RuleSet::new((0..count).map(|i| -> SharedRule {
        let fails = failing.contains(&i);
        FnRule::shared(format!("r{}", i), 100 - i as i64, move || {
            if fails {
                anyhow::bail!("r{} failed", i);
            }
            Ok(())
        })
    }))
}

#[tokio::test]
async fn test_concurrent_logs_every_failure() {
    let (logs, _guard) = capture();

    RuleEngine::new().execute_concurrent(&rules(5, &[0, 2, 4])).await;

    let failures: Vec<String> = logs
        .lines()
        .into_iter()
        .filter(|line| line.contains("ERROR") && line.contains("Rule execution failed"))
        .collect();
    assert_eq!(failures.len(), 3, "captured: {:#?}", logs.lines());

    for name in ["r0", "r2", "r4"] {
        let tagged = format!("rule={}", name);
        assert!(
            failures.iter().any(|line| line.contains(&tagged)),
            "no failure line for {}",
            name
        );
    }
}

#[tokio::test]
async fn test_sort_continue_on_error_logs_each_failure() {
    let (logs, _guard) = capture();

    RuleEngine::new()
        .execute(&rules(4, &[1, 3]), true)
        .await
        .unwrap();

    assert_eq!(logs.count("Rule execution failed, continuing"), 2);
}

#[tokio::test]
async fn test_named_stop_tag_read_failure_is_logged() {
    let (logs, _guard) = capture();

    RuleEngine::new()
        .execute_with_stop_tag(&rules(3, &[]), true, &BrokenStore, "halt")
        .await
        .unwrap();

    let lines = logs.lines();
    let read_failures: Vec<&String> = lines
        .iter()
        .filter(|line| line.contains("Failed to read stop tag"))
        .collect();
    // 每条规则执行后各读取一次
    assert_eq!(read_failures.len(), 3);
    assert!(read_failures
        .iter()
        .all(|line| line.contains("ERROR") && line.contains("stop_tag=halt")));
}

#[tokio::test]
async fn test_mix_named_stop_tag_read_failure_is_logged() {
    let (logs, _guard) = capture();

    RuleEngine::new()
        .execute_mix_model_with_stop_tag(&rules(3, &[]), &BrokenStore, "halt")
        .await;

    assert_eq!(logs.count("Failed to read stop tag"), 1);
}

#[tokio::test]
async fn test_mix_first_rule_failure_is_logged() {
    let (logs, _guard) = capture();

    RuleEngine::new().execute_mix_model(&rules(3, &[0, 2])).await;

    assert_eq!(logs.count("Highest priority rule execution failed"), 1);
    // 其余规则在并发阶段失败
    assert_eq!(
        logs.lines()
            .iter()
            .filter(|line| line.contains("Rule execution failed") && line.contains("rule=r2"))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_clean_run_logs_no_errors() {
    let (logs, _guard) = capture();

    RuleEngine::new().execute_concurrent(&rules(3, &[])).await;

    assert!(logs.lines().iter().all(|line| !line.contains("ERROR")));
}
