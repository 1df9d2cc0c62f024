use flux_rule::{
    init_logging, ControlStore, EngineConfig, ExecutionModel, FnRule, LoggingConfig, MemoryControlStore,
    RuleEngine, RuleSet, ScriptRuleFactory, SharedRule, StopTag,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    init_logging(&LoggingConfig::default())?;

    println!("🚀 FLUX IOT - 规则调度演示\n");

    let engine = RuleEngine::new();

    println!("{}", "=".repeat(60));
    println!("示例 1: 按优先级顺序执行");
    println!("{}", "=".repeat(60));

    let rules = RuleSet::new(vec![
        FnRule::shared("记录日志", 10, || {
            println!("   -> 记录日志");
            Ok(())
        }),
        FnRule::shared("高温告警", 90, || {
            println!("   -> 高温告警");
            Ok(())
        }),
        FnRule::shared("风扇控制", 50, || Err(anyhow::anyhow!("fan_001 离线"))),
    ]);
    println!("执行顺序: {:?}", rules.names_by_priority());

    engine.execute(&rules, true).await?;
    println!("✅ 出错继续模式执行完成");

    match engine.execute(&rules, false).await {
        Ok(_) => println!("✅ 执行成功"),
        Err(e) => println!("❌ 出错中止: {}\n", e),
    }

    println!("{}", "=".repeat(60));
    println!("示例 2: 脚本规则 + 命名停止标记");
    println!("{}", "=".repeat(60));

    let store = MemoryControlStore::shared();
    let factory = ScriptRuleFactory::builder()
        .with_control_store(store.clone())
        .build();

    let scripted: Vec<SharedRule> = vec![
        Arc::new(factory.compile("回家模式", 100, r#"print("回家模式"); set_flag("continue", true);"#)?),
        Arc::new(factory.compile("开灯", 80, r#"print("开灯"); set_flag("continue", false);"#)?),
        Arc::new(factory.compile("开空调", 60, r#"print("开空调");"#)?),
    ];
    let scripted = RuleSet::new(scripted);

    // 顺序模式下标记为 true 才会继续，"开灯" 写回 false，"开空调" 不会执行
    engine
        .execute_with_stop_tag(&scripted, true, store.as_ref(), "continue")
        .await?;
    println!("✅ 停止标记: {:?}\n", store.get_bool("continue"));

    println!("{}", "=".repeat(60));
    println!("示例 3: 混合模式 + 直接停止标记");
    println!("{}", "=".repeat(60));

    let stop = StopTag::default();
    let stopper = stop.clone();
    let mixed = RuleSet::new(vec![
        FnRule::shared("安防检查", 100, move || {
            println!("   -> 安防检查: 发现入侵，跳过其余规则");
            stopper.set(true);
            Ok(())
        }),
        FnRule::shared("播放音乐", 10, || {
            println!("   -> 播放音乐");
            Ok(())
        }),
    ]);
    engine.execute_mix_model_with_stop_tag_direct(&mixed, &stop).await;
    println!("✅ 混合模式执行完成\n");

    println!("{}", "=".repeat(60));
    println!("示例 4: 按配置执行");
    println!("{}", "=".repeat(60));

    let config = EngineConfig::from_toml_str(
        r#"
        model = "concurrent"
        continue_on_error = true
        "#,
    )?;
    assert_eq!(config.model, ExecutionModel::Concurrent);

    RuleEngine::with_config(config).run(&rules, None).await?;
    println!("✅ 并发模式执行完成");

    Ok(())
}
