use crate::error::{Result, RuleError};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// 环境变量前缀，例如 `FLUX_RULE_MODEL=mix`、`FLUX_RULE_LOGGING__LEVEL=debug`
pub const ENV_PREFIX: &str = "FLUX_RULE";

/// 执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModel {
    /// 按优先级顺序执行
    #[default]
    Sort,
    /// 按优先级顺序执行，由命名停止标记控制是否继续
    SortWithStopTag,
    /// 全部并发执行
    Concurrent,
    /// 先执行最高优先级规则，其余并发执行
    Mix,
    /// 混合模式，由命名停止标记决定是否执行其余规则
    MixWithStopTag,
}

impl ExecutionModel {
    pub fn uses_stop_tag(&self) -> bool {
        matches!(self, ExecutionModel::SortWithStopTag | ExecutionModel::MixWithStopTag)
    }
}

impl fmt::Display for ExecutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionModel::Sort => "sort",
            ExecutionModel::SortWithStopTag => "sort_with_stop_tag",
            ExecutionModel::Concurrent => "concurrent",
            ExecutionModel::Mix => "mix",
            ExecutionModel::MixWithStopTag => "mix_with_stop_tag",
        };
        f.write_str(name)
    }
}

/// 调度器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 执行模式
    pub model: ExecutionModel,

    /// 规则失败时是否继续执行后续规则（仅顺序模式）
    pub continue_on_error: bool,

    /// 停止标记名称（带停止标记的模式必填）
    pub stop_tag: Option<String>,

    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ExecutionModel::Sort,
            continue_on_error: true,
            stop_tag: None,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 指令
    pub level: String,

    /// 输出 JSON 格式
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// 从 TOML 文件加载，环境变量可覆盖文件中的值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RuleError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(env_source())
            .build()
            .map_err(|e| RuleError::Config(e.to_string()))?;

        Self::finish(config)
    }

    /// 从 TOML 字符串加载
    ///
    /// 只读取给定内容，不应用 `FLUX_RULE_*` 环境变量覆盖；需要覆盖时使用 [`EngineConfig::from_file`]。
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .map_err(|e| RuleError::Config(e.to_string()))?;

        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self> {
        let parsed: EngineConfig = config
            .try_deserialize()
            .map_err(|e| RuleError::Config(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.model.uses_stop_tag() {
            match self.stop_tag.as_deref() {
                Some(tag) if !tag.trim().is_empty() => {}
                _ => {
                    return Err(RuleError::Config(format!(
                        "model {} requires a non-empty stop_tag",
                        self.model
                    )))
                }
            }
        }

        if self.logging.level.trim().is_empty() {
            return Err(RuleError::Config("logging.level must not be empty".to_string()));
        }

        Ok(())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // 读取环境变量的测试需要串行执行
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.model, ExecutionModel::Sort);
        assert!(config.continue_on_error);
        assert!(config.stop_tag.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            model = "mix_with_stop_tag"
            continue_on_error = false
            stop_tag = "stop"

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.model, ExecutionModel::MixWithStopTag);
        assert!(!config.continue_on_error);
        assert_eq!(config.stop_tag.as_deref(), Some("stop"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = EngineConfig::from_toml_str(r#"model = "concurrent""#).unwrap();
        assert_eq!(config.model, ExecutionModel::Concurrent);
        assert!(config.continue_on_error);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_stop_tag_model_requires_tag() {
        let err = EngineConfig::from_toml_str(r#"model = "sort_with_stop_tag""#).unwrap_err();
        assert!(matches!(err, RuleError::Config(_)));

        let err = EngineConfig::from_toml_str(
            r#"
            model = "mix_with_stop_tag"
            stop_tag = "  "
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("stop_tag"));
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(EngineConfig::from_toml_str(r#"model = "random""#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("rule-engine.toml");
        fs::write(
            &path,
            r#"
            model = "sort_with_stop_tag"
            stop_tag = "halt"
            "#,
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.model, ExecutionModel::SortWithStopTag);
        assert_eq!(config.stop_tag.as_deref(), Some("halt"));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempdir().unwrap();
        let err = EngineConfig::from_file(temp_dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("rule-engine.toml");
        fs::write(
            &path,
            r#"
            model = "sort"
            continue_on_error = true

            [logging]
            level = "warn"
            "#,
        )
        .unwrap();

        std::env::set_var("FLUX_RULE_MODEL", "mix");
        std::env::set_var("FLUX_RULE_LOGGING__LEVEL", "debug");

        let from_file = EngineConfig::from_file(&path);
        let from_str = EngineConfig::from_toml_str(r#"model = "sort""#);

        std::env::remove_var("FLUX_RULE_MODEL");
        std::env::remove_var("FLUX_RULE_LOGGING__LEVEL");

        let config = from_file.unwrap();
        assert_eq!(config.model, ExecutionModel::Mix);
        assert_eq!(config.logging.level, "debug");
        assert!(config.continue_on_error);

        // 字符串加载不受环境变量影响
        assert_eq!(from_str.unwrap().model, ExecutionModel::Sort);
    }
}
