use crate::config::LoggingConfig;
use crate::error::{Result, RuleError};
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// `RUST_LOG` 优先于配置中的级别。重复初始化返回错误而不是 panic。
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| RuleError::Config(format!("invalid log level {}: {}", config.level, e)))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| RuleError::Config(format!("failed to install subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "flux_rule=loud".to_string(),
            json: false,
        };
        assert!(matches!(init_logging(&config), Err(RuleError::Config(_))));
    }

    #[test]
    fn test_second_init_is_an_error() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
