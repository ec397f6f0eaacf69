//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, DefaultsConfig, HeraldConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_defaults_config(&config.defaults)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.prefixes.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::validation(
            "Command prefixes must contain a non-whitespace character",
        ));
    }

    if bot.prefixes.is_empty() && !bot.mention_prefix {
        return Err(ConfigError::validation(
            "No prefixes configured and the mention prefix is disabled",
        ));
    }

    Ok(())
}

fn validate_defaults_config(defaults: &DefaultsConfig) -> ConfigResult<()> {
    if defaults.channel_types.is_empty() {
        return Err(ConfigError::validation(
            "Default channel types must allow at least one channel kind",
        ));
    }

    if let Some(throttle) = &defaults.throttle {
        if throttle.max == 0 {
            return Err(ConfigError::validation(
                "Throttle max must be greater than 0",
            ));
        }
        if throttle.window_ms == 0 {
            return Err(ConfigError::validation(
                "Throttle window must be greater than 0",
            ));
        }
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid log filter target: {target:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ThrottleConfig;
    use herald_core::{ChannelTypes, ThrottleScope};
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_config_is_valid() {
        assert_ok!(validate_config(&HeraldConfig::default()));
    }

    #[test]
    fn test_prefixes() {
        let mut config = HeraldConfig::default();
        config.bot.prefixes = vec!["!".into(), " ".into()];
        assert_err!(validate_config(&config));

        config.bot.prefixes.clear();
        assert_ok!(validate_config(&config));

        config.bot.mention_prefix = false;
        assert_err!(validate_config(&config));
    }

    #[test]
    fn test_throttle_values() {
        let mut config = HeraldConfig::default();
        config.defaults.throttle = Some(ThrottleConfig {
            scope: ThrottleScope::Guild,
            max: 0,
            window_ms: 1000,
        });
        assert_err!(validate_config(&config));

        config.defaults.throttle = Some(ThrottleConfig {
            scope: ThrottleScope::Guild,
            max: 3,
            window_ms: 0,
        });
        assert_err!(validate_config(&config));
    }

    #[test]
    fn test_channel_types_not_empty() {
        let mut config = HeraldConfig::default();
        config.defaults.channel_types = ChannelTypes::empty();
        assert_err!(validate_config(&config));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = HeraldConfig::default();
        config.logging.output = LogOutput::File;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "logging.file_path"));

        config.logging.file_path = Some("logs/herald.log".into());
        assert_ok!(validate_config(&config));
    }
}
