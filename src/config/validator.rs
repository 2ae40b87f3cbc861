//! Config validation: defaults must be allowed values and limits must be usable.

use crate::config::Config;
use crate::error::ConfigError;

/// Upper bound for `API_REPORTS_TIME_WINDOW_MAX`: 100 years in seconds.
pub const REPORTS_TIME_WINDOW_CEILING: u64 = 100 * 365 * 86_400;

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let api = &config.api;

    if api.formats.is_empty() {
        return Err(ConfigError::Validation("FORMATS must list at least one format".into()));
    }
    if !api.formats.contains(&api.format_default) {
        return Err(ConfigError::Validation(format!(
            "FORMAT_DEFAULT '{}' is not one of FORMATS {:?}",
            api.format_default, api.formats
        )));
    }
    if !api.geo_formats.contains(&api.geo_format_default) {
        return Err(ConfigError::Validation(format!(
            "GEO_FORMAT_DEFAULT '{}' is not one of GEO_FORMATS",
            api.geo_format_default
        )));
    }
    if api.reports_time_window_max > REPORTS_TIME_WINDOW_CEILING {
        return Err(ConfigError::Validation(format!(
            "API_REPORTS_TIME_WINDOW_MAX must not exceed {} seconds",
            REPORTS_TIME_WINDOW_CEILING
        )));
    }
    if api.reports_time_window == 0 || api.reports_time_window > api.reports_time_window_max {
        return Err(ConfigError::Validation(format!(
            "API_REPORTS_TIME_WINDOW must be within 1..={}",
            api.reports_time_window_max
        )));
    }
    if api.reports_limit < 1 {
        return Err(ConfigError::Validation("API_REPORTS_LIMIT must be positive".into()));
    }
    if api.flood_state_min > api.flood_state_max {
        return Err(ConfigError::Validation(
            "API_FLOODS_STATE_MIN must not exceed API_FLOODS_STATE_MAX".into(),
        ));
    }
    if api.topojson_quantization < 2 {
        return Err(ConfigError::Validation("TOPOJSON_QUANTIZATION must be at least 2".into()));
    }
    if config.cache.enabled && (config.cache.ttl.is_zero() || config.cache.timeseries_ttl.is_zero()) {
        return Err(ConfigError::Validation("cache durations must be non-zero when CACHE is on".into()));
    }
    if config.database.timeout.is_zero() {
        return Err(ConfigError::Validation("PGTIMEOUT must be non-zero".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoFormat;
    use std::time::Duration;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn default_geo_format_must_be_allowed() {
        let mut config = Config::default();
        config.api.geo_formats = vec![GeoFormat::GeoJson];
        config.api.geo_format_default = GeoFormat::TopoJson;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn default_format_must_be_allowed() {
        let mut config = Config::default();
        config.api.format_default = "xml".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_ttl_only_rejected_while_caching() {
        let mut config = Config::default();
        config.cache.ttl = Duration::ZERO;
        assert!(validate(&config).is_err());
        config.cache.enabled = false;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn reports_window_max_is_capped() {
        let mut config = Config::default();
        config.api.reports_time_window_max = REPORTS_TIME_WINDOW_CEILING;
        assert!(validate(&config).is_ok());
        config.api.reports_time_window_max = u64::MAX;
        assert!(validate(&config).is_err());
    }
}
