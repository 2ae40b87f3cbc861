//! Server configuration read from the environment (optionally seeded from `.env`).

use crate::error::ConfigError;
use crate::geo::GeoFormat;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_DATABASE_URL: &str = "postgres://postgres@localhost:5432/cognicity";
pub const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PG_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CACHE_SECS: u64 = 300;
pub const DEFAULT_TIMESERIES_CACHE_SECS: u64 = 60;
pub const DEFAULT_BODY_LIMIT: usize = 100_000;
pub const DEFAULT_REPORTS_TIME_WINDOW: u64 = 3600;
pub const DEFAULT_REPORTS_TIME_WINDOW_MAX: u64 = 604_800;
pub const DEFAULT_REPORTS_LIMIT: i64 = 1000;
pub const DEFAULT_TOPOJSON_QUANTIZATION: u32 = 10_000;

#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub api: ApiConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub body_limit: usize,
    pub cors: bool,
    /// Headers exposed to cross-origin callers.
    pub cors_headers: Vec<String>,
    /// Gzip responses. Ignored while caching is enabled.
    pub compress: bool,
    pub response_time: bool,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Upper bound on every single query.
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub timeseries_ttl: Duration,
}

/// Everything the route layer needs: query allow-lists, defaults and limits.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub version: String,
    /// Region codes accepted for `city`. Empty means every `city` value is rejected.
    pub region_codes: Vec<String>,
    pub formats: Vec<String>,
    pub format_default: String,
    pub geo_formats: Vec<GeoFormat>,
    pub geo_format_default: GeoFormat,
    /// Default `/reports` lookback in seconds.
    pub reports_time_window: u64,
    pub reports_time_window_max: u64,
    pub reports_limit: i64,
    pub flood_state_min: i32,
    pub flood_state_max: i32,
    pub topojson_quantization: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            region_codes: Vec::new(),
            formats: vec!["json".to_string()],
            format_default: "json".to_string(),
            geo_formats: vec![GeoFormat::GeoJson, GeoFormat::TopoJson],
            geo_format_default: GeoFormat::TopoJson,
            reports_time_window: DEFAULT_REPORTS_TIME_WINDOW,
            reports_time_window_max: DEFAULT_REPORTS_TIME_WINDOW_MAX,
            reports_limit: DEFAULT_REPORTS_LIMIT,
            flood_state_min: 1,
            flood_state_max: 4,
            topojson_quantization: DEFAULT_TOPOJSON_QUANTIZATION,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: DEFAULT_PORT,
                body_limit: DEFAULT_BODY_LIMIT,
                cors: true,
                cors_headers: vec!["Content-Length".to_string(), "Content-Type".to_string()],
                compress: false,
                response_time: true,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_PG_MAX_CONNECTIONS,
                timeout: Duration::from_millis(DEFAULT_PG_TIMEOUT_MS),
            },
            cache: CacheConfig {
                enabled: true,
                ttl: Duration::from_secs(DEFAULT_CACHE_SECS),
                timeseries_ttl: Duration::from_secs(DEFAULT_TIMESERIES_CACHE_SECS),
            },
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Load from environment variables on top of the defaults, then validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Config::default();
        let env = Env(&lookup);

        let geo_formats = match env.get("GEO_FORMATS") {
            Some(raw) => split_list(&raw)
                .iter()
                .map(|s| parse_geo_format("GEO_FORMATS", s))
                .collect::<Result<Vec<_>, _>>()?,
            None => d.api.geo_formats,
        };
        let geo_format_default = match env.get("GEO_FORMAT_DEFAULT") {
            Some(raw) => parse_geo_format("GEO_FORMAT_DEFAULT", &raw)?,
            None => d.api.geo_format_default,
        };

        let config = Config {
            server: ServerConfig {
                port: env.parse("PORT", d.server.port)?,
                body_limit: env.parse("BODY_LIMIT", d.server.body_limit)?,
                cors: env.parse("CORS", d.server.cors)?,
                cors_headers: env.list("CORS_HEADERS", d.server.cors_headers),
                compress: env.parse("COMPRESS", d.server.compress)?,
                response_time: env.parse("RESPONSE_TIME", d.server.response_time)?,
            },
            database: DatabaseConfig {
                url: env.get("DATABASE_URL").unwrap_or(d.database.url),
                max_connections: env.parse("PG_MAX_CONNECTIONS", d.database.max_connections)?,
                timeout: Duration::from_millis(env.parse("PGTIMEOUT", DEFAULT_PG_TIMEOUT_MS)?),
            },
            cache: CacheConfig {
                enabled: env.parse("CACHE", d.cache.enabled)?,
                ttl: Duration::from_secs(env.parse("CACHE_DURATION_SECS", DEFAULT_CACHE_SECS)?),
                timeseries_ttl: Duration::from_secs(
                    env.parse("CACHE_TIMESERIES_DURATION_SECS", DEFAULT_TIMESERIES_CACHE_SECS)?,
                ),
            },
            api: ApiConfig {
                version: env.get("API_VERSION").unwrap_or(d.api.version),
                region_codes: env.list("REGION_CODES", d.api.region_codes),
                formats: env.list("FORMATS", d.api.formats),
                format_default: env.get("FORMAT_DEFAULT").unwrap_or(d.api.format_default),
                geo_formats,
                geo_format_default,
                reports_time_window: env.parse("API_REPORTS_TIME_WINDOW", d.api.reports_time_window)?,
                reports_time_window_max: env
                    .parse("API_REPORTS_TIME_WINDOW_MAX", d.api.reports_time_window_max)?,
                reports_limit: env.parse("API_REPORTS_LIMIT", d.api.reports_limit)?,
                flood_state_min: env.parse("API_FLOODS_STATE_MIN", d.api.flood_state_min)?,
                flood_state_max: env.parse("API_FLOODS_STATE_MAX", d.api.flood_state_max)?,
                topojson_quantization: env
                    .parse("TOPOJSON_QUANTIZATION", d.api.topojson_quantization)?,
            },
        };
        crate::config::validate(&config)?;
        Ok(config)
    }
}

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key,
                message: format!("cannot parse '{}'", raw),
            }),
            None => Ok(default),
        }
    }

    fn list(&self, key: &str, default: Vec<String>) -> Vec<String> {
        self.get(key).map(|raw| split_list(&raw)).unwrap_or(default)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_geo_format(key: &'static str, raw: &str) -> Result<GeoFormat, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        message: format!("unknown geo format '{}'", raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.api.region_codes.is_empty());
        assert_eq!(config.api.geo_format_default, GeoFormat::TopoJson);
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.timeseries_ttl, Duration::from_secs(60));
        assert_eq!(config.database.timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn reads_lists_and_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("REGION_CODES", "jbd, sby ,bdg"),
            ("GEO_FORMAT_DEFAULT", "geojson"),
            ("PGTIMEOUT", "2500"),
            ("API_VERSION", "3.1.4"),
        ]))
        .unwrap();
        assert_eq!(config.api.region_codes, vec!["jbd", "sby", "bdg"]);
        assert_eq!(config.api.geo_format_default, GeoFormat::GeoJson);
        assert_eq!(config.database.timeout, Duration::from_millis(2500));
        assert_eq!(config.api.version, "3.1.4");
    }

    #[test]
    fn rejects_unparseable_values() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
        let err = Config::from_lookup(lookup(&[("GEO_FORMATS", "geojson,cap")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "GEO_FORMATS", .. }));
    }
}
