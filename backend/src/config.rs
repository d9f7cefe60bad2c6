use std::path::PathBuf;

use crate::error::ConfigError;
use crate::inference::CachePolicy;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MODEL_PATH: &str = "model.onnx";
pub const DEFAULT_STATIC_DIR: &str = "./static";
pub const DEFAULT_UPLOAD_LIMIT: usize = 1024 * 1024;
const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:8080", "http://127.0.0.1:8080"];

/// Configuration serveur, lue uniquement depuis l'environnement.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model_path: PathBuf,
    pub cache_policy: CachePolicy,
    pub static_dir: PathBuf,
    pub upload_limit: usize,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        // Comme avant: une valeur illisible retombe sur le nombre de CPU
        let workers = lookup("WORKERS")
            .and_then(|w| w.trim().parse::<usize>().ok())
            .filter(|w| *w > 0)
            .unwrap_or_else(num_cpus::get);

        let model_path = lookup("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));

        let cache_policy = match lookup("MODEL_CACHE") {
            Some(raw) => raw.parse::<CachePolicy>().map_err(|reason| ConfigError::Invalid {
                var: "MODEL_CACHE",
                value: raw.clone(),
                reason,
            })?,
            None => CachePolicy::Startup,
        };

        let static_dir = lookup("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        let upload_limit = match lookup("UPLOAD_LIMIT_BYTES") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                var: "UPLOAD_LIMIT_BYTES",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_UPLOAD_LIMIT,
        };

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            host,
            port,
            workers,
            model_path,
            cache_policy,
            static_dir,
            upload_limit,
            cors_origins,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_bind_all_interfaces_on_8080() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.model_path, PathBuf::from("model.onnx"));
        assert_eq!(config.cache_policy, CachePolicy::Startup);
        assert_eq!(config.upload_limit, DEFAULT_UPLOAD_LIMIT);
        assert_eq!(config.cors_origins.len(), 2);
        assert!(config.workers > 0);
    }

    #[test]
    fn port_comes_from_environment() {
        let config = config_from(&[("PORT", "9001")]).unwrap();
        assert_eq!(config.port, 9001);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().starts_with("PORT invalide"));
    }

    #[test]
    fn unreadable_workers_fall_back() {
        let config = config_from(&[("WORKERS", "beaucoup")]).unwrap();
        assert_eq!(config.workers, num_cpus::get());
        let config = config_from(&[("WORKERS", "3")]).unwrap();
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn model_settings() {
        let config = config_from(&[
            ("MODEL_PATH", "/srv/digits.onnx"),
            ("MODEL_CACHE", "per-request"),
        ])
        .unwrap();
        assert_eq!(config.model_path, PathBuf::from("/srv/digits.onnx"));
        assert_eq!(config.cache_policy, CachePolicy::PerRequest);

        assert!(config_from(&[("MODEL_CACHE", "sometimes")]).is_err());
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = config_from(&[("CORS_ORIGINS", "http://a.test, ,http://b.test ")]).unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }
}
