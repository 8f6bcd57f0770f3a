use std::{path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;

use crate::{openai, openrouter};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")] Missing(&'static str),
    #[error("invalid value for {key}: {value}")] Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub image_model: String,
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub vision_model: String,
    pub vision_max_tokens: Option<u32>,
    pub template_dir: PathBuf,
    pub http_timeout: Duration,
    pub body_limit_bytes: usize,
    pub free_credits: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            port: parse(&get, "PORT", 8080)?,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: or("OPENAI_API_BASE", openai::DEFAULT_BASE_URL),
            image_model: or("OPENAI_IMAGE_MODEL", "gpt-image-1"),
            openrouter_api_key: required("OPENROUTER_API_KEY")?,
            openrouter_base_url: or("OPENROUTER_API_BASE", openrouter::DEFAULT_BASE_URL),
            vision_model: or("OPENROUTER_MODEL", "qwen/qwen2.5-vl-72b-instruct"),
            vision_max_tokens: get("OPENROUTER_MAX_TOKENS")
                .map(|v| v.parse().map_err(|_| ConfigError::Invalid { key: "OPENROUTER_MAX_TOKENS", value: v }))
                .transpose()?,
            template_dir: PathBuf::from(or("TEMPLATE_DIR", "public/adsTemplates")),
            http_timeout: Duration::from_secs(parse(&get, "HTTP_TIMEOUT_SECS", 120)?),
            body_limit_bytes: parse::<usize>(&get, "BODY_LIMIT_MB", 50)? * 1024 * 1024,
            free_credits: parse(&get, "FREE_CREDITS", 5)?,
        })
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match get(key) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const KEYS: [(&str, &str); 2] = [("OPENAI_API_KEY", "sk-1"), ("OPENROUTER_API_KEY", "or-1")];

    #[test]
    fn defaults_apply() {
        let cfg = config(&KEYS).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.image_model, "gpt-image-1");
        assert_eq!(cfg.openrouter_base_url, "https://openrouter.ai/api/v1");
        assert_eq!(cfg.vision_max_tokens, None);
        assert_eq!(cfg.template_dir, PathBuf::from("public/adsTemplates"));
        assert_eq!(cfg.http_timeout, Duration::from_secs(120));
        assert_eq!(cfg.body_limit_bytes, 50 * 1024 * 1024);
        assert_eq!(cfg.free_credits, 5);
    }

    #[test]
    fn overrides_are_read() {
        let mut vars = KEYS.to_vec();
        vars.extend([("PORT", "9000"), ("TEMPLATE_DIR", "/srv/templates"), ("OPENROUTER_MAX_TOKENS", "600"), ("HTTP_TIMEOUT_SECS", "30")]);
        let cfg = config(&vars).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.template_dir, PathBuf::from("/srv/templates"));
        assert_eq!(cfg.vision_max_tokens, Some(600));
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_keys_and_bad_numbers_fail() {
        assert_eq!(config(&[("OPENAI_API_KEY", "sk-1")]).unwrap_err(), ConfigError::Missing("OPENROUTER_API_KEY"));

        let mut vars = KEYS.to_vec();
        vars.push(("PORT", "eighty"));
        assert_eq!(config(&vars).unwrap_err(), ConfigError::Invalid { key: "PORT", value: "eighty".into() });
    }
}
