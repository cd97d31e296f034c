use anyhow::{anyhow, bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use url::Url;

const DEFAULT_ES_HOST: &str = "http://localhost:9200";
const DEFAULT_ES_USERNAME: &str = "admin";
const DEFAULT_ES_PASSWORD: &str = "admin123";
const DEFAULT_ES_INDEX: &str = "random-walk";
const DEFAULT_STEP_STDDEV: f64 = 0.5;
const DEFAULT_START_VALUE: f64 = 100.0;
const DEFAULT_INTERVAL_SECONDS: f64 = 1.0;

const INDEX_FORBIDDEN_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ' '];

#[derive(Clone, Debug)]
pub struct Config {
    pub es_host: String,
    pub es_username: String,
    pub es_password: Option<String>,
    pub index_name: String,
    pub step_stddev: f64,
    pub start_value: f64,
    pub sample_interval: Duration,
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let es_host = normalize_host(&get("ES_HOST").unwrap_or_else(|| DEFAULT_ES_HOST.to_string()))?;
        let es_username = get("ES_USERNAME").unwrap_or_else(|| DEFAULT_ES_USERNAME.to_string());
        // An explicitly empty password disables it; only an unset one falls back to the default.
        let es_password = match lookup("ES_PASSWORD") {
            Some(raw) => Some(raw.trim().to_string()).filter(|v| !v.is_empty()),
            None => Some(DEFAULT_ES_PASSWORD.to_string()),
        };

        let index_name = get("ES_INDEX").unwrap_or_else(|| DEFAULT_ES_INDEX.to_string());
        validate_index_name(&index_name)?;

        let step_stddev = parse_f64(get("RW_STEP_STDDEV"), "RW_STEP_STDDEV", DEFAULT_STEP_STDDEV)?;
        if step_stddev < 0.0 {
            bail!("RW_STEP_STDDEV must be >= 0 (got {step_stddev})");
        }
        let start_value = parse_f64(get("RW_START_VALUE"), "RW_START_VALUE", DEFAULT_START_VALUE)?;
        let interval_seconds = parse_f64(
            get("RW_INTERVAL_SECONDS"),
            "RW_INTERVAL_SECONDS",
            DEFAULT_INTERVAL_SECONDS,
        )?;
        if interval_seconds < 0.0 {
            bail!("RW_INTERVAL_SECONDS must be >= 0 (got {interval_seconds})");
        }
        let sample_interval = Duration::try_from_secs_f64(interval_seconds)
            .with_context(|| format!("RW_INTERVAL_SECONDS out of range: {interval_seconds}"))?;

        let seed = get("RW_SEED")
            .map(|raw| raw.parse::<u64>().with_context(|| format!("invalid RW_SEED: {raw}")))
            .transpose()?;

        Ok(Self {
            es_host,
            es_username,
            es_password,
            index_name,
            step_stddev,
            start_value,
            sample_interval,
            seed,
        })
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }
}

fn parse_f64(raw: Option<String>, key: &str, default: f64) -> Result<f64> {
    let value = match raw {
        Some(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("invalid {key}: {raw}"))?,
        None => default,
    };
    if !value.is_finite() {
        bail!("{key} must be a finite number (got {value})");
    }
    Ok(value)
}

fn normalize_host(raw: &str) -> Result<String> {
    let url = Url::parse(raw).with_context(|| format!("invalid ES_HOST: {raw}"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => bail!("ES_HOST must use http or https (got {other})"),
    }
    if url.host_str().is_none() {
        return Err(anyhow!("ES_HOST missing host: {raw}"));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn validate_index_name(name: &str) -> Result<()> {
    if name == "." || name == ".." {
        bail!("ES_INDEX cannot be '.' or '..'");
    }
    if name.starts_with(['-', '_', '+']) {
        bail!("ES_INDEX cannot start with '-', '_' or '+' (got {name})");
    }
    if name.chars().any(|ch| ch.is_uppercase()) {
        bail!("ES_INDEX must be lowercase (got {name})");
    }
    if let Some(ch) = name.chars().find(|ch| INDEX_FORBIDDEN_CHARS.contains(ch)) {
        bail!("ES_INDEX contains forbidden character {ch:?} (got {name})");
    }
    Ok(())
}
