//! Runtime configuration from environment variables.
//!
//! Subscriber lists are comma-separated absolute http(s) URLs. A credential
//! bundle is all-or-nothing: cert, key and CA must be set together.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use url::Url;

use crate::dispatch::TlsBundle;

#[derive(Debug, Clone)]
pub struct Config {
    pub machine_failure_urls: Vec<Url>,
    pub truck_failure_urls: Vec<Url>,
    pub rate_update_urls: Vec<Url>,
    pub epoch_urls: Vec<Url>,
    pub rate_tls: Option<TlsBundle>,
    pub epoch_tls: Option<TlsBundle>,
    pub failure_period_days: u64,
    pub rate_period_days: u64,
    pub sim_day_ms: u64,
    pub sim_start_date: NaiveDate,
    /// Seed for reproducible draws; entropy when unset.
    pub sim_seed: Option<u64>,
    pub sim_days: u64,
    pub market_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            machine_failure_urls: Vec::new(),
            truck_failure_urls: Vec::new(),
            rate_update_urls: Vec::new(),
            epoch_urls: Vec::new(),
            rate_tls: None,
            epoch_tls: None,
            failure_period_days: 14,
            rate_period_days: 30,
            sim_day_ms: 120_000,
            sim_start_date: NaiveDate::from_ymd_opt(2050, 1, 1).unwrap_or(NaiveDate::MIN),
            sim_seed: None,
            sim_days: 60,
            market_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let num = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(v) => v.trim().parse().with_context(|| format!("{} must be an integer, got {:?}", key, v)),
                None => Ok(default),
            }
        };

        let cfg = Self {
            machine_failure_urls: parse_url_list(&get("MACHINE_FAILURE_URLS").unwrap_or_default())
                .context("MACHINE_FAILURE_URLS")?,
            truck_failure_urls: parse_url_list(&get("TRUCK_FAILURE_URLS").unwrap_or_default())
                .context("TRUCK_FAILURE_URLS")?,
            rate_update_urls: parse_url_list(&get("RATE_UPDATE_URLS").unwrap_or_default())
                .context("RATE_UPDATE_URLS")?,
            epoch_urls: parse_url_list(&get("EPOCH_URLS").unwrap_or_default()).context("EPOCH_URLS")?,
            rate_tls: tls_bundle(&get, "RATE")?,
            epoch_tls: tls_bundle(&get, "EPOCH")?,
            failure_period_days: num("FAILURE_PERIOD_DAYS", d.failure_period_days)?,
            rate_period_days: num("RATE_PERIOD_DAYS", d.rate_period_days)?,
            sim_day_ms: num("SIM_DAY_MS", d.sim_day_ms)?,
            sim_start_date: match get("SIM_START_DATE") {
                Some(v) => NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                    .with_context(|| format!("SIM_START_DATE must be YYYY-MM-DD, got {:?}", v))?,
                None => d.sim_start_date,
            },
            sim_seed: match get("SIM_SEED") {
                Some(v) => Some(v.trim().parse().with_context(|| format!("SIM_SEED must be an integer, got {:?}", v))?),
                None => None,
            },
            sim_days: num("SIM_DAYS", d.sim_days)?,
            market_file: get("MARKET_FILE").filter(|v| !v.trim().is_empty()).map(PathBuf::from),
        };

        if cfg.failure_period_days == 0 || cfg.rate_period_days == 0 {
            bail!("event periods must be at least one day");
        }
        if cfg.sim_day_ms == 0 {
            bail!("SIM_DAY_MS must be positive");
        }
        Ok(cfg)
    }
}

/// Split a comma-separated subscriber list. Blank entries are dropped; any
/// entry that is not an absolute http(s) URL fails the whole list.
pub fn parse_url_list(raw: &str) -> Result<Vec<Url>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let url = Url::parse(s).with_context(|| format!("invalid subscriber url {:?}", s))?;
            match url.scheme() {
                "http" | "https" => Ok(url),
                other => Err(anyhow!("unsupported scheme {:?} in subscriber url {:?}", other, s)),
            }
        })
        .collect()
}

fn tls_bundle<F>(get: &F, prefix: &str) -> Result<Option<TlsBundle>>
where
    F: Fn(&str) -> Option<String>,
{
    let path = |suffix: &str| get(&format!("{}_TLS_{}", prefix, suffix)).filter(|v| !v.trim().is_empty());
    match (path("CERT"), path("KEY"), path("CA")) {
        (None, None, None) => Ok(None),
        (Some(cert), Some(key), Some(ca)) => Ok(Some(TlsBundle {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
            ca_path: PathBuf::from(ca),
        })),
        _ => bail!("{0}_TLS_CERT, {0}_TLS_KEY and {0}_TLS_CA must be set together", prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.failure_period_days, 14);
        assert_eq!(cfg.rate_period_days, 30);
        assert!(cfg.machine_failure_urls.is_empty());
        assert!(cfg.rate_tls.is_none());
    }

    #[test]
    fn url_lists_are_trimmed_and_blank_entries_dropped() {
        let urls = parse_url_list(" http://a.test/hook , ,https://b.test/x,").unwrap();
        let urls: Vec<&str> = urls.iter().map(Url::as_str).collect();
        assert_eq!(urls, vec!["http://a.test/hook", "https://b.test/x"]);
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(parse_url_list("http://ok.test,not a url").is_err());
        assert!(parse_url_list("ftp://files.test/x").is_err());
    }

    #[test]
    fn partial_tls_bundle_is_an_error() {
        let err = Config::from_lookup(lookup(&[("RATE_TLS_CERT", "/c.pem")])).unwrap_err();
        assert!(format!("{:#}", err).contains("RATE_TLS_KEY"));
    }

    #[test]
    fn full_tls_bundle_and_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("EPOCH_TLS_CERT", "/c.pem"),
            ("EPOCH_TLS_KEY", "/k.pem"),
            ("EPOCH_TLS_CA", "/ca.pem"),
            ("RATE_PERIOD_DAYS", "7"),
            ("SIM_SEED", "99"),
            ("SIM_START_DATE", "2060-03-01"),
        ]))
        .unwrap();
        assert_eq!(cfg.epoch_tls.unwrap().key_path, PathBuf::from("/k.pem"));
        assert_eq!(cfg.rate_period_days, 7);
        assert_eq!(cfg.sim_seed, Some(99));
        assert_eq!(cfg.sim_start_date, NaiveDate::from_ymd_opt(2060, 3, 1).unwrap());
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(Config::from_lookup(lookup(&[("FAILURE_PERIOD_DAYS", "0")])).is_err());
    }
}
