use std::path::{Path, PathBuf};

use crate::client::{ClientConfig, DEFAULT_ENDPOINT};
use crate::error::{Error, Result};

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    key: Option<String>,
    endpoint: Option<String>,
    verify: Option<bool>,
}

pub(crate) fn load_config(
    key: Option<String>,
    endpoint: Option<String>,
    verify: Option<bool>,
) -> Result<ClientConfig> {
    let mut key = key.or_else(|| non_empty_env("MPDS_KEY"));
    let mut endpoint = endpoint.or_else(|| non_empty_env("MPDS_ENDPOINT"));

    let rc_candidates = rc_candidates();
    let mut file_verify: Option<bool> = None;

    if key.is_none() || endpoint.is_none() || verify.is_none() {
        for rc_path in &rc_candidates {
            if rc_path.exists() {
                let cfg = read_rc(rc_path)?;
                tracing::debug!(path = %rc_path.display(), "loaded MPDS settings");

                if key.is_none() {
                    key = cfg.key;
                }
                if endpoint.is_none() {
                    endpoint = cfg.endpoint;
                }
                file_verify = cfg.verify;
                break;
            }
        }
    }

    let Some(key) = key else {
        if rc_candidates.is_empty() {
            return Err(Error::Config(
                "missing API key (set MPDS_KEY or create .mpdsrc)".to_string(),
            ));
        }
        return Err(Error::Config(format!(
            "missing API key (set MPDS_KEY or put `key:` in one of: {})",
            rc_candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    };

    Ok(ClientConfig {
        endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        key,
        verify: verify.or(file_verify).unwrap_or(true),
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // `key:` may be alone on its line with the value on the next one.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !line.contains(':') || looks_like_url(line) {
                let v = strip_quotes(line).to_string();
                match pk {
                    "key" => cfg.key = Some(v),
                    "endpoint" => cfg.endpoint = Some(v),
                    _ => {}
                }
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            match k {
                "key" | "endpoint" if v.is_empty() => pending_key = Some(k),
                "key" => cfg.key = Some(v.to_string()),
                "endpoint" => cfg.endpoint = Some(v.to_string()),
                "verify" if !v.is_empty() => cfg.verify = Some(v != "0" && v != "false"),
                _ => {}
            }
        }
    }

    cfg
}

fn looks_like_url(line: &str) -> bool {
    let line = strip_quotes(line);
    line.starts_with("http://") || line.starts_with("https://")
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) MPDS_RC (explicit)
    // 2) ./.mpdsrc
    // 3) ~/.mpdsrc
    if let Some(p) = non_empty_env("MPDS_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".mpdsrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".mpdsrc"));
    }
    v
}
