use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not reach MPDS API ({url})")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 401, 402 and 403 responses.
    #[error(
        "MPDS authentication/authorization failed (HTTP {status}: {}).\n- Check that MPDS_KEY or the `key:` entry in .mpdsrc holds a valid API key\n- Ensure your subscription covers the requested data\n\nServer message: {message}",
        describe_status(*.status)
    )]
    Unauthorized { status: u16, message: String },

    #[error("MPDS API rate limit hit (HTTP 429); slow down before retrying. Server message: {message}")]
    RateLimited { message: String },

    #[error("HTTP error code {status}: {} ({message})", describe_status(*.status))]
    Http { status: u16, message: String },

    /// The service answered 200 but reported an error in the body.
    #[error("MPDS API error: {0}")]
    Api(String),

    #[error("malformed page {page}: {reason}")]
    Malformed { page: u32, reason: String },

    #[error("too many hits ({count} > {limit}), please, be more specific")]
    TooManyHits { count: u64, limit: u64 },

    #[error("hits count has been changed during the query ({before} -> {after})")]
    CountChanged { before: u64, after: u64 },

    #[error("collected and declared counts of hits differ ({collected} != {declared})")]
    CountMismatch { collected: usize, declared: u64 },

    #[error("unknown data type `{0}`")]
    UnknownObjectType(String),

    #[error("invalid field expression `{expr}`: {reason}")]
    InvalidField { expr: String, reason: String },

    #[error("shape error: {0}")]
    Shape(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("i/o error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps a non-success HTTP answer to the matching error kind.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let message = error_message(body);
        match status {
            401..=403 => Self::Unauthorized { status, message },
            429 => Self::RateLimited { message },
            _ => Self::Http { status, message },
        }
    }

    /// The HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ErrorReply {
    #[serde(default)]
    error: Option<String>,
}

fn error_message(body: &str) -> String {
    // The gateway usually answers {"error": "..."}; fall back to the raw text.
    if let Ok(ErrorReply { error: Some(msg) }) = serde_json::from_str::<ErrorReply>(body) {
        return msg;
    }
    let text = body.trim();
    if text.is_empty() {
        "no details".to_string()
    } else {
        text.chars().take(512).collect()
    }
}

pub(crate) fn describe_status(status: u16) -> &'static str {
    match status {
        204 => "No Results",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Unauthorized (Payment Required)",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Too Much Data Given",
        429 => "Too Many Requests (Rate Limiting)",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Communication Error"),
    }
}
