use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// One validated page of the facet API answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Zero-based page number this page was requested with.
    pub number: u32,
    pub entries: Vec<Value>,
    /// Total number of pages for the query (or phase chunk).
    pub npages: u32,
    /// Total number of hits for the query (or phase chunk).
    pub count: u64,
}

#[derive(Debug, Deserialize)]
struct PageReply {
    #[serde(default)]
    error: Option<Value>,
    /// `None` only when the key is absent; `"out": null` is `Some(Null)`.
    #[serde(default, deserialize_with = "present")]
    out: Option<Value>,
    #[serde(default)]
    npages: Option<Value>,
    #[serde(default)]
    count: Option<Value>,
}

impl Page {
    /// A page standing for "no results".
    pub(crate) fn empty(number: u32) -> Self {
        Self {
            number,
            entries: Vec::new(),
            npages: 0,
            count: 0,
        }
    }

    pub fn is_last(&self) -> bool {
        self.npages == 0 || self.number + 1 >= self.npages
    }

    /// Parses and checks the minimal shape of a 200 answer.
    pub(crate) fn parse(number: u32, body: &str) -> Result<Self> {
        let malformed = |reason: String| Error::Malformed {
            page: number,
            reason,
        };

        let reply: PageReply = serde_json::from_str(body)
            .map_err(|e| malformed(format!("unreadable data obtained ({e})")))?;

        match reply.error {
            None | Some(Value::Null) | Some(Value::Bool(false)) => {}
            Some(Value::String(msg)) if msg.is_empty() => {}
            Some(Value::String(msg)) => return Err(Error::Api(msg)),
            Some(other) => return Err(Error::Api(other.to_string())),
        }

        let entries = match reply.out {
            Some(Value::Array(items)) => items,
            // The gateway sends `"out": null` or `false` for no hits.
            Some(Value::Null) | Some(Value::Bool(false)) => Vec::new(),
            Some(other) => {
                return Err(malformed(format!(
                    "`out` must be an array, got {}",
                    json_kind(&other)
                )));
            }
            None => return Err(malformed("missing `out`".to_string())),
        };

        if entries.is_empty() {
            return Ok(Self::empty(number));
        }

        let npages = unsigned(reply.npages, "npages").map_err(malformed)?;
        let npages = u32::try_from(npages).map_err(|_| malformed(format!("npages {npages} out of range")))?;
        let count = unsigned(reply.count, "count").map_err(malformed)?;

        if number >= npages {
            return Err(malformed(format!(
                "page number beyond declared npages ({npages})"
            )));
        }
        if let Some(bad) = entries.iter().position(|e| !e.is_object()) {
            return Err(malformed(format!(
                "entry {bad} is a {}, expected an object",
                json_kind(&entries[bad])
            )));
        }

        Ok(Self {
            number,
            entries,
            npages,
            count,
        })
    }
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn unsigned(value: Option<Value>, name: &str) -> std::result::Result<u64, String> {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| format!("`{name}` must be a non-negative integer, got {n}")),
        Some(other) => Err(format!(
            "`{name}` must be a non-negative integer, got {}",
            json_kind(&other)
        )),
        None => Err(format!("missing `{name}`")),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
