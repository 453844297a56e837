use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fields::{Fields, ObjectType, Selector};

/// Paths a row must end with for [`CrystalData::from_row`].
pub const CRYSTAL_FIELDS: [&str; 5] = ["cell_abc", "sg_n", "setting", "basis_noneq", "els_noneq"];

/// Raw crystal structure parameters of one MPDS `S` entry.
///
/// Occupancies are not part of the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrystalData {
    /// `a, b, c, alpha, beta, gamma` (angstroms and degrees).
    pub cell_abc: [f64; 6],
    pub sg_n: u16,
    /// Space group setting, 1 or 2.
    pub setting: u8,
    /// Fractional coordinates of the non-equivalent atoms.
    pub basis_noneq: Vec<[f64; 3]>,
    /// Element symbols matching `basis_noneq`.
    pub els_noneq: Vec<String>,
}

impl CrystalData {
    /// The selection needed to build crystals from `S` entries.
    pub fn fields() -> Fields {
        Fields::select().with_selectors(
            ObjectType::S,
            CRYSTAL_FIELDS
                .iter()
                .map(|p| Selector::path(p).expect("built-in field paths compile"))
                .collect(),
        )
    }

    /// Extracts the structure from a row ending with [`CRYSTAL_FIELDS`].
    ///
    /// Returns `Ok(None)` for rows without a basis: property entries that
    /// matched the search, or structures with unit cell parameters only.
    pub fn from_row(row: &[Value]) -> Result<Option<Self>> {
        let Some(last) = row.last() else {
            return Ok(None);
        };
        if is_blank(last) {
            return Ok(None);
        }
        if row.len() < CRYSTAL_FIELDS.len() {
            return Err(Error::Shape(format!(
                "crystal row must end with {}, got {} value(s)",
                CRYSTAL_FIELDS.join(", "),
                row.len()
            )));
        }

        let tail = &row[row.len() - CRYSTAL_FIELDS.len()..];
        let bad = |what: &str, v: &Value| {
            Error::Shape(format!("cannot read {what} from {v}"))
        };

        let cell: Vec<f64> = numbers(&tail[0]).ok_or_else(|| bad("cell_abc", &tail[0]))?;
        let cell_abc: [f64; 6] = cell
            .try_into()
            .map_err(|_| bad("cell_abc", &tail[0]))?;

        let sg_n = integer(&tail[1])
            .and_then(|n| u16::try_from(n).ok())
            .filter(|n| (1..=230).contains(n))
            .ok_or_else(|| bad("sg_n", &tail[1]))?;

        let setting = match &tail[2] {
            Value::String(s) if s.trim() == "2" => 2,
            Value::Number(n) if n.as_u64() == Some(2) => 2,
            _ => 1,
        };

        let basis_noneq = match &tail[3] {
            Value::Array(sites) => sites
                .iter()
                .map(|site| {
                    numbers(site)
                        .and_then(|xyz| <[f64; 3]>::try_from(xyz).ok())
                        .ok_or_else(|| bad("basis_noneq", site))
                })
                .collect::<Result<Vec<_>>>()?,
            other => return Err(bad("basis_noneq", other)),
        };

        let els_noneq = match &tail[4] {
            Value::Array(els) => els
                .iter()
                .map(|e| e.as_str().map(str::to_string).ok_or_else(|| bad("els_noneq", e)))
                .collect::<Result<Vec<_>>>()?,
            other => return Err(bad("els_noneq", other)),
        };

        if els_noneq.len() != basis_noneq.len() {
            return Err(Error::Shape(format!(
                "{} element(s) for {} basis site(s)",
                els_noneq.len(),
                basis_noneq.len()
            )));
        }

        Ok(Some(Self {
            cell_abc,
            sg_n,
            setting,
            basis_noneq,
            els_noneq,
        }))
    }

    /// Chemical formula of the asymmetric unit, e.g. `O1Ti1`.
    pub fn noneq_formula(&self) -> String {
        let mut counts = std::collections::BTreeMap::<&str, usize>::new();
        for el in &self.els_noneq {
            *counts.entry(el.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(el, n)| format!("{el}{n}"))
            .collect()
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null | Value::Bool(false) => true,
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn numbers(v: &Value) -> Option<Vec<f64>> {
    v.as_array()?.iter().map(Value::as_f64).collect()
}

fn integer(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
