//! Field selection: reduces raw MPDS entries to rows.
//!
//! Entries come in three flavors, told apart by `object_type`:
//! `S` (crystal structures), `P` (physical properties) and `C` (phase
//! diagrams). For each flavor a list of [`Selector`]s picks the values of
//! one output row. See <https://developer.mpds.io/#JSON-schemata>.

use jmespath::Expression;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectType {
    /// Crystal structure entry.
    S,
    /// Physical property entry.
    P,
    /// Phase diagram entry.
    C,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::P => "P",
            Self::C => "C",
        }
    }

    /// Reads the `object_type` of a raw entry.
    pub fn of(entry: &Value) -> Result<Self> {
        match entry.get("object_type") {
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(Error::UnknownObjectType(other.to_string())),
            None => Err(Error::UnknownObjectType("(missing)".to_string())),
        }
    }
}

impl FromStr for ObjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "S" => Ok(Self::S),
            "P" => Ok(Self::P),
            "C" => Ok(Self::C),
            other => Err(Error::UnknownObjectType(other.to_string())),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled JMESPath expression like `sample.measurement[0].property.name`.
#[derive(Clone)]
pub struct FieldPath {
    expr: String,
    compiled: Rc<Expression<'static>>,
}

impl FieldPath {
    pub fn compile(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        let compiled = jmespath::compile(expr).map_err(|e| Error::InvalidField {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expr: expr.to_string(),
            compiled: Rc::new(compiled),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// Evaluates the expression; anything missing along the way gives null.
    pub fn search(&self, entry: &Value) -> Result<Value> {
        let invalid = |reason: String| Error::InvalidField {
            expr: self.expr.clone(),
            reason,
        };
        let found = self
            .compiled
            .search(entry)
            .map_err(|e| invalid(e.to_string()))?;
        serde_json::to_value(&*found).map_err(|e| invalid(e.to_string()))
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldPath").field(&self.expr).finish()
    }
}

impl PartialEq for FieldPath {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl Eq for FieldPath {}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::compile(s)
    }
}

/// One output column: a looked-up path or a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Path(FieldPath),
    Const(Value),
}

impl Selector {
    pub fn path(expr: &str) -> Result<Self> {
        FieldPath::compile(expr).map(Self::Path)
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Const(value.into())
    }

    pub fn select(&self, entry: &Value) -> Result<Value> {
        match self {
            Self::Path(p) => p.search(entry),
            Self::Const(v) => Ok(v.clone()),
        }
    }
}

/// Output selection per object type.
///
/// An empty selection means entries are returned as they came.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields {
    selectors: BTreeMap<ObjectType, Vec<Selector>>,
}

/// Column titles matching [`Fields::default`].
pub const DEFAULT_TITLES: [&str; 7] = ["Phase", "Formula", "SG", "Entry", "Property", "Units", "Value"];

impl Default for Fields {
    /// The seven-column layout shared by all entry types.
    fn default() -> Self {
        let path = |expr: &str| Selector::path(expr).expect("built-in field paths compile");
        let structures = vec![
            path("phase_id"),
            path("chemical_formula"),
            path("sg_n"),
            path("entry"),
            Selector::constant("crystal structure"),
            Selector::constant("A"),
        ];
        let properties = vec![
            path("sample.material.phase_id"),
            path("sample.material.chemical_formula"),
            path("sample.material.condition[0].scalar[0].value"),
            path("sample.material.entry"),
            path("sample.measurement[0].property.name"),
            path("sample.measurement[0].property.units"),
            path("sample.measurement[0].property.scalar"),
        ];
        let diagrams = vec![
            Selector::Const(Value::Null),
            path("title"),
            Selector::Const(Value::Null),
            path("entry"),
            Selector::constant("phase diagram"),
            path("naxes"),
            path("arity"),
        ];
        Self {
            selectors: BTreeMap::from([
                (ObjectType::S, structures),
                (ObjectType::P, properties),
                (ObjectType::C, diagrams),
            ]),
        }
    }
}

impl Fields {
    /// No selection: entries are kept whole.
    pub fn raw() -> Self {
        Self {
            selectors: BTreeMap::new(),
        }
    }

    /// Starts an empty selection to fill with [`Fields::with`].
    pub fn select() -> Self {
        Self::raw()
    }

    /// Sets the paths for one object type.
    ///
    /// ```
    /// use mpds_client::{Fields, ObjectType};
    ///
    /// let fields = Fields::select()
    ///     .with(ObjectType::P, ["sample.material.phase_id", "sample.material.chemical_formula"])
    ///     .unwrap();
    /// assert!(!fields.is_raw());
    /// ```
    pub fn with<I, S>(self, object_type: ObjectType, paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selectors = paths
            .into_iter()
            .map(|p| Selector::path(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_selectors(object_type, selectors))
    }

    pub fn with_selectors(mut self, object_type: ObjectType, selectors: Vec<Selector>) -> Self {
        self.selectors.insert(object_type, selectors);
        self
    }

    pub fn is_raw(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn selectors(&self, object_type: ObjectType) -> &[Selector] {
        self.selectors
            .get(&object_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reduces one raw entry to its output form.
    pub fn apply(&self, entry: Value) -> Result<Value> {
        if self.is_raw() {
            return Ok(entry);
        }
        let object_type = ObjectType::of(&entry)?;
        let row = self
            .selectors(object_type)
            .iter()
            .map(|s| s.select(&entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(row))
    }
}
