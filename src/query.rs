use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A search against the MPDS facet API.
///
/// The search part maps MPDS categories (`elements`, `classes`, `props`, ...)
/// to values; see <https://developer.mpds.io/#Categories>. Phase ids restrict
/// the search to given MPDS distinct phases.
///
/// ```
/// use mpds_client::Query;
///
/// let query = Query::new()
///     .elements("Ti-O")
///     .classes("binary")
///     .props("atomic structure")
///     .sgs(136);
/// assert_eq!(query.to_json(), r#"{"classes":"binary","elements":"Ti-O","props":"atomic structure","sgs":136}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    search: Map<String, Value>,
    phases: BTreeSet<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an arbitrary search category.
    pub fn with(mut self, category: impl Into<String>, value: impl Into<Value>) -> Self {
        self.search.insert(category.into(), value.into());
        self
    }

    pub fn elements(self, elements: impl Into<String>) -> Self {
        self.with("elements", elements.into())
    }

    pub fn classes(self, classes: impl Into<String>) -> Self {
        self.with("classes", classes.into())
    }

    pub fn props(self, props: impl Into<String>) -> Self {
        self.with("props", props.into())
    }

    pub fn lattices(self, lattices: impl Into<String>) -> Self {
        self.with("lattices", lattices.into())
    }

    pub fn formulae(self, formulae: impl Into<String>) -> Self {
        self.with("formulae", formulae.into())
    }

    pub fn sgs(self, space_group: u16) -> Self {
        self.with("sgs", space_group)
    }

    /// Restricts the search to the given phase ids. Duplicates collapse.
    pub fn phases(mut self, phases: impl IntoIterator<Item = u32>) -> Self {
        self.phases.extend(phases);
        self
    }

    pub fn search(&self) -> &Map<String, Value> {
        &self.search
    }

    pub fn get(&self, category: &str) -> Option<&Value> {
        self.search.get(category)
    }

    pub fn phase_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.phases.iter().copied()
    }

    /// The `q` parameter as sent on the wire.
    pub fn to_json(&self) -> String {
        Value::Object(self.search.clone()).to_string()
    }

    /// Splits the phase ids into at most `max_per_chunk`-sized contiguous
    /// chunks of nearly equal size, earlier chunks taking the remainder.
    /// A query without phases yields one empty chunk.
    pub(crate) fn phase_chunks(&self, max_per_chunk: usize) -> Vec<Vec<u32>> {
        let phases: Vec<u32> = self.phases.iter().copied().collect();
        let max_per_chunk = max_per_chunk.max(1);
        if phases.len() <= max_per_chunk {
            return vec![phases];
        }

        let nchunks = phases.len().div_ceil(max_per_chunk);
        let base = phases.len() / nchunks;
        let extra = phases.len() % nchunks;

        let mut chunks = Vec::with_capacity(nchunks);
        let mut rest = phases.as_slice();
        for i in 0..nchunks {
            let size = base + usize::from(i < extra);
            let (head, tail) = rest.split_at(size);
            chunks.push(head.to_vec());
            rest = tail;
        }
        chunks
    }
}

/// Query-string parameters of one page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub q: String,
    pub phases: String,
    pub page: u32,
    pub pagesize: u32,
}

impl PageRequest {
    pub(crate) fn new(query: &Query, phases: &[u32], page: u32, pagesize: u32) -> Self {
        Self {
            q: query.to_json(),
            phases: phases
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(","),
            page,
            pagesize,
        }
    }
}
