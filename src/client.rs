use indicatif::{ProgressBar, ProgressStyle};
use std::thread;
use std::time::Duration;

use crate::config::load_config;
use crate::crystal::CrystalData;
use crate::error::{Error, Result};
use crate::fields::{DEFAULT_TITLES, Fields};
use crate::page::Page;
use crate::query::{PageRequest, Query};
use crate::result::ResultSet;
use crate::table::Table;
use crate::transport::{HttpTransport, Transport};

/// Public MPDS facet gateway.
pub const DEFAULT_ENDPOINT: &str = "https://api.mpds.io/v0/download/facet";

pub const DEFAULT_PAGESIZE: u32 = 1000;
/// One hit may take ~50 kB in memory; pagesize * max_pages bounds a retrieval.
pub const DEFAULT_MAX_PAGES: u32 = 100;
/// More phases than this are split over several paginated requests.
pub const DEFAULT_MAX_PHASES: usize = 1500;
/// Pause between page requests. Values below 2 s strain the service.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(2);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const COUNT_PAGESIZE: u32 = 10;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Facet endpoint, typically [`DEFAULT_ENDPOINT`].
    pub endpoint: String,
    /// MPDS API key, sent in the `Key` header.
    pub key: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

#[derive(Debug, Clone)]
pub struct Client<T = HttpTransport> {
    endpoint: String,
    key: String,
    verify: bool,

    pagesize: u32,
    max_pages: u32,
    max_phases: usize,
    pause: Duration,
    progress: bool,

    transport: T,
}

impl Client<HttpTransport> {
    /// Creates a client from `MPDS_KEY` / `MPDS_ENDPOINT` and/or `.mpdsrc`.
    ///
    /// This is equivalent to `Client::new(None, None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `key`/`endpoint` arguments
    /// - environment variables `MPDS_KEY` / `MPDS_ENDPOINT`
    /// - config file from `MPDS_RC` or `.mpdsrc`
    pub fn new(key: Option<String>, endpoint: Option<String>, verify: Option<bool>) -> Result<Self> {
        let cfg = load_config(key, endpoint, verify)?;
        let transport = HttpTransport::new(DEFAULT_TIMEOUT, cfg.verify)?;
        Ok(Self::with_transport(cfg, transport))
    }

    /// Rebuilds the HTTP transport with another request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.transport = HttpTransport::new(timeout, self.verify)?;
        Ok(self)
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(cfg: ClientConfig, transport: T) -> Self {
        Self {
            endpoint: cfg.endpoint,
            key: cfg.key,
            verify: cfg.verify,
            pagesize: DEFAULT_PAGESIZE,
            max_pages: DEFAULT_MAX_PAGES,
            max_phases: DEFAULT_MAX_PHASES,
            pause: DEFAULT_PAUSE,
            progress: true,
            transport,
        }
    }

    pub fn with_pagesize(mut self, pagesize: u32) -> Self {
        self.pagesize = pagesize.max(1);
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_phases(mut self, max_phases: usize) -> Self {
        self.max_phases = max_phases.max(1);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Requests one page. HTTP 204 gives an empty page.
    pub fn fetch_page(&self, query: &Query, phases: &[u32], number: u32, pagesize: u32) -> Result<Page> {
        let request = PageRequest::new(query, phases, number, pagesize);
        tracing::debug!(
            page = number,
            pagesize,
            phases = phases.len(),
            q = %request.q,
            "requesting MPDS page"
        );

        let resp = self.transport.fetch(&self.endpoint, &self.key, &request)?;
        match resp.status {
            200 => Page::parse(number, &resp.body),
            204 => Ok(Page::empty(number)),
            status => Err(Error::from_status(status, &resp.body)),
        }
    }

    /// Number of entries matching the query.
    pub fn count(&self, query: &Query) -> Result<u64> {
        let phases: Vec<u32> = query.phase_ids().collect();
        let page = self.fetch_page(query, &phases, 0, COUNT_PAGESIZE)?;

        let needed = page.count.div_ceil(u64::from(self.pagesize));
        if needed > u64::from(self.max_pages) {
            tracing::warn!(
                count = page.count,
                max_pages = self.max_pages,
                needed,
                "dataset is too big: retrieving it needs max_pages raised to {needed}"
            );
        }
        Ok(page.count)
    }

    /// Runs the query to exhaustion and reduces entries through `fields`.
    ///
    /// Phase ids are split into chunks of at most `max_phases`, each chunk
    /// paginated in turn. Any malformed page, count inconsistency or
    /// non-success answer aborts the whole retrieval.
    pub fn execute(&self, query: &Query, fields: &Fields) -> Result<ResultSet> {
        let chunks = query.phase_chunks(self.max_phases);
        let nsteps = chunks.len();

        let mut output = Vec::new();
        let mut declared_total = 0u64;
        let mut pages = 0usize;

        for (step, phases) in chunks.iter().enumerate() {
            let mut number = 0u32;
            let mut declared: Option<u64> = None;
            let mut bar: Option<ProgressBar> = None;

            loop {
                let page = self.fetch_page(query, phases, number, self.pagesize)?;

                if page.entries.is_empty() {
                    if number == 0 {
                        tracing::debug!(step = step + 1, nsteps, "no hits");
                        break;
                    }
                    return Err(Error::Malformed {
                        page: number,
                        reason: "empty page before the declared end".to_string(),
                    });
                }

                if page.npages > self.max_pages {
                    return Err(Error::TooManyHits {
                        count: page.count,
                        limit: u64::from(self.max_pages) * u64::from(self.pagesize),
                    });
                }

                if let Some(before) = declared {
                    if before != page.count {
                        return Err(Error::CountChanged {
                            before,
                            after: page.count,
                        });
                    }
                }
                declared = Some(page.count);
                pages += 1;

                if self.progress && bar.is_none() && page.npages > 1 {
                    bar = Some(progress_bar(page.npages, step + 1, nsteps));
                }
                if let Some(bar) = &bar {
                    bar.inc(1);
                }

                let last = page.is_last();
                for entry in page.entries {
                    output.push(fields.apply(entry)?);
                }

                if last {
                    break;
                }
                if !self.pause.is_zero() {
                    thread::sleep(self.pause);
                }
                number += 1;
            }

            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
            declared_total += declared.unwrap_or(0);
        }

        if output.len() as u64 != declared_total {
            return Err(Error::CountMismatch {
                collected: output.len(),
                declared: declared_total,
            });
        }

        tracing::info!(hits = output.len(), pages, "retrieved MPDS data");
        Ok(ResultSet::new(output, declared_total, pages))
    }

    /// Like [`Client::execute`], shaped into a table.
    ///
    /// Without `columns` the default titles are used, matching
    /// [`Fields::default`].
    pub fn get_table(&self, query: &Query, fields: &Fields, columns: Option<&[&str]>) -> Result<Table> {
        let columns = columns.unwrap_or(&DEFAULT_TITLES);
        self.execute(query, fields)?.into_table(columns.iter().copied())
    }

    /// Crystal structures matching the query.
    ///
    /// The query is narrowed to `props = "atomic structure"`; entries without
    /// a basis are skipped.
    pub fn get_crystals(&self, query: &Query) -> Result<Vec<CrystalData>> {
        let query = query.clone().props("atomic structure");
        let rows = self.execute(&query, &CrystalData::fields())?;

        let mut crystals = Vec::new();
        for row in &rows {
            let values = row.as_array().map(Vec::as_slice).unwrap_or(&[]);
            if let Some(crystal) = CrystalData::from_row(values)? {
                crystals.push(crystal);
            }
        }
        tracing::debug!(rows = rows.len(), crystals = crystals.len(), "compiled crystals");
        Ok(crystals)
    }
}

fn progress_bar(npages: u32, step: usize, nsteps: usize) -> ProgressBar {
    let pb = ProgressBar::new(u64::from(npages));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} step {msg} {wide_bar} {pos}/{len} pages {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(format!("{step}/{nsteps}"));
    pb
}
