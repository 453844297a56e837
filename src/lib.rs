//! A small Rust client for the MPDS materials platform API.
//!
//! The client takes care of the chores around the MPDS facet API
//! (<https://developer.mpds.io>): it sends a search, follows pagination until
//! exhaustion, validates every page and hands back the collected entries,
//! optionally reduced to rows and shaped into a [`Table`].
//!
//! ## Quick start
//! - Put your API key in the `MPDS_KEY` environment variable or in a
//!   `.mpdsrc` file (current directory or home directory).
//! - Build a [`Query`] and call [`Client::execute`] or [`Client::get_table`].
//!
//! ```no_run
//! use mpds_client::{Client, Fields, Query};
//!
//! fn main() -> mpds_client::Result<()> {
//!     let client = Client::from_env()?;
//!     let query = Query::new().formulae("SrTiO3").props("phonons");
//!
//!     let table = client.get_table(&query, &Fields::default(), None)?;
//!     println!("{}", table.to_csv_string()?);
//!     Ok(())
//! }
//! ```
//!
//! Nothing is retried: transport failures, rejected keys, rate limiting and
//! malformed pages all surface as distinct [`Error`] variants.

#![forbid(unsafe_code)]

mod client;
mod config;
mod crystal;
mod error;
pub mod export;
mod fields;
mod page;
mod query;
mod result;
mod table;
mod transport;

pub use client::{
    Client, ClientConfig, DEFAULT_ENDPOINT, DEFAULT_MAX_PAGES, DEFAULT_MAX_PHASES, DEFAULT_PAGESIZE,
    DEFAULT_PAUSE, DEFAULT_TIMEOUT,
};
pub use crystal::{CRYSTAL_FIELDS, CrystalData};
pub use error::{Error, Result};
pub use fields::{DEFAULT_TITLES, FieldPath, Fields, ObjectType, Selector};
pub use page::Page;
pub use query::{PageRequest, Query};
pub use result::ResultSet;
pub use table::Table;
pub use transport::{HttpTransport, RawResponse, Transport};
