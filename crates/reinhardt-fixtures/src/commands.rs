//! Management commands wrapping the loader and dumper.
//!
//! - `loaddata` installs fixture files into storage
//! - `dumpdata` exports storage contents as a fixture document

mod dumpdata;
mod loaddata;

pub use dumpdata::{DumpDataCommand, DumpDataOptions, DumpResult};
pub use loaddata::{LoadDataArgs, LoadDataCommand, LoadDataOptions};
