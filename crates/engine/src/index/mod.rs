pub mod file_index;
pub mod header;
pub mod helpers;
pub mod list;
pub mod manager;

pub use file_index::*;
pub use header::{HEADER_SIZE, IndexHeader, ListDesc, TYPE_TAG_LEN};
pub use list::{IndexList, RecordIter};
pub use manager::*;

use crate::binary::Record;

/// Describes one kind of index file: what it stores and how it is tagged.
pub trait IndexKind {
    type Record: Record;

    /// ASCII hex tag written in the header; opening a file with another
    /// kind's tag fails.
    const TYPE_TAG: [u8; TYPE_TAG_LEN];

    /// List types this kind stores, in on-disk order.
    const LISTS: &'static [u32];

    /// Hook run on every record just before it is written.
    fn before_write(&self, _record: &mut Self::Record) {}
}
