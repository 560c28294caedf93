//! Scheduled ingest of the remote scene catalogue.

pub use importer::Importer;
pub use mailbox::{control_mailbox, ControlMailbox, ControlMessage, ControlSender, StatusHandle};
pub use source::looks_gzipped;

mod catalog;
mod catalogs;
mod columns;
mod engine;
mod ensure_file;
mod file_meta;
mod importer;
mod mailbox;
mod source;
mod stats;
#[cfg(test)]
mod test_support;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("catalogue stream has no header line")]
    MissingHeader,
    #[error("no such column: {0}")]
    MissingColumn(String),
    #[error("the importer has stopped")]
    Stopped,
}
