//! Persistence layer: whole-file JSON blobs, one per namespace.

pub mod json_file;
pub mod namespace;
