pub mod ingest;
pub mod submit;
