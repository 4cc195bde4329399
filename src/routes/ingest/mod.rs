mod handler;
pub mod model;
pub mod reconcile;

pub use handler::ingest;
