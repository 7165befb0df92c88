mod ingest_executor;

pub use ingest_executor::{ExecutorCreationError, IngestError, IngestExecutor};
