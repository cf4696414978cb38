pub mod in_memory;
pub mod retry;
pub mod source;

pub use in_memory::{FailingDataSource, InMemoryDataSource};
pub use retry::{RetryPolicy, DEFAULT_TIMEOUT};
pub use source::DataSource;
