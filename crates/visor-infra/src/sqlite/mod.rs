//! SQLite persistence via sqlx.

pub mod pool;
pub mod preferences;
pub mod thread;

pub use pool::DatabasePool;
pub use preferences::SqlitePreferenceStore;
pub use thread::SqliteThreadStore;
