pub mod error;
pub mod query;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use query::{CompareOp, Expr, QueryBuilder};
pub use schema::TableNames;
pub use sqlite::SqliteStorage;
pub use traits::*;
