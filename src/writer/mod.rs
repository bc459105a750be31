pub mod schema_gen;
pub mod sqlite;
pub mod value;

pub use sqlite::{convert_to_sqlite, SqliteWriter};
pub use value::SqlValue;
