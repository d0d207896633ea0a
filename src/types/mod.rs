pub mod value;

pub use value::{ColumnType, ColumnValue, Timestamp};
