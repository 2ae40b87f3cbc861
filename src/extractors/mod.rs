pub mod query;

pub use query::{raw_query, ValidatedQuery};
