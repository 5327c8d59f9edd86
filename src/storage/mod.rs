mod cache;
mod schema;
mod types;

pub use cache::{MemoryCache, TokenCache};
pub use schema::Database;
pub use types::DatabaseError;
