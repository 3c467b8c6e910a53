mod client;
mod repositories;
mod rows;

pub use client::{SqliteOptions, SqlitePersistenceClient};
