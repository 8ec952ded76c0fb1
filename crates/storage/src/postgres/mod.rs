mod client;
mod rows;

pub use client::PostgresStore;
