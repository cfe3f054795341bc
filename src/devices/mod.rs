pub mod connection;

pub use connection::{ConnectionManager, ConnectionState};
