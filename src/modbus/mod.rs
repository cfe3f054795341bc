pub mod client;
pub mod decoder;

pub use client::{ModbusSession, ModbusTransport, TcpSession, TcpTransport};
pub use decoder::{decode, DecodeError};

#[cfg(test)]
pub mod mock;
