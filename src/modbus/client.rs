use async_trait::async_trait;
use log::{debug, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use crate::utils::error::CollectorError;

/// An open connection to a Modbus TCP endpoint.
#[async_trait]
pub trait ModbusSession: Send {
    async fn read_holding_registers(
        &mut self,
        unit_id: u8,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, CollectorError>;

    async fn close(&mut self) -> Result<(), CollectorError>;
}

/// Opens sessions. Implemented over TCP for production and in memory for tests.
#[async_trait]
pub trait ModbusTransport: Send + Sync {
    async fn open(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn ModbusSession>, CollectorError>;
}

#[derive(Debug, Default, Clone)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }

    async fn resolve(host: &str, port: u16) -> Result<SocketAddr, CollectorError> {
        tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| {
                CollectorError::ConnectionError(format!("Cannot resolve {}:{}: {}", host, port, e))
            })?
            .next()
            .ok_or_else(|| {
                CollectorError::ConnectionError(format!("No address found for {}:{}", host, port))
            })
    }
}

#[async_trait]
impl ModbusTransport for TcpTransport {
    async fn open(
        &self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Box<dyn ModbusSession>, CollectorError> {
        let peer = timeout(connect_timeout, Self::resolve(host, port)).await??;

        debug!("🔌 Opening Modbus TCP session to {}", peer);
        let ctx = timeout(connect_timeout, tcp::connect(peer))
            .await?
            .map_err(|e| {
                CollectorError::ConnectionError(format!("Failed to connect to {}: {}", peer, e))
            })?;

        info!("✅ Modbus TCP session established with {}", peer);
        Ok(Box::new(TcpSession {
            ctx,
            peer,
            request_timeout: connect_timeout,
        }))
    }
}

pub struct TcpSession {
    ctx: Context,
    peer: SocketAddr,
    request_timeout: Duration,
}

#[async_trait]
impl ModbusSession for TcpSession {
    async fn read_holding_registers(
        &mut self,
        unit_id: u8,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, CollectorError> {
        debug!(
            "📊 Reading {} registers from unit {} starting at address {}",
            count, unit_id, start_addr
        );

        self.ctx.set_slave(Slave(unit_id));
        let response = timeout(
            self.request_timeout,
            self.ctx.read_holding_registers(start_addr, count),
        )
        .await?;

        match response {
            Ok(Ok(words)) => Ok(words),
            Ok(Err(exception)) => Err(CollectorError::ProtocolException {
                unit_id,
                message: format!("{:?}", exception),
            }),
            Err(e) => Err(CollectorError::CommunicationError(format!(
                "Read from {} failed: {}",
                self.peer, e
            ))),
        }
    }

    async fn close(&mut self) -> Result<(), CollectorError> {
        timeout(self.request_timeout, self.ctx.disconnect()).await??;
        debug!("🔌 Closed Modbus TCP session to {}", self.peer);
        Ok(())
    }
}
