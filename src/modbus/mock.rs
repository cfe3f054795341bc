//! In-memory transport and a loopback Modbus TCP device used by unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::client::{ModbusSession, ModbusTransport};
use crate::utils::error::CollectorError;

#[derive(Default)]
struct MockState {
    reachable: HashSet<String>,
    responses: HashMap<(u8, u16), Result<Vec<u16>, String>>,
    open_attempts: Vec<String>,
    reads: Vec<(u8, u16, u16)>,
    closes: usize,
    drop_on_timeout: bool,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, host: &str, reachable: bool) {
        let mut state = self.state.lock().unwrap();
        if reachable {
            state.reachable.insert(host.to_string());
        } else {
            state.reachable.remove(host);
        }
    }

    pub fn respond(&self, unit_id: u8, address: u16, words: Vec<u16>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert((unit_id, address), Ok(words));
    }

    pub fn fail(&self, unit_id: u8, address: u16, message: &str) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert((unit_id, address), Err(message.to_string()));
    }

    /// Make reads of this group time out.
    pub fn silence(&self, unit_id: u8, address: u16) {
        self.state.lock().unwrap().responses.remove(&(unit_id, address));
    }

    /// After a read times out, the host stops accepting connections.
    pub fn drop_on_timeout(&self, enabled: bool) {
        self.state.lock().unwrap().drop_on_timeout = enabled;
    }

    pub fn open_attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().open_attempts.clone()
    }

    pub fn reads(&self) -> Vec<(u8, u16, u16)> {
        self.state.lock().unwrap().reads.clone()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl ModbusTransport for MockTransport {
    async fn open(
        &self,
        host: &str,
        port: u16,
        _timeout: Duration,
    ) -> Result<Box<dyn ModbusSession>, CollectorError> {
        let mut state = self.state.lock().unwrap();
        state.open_attempts.push(host.to_string());
        if state.reachable.contains(host) {
            Ok(Box::new(MockSession {
                state: Arc::clone(&self.state),
                host: host.to_string(),
            }))
        } else {
            Err(CollectorError::ConnectionError(format!(
                "{}:{} unreachable",
                host, port
            )))
        }
    }
}

struct MockSession {
    state: Arc<Mutex<MockState>>,
    host: String,
}

#[async_trait]
impl ModbusSession for MockSession {
    async fn read_holding_registers(
        &mut self,
        unit_id: u8,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, CollectorError> {
        let mut state = self.state.lock().unwrap();
        state.reads.push((unit_id, start_addr, count));
        match state.responses.get(&(unit_id, start_addr)) {
            Some(Ok(words)) => Ok(words.clone()),
            Some(Err(message)) => Err(CollectorError::ProtocolException {
                unit_id,
                message: message.clone(),
            }),
            None => {
                if state.drop_on_timeout {
                    state.reachable.remove(&self.host);
                }
                Err(CollectorError::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<(), CollectorError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Serve read-holding-registers on a loopback port, answering every register
/// with `value`. The very first request (across all connections) is answered
/// only after `first_reply_delay`, like a slow serial gateway.
pub async fn spawn_tcp_device(value: u16, first_reply_delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_connection(
                socket,
                value,
                first_reply_delay,
                Arc::clone(&requests),
            ));
        }
    });

    addr
}

async fn serve_connection(
    mut socket: TcpStream,
    value: u16,
    first_reply_delay: Duration,
    requests: Arc<AtomicUsize>,
) {
    // MBAP header: transaction id, protocol id, length, unit id.
    let mut header = [0u8; 7];
    while socket.read_exact(&mut header).await.is_ok() {
        let length = usize::from(u16::from_be_bytes([header[4], header[5]]));
        let mut pdu = vec![0u8; length.saturating_sub(1)];
        if pdu.len() < 5 || socket.read_exact(&mut pdu).await.is_err() {
            return;
        }
        let count = u16::from_be_bytes([pdu[3], pdu[4]]);

        if requests.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(first_reply_delay).await;
        }

        let byte_count = count * 2;
        let mut reply = Vec::with_capacity(9 + usize::from(byte_count));
        reply.extend_from_slice(&header[..4]);
        reply.extend_from_slice(&(3 + byte_count).to_be_bytes());
        reply.push(header[6]);
        reply.push(0x03);
        reply.push(byte_count as u8);
        for _ in 0..count {
            reply.extend_from_slice(&value.to_be_bytes());
        }
        if socket.write_all(&reply).await.is_err() {
            return;
        }
    }
}
