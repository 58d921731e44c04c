//! Modbus TCP coil server
//!
//! Serves the shared coil store to supervisory clients. Every connection
//! gets its own task, and each request maps to exactly one `get_range` or
//! `set_range` call on the store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use errors::{protocol_error, BridgeResult};
use shm_rtdb::{CoilDatastore, CoilError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::pdu::{
    encode_frame, exception_response, read_coils_response, write_multiple_coils_response,
    write_single_coil_response, CoilRequest, ExceptionCode, MbapHeader, MBAP_HEADER_LEN,
};

// Pause after a failed accept (e.g. descriptor exhaustion)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Modbus TCP server exposing a coil datastore (FC01, FC05, FC15)
pub struct CoilServer<S: CoilDatastore> {
    store: Arc<S>,
    unit_id: Option<u8>,
}

impl<S: CoilDatastore> CoilServer<S> {
    /// Server answering every unit id
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            unit_id: None,
        }
    }

    /// Only answer requests addressed to `unit_id`
    pub fn with_unit_id(mut self, unit_id: Option<u8>) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Bind `addr` and serve until `token` is cancelled.
    ///
    /// Returns the bound address (useful with port 0) and the accept-loop task.
    pub async fn start(
        self,
        addr: &str,
        token: CancellationToken,
    ) -> BridgeResult<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            protocol_error!("modbus", format!("Failed to bind {}: {}", addr, e))
        })?;
        let local_addr = listener.local_addr()?;
        info!("Modbus TCP coil server listening on {}", local_addr);

        let server = Arc::new(self);
        let handle = tokio::spawn(server.accept_loop(listener, token));
        Ok((local_addr, handle))
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, token: CancellationToken) {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("New connection from {}", peer);
                        let server = Arc::clone(&self);
                        let conn_token = token.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, conn_token).await {
                                debug!("Connection {} closed: {}", peer, e);
                            }
                        });
                    },
                    Err(e) => {
                        error!("Accept error: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    },
                },
            }
        }
        info!("Modbus TCP coil server stopped");
    }

    async fn handle_connection(
        &self,
        mut stream: TcpStream,
        token: CancellationToken,
    ) -> std::io::Result<()> {
        let mut header_buf = [0u8; MBAP_HEADER_LEN];
        let mut pdu_buf = Vec::new();

        loop {
            tokio::select! {
                () = token.cancelled() => return Ok(()),
                read = stream.read_exact(&mut header_buf) => match read {
                    Ok(_) => {},
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                    Err(e) => return Err(e),
                },
            }

            let header = MbapHeader::parse(&header_buf);
            if !header.is_valid() {
                warn!(
                    "Dropping connection: bad MBAP header (protocol {}, length {})",
                    header.protocol_id, header.length
                );
                return Ok(());
            }

            pdu_buf.resize(header.pdu_len(), 0);
            tokio::select! {
                () = token.cancelled() => return Ok(()),
                read = stream.read_exact(&mut pdu_buf) => {
                    read?;
                },
            }

            if let Some(expected) = self.unit_id {
                if header.unit_id != expected {
                    debug!("Ignoring request for unit {}", header.unit_id);
                    continue;
                }
            }

            let response = self.handle_pdu(&pdu_buf);
            stream.write_all(&encode_frame(&header, &response)).await?;
        }
    }

    /// Execute one request PDU and build the response PDU
    pub fn handle_pdu(&self, pdu: &[u8]) -> Vec<u8> {
        let fc = pdu.first().copied().unwrap_or(0);
        match CoilRequest::parse(pdu).and_then(|request| self.execute(&request)) {
            Ok(response) => response,
            Err(code) => {
                debug!("Exception {:?} for FC={:02X}", code, fc);
                exception_response(fc, code)
            },
        }
    }

    fn execute(&self, request: &CoilRequest) -> Result<Vec<u8>, ExceptionCode> {
        match request {
            CoilRequest::ReadCoils { start, quantity } => {
                let values = self
                    .store
                    .get_range(usize::from(*start), usize::from(*quantity))
                    .map_err(exception_for)?;
                Ok(read_coils_response(&values))
            },
            CoilRequest::WriteSingleCoil { address, value } => {
                self.store
                    .set_range(usize::from(*address), &[*value])
                    .map_err(exception_for)?;
                Ok(write_single_coil_response(*address, *value))
            },
            CoilRequest::WriteMultipleCoils { start, values } => {
                self.store
                    .set_range(usize::from(*start), values)
                    .map_err(exception_for)?;
                Ok(write_multiple_coils_response(*start, values.len() as u16))
            },
        }
    }
}

fn exception_for(err: CoilError) -> ExceptionCode {
    match err {
        CoilError::OutOfRange { .. } => ExceptionCode::IllegalDataAddress,
        CoilError::Unavailable(_) => ExceptionCode::ServerDeviceFailure,
    }
}
