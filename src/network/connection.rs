//! Connection worker
//!
//! Handles one accepted client connection: decodes request frames via the
//! configured wire codec, dispatches them through the listener's handler
//! chain, writes responses, and applies the transport upgrade when a
//! successful StartTLS response passes through.

use std::io::{self, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crate::error::{MemDirError, Result};
use crate::handler::{OperationHandler, OID_START_TLS};
use crate::network::socket::TransportUpgrade;
use crate::protocol::{ResponseBody, ResponseMessage, ResultCode, WireCodec};

/// Handles a single client connection
pub(crate) struct ConnectionWorker {
    reader: BufReader<TcpStream>,
    chain: Arc<dyn OperationHandler>,
    codec: Arc<dyn WireCodec>,
    upgrade: Option<Arc<dyn TransportUpgrade>>,
    peer_addr: String,
}

impl ConnectionWorker {
    pub(crate) fn new(
        stream: TcpStream,
        chain: Arc<dyn OperationHandler>,
        codec: Arc<dyn WireCodec>,
        upgrade: Option<Arc<dyn TransportUpgrade>>,
    ) -> Self {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            reader: BufReader::new(stream),
            chain,
            codec,
            upgrade,
            peer_addr,
        }
    }

    /// Serve the connection until the client disconnects or an error occurs
    pub(crate) fn run(mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let frame = match self.codec.read_request(&mut self.reader) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(MemDirError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Connection closed by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            let (message_id, request, controls) = frame;
            tracing::trace!(
                "Received {} request from {} (msgID={})",
                request.kind_name(),
                self.peer_addr,
                message_id
            );

            let response = self.chain.process(message_id, &request, &controls);
            let upgrade_accepted = is_start_tls_success(&response) && self.upgrade.is_some();

            if let Err(e) = self.send_response(&response) {
                if let MemDirError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent",
                            self.peer_addr
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }

            if upgrade_accepted {
                self.upgrade_transport()?;
            }
        }
    }

    fn send_response(&mut self, response: &ResponseMessage) -> Result<()> {
        let mut writer = self.reader.get_ref();
        self.codec.write_response(&mut writer as &mut dyn Write, response)?;
        writer.flush()?;
        Ok(())
    }

    /// Swap the underlying stream for its upgraded form. Requests already
    /// buffered from the pre-upgrade transport are discarded; clients must
    /// not pipeline past a StartTLS request.
    fn upgrade_transport(&mut self) -> Result<()> {
        let upgrade = self
            .upgrade
            .as_ref()
            .ok_or_else(|| MemDirError::Protocol("no transport upgrade configured".to_string()))?;

        tracing::debug!("Upgrading transport for {}", self.peer_addr);
        let stream = self.reader.get_ref().try_clone()?;
        let upgraded = upgrade.upgrade(stream)?;
        self.reader = BufReader::new(upgraded);
        Ok(())
    }
}

fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

fn is_start_tls_success(response: &ResponseMessage) -> bool {
    match &response.body {
        ResponseBody::Extended {
            result,
            response_oid,
            ..
        } => {
            result.code == ResultCode::Success
                && response_oid.as_deref() == Some(OID_START_TLS)
        }
        _ => false,
    }
}
