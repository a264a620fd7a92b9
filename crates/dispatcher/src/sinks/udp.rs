//! UdpSink - fire-and-forget JSON datagrams

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use contracts::{ContractError, EventSink, KubeEvent};
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

use super::parse_dedot;

/// Largest UDP payload over IPv4
const MAX_DATAGRAM: usize = 65507;

/// Configuration for UdpSink
#[derive(Debug, Clone)]
pub struct UdpSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Events encoding larger than this are rejected
    pub max_packet_size: usize,
    /// Replace dots in label/annotation keys before sending
    pub dedot: bool,
}

impl UdpSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let max_packet_size = match params.get("max_packet_size") {
            Some(s) => s
                .parse::<usize>()
                .map_err(|e| format!("invalid 'max_packet_size' '{}': {}", s, e))?
                .min(MAX_DATAGRAM),
            None => MAX_DATAGRAM,
        };

        let dedot = parse_dedot(params)?;

        Ok(Self {
            addr,
            max_packet_size,
            dedot,
        })
    }
}

/// Sink that sends each event as one UDP datagram
pub struct UdpSink {
    name: String,
    config: UdpSinkConfig,
    socket: Option<UdpSocket>,
}

impl UdpSink {
    /// Bind an ephemeral local port and connect it to the target
    #[instrument(name = "udp_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: UdpSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(sink = %name, target = %config.addr, "UdpSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "udp_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = UdpSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;

        Self::new(&name, config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_send(&self.name, "socket not connected"))
    }

    fn prepare_payload(&self, event: &KubeEvent) -> Result<Vec<u8>, ContractError> {
        let data = if self.config.dedot {
            event.dedot().to_json()?
        } else {
            event.to_json()?
        };

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                uid = %event.uid(),
                size = data.len(),
                max = self.config.max_packet_size,
                "Event too large for one datagram"
            );
            return Err(ContractError::sink_send(
                &self.name,
                format!("payload of {} bytes exceeds datagram limit", data.len()),
            ));
        }

        Ok(data)
    }
}

impl EventSink for UdpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "udp_sink_send",
        skip(self, event),
        fields(sink = %self.name, uid = %event.uid())
    )]
    async fn send(&mut self, event: &Arc<KubeEvent>) -> Result<(), ContractError> {
        let data = self.prepare_payload(event)?;
        let sent = self
            .socket()?
            .send(&data)
            .await
            .map_err(|e| ContractError::sink_send(&self.name, e.to_string()))?;
        debug!(sink = %self.name, bytes = sent, "Sent");
        Ok(())
    }

    #[instrument(name = "udp_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "UdpSink closed");
        Ok(())
    }
}
