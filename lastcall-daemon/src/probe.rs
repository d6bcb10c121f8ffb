//! Activity probe: reachability and player count of the game server

use std::future::Future;

use lastcall_protocol::client::StatusClient;
use tracing::debug;

use crate::config::ServerConfig;
use crate::poll::Probe;

/// Read-only queries against the supervised server
pub trait ActivityProbe {
    /// Whether the server answers at all
    fn is_reachable(&self) -> impl Future<Output = Probe<bool>> + Send;

    /// Number of players currently connected
    fn sample_player_count(&self) -> impl Future<Output = Probe<u32>> + Send;
}

/// Probe speaking the Server List Ping protocol
#[derive(Debug, Clone)]
pub struct MinecraftProbe {
    client: StatusClient,
}

impl MinecraftProbe {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            client: StatusClient::new(config.host.clone(), config.port)
                .with_timeout(config.probe_timeout),
        }
    }

    pub fn from_client(client: StatusClient) -> Self {
        Self { client }
    }
}

impl ActivityProbe for MinecraftProbe {
    async fn is_reachable(&self) -> Probe<bool> {
        match self.client.ping().await {
            Ok(latency) => {
                debug!(address = %self.client.address(), ?latency, "Server answered ping");
                Probe::Observed(true)
            }
            Err(e) => {
                debug!(address = %self.client.address(), "Ping failed: {}", e);
                Probe::Unknown
            }
        }
    }

    async fn sample_player_count(&self) -> Probe<u32> {
        match self.client.status().await {
            Ok(status) => Probe::Observed(status.players.online),
            Err(e) => {
                debug!(address = %self.client.address(), "Status query failed: {}", e);
                Probe::Unknown
            }
        }
    }
}
