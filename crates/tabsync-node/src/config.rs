use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub features: FeaturesSection,
    #[serde(default)]
    pub anti_override: AntiOverrideSection,
    #[serde(default)]
    pub executor: ExecutorSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// Backend server players start on.
    #[serde(default = "default_server")]
    pub server: String,
    /// Protocol version of simulated clients, selects the packet layout.
    #[serde(default = "default_protocol")]
    pub protocol: i32,
}

fn default_server() -> String {
    "lobby".into()
}

fn default_protocol() -> i32 {
    765
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            server: default_server(),
            protocol: default_protocol(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransportSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub peers: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1:25600".into()
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            peers: Vec::new(),
        }
    }
}

impl TransportSection {
    pub fn bind_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(self.bind.parse::<SocketAddr>()?)
    }

    pub fn peer_addrs(&self) -> Result<Vec<SocketAddr>, Box<dyn std::error::Error>> {
        let mut addrs = Vec::with_capacity(self.peers.len());
        for peer in &self.peers {
            let addr = peer
                .parse::<SocketAddr>()
                .map_err(|e| format!("invalid peer address {peer}: {e}"))?;
            addrs.push(addr);
        }
        Ok(addrs)
    }
}

#[derive(Debug, Deserialize)]
pub struct FeaturesSection {
    #[serde(default = "default_true")]
    pub nametags: bool,
    #[serde(default = "default_true")]
    pub belowname: bool,
    #[serde(default = "default_belowname_title")]
    pub belowname_title: String,
    #[serde(default = "default_true")]
    pub playerlist: bool,
    #[serde(default = "default_playerlist_title")]
    pub playerlist_title: String,
}

fn default_true() -> bool {
    true
}

fn default_belowname_title() -> String {
    "Health".into()
}

fn default_playerlist_title() -> String {
    "Ping".into()
}

impl Default for FeaturesSection {
    fn default() -> Self {
        Self {
            nametags: true,
            belowname: true,
            belowname_title: default_belowname_title(),
            playerlist: true,
            playerlist_title: default_playerlist_title(),
        }
    }
}

/// Whether packets from other plugins are rewritten to keep ours visible.
#[derive(Debug, Deserialize)]
pub struct AntiOverrideSection {
    #[serde(default = "default_true")]
    pub scoreboard: bool,
    #[serde(default = "default_true")]
    pub teams: bool,
}

impl Default for AntiOverrideSection {
    fn default() -> Self {
        Self {
            scoreboard: true,
            teams: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecutorSection {
    /// Grace period for queue shutdown in milliseconds.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_shutdown_grace_ms() -> u64 {
    500
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl ExecutorSection {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl NodeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
