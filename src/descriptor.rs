//! Expected parameters of the authorized Wi-Fi network and the VPN server
//! behind it (inert data)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Local address prefix handed out by the authorized network's router
pub const DEFAULT_EXPECTED_IP_PREFIX: &str = "192.168.1.";
pub const DEFAULT_EXPECTED_GATEWAY: &str = "192.168.1.1";
pub const DEFAULT_WIFI_NAME: &str = "WiFi-Desconocida";
pub const DEFAULT_ISP: &str = "Telefonica";
pub const DEFAULT_CITY: &str = "Las Palmas de Gran Canaria";

pub const DEFAULT_SERVER_ADDRESS: &str = "192.168.1.58";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
/// Pre-shared key from the sample setup; replace it in real deployments
pub const DEFAULT_SERVER_KEY: &str = "QUbFiNSnGLphVVVgDD9CNuFjBxKBTMJzgdgbkib4X2c=";

/// Nothing checks live network state against this; it is carried for display.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkDescriptor {
    pub expected_ip_prefix: String,
    pub expected_gateway: String,
    pub wifi_name: String,
    /// Router MAC, if pinned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mac: Option<String>,
    pub isp: String,
    pub city: String,
}

impl Default for NetworkDescriptor {
    fn default() -> Self {
        Self {
            expected_ip_prefix: DEFAULT_EXPECTED_IP_PREFIX.to_string(),
            expected_gateway: DEFAULT_EXPECTED_GATEWAY.to_string(),
            wifi_name: DEFAULT_WIFI_NAME.to_string(),
            allowed_mac: None,
            isp: DEFAULT_ISP.to_string(),
            city: DEFAULT_CITY.to_string(),
        }
    }
}

impl fmt::Display for NetworkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📡 WiFi name: {}", self.wifi_name)?;
        writeln!(f, "📊 IP range: {}x", self.expected_ip_prefix)?;
        writeln!(f, "🌐 Gateway: {}", self.expected_gateway)?;
        writeln!(
            f,
            "🔒 Allowed MAC: {}",
            self.allowed_mac.as_deref().unwrap_or("any")
        )?;
        writeln!(f, "🏢 ISP: {}", self.isp)?;
        write!(f, "🏙️ City: {}", self.city)
    }
}

/// Where the VPN server listens and the key it expects. Nothing connects to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_SERVER_ADDRESS.to_string(),
            port: DEFAULT_SERVER_PORT,
            key: DEFAULT_SERVER_KEY.to_string(),
        }
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🖥️ VPN server: {}:{}", self.address, self.port)?;
        // Only a prefix of the key is shown
        let shown: String = self.key.chars().take(4).collect();
        write!(f, "🔑 Key: {}…", shown)
    }
}
