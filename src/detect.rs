//! Describe the network this machine is on, printed as a `[network]` config section

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::descriptor::{NetworkDescriptor, DEFAULT_WIFI_NAME};
use crate::network::{Fetch, FetchError};
use crate::probe::UNKNOWN;

/// Public IP lookup (JSON body with an `ip` field)
pub const DEFAULT_PUBLIC_IP_URL: &str = "https://api.ipify.org?format=json";

/// Geo/ISP lookup; `{ip}` is replaced with the public IP
pub const DEFAULT_GEO_URL: &str = "https://ipapi.co/{ip}/json/";

pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct DetectSettings {
    pub public_ip_url: String,
    pub geo_url: String,
    pub timeout: Duration,
}

impl Default for DetectSettings {
    fn default() -> Self {
        Self {
            public_ip_url: DEFAULT_PUBLIC_IP_URL.to_string(),
            geo_url: DEFAULT_GEO_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct PublicIpBody {
    ip: String,
}

#[derive(Deserialize)]
struct GeoBody {
    city: Option<String>,
    country_name: Option<String>,
    org: Option<String>,
}

/// What the public lookups say about this connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicInfo {
    pub public_ip: String,
    pub city: String,
    pub country: String,
    /// Full organisation name, e.g. "Telefonica De Espana S.a.u."
    pub org: String,
}

impl PublicInfo {
    /// First word of the organisation, the form the descriptor stores
    pub fn short_isp(&self) -> &str {
        self.org.split_whitespace().next().unwrap_or(UNKNOWN)
    }
}

async fn get_json<F, T>(fetcher: &F, url: &str, timeout: Duration) -> Result<T, DetectError>
where
    F: Fetch + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let response = fetcher.get(url, timeout).await?;
    if !response.is_success() {
        return Err(DetectError::Status {
            url: url.to_string(),
            status: response.status,
        });
    }
    Ok(serde_json::from_str(&response.body)?)
}

pub async fn lookup_public_info<F: Fetch + ?Sized>(
    fetcher: &F,
    settings: &DetectSettings,
) -> Result<PublicInfo, DetectError> {
    let body: PublicIpBody = get_json(fetcher, &settings.public_ip_url, settings.timeout).await?;
    let ip = body.ip;
    tracing::info!("Public IP: {}", ip);

    let geo_url = settings.geo_url.replace("{ip}", &ip);
    let geo: GeoBody = get_json(fetcher, &geo_url, settings.timeout).await?;
    Ok(PublicInfo {
        public_ip: ip,
        city: geo.city.unwrap_or_else(|| UNKNOWN.to_string()),
        country: geo.country_name.unwrap_or_else(|| UNKNOWN.to_string()),
        org: geo.org.unwrap_or_else(|| UNKNOWN.to_string()),
    })
}

/// Local IPv4 of the interface holding the default route. A UDP connect sends
/// no packets, it only makes the kernel pick a source address.
pub async fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = tokio::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).await.ok()?;
    match socket.local_addr().ok()?.ip() {
        std::net::IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// Router address assumed for a /24 home network: `a.b.c.1`
pub fn assumed_gateway(ip: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = ip.octets();
    Ipv4Addr::new(a, b, c, 1)
}

/// Address prefix shared by the host and its gateway, e.g. `192.168.1.`
pub fn network_range(ip: Ipv4Addr, gateway: Ipv4Addr) -> String {
    let ip = ip.octets();
    let gw = gateway.octets();
    let shared = if ip[..3] == gw[..3] || ip[..2] != gw[..2] { 3 } else { 2 };
    let mut range = String::new();
    for octet in &ip[..shared] {
        range.push_str(&octet.to_string());
        range.push('.');
    }
    range
}

#[derive(Debug, Clone)]
pub struct DetectedNetwork {
    pub descriptor: NetworkDescriptor,
    pub local_ip: Ipv4Addr,
    pub public: Option<PublicInfo>,
}

#[derive(Serialize)]
struct NetworkSection<'a> {
    network: &'a NetworkDescriptor,
}

impl DetectedNetwork {
    /// `[network]` section ready to paste into a config file, with the raw
    /// detection results as comments
    pub fn to_toml(&self) -> anyhow::Result<String> {
        let mut out = String::from("# Generated by vpn-check --detect\n");
        out.push_str(&format!("# Local IP: {}\n", self.local_ip));
        match self.public {
            Some(ref public) => {
                out.push_str(&format!("# Public IP: {}\n", public.public_ip));
                out.push_str(&format!("# Full ISP: {}\n", public.org));
                out.push_str(&format!("# Country: {}\n", public.country));
            }
            None => out.push_str("# Public lookup failed; isp and city are placeholders\n"),
        }
        out.push('\n');
        out.push_str(&toml::to_string(&NetworkSection {
            network: &self.descriptor,
        })?);
        Ok(out)
    }
}

/// Build a descriptor for the current network. Lookup failures are logged and
/// leave placeholders; this never fails.
pub async fn detect<F: Fetch + ?Sized>(
    fetcher: &F,
    settings: &DetectSettings,
    local_ip: Option<Ipv4Addr>,
) -> DetectedNetwork {
    let local_ip = local_ip.unwrap_or_else(|| {
        tracing::warn!("Could not determine local IP, using loopback");
        Ipv4Addr::LOCALHOST
    });
    let gateway = assumed_gateway(local_ip);
    tracing::info!("Local IP: {}, assumed gateway: {}", local_ip, gateway);

    let public = match lookup_public_info(fetcher, settings).await {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!("Public IP lookup failed: {}", e);
            None
        }
    };

    let (isp, city) = match public {
        Some(ref info) => (info.short_isp().to_string(), info.city.clone()),
        None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
    };
    DetectedNetwork {
        descriptor: NetworkDescriptor {
            expected_ip_prefix: network_range(local_ip, gateway),
            expected_gateway: gateway.to_string(),
            wifi_name: DEFAULT_WIFI_NAME.to_string(),
            allowed_mac: None,
            isp,
            city,
        },
        local_ip,
        public,
    }
}
