//! Connectivity probe: echo the public IP, then classify the verification page

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::network::{Fetch, FetchError};

/// Marker the verification page shows when the request came from the authorized network
pub const DEFAULT_AUTHORIZED_MARKER: &str = "🎉 ¡Acceso autorizado desde WiFi X!";

/// Marker the verification page shows otherwise
pub const DEFAULT_DENIED_MARKER: &str = "🚫 Acceso denegado";

/// Placeholder for an IP (or access state) that could not be determined
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Warning,
}

/// Whether the verification page granted access; `Unknown` when it said neither
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiAccess {
    Granted,
    Denied,
    Unknown,
}

impl fmt::Display for WifiAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WifiAccess::Granted => f.write_str("true"),
            WifiAccess::Denied => f.write_str("false"),
            WifiAccess::Unknown => f.write_str(UNKNOWN),
        }
    }
}

// true / false / "unknown"
impl Serialize for WifiAccess {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WifiAccess::Granted => serializer.serialize_bool(true),
            WifiAccess::Denied => serializer.serialize_bool(false),
            WifiAccess::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

/// Outcome of one probe run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub status: Status,
    pub message: String,
    pub ip: String,
    pub wifi_access: WifiAccess,
}

impl ProbeResult {
    fn new(
        status: Status,
        message: impl Into<String>,
        ip: impl Into<String>,
        wifi_access: WifiAccess,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            ip: ip.into(),
            wifi_access,
        }
    }

    /// Error result for a failure before the IP was known
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(Status::Error, message, UNKNOWN, WifiAccess::Denied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub authorized: String,
    pub denied: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            authorized: DEFAULT_AUTHORIZED_MARKER.to_string(),
            denied: DEFAULT_DENIED_MARKER.to_string(),
        }
    }
}

/// What the verification page body says
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Authorized,
    Denied,
    Unclear,
}

/// Match the page body against the markers; the authorized marker wins if both appear
pub fn classify(body: &str, markers: &Markers) -> Classification {
    if body.contains(markers.authorized.as_str()) {
        Classification::Authorized
    } else if body.contains(markers.denied.as_str()) {
        Classification::Denied
    } else {
        Classification::Unclear
    }
}

/// Everything one probe run needs
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub echo_url: String,
    pub echo_timeout: Duration,
    pub target_url: String,
    pub target_timeout: Duration,
    pub markers: Markers,
}

/// Unexpected failures; reported as `error: ...` with an unknown IP
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("echo response is not valid JSON: {0}")]
    EchoJson(#[from] serde_json::Error),
    #[error("echo response has no string `origin` field")]
    MissingOrigin,
}

/// Pull the caller's IP out of an echo body like `{"origin": "1.2.3.4"}`
pub fn parse_origin(body: &str) -> Result<String, ProbeError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    value
        .get("origin")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or(ProbeError::MissingOrigin)
}

/// Run the echo request, then the verification request. Never fails: every
/// problem becomes a `Status::Error` result.
pub async fn probe<F: Fetch + ?Sized>(fetcher: &F, settings: &ProbeSettings) -> ProbeResult {
    tracing::info!("Checking connectivity via {}", settings.echo_url);

    let echo = match fetcher.get(&settings.echo_url, settings.echo_timeout).await {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            tracing::warn!(
                "No internet connectivity (echo returned HTTP {})",
                response.status
            );
            return ProbeResult::failed("no internet connectivity");
        }
        Err(e) => {
            tracing::warn!("Echo request failed: {}", e);
            return ProbeResult::failed(format!("error: {}", e));
        }
    };

    let ip = match parse_origin(&echo.body) {
        Ok(ip) => ip,
        Err(e) => {
            tracing::warn!("Probe failed: {}", e);
            return ProbeResult::failed(format!("error: {}", e));
        }
    };
    tracing::info!("Current IP: {}", ip);

    tracing::info!("Checking verification page {}", settings.target_url);
    match fetcher.get(&settings.target_url, settings.target_timeout).await {
        Ok(response) if response.is_success() => {
            classify_page(&response.body, &settings.markers, ip)
        }
        Ok(response) => {
            tracing::warn!("Could not load verification page (HTTP {})", response.status);
            ProbeResult::new(
                Status::Error,
                "could not load verification page",
                ip,
                WifiAccess::Denied,
            )
        }
        Err(e) => target_failed(e, ip),
    }
}

fn classify_page(body: &str, markers: &Markers, ip: String) -> ProbeResult {
    match classify(body, markers) {
        Classification::Authorized => {
            tracing::info!("VPN working: page reports authorized network");
            ProbeResult::new(
                Status::Success,
                "VPN working correctly",
                ip,
                WifiAccess::Granted,
            )
        }
        Classification::Denied => {
            tracing::warn!("VPN not working: page reports access denied");
            ProbeResult::new(Status::Error, "VPN is not working", ip, WifiAccess::Denied)
        }
        Classification::Unclear => {
            tracing::warn!("Page loaded but carries neither marker");
            ProbeResult::new(Status::Warning, "uncertain state", ip, WifiAccess::Unknown)
        }
    }
}

fn target_failed(e: FetchError, ip: String) -> ProbeResult {
    tracing::warn!("Error reaching verification page: {}", e);
    ProbeResult::new(
        Status::Error,
        format!("connection error: {}", e),
        ip,
        WifiAccess::Denied,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::{FakeFetcher, Reply};

    const ECHO: &str = "http://echo.test/ip";
    const TARGET: &str = "http://wifi.test/";

    fn settings() -> ProbeSettings {
        ProbeSettings {
            echo_url: ECHO.to_string(),
            echo_timeout: Duration::from_secs(5),
            target_url: TARGET.to_string(),
            target_timeout: Duration::from_secs(10),
            markers: Markers::default(),
        }
    }

    fn echo_ok() -> (&'static str, Reply) {
        (ECHO, Reply::Ok(200, r#"{"origin": "2.137.220.106"}"#))
    }

    #[tokio::test]
    async fn authorized_marker_means_success() {
        let fetcher = FakeFetcher::new(vec![
            echo_ok(),
            (TARGET, Reply::Ok(200, "<h1>🎉 ¡Acceso autorizado desde WiFi X!</h1>")),
        ]);
        let result = probe(&fetcher, &settings()).await;
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.wifi_access, WifiAccess::Granted);
        assert_eq!(result.ip, "2.137.220.106");
        assert_eq!(fetcher.requested(), vec![ECHO, TARGET]);
    }

    #[tokio::test]
    async fn denied_marker_means_error() {
        let fetcher = FakeFetcher::new(vec![
            echo_ok(),
            (TARGET, Reply::Ok(200, "<p>🚫 Acceso denegado</p>")),
        ]);
        let result = probe(&fetcher, &settings()).await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.wifi_access, WifiAccess::Denied);
        assert_eq!(result.ip, "2.137.220.106");
        assert_eq!(result.message, "VPN is not working");
    }

    #[tokio::test]
    async fn no_marker_means_warning() {
        let fetcher = FakeFetcher::new(vec![
            echo_ok(),
            (TARGET, Reply::Ok(200, "<html>hello</html>")),
        ]);
        let result = probe(&fetcher, &settings()).await;
        assert_eq!(result.status, Status::Warning);
        assert_eq!(result.wifi_access, WifiAccess::Unknown);
        assert_eq!(result.ip, "2.137.220.106");
    }

    #[tokio::test]
    async fn echo_failure_skips_target() {
        let fetcher = FakeFetcher::new(vec![
            (ECHO, Reply::Timeout),
            (TARGET, Reply::Ok(200, DEFAULT_AUTHORIZED_MARKER)),
        ]);
        let result = probe(&fetcher, &settings()).await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.ip, UNKNOWN);
        assert_eq!(result.wifi_access, WifiAccess::Denied);
        assert_eq!(
            result.message,
            "error: request to http://echo.test/ip timed out after 5 s"
        );
        assert_eq!(fetcher.requested(), vec![ECHO]);
    }

    #[tokio::test]
    async fn echo_bad_status_skips_target() {
        let fetcher = FakeFetcher::new(vec![
            (ECHO, Reply::Ok(502, "bad gateway")),
            (TARGET, Reply::Ok(200, DEFAULT_AUTHORIZED_MARKER)),
        ]);
        let result = probe(&fetcher, &settings()).await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.ip, UNKNOWN);
        assert_eq!(result.message, "no internet connectivity");
        assert_eq!(fetcher.requested(), vec![ECHO]);
    }

    #[tokio::test]
    async fn target_error_text_is_in_message() {
        let fetcher = FakeFetcher::new(vec![echo_ok(), (TARGET, Reply::Timeout)]);
        let result = probe(&fetcher, &settings()).await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.wifi_access, WifiAccess::Denied);
        assert_eq!(result.ip, "2.137.220.106");
        assert!(result.message.starts_with("connection error: "));
        assert!(result.message.contains("request to http://wifi.test/ timed out after 10 s"));
    }

    #[tokio::test]
    async fn target_bad_status_could_not_load() {
        let fetcher = FakeFetcher::new(vec![echo_ok(), (TARGET, Reply::Ok(404, "not found"))]);
        let result = probe(&fetcher, &settings()).await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.wifi_access, WifiAccess::Denied);
        assert_eq!(result.message, "could not load verification page");
    }

    #[tokio::test]
    async fn garbage_echo_body_is_unexpected_error() {
        let fetcher = FakeFetcher::new(vec![(ECHO, Reply::Ok(200, "<html>not json</html>"))]);
        let result = probe(&fetcher, &settings()).await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.ip, UNKNOWN);
        assert!(result.message.starts_with("error: echo response is not valid JSON"));
        assert_eq!(fetcher.requested(), vec![ECHO]);
    }

    #[test]
    fn origin_must_be_a_string() {
        assert_eq!(parse_origin(r#"{"origin":"10.0.0.1"}"#).unwrap(), "10.0.0.1");
        assert!(matches!(parse_origin(r#"{"ip":"10.0.0.1"}"#), Err(ProbeError::MissingOrigin)));
        assert!(matches!(parse_origin(r#"{"origin":42}"#), Err(ProbeError::MissingOrigin)));
    }

    #[test]
    fn authorized_marker_wins_over_denied() {
        let body = format!("{} {}", DEFAULT_DENIED_MARKER, DEFAULT_AUTHORIZED_MARKER);
        assert_eq!(classify(&body, &Markers::default()), Classification::Authorized);
    }

    #[test]
    fn custom_markers() {
        let markers = Markers {
            authorized: "ALLOW".into(),
            denied: "DENY".into(),
        };
        assert_eq!(classify("... DENY ...", &markers), Classification::Denied);
        assert_eq!(classify(DEFAULT_AUTHORIZED_MARKER, &markers), Classification::Unclear);
    }

    #[test]
    fn result_serializes_like_the_shortcut() {
        let result = ProbeResult::new(
            Status::Warning,
            "uncertain state",
            "1.1.1.1",
            WifiAccess::Unknown,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "warning",
                "message": "uncertain state",
                "ip": "1.1.1.1",
                "wifiAccess": "unknown",
            })
        );
        let failed = serde_json::to_value(ProbeResult::failed("x")).unwrap();
        assert_eq!(failed["wifiAccess"], serde_json::json!(false));
        assert_eq!(failed["status"], "error");
    }
}
