// Attached device and camera models

use serde::{Deserialize, Serialize};

/// Which heuristic tagged a device as a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DetectionMethod {
    /// MAC prefix table hit at the given prefix length (8, 7 or 6 characters).
    MacVendor(u8),
    Hostname,
    /// Low-confidence fallback on pool-like address and anonymous hostname.
    IpRange,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMethod::MacVendor(len) => write!(f, "MAC Vendor ({})", len),
            DetectionMethod::Hostname => f.write_str("Hostname"),
            DetectionMethod::IpRange => f.write_str("IP Range"),
        }
    }
}

impl From<DetectionMethod> for String {
    fn from(m: DetectionMethod) -> Self {
        m.to_string()
    }
}

impl TryFrom<String> for DetectionMethod {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "Hostname" => Ok(DetectionMethod::Hostname),
            "IP Range" => Ok(DetectionMethod::IpRange),
            other => other
                .strip_prefix("MAC Vendor (")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|n| n.parse().ok())
                .map(DetectionMethod::MacVendor)
                .ok_or_else(|| format!("unknown detection method: {}", other)),
        }
    }
}

/// A DHCP/ARP-derived device. Camera fields are set only on classified cameras.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub mac: String,
    pub ip: String,
    pub hostname: String,
    pub brand: Option<String>,
    pub online: bool,
    pub detection_method: Option<DetectionMethod>,
    pub is_static: bool,
}
