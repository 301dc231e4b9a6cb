// Device/camera classifier over DHCP leases and the ARP table.
//
// Heuristics, in order:
//   1. MAC vendor prefix at 8, 7, then 6 characters.
//   2. Hostname camera keyword, with a brand pass over a smaller keyword table.
//   3. Pool-range IP with an anonymous hostname (low confidence, only when 1 and 2 miss).

use crate::client::{Record, field, field_bool};
use crate::models::{DetectionMethod, DeviceRecord};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_TABLES: &str = include_str!("tables.json");

/// MAC prefix lengths tried, most specific first ("F8:CE:07", "F8:CE:0", "F8:CE:").
const PREFIX_LENGTHS: [usize; 3] = [8, 7, 6];

pub const UNKNOWN_BRAND: &str = "Unknown";
pub const GENERIC_CAMERA: &str = "Generic Camera";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandKeyword {
    pub keyword: String,
    pub brand: String,
}

/// Lookup tables: prefix to brand, camera keywords, brand keywords.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorTables {
    pub mac_prefixes: HashMap<String, String>,
    pub camera_keywords: Vec<String>,
    pub brand_keywords: Vec<BrandKeyword>,
}

impl VendorTables {
    pub fn builtin() -> Result<Self, serde_json::Error> {
        Self::from_json(BUILTIN_TABLES)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        let tables: VendorTables = serde_json::from_str(s)?;
        Ok(tables.normalized())
    }

    /// Prefix keys uppercase with ':' separators, keywords lowercase.
    fn normalized(self) -> Self {
        Self {
            mac_prefixes: self
                .mac_prefixes
                .into_iter()
                .map(|(k, v)| (normalize_mac(&k), v))
                .collect(),
            camera_keywords: self
                .camera_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            brand_keywords: self
                .brand_keywords
                .into_iter()
                .map(|b| BrandKeyword {
                    keyword: b.keyword.to_lowercase(),
                    brand: b.brand,
                })
                .filter(|b| !b.keyword.is_empty())
                .collect(),
        }
    }
}

/// DHCP lease fields the classifier reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lease {
    pub mac: String,
    pub ip: String,
    pub hostname: String,
    /// Lease status is "bound".
    pub bound: bool,
    pub dynamic: bool,
}

impl Lease {
    pub fn from_record(r: &Record) -> Self {
        let ip = match field(r, "active-address") {
            "" => field(r, "address"),
            active => active,
        };
        Self {
            mac: normalize_mac(field(r, "mac-address")),
            ip: ip.to_string(),
            hostname: field(r, "host-name").to_string(),
            bound: field(r, "status") == "bound",
            dynamic: field_bool(r, "dynamic"),
        }
    }
}

/// MAC addresses currently present in the ARP table.
pub fn arp_macs(records: &[Record]) -> HashSet<String> {
    records
        .iter()
        .map(|r| normalize_mac(field(r, "mac-address")))
        .filter(|m| !m.is_empty())
        .collect()
}

pub fn normalize_mac(mac: &str) -> String {
    mac.trim().to_uppercase().replace('-', ":")
}

pub struct Classifier {
    tables: VendorTables,
}

impl Classifier {
    pub fn new(tables: VendorTables) -> Self {
        Self { tables }
    }

    /// Override file if given and readable, else the built-in tables, else empty tables.
    pub fn load(tables_path: Option<&Path>) -> Self {
        if let Some(path) = tables_path {
            match std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|s| VendorTables::from_json(&s).map_err(|e| e.to_string()))
            {
                Ok(tables) => return Self::new(tables),
                Err(e) => tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    operation = "load_vendor_tables",
                    "vendor tables unusable; falling back to built-in tables"
                ),
            }
        }
        match VendorTables::builtin() {
            Ok(tables) => Self::new(tables),
            Err(e) => {
                tracing::error!(error = %e, "built-in vendor tables invalid; camera detection limited to IP range");
                Self::new(VendorTables::default())
            }
        }
    }

    /// Brand and method for a camera-like lease, `None` for anything else.
    pub fn classify(&self, lease: &Lease) -> Option<(String, DetectionMethod)> {
        if let Some(hit) = self.lookup_mac(&lease.mac) {
            return Some(hit);
        }

        let hostname = lease.hostname.to_lowercase();
        if self
            .tables
            .camera_keywords
            .iter()
            .any(|k| hostname.contains(k.as_str()))
        {
            let brand = self
                .tables
                .brand_keywords
                .iter()
                .find(|b| hostname.contains(b.keyword.as_str()))
                .map(|b| b.brand.clone())
                .unwrap_or_else(|| UNKNOWN_BRAND.to_string());
            return Some((brand, DetectionMethod::Hostname));
        }

        if in_device_pool(&lease.ip) && is_anonymous_hostname(&lease.hostname) {
            return Some((GENERIC_CAMERA.to_string(), DetectionMethod::IpRange));
        }
        None
    }

    fn lookup_mac(&self, mac: &str) -> Option<(String, DetectionMethod)> {
        let mac = normalize_mac(mac);
        PREFIX_LENGTHS.iter().find_map(|&len| {
            let prefix = mac.get(..len)?;
            let brand = self.tables.mac_prefixes.get(prefix)?;
            Some((brand.clone(), DetectionMethod::MacVendor(len as u8)))
        })
    }

    pub fn device_record(&self, lease: &Lease, online: bool) -> DeviceRecord {
        let class = self.classify(lease);
        DeviceRecord {
            mac: lease.mac.clone(),
            ip: lease.ip.clone(),
            hostname: lease.hostname.clone(),
            brand: class.as_ref().map(|(b, _)| b.clone()),
            online,
            detection_method: class.map(|(_, m)| m),
            is_static: !lease.dynamic,
        }
    }

    /// Every lease as a device; online from the lease's own bound status.
    pub fn devices(&self, leases: &[Lease]) -> Vec<DeviceRecord> {
        leases
            .iter()
            .map(|l| self.device_record(l, l.bound))
            .collect()
    }

    /// Camera-classified leases only; online when present in ARP, else when the lease is bound.
    pub fn cameras(&self, leases: &[Lease], arp: &HashSet<String>) -> Vec<DeviceRecord> {
        leases
            .iter()
            .map(|l| self.device_record(l, arp.contains(&l.mac) || l.bound))
            .filter(|d| d.detection_method.is_some())
            .collect()
    }
}

/// Last octet in 100-254, where consumer DHCP pools usually hand out addresses.
fn in_device_pool(ip: &str) -> bool {
    ip.rsplit('.')
        .next()
        .and_then(|o| o.parse::<u8>().ok())
        .is_some_and(|o| (100..=254).contains(&o))
}

/// Empty, very short, or a bare MAC/hex string.
fn is_anonymous_hostname(hostname: &str) -> bool {
    let h = hostname.trim();
    if h.chars().count() <= 3 {
        return true;
    }
    let hex_digits = h.chars().filter(char::is_ascii_hexdigit).count();
    hex_digits >= 6
        && h
            .chars()
            .all(|c| c.is_ascii_hexdigit() || matches!(c, ':' | '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(VendorTables::builtin().unwrap())
    }

    fn lease(mac: &str, ip: &str, hostname: &str) -> Lease {
        Lease {
            mac: normalize_mac(mac),
            ip: ip.into(),
            hostname: hostname.into(),
            bound: true,
            dynamic: true,
        }
    }

    #[test]
    fn builtin_tables_parse() {
        let t = VendorTables::builtin().unwrap();
        assert!(!t.mac_prefixes.is_empty());
        assert!(t.camera_keywords.iter().all(|k| k == &k.to_lowercase()));
    }

    #[test]
    fn mac_prefix_classifies_dahua() {
        let got = classifier().classify(&lease("f8:ce:07:12:34:56", "192.168.1.20", "device"));
        assert_eq!(got, Some(("Dahua".into(), DetectionMethod::MacVendor(8))));
        assert_eq!(DetectionMethod::MacVendor(8).to_string(), "MAC Vendor (8)");
    }

    #[test]
    fn shorter_prefixes_are_tried_in_order() {
        let tables = VendorTables::from_json(
            r#"{"macPrefixes": {"AA:BB:C": "Seven", "DD:EE:": "Six"}}"#,
        )
        .unwrap();
        let c = Classifier::new(tables);
        assert_eq!(
            c.classify(&lease("AA:BB:CC:00:00:01", "10.0.0.2", "x1234")),
            Some(("Seven".into(), DetectionMethod::MacVendor(7)))
        );
        assert_eq!(
            c.classify(&lease("dd-ee-ff-00-00-01", "10.0.0.2", "x1234")),
            Some(("Six".into(), DetectionMethod::MacVendor(6)))
        );
    }

    #[test]
    fn hostname_keyword_refines_brand() {
        let got = classifier().classify(&lease("02:00:00:00:00:01", "192.168.1.50", "hikvision-cam-01"));
        assert_eq!(got, Some(("Hikvision".into(), DetectionMethod::Hostname)));
    }

    #[test]
    fn hostname_keyword_without_brand_is_unknown() {
        let got = classifier().classify(&lease("02:00:00:00:00:01", "192.168.1.50", "garage-cam"));
        assert_eq!(got, Some((UNKNOWN_BRAND.into(), DetectionMethod::Hostname)));
    }

    #[test]
    fn ip_range_fallback_for_anonymous_hosts() {
        let c = classifier();
        assert_eq!(
            c.classify(&lease("02:00:00:00:00:01", "192.168.1.210", "")),
            Some((GENERIC_CAMERA.into(), DetectionMethod::IpRange))
        );
        assert_eq!(
            c.classify(&lease("02:00:00:00:00:01", "192.168.1.150", "a4b1c2d3e4f5")),
            Some((GENERIC_CAMERA.into(), DetectionMethod::IpRange))
        );
        assert_eq!(c.classify(&lease("02:00:00:00:00:01", "192.168.1.20", "")), None);
        assert_eq!(c.classify(&lease("02:00:00:00:00:01", "192.168.1.255", "")), None);
    }

    #[test]
    fn laptop_is_never_a_camera() {
        let c = classifier();
        for ip in ["192.168.1.5", "192.168.1.120", "192.168.1.210", "192.168.1.254"] {
            assert_eq!(c.classify(&lease("02:00:00:00:00:09", ip, "laptop-maria")), None);
        }
    }

    #[test]
    fn cameras_use_arp_presence_then_lease_status() {
        let c = classifier();
        let mut offline = lease("F8:CE:07:00:00:01", "192.168.1.30", "");
        offline.bound = false;
        let mut in_arp = lease("F8:CE:07:00:00:02", "192.168.1.31", "");
        in_arp.bound = false;
        let laptop = lease("02:00:00:00:00:09", "192.168.1.40", "laptop-maria");
        let arp: HashSet<String> = [in_arp.mac.clone()].into_iter().collect();

        let cams = c.cameras(&[offline, in_arp, laptop], &arp);
        assert_eq!(cams.len(), 2);
        assert!(!cams[0].online);
        assert!(cams[1].online);
        assert_eq!(cams[1].brand.as_deref(), Some("Dahua"));
    }

    #[test]
    fn lease_from_record_prefers_active_address() {
        let mut r = Record::new();
        r.insert("mac-address".into(), "aa-bb-cc-dd-ee-ff".into());
        r.insert("address".into(), "192.168.1.9".into());
        r.insert("active-address".into(), "192.168.1.10".into());
        r.insert("status".into(), "bound".into());
        r.insert("dynamic".into(), "false".into());
        let l = Lease::from_record(&r);
        assert_eq!(l.mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(l.ip, "192.168.1.10");
        assert!(l.bound);
        assert!(!l.dynamic);
        let d = classifier().device_record(&l, l.bound);
        assert!(d.is_static);
    }
}
