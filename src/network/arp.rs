//! ARP cache and MAC vendor lookup
//!
//! MAC addresses come from the local ARP cache, which only covers hosts on
//! directly attached subnets. Vendor names resolve through the embedded OUI
//! database.

use std::net::Ipv4Addr;
use std::sync::OnceLock;

use mac_oui::Oui;

/// Global OUI database instance (loaded once)
static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn oui_db() -> Option<&'static Oui> {
    OUI_DB.get_or_init(|| Oui::default().ok()).as_ref()
}

/// Check if a MAC address is locally administered (randomized/virtual).
///
/// Bit 2 of the first byte: 0 = universally administered hardware,
/// 1 = locally administered.
pub fn is_locally_administered(mac: &str) -> bool {
    let normalized: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(2)
        .collect();

    if normalized.len() < 2 {
        return false;
    }

    match u8::from_str_radix(&normalized, 16) {
        Ok(first_byte) => (first_byte & 0x02) != 0,
        Err(_) => false,
    }
}

/// Look up the manufacturer for a MAC address.
pub fn lookup_vendor(mac: &str) -> Option<String> {
    if is_locally_administered(mac) {
        return Some("Private Device (Randomized MAC)".to_string());
    }

    let db = oui_db()?;
    match db.lookup_by_mac(mac) {
        Ok(Some(entry)) => Some(entry.company_name.clone()),
        _ => None,
    }
}

/// Look up a host's MAC address in the local ARP cache.
///
/// Linux exposes the cache at /proc/net/arp; other platforms return None and
/// the probe simply carries no MAC enrichment.
pub fn lookup_mac(ip: Ipv4Addr) -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let table = std::fs::read_to_string("/proc/net/arp").ok()?;
        parse_arp_table(&table, ip)
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = ip;
        None
    }
}

/// Parse one `/proc/net/arp`-format table.
///
/// Columns: IP address, HW type, Flags, HW address, Mask, Device.
/// Flags 0x0 marks an incomplete entry.
fn parse_arp_table(table: &str, ip: Ipv4Addr) -> Option<String> {
    let needle = ip.to_string();
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        if fields[0] != needle {
            continue;
        }
        if fields[2] == "0x0" {
            return None;
        }
        let mac = fields[3].to_uppercase();
        if mac == "00:00:00:00:00:00" {
            return None;
        }
        return Some(mac);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TABLE: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.1      0x1         0x2         a4:91:b1:0a:22:01     *        eth0
192.168.1.50     0x1         0x0         00:00:00:00:00:00     *        eth0
192.168.1.77     0x1         0x2         b8:27:eb:3c:11:9f     *        eth0
";

    #[test]
    fn test_parse_arp_table_finds_complete_entry() {
        let mac = parse_arp_table(SAMPLE_TABLE, Ipv4Addr::new(192, 168, 1, 77));
        assert_eq!(mac.as_deref(), Some("B8:27:EB:3C:11:9F"));
    }

    #[test]
    fn test_parse_arp_table_skips_incomplete_entry() {
        assert!(parse_arp_table(SAMPLE_TABLE, Ipv4Addr::new(192, 168, 1, 50)).is_none());
    }

    #[test]
    fn test_parse_arp_table_misses_unknown_ip() {
        assert!(parse_arp_table(SAMPLE_TABLE, Ipv4Addr::new(192, 168, 1, 200)).is_none());
    }

    #[test]
    fn test_locally_administered_detection() {
        assert!(is_locally_administered("02:00:00:11:22:33"));
        assert!(is_locally_administered("D6:11:22:33:44:55"));
        assert!(!is_locally_administered("A4:91:B1:0A:22:01"));
        assert!(!is_locally_administered(""));
    }

    #[test]
    fn test_randomized_mac_vendor_label() {
        let vendor = lookup_vendor("02:00:00:11:22:33");
        assert_eq!(vendor.as_deref(), Some("Private Device (Randomized MAC)"));
    }
}
