//! Network primitives: interface enumeration, subnet math, reverse DNS,
//! ARP cache and vendor lookup

pub mod arp;
pub mod dns;
pub mod interface;
pub mod subnet;

pub use arp::{is_locally_administered, lookup_mac, lookup_vendor};
pub use dns::{reverse_lookup, reverse_lookup_with_timeout};
pub use interface::{detect_local_networks, interface_score, list_interfaces};
pub use subnet::{parse_range, resolve_networks, subnet_hosts, RangeSpec};
