//! Board identity and local address discovery.

use std::path::Path;
use tracing::{debug, info};

use crate::session::DeviceIdentity;

const SYS_NET: &str = "/sys/class/net";

/// Reported to the board when the local address cannot be determined.
pub const UNKNOWN_ADDRESS: &str = "no idea";

/// Resolve this board's identity: an explicit override wins, then the first
/// hardware address, then a random node id.
pub fn identity(override_id: Option<&str>) -> DeviceIdentity {
    let hardware = hardware_address(Path::new(SYS_NET));
    info!(
        "my real mac> {}",
        hardware.as_deref().unwrap_or("unavailable")
    );

    if let Some(id) = override_id.filter(|id| !id.is_empty()) {
        info!("Emulating board {}", id);
        return DeviceIdentity::new(id);
    }
    DeviceIdentity::new(hardware.unwrap_or_else(random_node_id))
}

/// First non-loopback, non-zero interface address under `root`, as twelve
/// upper-case hex digits.
pub fn hardware_address(root: &Path) -> Option<String> {
    let mut interfaces: Vec<_> = std::fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name() != "lo")
        .map(|entry| entry.path())
        .collect();
    interfaces.sort();

    interfaces.iter().find_map(|iface| {
        let raw = std::fs::read_to_string(iface.join("address")).ok()?;
        format_hardware_address(&raw)
    })
}

/// `b4:21:8a:f8:35:36` -> `B4218AF83536`. Rejects anything but a non-zero
/// 48-bit address.
pub fn format_hardware_address(raw: &str) -> Option<String> {
    let hex: String = raw.trim().split(':').collect::<Vec<_>>().concat();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    if hex.chars().all(|c| c == '0') {
        return None;
    }
    Some(hex.to_ascii_uppercase())
}

/// Random 48-bit node id with the multicast bit set, so it can never collide
/// with a real hardware address.
pub fn random_node_id() -> String {
    let node = (rand::random::<u64>() & 0xFFFF_FFFF_FFFF) | (1 << 40);
    format!("{:012X}", node)
}

/// Address of the interface carrying the default route, or
/// [`UNKNOWN_ADDRESS`].
pub fn local_ip() -> String {
    match local_ip_address::local_ip() {
        Ok(ip) => ip.to_string(),
        Err(e) => {
            debug!("Local address discovery failed: {}", e);
            UNKNOWN_ADDRESS.to_string()
        }
    }
}
