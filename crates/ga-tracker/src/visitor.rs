//! Anonymous, machine-stable visitor identifiers

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derive a visitor id that is stable for this machine and account.
///
/// The id is a SHA256 hash of:
/// - the tracking code, used as salt
/// - MAC address (or hostname as fallback)
///
/// folded into the positive 31-bit range the `__utma` cookie expects. The
/// same machine reports different ids to different accounts.
pub fn machine_visitor_id(tracking_code: &str) -> u32 {
    let machine_identifier = get_machine_identifier();
    fold_digest(tracking_code, &machine_identifier)
}

fn fold_digest(salt: &str, identifier: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(identifier.as_bytes());
    let hash = hasher.finalize();

    let folded = u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]) & 0x7fff_ffff;
    folded.max(1)
}

/// Get a stable machine identifier (MAC address, hostname, or UUID fallback)
fn get_machine_identifier() -> String {
    // Try MAC address first (most stable)
    if let Ok(Some(mac_addr)) = mac_address::get_mac_address() {
        return mac_addr.to_string();
    }

    if let Ok(hostname) = hostname::get() {
        if let Some(hostname_str) = hostname.to_str() {
            if !hostname_str.is_empty() {
                return hostname_str.to_string();
            }
        }
    }

    // Not stable across runs, but still anonymous
    tracing::debug!("no MAC address or hostname available, using a random visitor id");
    Uuid::new_v4().to_string()
}
