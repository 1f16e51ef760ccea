//! Identifier generation for documents created by the server.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::utils::time::now_secs;

static OBJECT_ID_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Prefix carried by every area bundle key.
pub const BUNDLE_KEY_PREFIX: &str = "rr";

/// Object-id style identifier: seconds timestamp (8 hex), machine id
/// (6 hex), process id (4 hex) and a process-wide counter (6 hex).
/// Machine and process id are always zero.
pub fn generate_object_id() -> String {
    let counter = OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format_object_id(now_secs(), 0, 0, counter)
}

fn format_object_id(timestamp_secs: u64, machine_id: u32, process_id: u16, counter: u32) -> String {
    format!(
        "{:08x}{:06x}{:04x}{:06x}",
        timestamp_secs & 0xffff_ffff,
        machine_id & 0x00ff_ffff,
        process_id,
        counter & 0x00ff_ffff
    )
}

/// 24 hex characters taken from a random UUID.
pub fn generate_area_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(24);
    id
}

pub fn generate_bundle_key() -> String {
    format!("{BUNDLE_KEY_PREFIX}{}", generate_area_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_hex(value: &str) -> bool {
        value.chars().all(|c| c.is_ascii_hexdigit())
    }

    #[test]
    fn object_id_layout() {
        assert_eq!(
            format_object_id(0x5f5e_1000, 0, 0, 0x2a),
            "5f5e1000000000000000002a"
        );
        assert_eq!(format_object_id(1, 0xab, 0xcd, 0xef), "000000010000ab00cd0000ef");
    }

    #[test]
    fn generated_object_ids_are_unique_and_hex() {
        let first = generate_object_id();
        let second = generate_object_id();
        assert_eq!(first.len(), 24);
        assert!(is_hex(&first));
        assert_ne!(first, second);
    }

    #[test]
    fn area_ids_and_bundle_keys() {
        let id = generate_area_id();
        assert_eq!(id.len(), 24);
        assert!(is_hex(&id));

        let key = generate_bundle_key();
        assert!(key.starts_with(BUNDLE_KEY_PREFIX));
        assert_eq!(key.len(), 26);
    }
}
