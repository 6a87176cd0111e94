//! Broker client identity derived from the ESP32 factory MAC address.
//!
//! The client id is `{base}_{MAC}` with the full 6-byte MAC in uppercase
//! hex and no separators, e.g. `esp32_client_DEADBEEFCAFE`. It is stable
//! across reboots and unique per board, so two lamps never evict each other
//! from the broker.

use core::fmt::Write;

/// Client id string; base (max 24) + `_` + 12 hex digits fits with room.
pub type ClientId = heapless::String<48>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: writes exactly six bytes into `mac`.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn client_id(base: &str, mac: &MacAddress) -> ClientId {
    let mut id = ClientId::new();
    // Cannot overflow: NetworkConfig caps the base at 24 bytes.
    let _ = write!(
        id,
        "{base}_{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    id
}
