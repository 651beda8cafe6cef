//! Persisted device configuration: pairing address and battery calibration.

mod record;

use core::fmt;

pub use record::{CONFIG_RECORD_LEN, RecordError, decode_record, encode_record};

/// 6-byte radio address of the paired receiver.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PairingAddress(pub [u8; 6]);

impl PairingAddress {
    /// Erased-flash value, meaning "no receiver configured".
    pub const UNSET: Self = Self([0xFF; 6]);

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    /// Parses `AA:BB:CC:DD:EE:FF` (`-` separators are accepted as well).
    pub fn parse(text: &str) -> Option<Self> {
        let mut out = [0u8; 6];
        let mut parts = text.trim().split([':', '-']);
        for slot in out.iter_mut() {
            let part = parts.next()?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            *slot = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self(out))
    }
}

impl fmt::Display for PairingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// The single record kept in the persistent store.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PersistedConfig {
    pub pairing_address: PairingAddress,
    pub calibration_offset: i32,
}

impl PersistedConfig {
    pub const fn new(pairing_address: PairingAddress, calibration_offset: i32) -> Self {
        Self {
            pairing_address,
            calibration_offset,
        }
    }

    pub const fn with_calibration_offset(mut self, calibration_offset: i32) -> Self {
        self.calibration_offset = calibration_offset;
        self
    }

    pub const fn with_pairing_address(mut self, pairing_address: PairingAddress) -> Self {
        self.pairing_address = pairing_address;
        self
    }
}

impl Default for PersistedConfig {
    fn default() -> Self {
        Self::new(PairingAddress::UNSET, 0)
    }
}

/// Abstract config persistence backend. `save` always rewrites the full record.
pub trait ConfigStore {
    type Error;

    fn load(&mut self) -> Result<Option<PersistedConfig>, Self::Error>;
    fn save(&mut self, config: &PersistedConfig) -> Result<(), Self::Error>;
}

/// Result of applying the compiled-in pairing address at boot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Provisioning {
    pub config: PersistedConfig,
    pub needs_write: bool,
}

/// Applies `provisioned` only when it is set and differs from the stored address.
pub fn provision(stored: Option<PersistedConfig>, provisioned: PairingAddress) -> Provisioning {
    let config = stored.unwrap_or_default();
    if provisioned.is_unset() || provisioned == config.pairing_address {
        return Provisioning {
            config,
            needs_write: false,
        };
    }

    Provisioning {
        config: config.with_pairing_address(provisioned),
        needs_write: true,
    }
}
