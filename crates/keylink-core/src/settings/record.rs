use super::{PairingAddress, PersistedConfig};

const CONFIG_MAGIC: u32 = 0x3143_4C4B; // "KLC1"
const CONFIG_VERSION: u8 = 1;
const CHECKSUM_OFFSET: usize = 16;

pub const CONFIG_RECORD_LEN: usize = 20;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RecordError {
    Corrupted,
}

/// Serialises `config` into the fixed on-flash layout.
///
/// | bytes  | field                         |
/// |--------|-------------------------------|
/// | 0..4   | magic `KLC1`                  |
/// | 4      | version                       |
/// | 5..11  | pairing address               |
/// | 11..15 | calibration offset, `i32` LE  |
/// | 15     | reserved                      |
/// | 16..20 | FNV-1a checksum of bytes 0..16 |
pub fn encode_record(config: &PersistedConfig) -> [u8; CONFIG_RECORD_LEN] {
    let mut buf = [0u8; CONFIG_RECORD_LEN];
    buf[0..4].copy_from_slice(&CONFIG_MAGIC.to_le_bytes());
    buf[4] = CONFIG_VERSION;
    buf[5..11].copy_from_slice(&config.pairing_address.0);
    buf[11..15].copy_from_slice(&config.calibration_offset.to_le_bytes());
    let checksum = checksum32(&buf[..CHECKSUM_OFFSET]);
    buf[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_le_bytes());
    buf
}

/// Erased flash, a foreign magic or an unknown version all read as "no record".
pub fn decode_record(
    buf: &[u8; CONFIG_RECORD_LEN],
) -> Result<Option<PersistedConfig>, RecordError> {
    if buf.iter().all(|b| *b == 0xFF) {
        return Ok(None);
    }

    let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if magic != CONFIG_MAGIC || buf[4] != CONFIG_VERSION {
        return Ok(None);
    }

    let expected_checksum = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);
    if checksum32(&buf[..CHECKSUM_OFFSET]) != expected_checksum {
        return Err(RecordError::Corrupted);
    }

    let mut address = [0u8; 6];
    address.copy_from_slice(&buf[5..11]);
    let calibration_offset = i32::from_le_bytes([buf[11], buf[12], buf[13], buf[14]]);

    Ok(Some(PersistedConfig::new(
        PairingAddress(address),
        calibration_offset,
    )))
}

fn checksum32(bytes: &[u8]) -> u32 {
    let mut hash = 0x811C9DC5u32;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
