use embedded_storage::{ReadStorage, Storage};
use esp_bootloader_esp_idf::partitions::{
    DataPartitionSubType, PARTITION_TABLE_MAX_LEN, PartitionType, read_partition_table,
};
use esp_rom_sys::rom::spiflash::{
    ESP_ROM_SPIFLASH_RESULT_OK, esp_rom_spiflash_erase_sector, esp_rom_spiflash_read,
    esp_rom_spiflash_unlock, esp_rom_spiflash_write,
};
use keylink_core::settings::{
    CONFIG_RECORD_LEN, ConfigStore, PersistedConfig, RecordError, decode_record, encode_record,
};

const FLASH_SECTOR_SIZE: u32 = 4096;
const FLASH_WORD: usize = 4;
const RECORD_WORDS: usize = CONFIG_RECORD_LEN / FLASH_WORD;
const DEFAULT_FLASH_CAPACITY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlashConfigError {
    PartitionTable,
    ConfigPartitionMissing,
    FlashOpFailed(i32),
    Corrupted,
    Unaligned,
}

impl From<RecordError> for FlashConfigError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Corrupted => Self::Corrupted,
        }
    }
}

fn rom_result(rc: i32) -> Result<(), FlashConfigError> {
    if rc == ESP_ROM_SPIFLASH_RESULT_OK {
        Ok(())
    } else {
        Err(FlashConfigError::FlashOpFailed(rc))
    }
}

/// Word-granular access to the SPI flash through the ROM routines.
#[derive(Debug)]
struct RomFlash;

impl RomFlash {
    fn unlock() -> Result<Self, FlashConfigError> {
        rom_result(unsafe { esp_rom_spiflash_unlock() })?;
        Ok(Self)
    }

    fn read_words(&mut self, addr: u32, words: &mut [u32]) -> Result<(), FlashConfigError> {
        if !addr.is_multiple_of(FLASH_WORD as u32) {
            return Err(FlashConfigError::Unaligned);
        }
        let len = (words.len() * FLASH_WORD) as i32;
        rom_result(unsafe { esp_rom_spiflash_read(addr, words.as_mut_ptr() as *const u32, len) })
    }

    fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<(), FlashConfigError> {
        if !addr.is_multiple_of(FLASH_WORD as u32) {
            return Err(FlashConfigError::Unaligned);
        }
        let len = (words.len() * FLASH_WORD) as i32;
        rom_result(unsafe { esp_rom_spiflash_write(addr, words.as_ptr(), len) })
    }

    fn erase_sector_at(&mut self, addr: u32) -> Result<(), FlashConfigError> {
        if !addr.is_multiple_of(FLASH_SECTOR_SIZE) {
            return Err(FlashConfigError::Unaligned);
        }
        rom_result(unsafe { esp_rom_spiflash_erase_sector(addr / FLASH_SECTOR_SIZE) })
    }
}

// Only used to walk the partition table, whose reads are word aligned.
impl ReadStorage for RomFlash {
    type Error = FlashConfigError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let mut word = [0u32; 1];
        for (index, chunk) in bytes.chunks_mut(FLASH_WORD).enumerate() {
            self.read_words(offset + (index * FLASH_WORD) as u32, &mut word)?;
            chunk.copy_from_slice(&word[0].to_le_bytes()[..chunk.len()]);
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        DEFAULT_FLASH_CAPACITY_BYTES
    }
}

impl Storage for RomFlash {
    fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Self::Error> {
        Err(FlashConfigError::Unaligned)
    }
}

/// Keeps the config record in the last sector of the first writable data
/// partition (`undefined` subtype preferred, `nvs` as fallback).
#[derive(Debug)]
pub struct FlashConfigStore {
    flash: RomFlash,
    record_addr: u32,
}

impl FlashConfigStore {
    pub fn new() -> Result<Self, FlashConfigError> {
        let mut flash = RomFlash::unlock()?;

        let mut table_buf = [0u8; PARTITION_TABLE_MAX_LEN];
        let table = read_partition_table(&mut flash, &mut table_buf)
            .map_err(|_| FlashConfigError::PartitionTable)?;

        let mut nvs = None;
        let mut undefined = None;
        for entry in table.iter() {
            if entry.is_read_only() || entry.len() < FLASH_SECTOR_SIZE {
                continue;
            }
            match entry.partition_type() {
                PartitionType::Data(DataPartitionSubType::Undefined) if undefined.is_none() => {
                    undefined = Some((entry.offset(), entry.len()));
                }
                PartitionType::Data(DataPartitionSubType::Nvs) if nvs.is_none() => {
                    nvs = Some((entry.offset(), entry.len()));
                }
                _ => {}
            }
        }

        let (offset, len) = undefined
            .or(nvs)
            .ok_or(FlashConfigError::ConfigPartitionMissing)?;
        let record_addr = offset + len - FLASH_SECTOR_SIZE;
        log::debug!("config: record sector at {:#x}", record_addr);

        Ok(Self { flash, record_addr })
    }
}

impl ConfigStore for FlashConfigStore {
    type Error = FlashConfigError;

    fn load(&mut self) -> Result<Option<PersistedConfig>, Self::Error> {
        let mut words = [0u32; RECORD_WORDS];
        self.flash.read_words(self.record_addr, &mut words)?;

        let mut buf = [0u8; CONFIG_RECORD_LEN];
        for (chunk, word) in buf.chunks_exact_mut(FLASH_WORD).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Ok(decode_record(&buf)?)
    }

    fn save(&mut self, config: &PersistedConfig) -> Result<(), Self::Error> {
        let buf = encode_record(config);
        let mut words = [0u32; RECORD_WORDS];
        for (word, chunk) in words.iter_mut().zip(buf.chunks_exact(FLASH_WORD)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        self.flash.erase_sector_at(self.record_addr)?;
        self.flash.write_words(self.record_addr, &words)
    }
}
