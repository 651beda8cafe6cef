const BOOT_COUNT_MAGIC: u32 = 0x4b4c_4243;

// Survives deep sleep; garbage after a power-on reset until the magic is written.
#[esp_hal::ram(unstable(rtc_fast, persistent))]
static mut BOOT_COUNT_MARK: u32 = 0;
#[esp_hal::ram(unstable(rtc_fast, persistent))]
static mut BOOT_COUNT: u32 = 0;

/// Bumps and returns the boot counter. A cold boot restarts it at 1.
pub(super) fn advance(cold_boot: bool) -> u32 {
    let mark = &raw mut BOOT_COUNT_MARK;
    let count = &raw mut BOOT_COUNT;

    // Single core, called once before any task is spawned.
    unsafe {
        let previous = if cold_boot || mark.read_volatile() != BOOT_COUNT_MAGIC {
            0
        } else {
            count.read_volatile()
        };
        let next = previous.wrapping_add(1);
        count.write_volatile(next);
        mark.write_volatile(BOOT_COUNT_MAGIC);
        next
    }
}
