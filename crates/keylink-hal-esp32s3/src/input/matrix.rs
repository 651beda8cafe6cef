use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Deque;

use keylink_core::{
    command::KeyId,
    input::{KeyEvent, KeyEventProvider},
};

const EVENT_QUEUE_DEPTH: usize = 16;
// Spins between driving a column and sampling the rows.
const COLUMN_SETTLE_SPINS: u32 = 64;

#[derive(Debug, Clone, Copy)]
pub struct MatrixConfig {
    debounce_polls: u8,
    rows_active_high: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            debounce_polls: 3,
            rows_active_high: true,
        }
    }
}

impl MatrixConfig {
    pub const fn with_debounce_polls(mut self, debounce_polls: u8) -> Self {
        self.debounce_polls = debounce_polls;
        self
    }

    pub const fn with_rows_active_high(mut self, rows_active_high: bool) -> Self {
        self.rows_active_high = rows_active_high;
        self
    }
}

#[derive(Debug)]
pub enum MatrixError<RowErr, ColErr> {
    Row(RowErr),
    Col(ColErr),
}

type MatrixResult<RowErr, ColErr, T> = Result<T, MatrixError<RowErr, ColErr>>;

/// Column-driven key matrix. Key ids are `row * COLS + col`.
#[derive(Debug)]
pub struct KeyMatrix<ROW, COL, const ROWS: usize, const COLS: usize> {
    rows: [ROW; ROWS],
    cols: [COL; COLS],
    config: MatrixConfig,
    raw: [[bool; COLS]; ROWS],
    stable: [[bool; COLS]; ROWS],
    stable_count: [[u8; COLS]; ROWS],
    queued: Deque<KeyEvent, EVENT_QUEUE_DEPTH>,
    overflow_logged: bool,
}

impl<ROW, COL, const ROWS: usize, const COLS: usize> KeyMatrix<ROW, COL, ROWS, COLS>
where
    ROW: InputPin,
    COL: OutputPin,
{
    pub fn new(
        rows: [ROW; ROWS],
        mut cols: [COL; COLS],
        config: MatrixConfig,
    ) -> MatrixResult<ROW::Error, COL::Error, Self> {
        for col in cols.iter_mut() {
            col.set_low().map_err(MatrixError::Col)?;
        }

        Ok(Self {
            rows,
            cols,
            config,
            raw: [[false; COLS]; ROWS],
            stable: [[false; COLS]; ROWS],
            stable_count: [[0; COLS]; ROWS],
            queued: Deque::new(),
            overflow_logged: false,
        })
    }

    pub const fn key_at(row: usize, col: usize) -> KeyId {
        KeyId((row * COLS + col) as u8)
    }

    pub fn any_pressed(&self) -> bool {
        self.stable.iter().flatten().any(|pressed| *pressed)
    }

    /// Drives every column high so a press on any key raises its row line.
    pub fn prepare_for_wake(&mut self) -> MatrixResult<ROW::Error, COL::Error, ()> {
        for col in self.cols.iter_mut() {
            col.set_high().map_err(MatrixError::Col)?;
        }
        Ok(())
    }

    fn scan(&mut self) -> MatrixResult<ROW::Error, COL::Error, ()> {
        let debounce_threshold = self.config.debounce_polls.max(1);

        for col in 0..COLS {
            self.cols[col].set_high().map_err(MatrixError::Col)?;
            for _ in 0..COLUMN_SETTLE_SPINS {
                core::hint::spin_loop();
            }

            for row in 0..ROWS {
                let high = self.rows[row].is_high().map_err(MatrixError::Row)?;
                let pressed = high == self.config.rows_active_high;

                if pressed == self.raw[row][col] {
                    self.stable_count[row][col] = self.stable_count[row][col].saturating_add(1);
                } else {
                    self.raw[row][col] = pressed;
                    self.stable_count[row][col] = 0;
                }

                if self.stable_count[row][col] >= debounce_threshold
                    && self.stable[row][col] != pressed
                {
                    self.stable[row][col] = pressed;
                    let key = Self::key_at(row, col);
                    let event = if pressed {
                        KeyEvent::Down(key)
                    } else {
                        KeyEvent::Up(key)
                    };
                    self.enqueue(event);
                }
            }

            self.cols[col].set_low().map_err(MatrixError::Col)?;
        }

        Ok(())
    }

    fn enqueue(&mut self, event: KeyEvent) {
        if self.queued.push_back(event).is_err() && !self.overflow_logged {
            log::info!("matrix: event queue full; dropping {:?}", event);
            self.overflow_logged = true;
        }
    }
}

impl<ROW, COL, const ROWS: usize, const COLS: usize> KeyEventProvider
    for KeyMatrix<ROW, COL, ROWS, COLS>
where
    ROW: InputPin,
    COL: OutputPin,
{
    type Error = MatrixError<ROW::Error, COL::Error>;

    /// One full matrix pass per control cycle; the debounce counts cycles.
    fn refresh(&mut self) -> Result<(), Self::Error> {
        self.scan()
    }

    fn poll_event(&mut self) -> Result<Option<KeyEvent>, Self::Error> {
        Ok(self.queued.pop_front())
    }
}
