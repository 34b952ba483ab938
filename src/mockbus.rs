//! Scripted I2C bus for tests, backed by a register image.

use std::collections::HashMap;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};

pub struct MockBus {
    regs: HashMap<u8, u8>,
    /// Register/value pairs written by the device under test, in order.
    pub writes: Vec<(u8, u8)>,
    /// Fail every transaction after this many have succeeded.
    pub fail_after: Option<usize>,
    completed: usize,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            regs: HashMap::new(),
            writes: Vec::new(),
            fail_after: None,
            completed: 0,
        }
    }

    /// Store a signed 16-bit word big-endian across a high/low register pair.
    pub fn set_word(&mut self, reg: u8, value: i16) {
        let bytes = value.to_be_bytes();
        self.regs.insert(reg, bytes[0]);
        self.regs.insert(reg + 1, bytes[1]);
    }
}

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    fn transaction(
        &mut self,
        _address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if let Some(limit) = self.fail_after {
            if self.completed >= limit {
                return Err(ErrorKind::Other);
            }
        }
        self.completed += 1;

        let mut pointer = 0u8;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let bytes: &[u8] = bytes;
                    match bytes {
                        [reg] => pointer = *reg,
                        [reg, value] => {
                            self.regs.insert(*reg, *value);
                            self.writes.push((*reg, *value));
                        }
                        _ => {}
                    }
                }
                Operation::Read(buf) => {
                    for (offset, slot) in buf.iter_mut().enumerate() {
                        *slot = self
                            .regs
                            .get(&(pointer.wrapping_add(offset as u8)))
                            .copied()
                            .unwrap_or(0);
                    }
                }
            }
        }
        Ok(())
    }
}
