/// Result of an append that did not fit: the bytes that were kept and the ones dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow {
    pub kept: usize,
    pub dropped: usize,
}

/// Byte buffer that never grows past its capacity.
#[derive(Debug, Clone)]
pub struct BoundedBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl BoundedBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append as much of `bytes` as fits. Anything past capacity is dropped and
    /// reported through `Overflow`.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), Overflow> {
        let room = self.remaining();
        if bytes.len() <= room {
            self.data.extend_from_slice(bytes);
            return Ok(());
        }
        self.data.extend_from_slice(&bytes[..room]);
        Err(Overflow {
            kept: room,
            dropped: bytes.len() - room,
        })
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Move the contents out, leaving the buffer empty with its capacity intact.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.data, Vec::with_capacity(self.capacity))
    }
}
