use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("Index out of bounds.")]
    IndexOutOfBounds,
    #[error("Buffer exceeds its fixed capacity of {0} bytes.")]
    CapacityExceeded(usize),
}

/// A byte buffer that is consumed from the front as headers are peeled off.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Buffer {
    storage: Vec<u8>,
    starting_offset: usize,
}

impl From<Vec<u8>> for Buffer {
    #[inline(always)]
    fn from(v: Vec<u8>) -> Self {
        Buffer {
            storage: v,
            starting_offset: 0,
        }
    }
}

impl From<&[u8]> for Buffer {
    #[inline(always)]
    fn from(v: &[u8]) -> Self {
        Buffer::from(v.to_vec())
    }
}

impl AsRef<[u8]> for Buffer {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        &self.storage[self.starting_offset..]
    }
}

impl AsMut<[u8]> for Buffer {
    #[inline(always)]
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.starting_offset..]
    }
}

impl Buffer {
    /// Wraps `v`, refusing it when it is longer than `capacity`.
    pub fn with_capacity_limit(v: Vec<u8>, capacity: usize) -> Result<Self, BufferError> {
        if v.len() > capacity {
            return Err(BufferError::CapacityExceeded(capacity));
        }
        Ok(Buffer::from(v))
    }

    #[inline(always)]
    pub fn try_at(&self, n: usize) -> Option<u8> {
        self.as_ref().get(n).copied()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn try_remove_prefix(&mut self, n: usize) -> Result<&[u8], BufferError> {
        if n > self.len() {
            return Err(BufferError::IndexOutOfBounds);
        }
        let slice = &self.storage[self.starting_offset..self.starting_offset + n];
        self.starting_offset += n;
        Ok(slice)
    }

    /// Drops `n` bytes from the back, used to shed trailers such as the FCS.
    pub fn try_remove_suffix(&mut self, n: usize) -> Result<(), BufferError> {
        if n > self.len() {
            return Err(BufferError::IndexOutOfBounds);
        }
        let new_len = self.storage.len() - n;
        self.storage.truncate(new_len);
        Ok(())
    }

    /// Takes whatever has not been consumed yet, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        let rest = self.storage.split_off(self.starting_offset);
        self.storage.clear();
        self.starting_offset = 0;
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_prefix_advances_view() {
        let mut buf = Buffer::from(vec![1, 2, 3, 4, 5]);
        assert_eq!(buf.try_remove_prefix(2).unwrap(), &[1, 2]);
        assert_eq!(buf.as_ref(), &[3, 4, 5]);
        assert_eq!(buf.try_at(0), Some(3));
        assert_eq!(
            buf.try_remove_prefix(4).unwrap_err(),
            BufferError::IndexOutOfBounds
        );
    }

    #[test]
    fn suffix_and_take() {
        let mut buf = Buffer::from(vec![1, 2, 3, 4, 5, 6]);
        buf.try_remove_prefix(1).unwrap();
        buf.try_remove_suffix(2).unwrap();
        assert_eq!(buf.take(), vec![2, 3, 4]);
        assert!(buf.is_empty());
    }

    #[test]
    fn capacity_limit() {
        assert!(Buffer::with_capacity_limit(vec![0; 8], 8).is_ok());
        assert_eq!(
            Buffer::with_capacity_limit(vec![0; 9], 8).unwrap_err(),
            BufferError::CapacityExceeded(8)
        );
    }
}
