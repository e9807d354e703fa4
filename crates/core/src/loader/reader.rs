//! Bounds-checked big-endian cursor over class-file bytes.

/// Cursor over a byte slice. Every read checks the remaining length and
/// reports the offset of a truncated read.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        ByteReader { data, position: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, String> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, String> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, String> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], String> {
        if len > self.remaining() {
            return Err(format!(
                "truncated data: need {len} bytes at offset {}, {} available",
                self.position,
                self.remaining()
            ));
        }
        let start = self.position;
        self.position += len;
        Ok(&self.data[start..self.position])
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), String> {
        self.read_bytes(len).map(|_| ())
    }
}
