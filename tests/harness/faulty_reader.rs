use std::io::{Read, Result};

/// Wraps a source and misbehaves in one configurable way.
pub struct FaultyReader<R: Read> {
    inner: R,
    mode: FaultMode,
    calls: usize,
    delivered: usize,
}

#[allow(dead_code)]
pub enum FaultMode {
    /// Every read returns at most `n` bytes.
    ChunksOf(usize),
    /// Every `n`th read fails with `Interrupted`.
    InterruptedEvery(usize),
    /// Reports EOF once `n` bytes have been delivered.
    EofAfterBytes(usize),
}

impl<R: Read> FaultyReader<R> {
    pub fn new(inner: R, mode: FaultMode) -> Self {
        Self {
            inner,
            mode,
            calls: 0,
            delivered: 0,
        }
    }
}

impl<R: Read> Read for FaultyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.calls += 1;
        let limit = match self.mode {
            FaultMode::ChunksOf(n) => n.max(1).min(buf.len()),
            FaultMode::InterruptedEvery(n) if n != 0 && self.calls % n == 0 => {
                return Err(std::io::Error::from(std::io::ErrorKind::Interrupted));
            }
            FaultMode::EofAfterBytes(n) => (n - self.delivered.min(n)).min(buf.len()),
            FaultMode::InterruptedEvery(_) => buf.len(),
        };
        let n = self.inner.read(&mut buf[..limit])?;
        self.delivered += n;
        Ok(n)
    }
}
