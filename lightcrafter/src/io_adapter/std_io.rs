use super::IoAdapter;
use crate::error::Result;
use std::io::{ErrorKind, Read, Write};

pub struct StdIoAdapter<IO: Read + Write> {
    io: IO,
}

impl<IO: Read + Write> IoAdapter for StdIoAdapter<IO> {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.io.write_all(buf)?;
        self.io.flush()?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.io.read(buf) {
                Ok(count) => return Ok(count),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<IO: Read + Write> StdIoAdapter<IO> {
    pub fn new(io: IO) -> Self {
        StdIoAdapter { io }
    }

    pub fn get_ref(&self) -> &IO {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn into_inner(self) -> IO {
        self.io
    }
}
