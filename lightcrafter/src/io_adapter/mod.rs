pub(crate) mod std_io;
pub(crate) mod tcp;

use crate::{
    error::{Error, Result},
    lightcrafter::LightCrafter,
};

/// Byte stream the projector is reached through
pub trait IoAdapter {
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Fills `buf` completely, a stream that ends early means the device hung up
    fn read_exact(&mut self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.read(buf)? {
                0 => return Err(Error::ConnectionClosed),
                n => {
                    let rest = buf;
                    buf = &mut rest[n..];
                }
            }
        }
        Ok(())
    }

    fn open_lightcrafter(self) -> LightCrafter<Self>
    where
        Self: Sized,
    {
        LightCrafter::new(self)
    }
}
