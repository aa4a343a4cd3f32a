//! Line channel straight over a serial port, for boards where the modem UART
//! is wired to the host without a bridge in between.

use super::error::Error;
use crate::network::{LineChannel, Read, Write};

/// Adapts a raw [`Read`] + [`Write`] port to [`LineChannel`].
#[derive(Debug)]
pub struct Direct<P> {
    port: P,
}

impl<P> Direct<P>
where
    P: Read + Write,
{
    /// Wrap `port`.
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Give the port back.
    pub fn release(self) -> P {
        self.port
    }
}

impl<P> LineChannel for Direct<P>
where
    P: Read + Write,
{
    type Error = Error;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let mut sent = 0;
        while sent < data.len() {
            match self.port.write(&data[sent..]) {
                Ok(0) | Err(_) => return Err(Error::Io),
                Ok(n) => sent += n,
            }
        }
        self.port.flush().map_err(|_| Error::Io)
    }

    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        while count < buf.len() {
            let n = self
                .port
                .read(&mut buf[count..count + 1])
                .map_err(|_| Error::Io)?;
            if n == 0 {
                break;
            }
            count += 1;
            if buf[count - 1] == b'\n' {
                break;
            }
        }
        Ok(count)
    }
}
