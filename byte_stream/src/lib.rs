#![no_std]

use core::hint::spin_loop;

/// Non-blocking byte-oriented stream abstraction.
///
/// Implementations sit directly on a UART FIFO: `try_read` pops one received
/// byte if the RX FIFO holds one, `try_write` pushes one byte if the TX FIFO
/// has room.
pub trait ByteStream {
    /// Error type returned by stream operations.
    type Error;

    /// Read a single byte if one is available.
    fn try_read(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Write a single byte if the transmitter can accept it.
    /// Returns `false` when the byte was not accepted.
    fn try_write(&mut self, byte: u8) -> Result<bool, Self::Error>;

    /// Flush any buffered data. Default is a no-op.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Blocking helpers layered on top of [`ByteStream`].
pub trait ByteStreamBlockingExt: ByteStream {
    /// Spin until the transmitter accepts `byte`.
    fn write_blocking(&mut self, byte: u8) -> Result<(), Self::Error> {
        while !self.try_write(byte)? {
            spin_loop();
        }
        Ok(())
    }

    /// Write an entire buffer to the stream.
    fn write_all_blocking(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        for &b in buf {
            self.write_blocking(b)?;
        }
        self.flush()
    }
}

impl<T: ByteStream + ?Sized> ByteStreamBlockingExt for T {}

impl<T: ByteStream + ?Sized> ByteStream for &mut T {
    type Error = T::Error;

    fn try_read(&mut self) -> Result<Option<u8>, Self::Error> {
        (**self).try_read()
    }

    fn try_write(&mut self, byte: u8) -> Result<bool, Self::Error> {
        (**self).try_write(byte)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }
}
