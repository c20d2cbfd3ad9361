use std::io;

/// Byte channel to the BMS.
///
/// `read` must not block: it returns whatever is pending, possibly nothing.
pub trait Transport {
    fn write(&mut self, tx_buffer: &[u8]) -> io::Result<()>;

    /// Reads at most `rx_buffer.len()` pending bytes and returns how many were read.
    fn read(&mut self, rx_buffer: &mut [u8]) -> io::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, tx_buffer: &[u8]) -> io::Result<()> {
        (**self).write(tx_buffer)
    }

    fn read(&mut self, rx_buffer: &mut [u8]) -> io::Result<usize> {
        (**self).read(rx_buffer)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, tx_buffer: &[u8]) -> io::Result<()> {
        (**self).write(tx_buffer)
    }

    fn read(&mut self, rx_buffer: &mut [u8]) -> io::Result<usize> {
        (**self).read(rx_buffer)
    }
}
