use super::IoAdapter;
use crate::{error::Result, flags::BaudRate};
use core::time::Duration;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read};

/// [`IoAdapter`] over a native serial port, 8N1 framing
pub struct SerialAdapter {
    port: Box<dyn SerialPort>,
}

impl SerialAdapter {
    pub fn open(path: &str, baud: BaudRate, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud.as_u32())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(timeout)
            .open()?;
        log::info!("Camera opened on port {} at {} baud", path, baud);
        Ok(SerialAdapter { port })
    }

    pub fn new(port: Box<dyn SerialPort>) -> Self {
        SerialAdapter { port }
    }
}

impl IoAdapter for SerialAdapter {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(&mut self.port, buf)?;
        std::io::Write::flush(&mut self.port)?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut count = 0;
        while count < buf.len() {
            match self.port.read(&mut buf[count..]) {
                Ok(0) => break,
                Ok(n) => count += n,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(count)
    }

    fn set_baud_rate(&mut self, baud: BaudRate) -> Result<()> {
        self.port.set_baud_rate(baud.as_u32())?;
        Ok(())
    }

    fn baud_rate(&self) -> Result<BaudRate> {
        BaudRate::try_from(self.port.baud_rate()?)
    }

    fn clear_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
