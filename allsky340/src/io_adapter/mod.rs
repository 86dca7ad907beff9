#[cfg(feature = "serial")]
pub(crate) mod serial;

use crate::{camera::Camera, error::Result, flags::BaudRate};

/// Byte level link to the camera.
///
/// Implementations own the currently active baud rate; the camera driver only
/// ever changes it through [`IoAdapter::set_baud_rate`].
pub trait IoAdapter {
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Fills `buf` from the link, returning early with the amount of bytes
    /// read so far once the link timeout elapses
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn set_baud_rate(&mut self, baud: BaudRate) -> Result<()>;

    fn baud_rate(&self) -> Result<BaudRate>;

    /// Drops anything received but not read yet
    fn clear_input(&mut self) -> Result<()> {
        Ok(())
    }

    fn open_camera(self) -> Camera<Self>
    where
        Self: Sized,
    {
        Camera::new(self)
    }
}
