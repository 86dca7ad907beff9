use crate::{
    camera::Camera,
    cancel::CancelToken,
    checksum::lrc,
    command::Command,
    error::{Error, Result},
    exposure::ExposureSpec,
    image::Image,
    io_adapter::IoAdapter,
};

/// Pixels in a single checksummed block at 1x1 binning
pub const BLOCK_PIXELS: usize = 4096;
pub const BLOCK_BYTES: usize = BLOCK_PIXELS * 2;
/// Retransmissions requested for a single block before it is zero-filled
pub const MAX_BLOCK_RETRIES: usize = 5;
// Framing around the pixel stream that carries no image data
const SYNC_BYTES: usize = 1;
const EPILOGUE_BYTES: usize = 5;

/// Reasons a block has to be sent again
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BlockFault {
    #[error("checksum mismatch, computed {computed:#04X}, camera sent {received:#04X}")]
    ChecksumMismatch { computed: u8, received: u8 },
    #[error("short read, got {0} of {} bytes", BLOCK_BYTES)]
    ShortRead(usize),
    #[error("no checksum byte received")]
    MissingChecksum,
}

/// How a single block made it into the image
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BlockOutcome {
    Received { attempts: usize },
    Substituted,
}

impl<IO> Camera<IO>
where
    IO: IoAdapter,
{
    /// Transfers the image of a finished exposure.
    ///
    /// Blocks that keep failing their checksum are replaced with zeros, so a
    /// noisy link degrades the image but never aborts the transfer. Their
    /// indices are available through [`Image::substituted_blocks`].
    pub fn read_image(&mut self, spec: &ExposureSpec, cancel: &CancelToken) -> Result<Image> {
        log::info!("Transferring image from camera");
        self.send_command(&Command::BeginTransfer)?;
        let mut sync = [0u8; SYNC_BYTES];
        self.io.read(&mut sync)?;

        let block_count = spec.crop.pixel_count() / BLOCK_PIXELS;
        let mut raw = vec![0u8; block_count * BLOCK_BYTES];
        let mut substituted = Vec::new();
        for (idx, block) in raw.chunks_exact_mut(BLOCK_BYTES).enumerate() {
            if cancel.is_cancelled() {
                log::warn!("Image transfer cancelled at block {} of {}", idx, block_count);
                self.send_command(&Command::StopTransfer)?;
                self.io.clear_input()?;
                return Err(Error::Cancelled);
            }
            match self.read_block(idx, block)? {
                BlockOutcome::Received { attempts } if attempts > 1 => {
                    log::debug!("Block {} received after {} attempts", idx, attempts)
                }
                BlockOutcome::Received { .. } => {}
                BlockOutcome::Substituted => substituted.push(idx),
            }
        }

        let mut epilogue = [0u8; EPILOGUE_BYTES];
        self.io.read(&mut epilogue)?;
        if !substituted.is_empty() {
            log::warn!(
                "Image transferred with {} of {} blocks zero-filled",
                substituted.len(),
                block_count
            );
        } else {
            log::info!("Image transferred");
        }

        Ok(Image::decode(&raw, spec.crop)?.with_substituted_blocks(substituted))
    }

    /// Reads block `idx` into `buf`, asking for retransmission on a bad
    /// checksum. Always acknowledges the block so the camera moves on.
    ///
    /// Every `R` is answered by a full block on the wire, so the answer to the
    /// last one is read and checked too before the block is given up.
    pub(crate) fn read_block(&mut self, idx: usize, buf: &mut [u8]) -> Result<BlockOutcome> {
        let mut attempt = 1;
        loop {
            match self.receive_block(buf)? {
                None => {
                    self.send_command(&Command::AckBlock)?;
                    return Ok(BlockOutcome::Received { attempts: attempt });
                }
                Some(fault) if attempt <= MAX_BLOCK_RETRIES => {
                    log::warn!(
                        "Read-out error in block {}: {}, requesting retransmission {} of {}",
                        idx,
                        fault,
                        attempt,
                        MAX_BLOCK_RETRIES
                    );
                    self.send_command(&Command::ResendBlock)?;
                    attempt += 1;
                }
                Some(fault) => {
                    log::error!(
                        "Read-out of block {} failed after {} attempts ({}), substituting zeros",
                        idx,
                        attempt,
                        fault
                    );
                    break;
                }
            }
        }

        self.send_command(&Command::StopTransfer)?;
        self.io.clear_input()?;
        buf.fill(0);
        self.send_command(&Command::AckBlock)?;
        Ok(BlockOutcome::Substituted)
    }

    fn receive_block(&mut self, buf: &mut [u8]) -> Result<Option<BlockFault>> {
        let received = self.io.read(buf)?;
        if received < buf.len() {
            return Ok(Some(BlockFault::ShortRead(received)));
        }
        let mut trailer = [0u8; 1];
        if self.io.read(&mut trailer)? == 0 {
            return Ok(Some(BlockFault::MissingChecksum));
        }
        let computed = lrc(buf);
        if computed != trailer[0] {
            return Ok(Some(BlockFault::ChecksumMismatch {
                computed,
                received: trailer[0],
            }));
        }
        Ok(None)
    }
}
