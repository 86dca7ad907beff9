use crate::{
    cancel::CancelToken,
    command::Command,
    error::{Error, Result},
    exposure::ExposureSpec,
    firmware::FirmwareVersion,
    flags::BaudRate,
    image::Image,
    io_adapter::IoAdapter,
};
use core::time::Duration;
use scopeguard::{guard, ScopeGuard};
use std::time::Instant;

/// Byte sent by the camera once an exposure is finished and ready for read-out
const READY_SIGNAL: u8 = b'D';
/// Reply to [`Command::TestLink`] when the new baud rate works
const LINK_OK: &[u8] = b"TestOk";
const DEFAULT_READY_MARGIN: Duration = Duration::from_secs(30);

pub struct Camera<IO>
where
    IO: IoAdapter,
{
    pub(crate) io: IO,
    // How long past the nominal exposure time to wait for the ready signal
    ready_margin: Duration,
}

impl<IO> Camera<IO>
where
    IO: IoAdapter,
{
    pub fn new(io: IO) -> Self {
        Camera {
            io,
            ready_margin: DEFAULT_READY_MARGIN,
        }
    }

    pub fn with_ready_margin(mut self, margin: Duration) -> Self {
        self.ready_margin = margin;
        self
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    /// Writes a checksummed frame and reads back `cmd.response_len()` bytes.
    ///
    /// A reply shorter than expected is returned as is, see [`Self::query`]
    /// for a strict version.
    pub fn send_command(&mut self, cmd: &Command) -> Result<Vec<u8>> {
        let frame = cmd.encode();
        log::trace!("Sending {} frame {:02X?}", cmd.name(), frame);
        self.io.write_all(&frame)?;

        let expected = cmd.response_len();
        if expected == 0 {
            return Ok(Vec::new());
        }
        let mut resp = vec![0u8; expected];
        let received = self.io.read(&mut resp)?;
        resp.truncate(received);
        log::trace!("Got {} response {:02X?}", cmd.name(), resp);
        Ok(resp)
    }

    /// Same as [`Self::send_command`], but a short reply is an error
    pub fn query(&mut self, cmd: &Command) -> Result<Vec<u8>> {
        let resp = self.send_command(cmd)?;
        if resp.len() < cmd.response_len() {
            log::warn!(
                "Timed out waiting for {} response, got {} of {} bytes",
                cmd.name(),
                resp.len(),
                cmd.response_len()
            );
            return Err(Error::CommunicationTimeout {
                command: cmd.name(),
                expected: cmd.response_len(),
                received: resp.len(),
            });
        }
        Ok(resp)
    }

    /// Checks that the camera is on-line. Never fails on a bad reply, only on
    /// a broken link.
    pub fn ping(&mut self) -> Result<bool> {
        let resp = self.send_command(&Command::Ping)?;
        log::debug!("Pinged camera and received response of {:02X?}", resp);
        if resp.get(1) == Some(&b'O') {
            log::info!("Camera on-line and communicating properly");
            Ok(true)
        } else {
            log::warn!("Did not receive correct ping response from camera");
            Ok(false)
        }
    }

    pub fn open_shutter(&mut self) -> Result<()> {
        log::info!("Opening camera shutter");
        self.send_command(&Command::OpenShutter).map(drop)
    }

    pub fn close_shutter(&mut self) -> Result<()> {
        log::info!("Closing camera shutter");
        self.send_command(&Command::CloseShutter).map(drop)
    }

    pub fn de_energize_shutter(&mut self) -> Result<()> {
        log::info!("De-energizing camera shutter");
        self.send_command(&Command::DeEnergizeShutter).map(drop)
    }

    pub fn abort_exposure(&mut self) -> Result<()> {
        log::info!("Aborting current exposure");
        self.send_command(&Command::AbortExposure).map(drop)
    }

    pub fn set_heater(&mut self, on: bool) -> Result<()> {
        log::info!("Turning camera heater {}", if on { "on" } else { "off" });
        self.send_command(&Command::Heater(on)).map(drop)
    }

    pub fn set_shutter_chop(&mut self, on: bool) -> Result<()> {
        log::info!(
            "{} chopping shutter mode",
            if on { "Enabling" } else { "Disabling" }
        );
        self.send_command(&Command::ShutterChop(on)).map(drop)
    }

    pub fn firmware(&mut self) -> Result<FirmwareVersion> {
        let resp = self.query(&Command::GetFirmware)?;
        let version = FirmwareVersion::from_response(resp[0], resp[1]);
        log::info!("Camera firmware: {:02X?} (raw) {} (formatted)", resp, version);
        Ok(version)
    }

    /// Switches both the camera and the local port to `baud`.
    ///
    /// The camera has to echo the test string back at the new rate. Otherwise,
    /// or when the link fails halfway, the local port goes back to the
    /// previous rate.
    pub fn set_baud_rate(&mut self, baud: BaudRate) -> Result<()> {
        let previous = self.io.baud_rate()?;
        log::info!("Setting camera baud rate to {} (currently {})", baud, previous);

        self.send_command(&Command::SetBaudRate(baud))?;
        self.io.set_baud_rate(baud)?;
        // Disarmed only once the camera confirmed the new rate
        let mut s = guard(self, move |s| {
            log::warn!("Resetting port to {} baud", previous);
            if let Err(e) = s.io.set_baud_rate(previous) {
                log::error!("Could not reset port to {} baud: {}", previous, e);
            }
        });
        let mut ack = [0u8; 2];
        let received = s.io.read(&mut ack)?;
        log::debug!("Baud rate switched, got response of {:02X?}", &ack[..received]);

        let resp = s.send_command(&Command::TestLink)?;
        log::debug!("Tested new baud rate and got response of {:02X?}", resp);
        if !resp.starts_with(LINK_OK) {
            log::warn!("Camera did not accept baud rate {}", baud);
            return Err(Error::BaudNegotiationFailed {
                requested: baud,
                restored: previous,
            });
        }
        s.send_command(&Command::ConfirmBaudRate)?;
        ScopeGuard::into_inner(s);
        log::info!("Camera accepted baud rate {}", baud);
        Ok(())
    }

    /// Starts an exposure and blocks until the camera reports it is ready for
    /// read-out.
    ///
    /// Gives up after the exposure time plus the ready margin, or when
    /// `cancel` is triggered. In both cases the exposure is aborted on the
    /// camera before returning.
    pub fn start_exposure(&mut self, spec: &ExposureSpec, cancel: &CancelToken) -> Result<()> {
        self.send_command(&Command::TakeImage(*spec))?;
        log::info!(
            "Exposing {} {} image for {} seconds",
            spec.crop,
            spec.frame,
            spec.seconds()
        );
        let max_wait = spec.duration() + self.ready_margin;
        self.wait_ready(max_wait, cancel)
    }

    fn wait_ready(&mut self, max_wait: Duration, cancel: &CancelToken) -> Result<()> {
        let started = Instant::now();
        let mut s = guard(self, |s| {
            if let Err(e) = s.abort_exposure() {
                log::error!("Could not abort exposure: {}", e);
            }
        });
        let mut byte = [0u8; 1];
        loop {
            if cancel.is_cancelled() {
                log::warn!("Exposure cancelled while waiting for camera");
                return Err(Error::Cancelled);
            }
            if started.elapsed() >= max_wait {
                log::warn!("No ready signal from camera after {:?}", max_wait);
                return Err(Error::ExposureTimedOut(max_wait));
            }
            // Anything else, including the 'E' sent while exposing, is noise
            if s.io.read(&mut byte)? == 1 && byte[0] == READY_SIGNAL {
                break;
            }
        }
        ScopeGuard::into_inner(s);
        log::debug!("Camera ready after {:?}", started.elapsed());
        Ok(())
    }

    /// Takes one exposure and reads it out
    pub fn capture(&mut self, spec: &ExposureSpec, cancel: &CancelToken) -> Result<Image> {
        self.start_exposure(spec, cancel)?;
        self.read_image(spec, cancel)
    }
}
