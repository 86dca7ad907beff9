use allsky340::{
    checksum, lrc, BaudRate, CancelToken, Crop, IoAdapter, Result, BLOCK_BYTES, U16_TO_PLANES,
};
use mockall::mock;
use std::collections::{HashMap, VecDeque};

mock! {
    pub Adapter {}
    impl IoAdapter for Adapter {
        fn write_all(&mut self, buf: &[u8]) -> Result<()>;
        fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
        fn set_baud_rate(&mut self, baud: BaudRate) -> Result<()>;
        fn baud_rate(&self) -> Result<BaudRate>;
        fn clear_input(&mut self) -> Result<()>;
    }
}

/// Deterministic test pattern in scan order, every pixel distinct in its row
pub fn scan_pixels(crop: Crop) -> Vec<u16> {
    (0..crop.pixel_count())
        .map(|i| ((i * 7 + i / crop.cols()) % 65_536) as u16)
        .collect()
}

/// Byte stream the camera sends for `pixels`, before splitting into blocks
pub fn interleave(pixels: &[u16]) -> Vec<u8> {
    pixels.iter().flat_map(|p| U16_TO_PLANES(*p)).collect()
}

/// Device side of the protocol, answering every frame written to it the way
/// the camera does. A missing answer shows up as a short read.
pub struct FakeCamera {
    port_baud: BaudRate,
    camera_baud: BaudRate,
    accept_baud: bool,
    firmware: [u8; 2],
    ping_reply: Vec<u8>,
    ready: bool,
    exposure_noise: Vec<u8>,
    raw: Vec<u8>,
    corrupt: HashMap<usize, usize>,
    cancel_at: Option<(usize, CancelToken)>,
    line_delay: bool,

    // Received by the host, not read yet
    pending: VecDeque<u8>,
    // Sent by the camera, still on the wire
    in_flight: VecDeque<u8>,
    commands: Vec<Vec<u8>>,
    bad_frames: usize,
    block: Option<usize>,
    transmissions: HashMap<usize, usize>,
}

impl FakeCamera {
    pub fn new(baud: BaudRate) -> Self {
        FakeCamera {
            port_baud: baud,
            camera_baud: baud,
            accept_baud: true,
            firmware: [0x01, 0x03],
            ping_reply: b"EO".to_vec(),
            ready: true,
            exposure_noise: b"E".to_vec(),
            raw: interleave(&scan_pixels(Crop::Full)),
            corrupt: HashMap::new(),
            cancel_at: None,
            line_delay: false,
            pending: VecDeque::new(),
            in_flight: VecDeque::new(),
            commands: Vec::new(),
            bad_frames: 0,
            block: None,
            transmissions: HashMap::new(),
        }
    }

    /// Camera ignores baud rate changes
    pub fn rejecting_baud(mut self) -> Self {
        self.accept_baud = false;
        self
    }

    pub fn with_firmware(mut self, major: u8, minor: u8) -> Self {
        self.firmware = [major, minor];
        self
    }

    pub fn with_ping_reply(mut self, reply: &[u8]) -> Self {
        self.ping_reply = reply.to_vec();
        self
    }

    /// Exposures never finish
    pub fn never_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn with_exposure_noise(mut self, noise: &[u8]) -> Self {
        self.exposure_noise = noise.to_vec();
        self
    }

    pub fn with_pixels(mut self, pixels: &[u16]) -> Self {
        self.raw = interleave(pixels);
        self
    }

    /// First `times` transmissions of `block` carry a wrong checksum
    pub fn corrupting(mut self, block: usize, times: usize) -> Self {
        self.corrupt.insert(block, times);
        self
    }

    /// Triggers `token` as soon as `block` is sent
    pub fn cancelling_at(mut self, block: usize, token: CancelToken) -> Self {
        self.cancel_at = Some((block, token));
        self
    }

    /// Bytes sent by the camera only reach the host on its next read, so
    /// neither `S` nor [`IoAdapter::clear_input`] can drop them
    pub fn with_line_delay(mut self) -> Self {
        self.line_delay = true;
        self
    }

    /// Payloads of every frame received, checksum stripped
    pub fn commands(&self) -> &[Vec<u8>] {
        &self.commands
    }

    pub fn count(&self, payload: &[u8]) -> usize {
        self.commands.iter().filter(|c| c.as_slice() == payload).count()
    }

    /// Frames that arrived with a wrong checksum or at the wrong baud rate
    pub fn bad_frames(&self) -> usize {
        self.bad_frames
    }

    pub fn camera_baud(&self) -> BaudRate {
        self.camera_baud
    }

    pub fn transmissions(&self, block: usize) -> usize {
        self.transmissions.get(&block).copied().unwrap_or(0)
    }

    pub fn unread(&self) -> usize {
        self.pending.len() + self.in_flight.len()
    }

    fn outbox(&mut self) -> &mut VecDeque<u8> {
        if self.line_delay {
            &mut self.in_flight
        } else {
            &mut self.pending
        }
    }

    fn block_count(&self) -> usize {
        self.raw.len() / BLOCK_BYTES
    }

    fn send_block(&mut self, idx: usize) {
        let sent = self.transmissions.entry(idx).or_insert(0);
        *sent += 1;
        let corrupted = *sent <= self.corrupt.get(&idx).copied().unwrap_or(0);
        let data = self.raw[idx * BLOCK_BYTES..(idx + 1) * BLOCK_BYTES].to_vec();
        let trailer = if corrupted { !lrc(&data) } else { lrc(&data) };
        self.outbox().extend(data);
        self.outbox().push_back(trailer);
        if let Some((at, token)) = &self.cancel_at {
            if *at == idx {
                token.cancel();
            }
        }
    }

    fn handle(&mut self, payload: &[u8]) {
        match payload {
            b"E" => {
                let reply = self.ping_reply.clone();
                self.outbox().extend(reply);
            }
            b"V" => {
                let firmware = self.firmware;
                self.outbox().extend(firmware);
            }
            [b'B', code @ b'0'..=b'6'] => {
                if self.accept_baud {
                    self.camera_baud = [
                        BaudRate::Baud9600,
                        BaudRate::Baud19200,
                        BaudRate::Baud38400,
                        BaudRate::Baud57600,
                        BaudRate::Baud115200,
                        BaudRate::Baud230400,
                        BaudRate::Baud460800,
                    ][(code - b'0') as usize];
                    self.outbox().extend(b"OK");
                }
            }
            b"Test" => {
                self.outbox().extend(b"TestOk");
                self.outbox().push_back(checksum(b"TestOk"));
            }
            [b'T', ..] if payload.len() == 6 => {
                let noise = self.exposure_noise.clone();
                self.outbox().extend(noise);
                if self.ready {
                    self.outbox().push_back(b'D');
                }
            }
            b"X" => {
                self.outbox().push_back(0x00);
                self.block = Some(0);
                self.send_block(0);
            }
            b"K" => {
                if let Some(idx) = self.block {
                    if idx + 1 < self.block_count() {
                        self.block = Some(idx + 1);
                        self.send_block(idx + 1);
                    } else {
                        self.block = None;
                        self.outbox().extend([0u8; 5]);
                    }
                }
            }
            b"R" => {
                if let Some(idx) = self.block {
                    self.send_block(idx);
                }
            }
            // Only output the camera has not sent yet can be stopped
            b"S" if !self.line_delay => self.pending.clear(),
            _ => {}
        }
    }
}

impl IoAdapter for FakeCamera {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.port_baud != self.camera_baud {
            log::trace!("Frame {:02X?} sent at the wrong baud rate", buf);
            self.bad_frames += 1;
            return Ok(());
        }
        let Some((sum, payload)) = buf.split_last() else {
            return Ok(());
        };
        if checksum(payload) != *sum {
            self.bad_frames += 1;
            return Ok(());
        }
        self.commands.push(payload.to_vec());
        self.handle(payload);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.port_baud != self.camera_baud {
            return Ok(0);
        }
        let arrived: Vec<u8> = self.in_flight.drain(..).collect();
        self.pending.extend(arrived);
        let count = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *dst = src;
        }
        Ok(count)
    }

    fn set_baud_rate(&mut self, baud: BaudRate) -> Result<()> {
        self.port_baud = baud;
        Ok(())
    }

    fn baud_rate(&self) -> Result<BaudRate> {
        Ok(self.port_baud)
    }

    fn clear_input(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;

    #[test]
    fn answers_ping() {
        let mut cam = FakeCamera::new(BaudRate::Baud9600);
        let mut frame = b"E".to_vec();
        frame.push(checksum(b"E"));
        assert_ok!(cam.write_all(&frame));
        let mut buf = [0u8; 4];
        assert_ok_eq!(cam.read(&mut buf), 2);
        assert_eq!(&buf[..2], b"EO");
    }

    #[test]
    fn ignores_bad_checksum() {
        let mut cam = FakeCamera::new(BaudRate::Baud9600);
        assert_ok!(cam.write_all(&[b'E', 0x00]));
        assert_eq!(cam.bad_frames(), 1);
        assert_eq!(cam.unread(), 0);
    }

    #[test]
    fn test_pattern_fills_rows() {
        let pixels = scan_pixels(Crop::Cropped);
        assert_eq!(pixels.len(), 245_760);
        assert_eq!(interleave(&pixels).len(), 491_520);
    }

    #[test]
    fn delayed_bytes_survive_clear_input() {
        let mut cam = FakeCamera::new(BaudRate::Baud9600).with_line_delay();
        let mut frame = b"E".to_vec();
        frame.push(checksum(b"E"));
        assert_ok!(cam.write_all(&frame));
        assert_ok!(cam.clear_input());
        assert_eq!(cam.unread(), 2);
        let mut buf = [0u8; 2];
        assert_ok_eq!(cam.read(&mut buf), 2);
        assert_eq!(&buf, b"EO");
    }
}
