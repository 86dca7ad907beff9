use crate::{checksum::checksum, exposure::ExposureSpec, flags::BaudRate};

/// Package that can be sent to the camera
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Command {
    Ping,
    OpenShutter,
    CloseShutter,
    DeEnergizeShutter,
    AbortExposure,
    GetFirmware,
    SetBaudRate(BaudRate),
    TestLink,
    ConfirmBaudRate,
    /// The heater is wired to the X+ guide relay
    Heater(bool),
    ShutterChop(bool),
    TakeImage(ExposureSpec),
    BeginTransfer,
    AckBlock,
    ResendBlock,
    StopTransfer,
}

impl Command {
    /// Name used in logs and error reports
    pub fn name(&self) -> &'static str {
        use Command::*;
        match self {
            Ping => "ping",
            OpenShutter => "open shutter",
            CloseShutter => "close shutter",
            DeEnergizeShutter => "de-energize shutter",
            AbortExposure => "abort exposure",
            GetFirmware => "get firmware",
            SetBaudRate(_) => "set baud rate",
            TestLink => "test link",
            ConfirmBaudRate => "confirm baud rate",
            Heater(_) => "heater",
            ShutterChop(_) => "shutter chop",
            TakeImage(_) => "take image",
            BeginTransfer => "begin transfer",
            AckBlock => "ack block",
            ResendBlock => "resend block",
            StopTransfer => "stop transfer",
        }
    }

    /// Command bytes before the checksum is appended
    pub fn payload(&self) -> Vec<u8> {
        use Command::*;
        match self {
            Ping => vec![b'E'],
            OpenShutter => vec![b'O'],
            CloseShutter => vec![b'C'],
            DeEnergizeShutter | AckBlock => vec![b'K'],
            AbortExposure => vec![b'A'],
            GetFirmware => vec![b'V'],
            SetBaudRate(b) => b.to_code().to_vec(),
            TestLink => b"Test".to_vec(),
            ConfirmBaudRate => vec![b'k'],
            Heater(on) => vec![b'g', *on as u8],
            ShutterChop(on) => vec![b'U', *on as u8],
            TakeImage(spec) => {
                let mut payload = Vec::with_capacity(6);
                payload.push(b'T');
                payload.extend_from_slice(&spec.encode());
                payload
            }
            BeginTransfer => vec![b'X'],
            ResendBlock => vec![b'R'],
            StopTransfer => vec![b'S'],
        }
    }

    /// Full frame as written to the link
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = self.payload();
        frame.push(checksum(&frame));
        frame
    }

    /// Amount of bytes the camera answers with
    pub fn response_len(&self) -> usize {
        use Command::*;
        match self {
            Ping | GetFirmware => 2,
            TestLink => 7,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::ExposureSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn expected_encoding() {
        assert_eq!(Command::Ping.encode(), vec![b'E', 0x3A]);
        assert_eq!(Command::Heater(true).encode(), vec![b'g', 0x01, 0x66]);
        assert_eq!(Command::ShutterChop(false).encode(), vec![b'U', 0x00, 0x55]);
    }

    #[test]
    fn take_image_payload() {
        let spec = ExposureSpec::light(1.0).unwrap();
        assert_eq!(
            Command::TakeImage(spec).payload(),
            vec![b'T', 0x00, 0x27, 0x10, 0x00, 0x01]
        );
    }

    #[test]
    fn baud_rate_payload() {
        assert_eq!(Command::SetBaudRate(BaudRate::Baud230400).payload(), b"B5");
        assert_eq!(Command::TestLink.payload(), b"Test");
    }

    #[test]
    fn shared_command_byte() {
        assert_eq!(Command::AckBlock.encode(), Command::DeEnergizeShutter.encode());
    }

    #[test]
    fn response_lengths() {
        assert_eq!(Command::Ping.response_len(), 2);
        assert_eq!(Command::GetFirmware.response_len(), 2);
        assert_eq!(Command::TestLink.response_len(), 7);
        assert_eq!(Command::BeginTransfer.response_len(), 0);
    }
}
