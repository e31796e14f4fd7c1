use bytes::BytesMut;
use tracing::{debug, warn};
use wasche_frame::{decode_packet, Packet, PAYLOAD_SIZE};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packets, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = match (&args.hex, &args.file) {
        (Some(hex), _) => parse_hex(hex)?,
        (None, Some(path)) => std::fs::read(path)
            .map_err(|err| io_error(&format!("read {}", path.display()), err))?,
        (None, None) => return Err(CliError::new(USAGE, "one of --hex or --file is required")),
    };

    let (packets, trailing) = decode_all(&bytes);
    debug!(
        bytes = bytes.len(),
        packets = packets.len(),
        "capture decoded"
    );
    print_packets(&packets, format);

    if trailing.is_empty() {
        return Ok(SUCCESS);
    }
    warn!(bytes = trailing.len(), "capture ends inside a frame");
    Err(frame_error(
        "decode",
        wasche_frame::FrameError::Incomplete {
            tag: trailing[0],
            expected: PAYLOAD_SIZE,
            received: trailing.len() - 1,
        },
    ))
}

/// Decode every complete packet, returning them with their byte offsets and
/// any trailing bytes of an unfinished frame.
fn decode_all(bytes: &[u8]) -> (Vec<(usize, Packet)>, BytesMut) {
    let mut buf = BytesMut::from(bytes);
    let mut packets = Vec::new();
    loop {
        let offset = bytes.len() - buf.len();
        match decode_packet(&mut buf) {
            Some(packet) => packets.push((offset, packet)),
            None => break,
        }
    }
    (packets, buf)
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',' || c == '|')
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex near offset {}", i / 2)))
        })
        .collect()
}
