//! Byte-level RSP encoding: outgoing packet framing and hex field parsing.

use byte_stream::ByteStream;
use byte_stream::ByteStreamBlockingExt;

pub(crate) const HEX: &[u8; 16] = b"0123456789abcdef";
const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Bytes that must never appear raw inside a packet body.
const ESCAPED: [u8; 4] = [b'#', b'$', b'}', b'*'];
pub const ESCAPE_BYTE: u8 = b'}';
pub const ESCAPE_XOR: u8 = 0x20;

/// Failure while reading a hex field out of a command buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// The packet terminator (or the end of the buffer) was reached before
    /// a fixed-width field was complete.
    #[error("packet ended inside a hex field")]
    EndOfPacket,
    /// A non-hex byte was found inside a fixed-width field.
    #[error("invalid hex digit")]
    Invalid,
}

/// How many digits [`HexReader::read`] consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HexWidth {
    /// Exactly `bits / 4` digits.
    Bits(u32),
    /// As many digits as present, stopping before the first non-hex byte.
    Variable,
}

const VARIABLE_MAX_DIGITS: usize = 64;

pub const fn from_hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(10 + b - b'a'),
        b'A'..=b'F' => Some(10 + b - b'A'),
        _ => None,
    }
}

/// Cursor over the body of a received command.
pub struct HexReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> HexReader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.buf.get(self.pos..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Consume `sep` if it is the next byte.
    pub fn expect(&mut self, sep: u8) -> Result<(), HexError> {
        match self.buf.get(self.pos) {
            Some(&b) if b == sep => {
                self.pos += 1;
                Ok(())
            }
            Some(b'#') | None => Err(HexError::EndOfPacket),
            Some(_) => Err(HexError::Invalid),
        }
    }

    /// Read a hex value. Values wider than 32 bits keep the low 32 bits.
    ///
    /// For [`HexWidth::Variable`] the terminating byte is left unconsumed and
    /// reading zero digits yields `0`.
    pub fn read(&mut self, width: HexWidth) -> Result<u32, HexError> {
        let digits = match width {
            HexWidth::Bits(bits) => (bits / 4) as usize,
            HexWidth::Variable => VARIABLE_MAX_DIGITS,
        };
        let mut value: u32 = 0;
        for _ in 0..digits {
            let Some(&c) = self.buf.get(self.pos) else {
                return match width {
                    HexWidth::Variable => Ok(value),
                    HexWidth::Bits(_) => Err(HexError::EndOfPacket),
                };
            };
            match from_hex_digit(c) {
                Some(d) => {
                    self.pos += 1;
                    value = (value << 4) | d as u32;
                }
                None => {
                    return match width {
                        HexWidth::Variable => Ok(value),
                        HexWidth::Bits(_) if c == b'#' => Err(HexError::EndOfPacket),
                        HexWidth::Bits(_) => Err(HexError::Invalid),
                    };
                }
            }
        }
        Ok(value)
    }

    /// Read a 32-bit register value sent in target (little-endian) byte order.
    pub fn read_swapped_u32(&mut self) -> Result<u32, HexError> {
        self.read(HexWidth::Bits(32)).map(u32::swap_bytes)
    }
}

/// Streaming writer for one outgoing `$...#cc` packet.
///
/// Bytes go straight to the transport as they are pushed; the only state is
/// the running checksum over the bytes as transmitted.
pub struct PacketWriter<'s, S: ByteStream> {
    stream: &'s mut S,
    checksum: u8,
}

impl<'s, S: ByteStream> PacketWriter<'s, S> {
    /// Send the `$` start marker and reset the checksum.
    pub fn start(stream: &'s mut S) -> Result<Self, S::Error> {
        stream.write_blocking(b'$')?;
        Ok(Self {
            stream,
            checksum: 0,
        })
    }

    fn send_raw(&mut self, byte: u8) -> Result<(), S::Error> {
        self.stream.write_blocking(byte)?;
        self.checksum = self.checksum.wrapping_add(byte);
        Ok(())
    }

    /// Send one payload byte, escaping it if needed.
    pub fn push(&mut self, byte: u8) -> Result<(), S::Error> {
        if ESCAPED.contains(&byte) {
            self.send_raw(ESCAPE_BYTE)?;
            self.send_raw(byte ^ ESCAPE_XOR)
        } else {
            self.send_raw(byte)
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), S::Error> {
        for &b in bytes {
            self.push(b)?;
        }
        Ok(())
    }

    /// Send `bits / 4` hex digits of `value`, most significant nibble first.
    pub fn push_hex(&mut self, value: u32, bits: u32) -> Result<(), S::Error> {
        let mut shift = bits;
        while shift > 0 {
            shift -= 4;
            self.push(HEX[((value >> shift) & 0xF) as usize])?;
        }
        Ok(())
    }

    /// Send a 32-bit register value in target (little-endian) byte order.
    pub fn push_swapped_u32(&mut self, value: u32) -> Result<(), S::Error> {
        self.push_hex(value.swap_bytes(), 32)
    }

    /// Send each byte of `bytes` as two hex digits.
    pub fn push_hex_bytes(&mut self, bytes: &[u8]) -> Result<(), S::Error> {
        for &b in bytes {
            self.push_hex(b as u32, 8)?;
        }
        Ok(())
    }

    /// Send `value` as uppercase hex without leading zeros.
    pub fn push_hex_upper(&mut self, value: u32) -> Result<(), S::Error> {
        let mut tmp = [0u8; 8];
        let mut len = 0usize;
        let mut v = value;
        loop {
            tmp[len] = HEX_UPPER[(v & 0xF) as usize];
            len += 1;
            v >>= 4;
            if v == 0 {
                break;
            }
        }
        for i in (0..len).rev() {
            self.push(tmp[i])?;
        }
        Ok(())
    }

    /// Send `#` and the checksum, completing the packet.
    pub fn finish(self) -> Result<(), S::Error> {
        let checksum = self.checksum;
        self.stream.write_blocking(b'#')?;
        self.stream.write_blocking(HEX[(checksum >> 4) as usize])?;
        self.stream.write_blocking(HEX[(checksum & 0xF) as usize])?;
        self.stream.flush()
    }
}

/// Send a complete packet containing `payload`.
pub fn send_packet<S: ByteStream>(stream: &mut S, payload: &[u8]) -> Result<(), S::Error> {
    let mut writer = PacketWriter::start(stream)?;
    writer.push_bytes(payload)?;
    writer.finish()
}

/// Decode ASCII hex in `src` into raw bytes in `dst`.
/// Returns decoded length on success.
pub fn hex_decode(src: &[u8], dst: &mut [u8]) -> Result<usize, HexError> {
    if src.len() % 2 != 0 {
        return Err(HexError::EndOfPacket);
    }
    let mut out = 0usize;
    for chunk in src.chunks_exact(2) {
        if out >= dst.len() {
            return Err(HexError::Invalid);
        }
        let hi = from_hex_digit(chunk[0]).ok_or(HexError::Invalid)?;
        let lo = from_hex_digit(chunk[1]).ok_or(HexError::Invalid)?;
        dst[out] = (hi << 4) | lo;
        out += 1;
    }
    Ok(out)
}

/// Escape `src` the way [`PacketWriter::push`] does, returning bytes written.
/// Stops early when `dst` cannot hold the next (possibly escaped) byte.
pub fn escape_into(src: &[u8], dst: &mut [u8]) -> usize {
    let mut idx = 0usize;
    for &b in src {
        if ESCAPED.contains(&b) {
            if idx + 2 > dst.len() {
                break;
            }
            dst[idx] = ESCAPE_BYTE;
            dst[idx + 1] = b ^ ESCAPE_XOR;
            idx += 2;
        } else {
            if idx >= dst.len() {
                break;
            }
            dst[idx] = b;
            idx += 1;
        }
    }
    idx
}

/// Sum of bytes modulo 256, as RSP defines the packet checksum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}
