use std::fmt;

use crate::serialization::{Serialization,
                           SerializationError,
                           parse_u8};

/// Echo byte marking event data
pub const EVENT_ECHO : u8      = 0xDD;

/// Filler to align the packet to 3 bytes
pub const PADDING    : [u8;2]  = [0x01, 0x02];

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPacket {
  /// The command code the packet responds to,
  /// or EVENT_ECHO
  pub echo     : u8,
  /// Echo of the data bytes of the command
  pub cmd_data : Vec<u8>,
  pub payload  : Vec<u8>,
}

impl OutputPacket {

  pub fn new(echo : u8, cmd_data : &[u8], payload : Vec<u8>) -> Self {
    Self {
      echo,
      cmd_data : cmd_data.to_vec(),
      payload,
    }
  }

  /// An event goes out without any command echo
  pub fn event(payload : Vec<u8>) -> Self {
    Self::new(EVENT_ECHO, &[], payload)
  }

  pub fn is_event(&self) -> bool {
    self.echo == EVENT_ECHO
  }

  /// The 6 byte envelope header
  pub fn header(&self) -> [u8;6] {
    let length = (self.payload.len() + self.cmd_data.len()) as u8;
    [Self::HEAD[0], Self::HEAD[1], Self::HEAD[2],
     length,
     self.echo,
     self.cmd_data.len() as u8]
  }

  /// Padding bytes needed to align echo data + payload to 3 bytes
  pub fn padding(&self) -> &'static [u8] {
    let n_pad = (3 - (self.payload.len() + self.cmd_data.len()) % 3) % 3;
    &PADDING[0..n_pad]
  }

  /// Total size on the wire
  pub fn wire_len(&self) -> usize {
    6 + self.cmd_data.len() + self.payload.len() + self.padding().len() + Self::TAIL.len()
  }
}

impl Serialization for OutputPacket {
  const HEAD : &'static [u8] = &[0xDC, 0x00, 0xFF];
  const TAIL : &'static [u8] = &[0xFF, 0x00, 0xFF];

  fn from_bytestream(stream : &Vec<u8>,
                     pos    : &mut usize)
    -> Result<Self, SerializationError> {
    Self::verify_head(stream, *pos, 6 + Self::TAIL.len())?;
    *pos += Self::HEAD.len();
    let length  = parse_u8(stream, pos) as usize;
    let echo    = parse_u8(stream, pos);
    let n_echo  = parse_u8(stream, pos) as usize;
    if n_echo > length {
      error!("Packet claims {} echo bytes but has only {} bytes!", n_echo, length);
      return Err(SerializationError::WrongByteSize);
    }
    let n_pad   = (3 - length % 3) % 3;
    if stream.len() < *pos + length + n_pad + Self::TAIL.len() {
      return Err(SerializationError::StreamTooShort);
    }
    let cmd_data = stream[*pos..*pos + n_echo].to_vec();
    *pos += n_echo;
    let payload  = stream[*pos..*pos + length - n_echo].to_vec();
    *pos += length - n_echo + n_pad;
    Self::verify_tail(stream, *pos)?;
    *pos += Self::TAIL.len();
    Ok(Self {
      echo,
      cmd_data,
      payload,
    })
  }

  fn to_bytestream(&self) -> Vec<u8> {
    let mut stream = Vec::<u8>::with_capacity(self.wire_len());
    stream.extend_from_slice(&self.header());
    stream.extend_from_slice(&self.cmd_data);
    stream.extend_from_slice(&self.payload);
    stream.extend_from_slice(self.padding());
    stream.extend_from_slice(Self::TAIL);
    stream
  }
}

impl fmt::Display for OutputPacket {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<OutputPacket:");
    if self.is_event() {
      repr += "\n  echo     : EVENT";
    } else {
      repr += &(format!("\n  echo     : {:#04x}", self.echo));
    }
    repr += &(format!("\n  cmd data : {:?}", self.cmd_data));
    repr += &(format!("\n  payload  : {} bytes", self.payload.len()));
    write!(f, "{}>", repr)
  }
}

/// Take all complete packets from the front of a
/// stream. Bytes in front of a packet head are skipped,
/// an incomplete packet at the end stays in the stream.
pub fn unpack_stream(stream : &mut Vec<u8>) -> Vec<OutputPacket> {
  let mut packets = Vec::<OutputPacket>::new();
  let mut pos     = 0usize;
  loop {
    let head = OutputPacket::HEAD;
    let start = match stream[pos..].windows(head.len()).position(|w| w == head) {
      None => {
        pos = pos.max(stream.len().saturating_sub(head.len() - 1));
        break;
      }
      Some(offset) => pos + offset,
    };
    let mut cursor = start;
    match OutputPacket::from_bytestream(stream, &mut cursor) {
      Ok(packet) => {
        packets.push(packet);
        pos = cursor;
      }
      Err(SerializationError::StreamTooShort) => {
        pos = start;
        break;
      }
      Err(err) => {
        debug!("Skipping broken packet at {}! {}", start, err);
        pos = start + 1;
      }
    }
  }
  stream.drain(..pos);
  packets
}

#[cfg(test)]
mod test_output_packet {
  use super::*;

  #[test]
  fn envelope_layout() {
    let packet = OutputPacket::new(0x07, &[], vec![0x01]);
    let stream = packet.to_bytestream();
    assert_eq!(stream, vec![0xDC, 0x00, 0xFF, 1, 0x07, 0, 0x01, 0x01, 0x02, 0xFF, 0x00, 0xFF]);
    assert_eq!(stream.len() % 3, 0);
  }

  #[test]
  fn echo_data_counts_for_padding() {
    let packet = OutputPacket::new(0x23, &[0x6F, 0x03], vec![0x17]);
    let stream = packet.to_bytestream();
    assert_eq!(stream[3], 3);
    assert_eq!(stream[5], 2);
    assert!(packet.padding().is_empty());
    let mut pos = 0usize;
    let decoded = OutputPacket::from_bytestream(&stream, &mut pos).unwrap();
    assert_eq!(decoded, packet);
    assert_eq!(pos, stream.len());
  }

  #[test]
  fn event_packets_are_3_byte_aligned() {
    for n in 1..40 {
      let packet = OutputPacket::event(vec![0xAB; n]);
      assert_eq!(packet.to_bytestream().len() % 3, 0);
      assert_eq!(packet.header()[4], 0xDD);
    }
  }

  #[test]
  fn unpack_split_stream() {
    let first  = OutputPacket::new(0x07, &[], vec![0x01]);
    let second = OutputPacket::event(vec![0x5A; 10]);
    let mut stream = vec![0x13, 0x37];
    stream.extend(first.to_bytestream());
    let tail = second.to_bytestream();
    stream.extend_from_slice(&tail[0..5]);
    let packets = unpack_stream(&mut stream);
    assert_eq!(packets, vec![first]);
    assert_eq!(stream, tail[0..5].to_vec());
    stream.extend_from_slice(&tail[5..]);
    assert_eq!(unpack_stream(&mut stream), vec![second]);
    assert!(stream.is_empty());
  }
}
