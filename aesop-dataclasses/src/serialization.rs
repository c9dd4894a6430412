//! Serialization/Deserialization helpers
//!
//! Everything the event PSOC sends is big endian,
//! so all the parse_* functions here read network
//! byte order.

pub use crate::errors::SerializationError;

/// Get a u8 from a bytestream and move on the position marker
pub fn parse_u8(bs : &Vec::<u8>, pos : &mut usize) -> u8 {
  let value = bs[*pos];
  *pos += 1;
  value
}

/// Get a big endian u16 from a bytestream and move
/// on the position marker
///
/// # Arguments
///
/// * bs  : the stream
/// * pos : position of the most significant byte
pub fn parse_u16(bs : &Vec::<u8>, pos : &mut usize) -> u16 {
  let value = u16::from_be_bytes([bs[*pos], bs[*pos+1]]);
  *pos += 2;
  value
}

pub fn parse_i16(bs : &Vec::<u8>, pos : &mut usize) -> i16 {
  let value = i16::from_be_bytes([bs[*pos], bs[*pos+1]]);
  *pos += 2;
  value
}

pub fn parse_u32(bs : &Vec::<u8>, pos : &mut usize) -> u32 {
  let value = u32::from_be_bytes([bs[*pos], bs[*pos+1], bs[*pos+2], bs[*pos+3]]);
  *pos += 4;
  value
}

/// Encode/decode structs to Vec::<u8> to send them
/// to the host
///
pub trait Serialization {

  /// Marker at the start of the serialized struct
  const HEAD : &'static [u8];
  /// Marker at the end of the serialized struct
  const TAIL : &'static [u8];
  /// The SIZE is the size of the serialized
  /// bytestream INCLUDING head and tail. In case
  /// the struct does NOT HAVE a fixed size, SIZE
  /// will be 0 (so default value of the trait)
  const SIZE : usize = 0;

  /// Check that the stream has HEAD at pos and
  /// at least `min_len` bytes left
  fn verify_head(stream  : &Vec<u8>,
                 pos     : usize,
                 min_len : usize) -> Result<(), SerializationError> {
    if stream.len() < pos + min_len.max(Self::HEAD.len()) {
      return Err(SerializationError::StreamTooShort);
    }
    if &stream[pos..pos + Self::HEAD.len()] != Self::HEAD {
      return Err(SerializationError::HeadInvalid);
    }
    Ok(())
  }

  /// Check that the stream has TAIL at pos
  fn verify_tail(stream : &Vec<u8>,
                 pos    : usize) -> Result<(), SerializationError> {
    if stream.len() < pos + Self::TAIL.len() {
      return Err(SerializationError::StreamTooShort);
    }
    if &stream[pos..pos + Self::TAIL.len()] != Self::TAIL {
      return Err(SerializationError::TailInvalid);
    }
    Ok(())
  }

  /// Decode a serializable from a bytestream
  fn from_bytestream(bytestream : &Vec<u8>,
                     pos        : &mut usize)
    -> Result<Self, SerializationError>
    where Self : Sized;

  /// Encode a serializable to a bytestream
  fn to_bytestream(&self) -> Vec<u8>;
}

/// Search for a byte marker in a bytestream
///
/// Returns the position of the first byte of
/// the marker.
pub fn search_for_marker(marker     : &[u8],
                         bytestream : &Vec<u8>,
                         start_pos  : usize)
  -> Result<usize, SerializationError> {
  if marker.is_empty() || bytestream.len() < marker.len() {
    error!("Stream too short to contain {:?}!", marker);
    return Err(SerializationError::StreamTooShort);
  }
  if start_pos > bytestream.len() - marker.len() {
    error!("Start position {} beyond stream capacity {}!", start_pos, bytestream.len() - marker.len());
    return Err(SerializationError::StreamTooShort);
  }
  match bytestream[start_pos..].windows(marker.len()).position(|w| w == marker) {
    None => {
      warn!("Can not find {:?} in bytestream [{}:{}]!", marker, start_pos, bytestream.len());
      Err(SerializationError::ValueNotFound)
    }
    Some(offset) => {
      trace!("Found {:?} at {}", marker, start_pos + offset);
      Ok(start_pos + offset)
    }
  }
}

#[cfg(test)]
mod test_serialization {
  use super::*;

  #[test]
  fn big_endian_parsing() {
    let stream  = vec![0x12, 0x34, 0x56, 0x78, 0xFF, 0xFE, 0x01];
    let mut pos = 0usize;
    assert_eq!(parse_u32(&stream, &mut pos), 0x12345678);
    assert_eq!(parse_i16(&stream, &mut pos), -2);
    assert_eq!(parse_u8(&stream, &mut pos), 1);
    assert_eq!(pos, 7);
    pos = 1;
    assert_eq!(parse_u16(&stream, &mut pos), 0x3456);
  }

  #[test]
  fn search_for_markers() {
    let bytestream = vec![1, 2, b'Z', b'E', b'R', b'O', 7, b'F', b'I', b'N', b'I'];
    assert_eq!(search_for_marker(b"ZERO", &bytestream, 0), Ok(2));
    assert_eq!(search_for_marker(b"FINI", &bytestream, 3), Ok(7));
    assert_eq!(search_for_marker(b"ZERO", &bytestream, 3), Err(SerializationError::ValueNotFound));
    assert_eq!(search_for_marker(b"ZERO", &bytestream, 10), Err(SerializationError::StreamTooShort));
  }
}
