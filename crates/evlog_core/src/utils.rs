use byteorder::{ByteOrder, LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub fn crc32(data: &[u8]) -> u32 { crc32fast::hash(data) }

pub fn xxh3(data: &[u8]) -> u64 { xxhash_rust::xxh3::xxh3_64(data) }

pub fn head_hash(data: &[u8], window: usize) -> u64 {
    xxh3(&data[..data.len().min(window)])
}

/// Bounds-checked slice of `len` bytes at `off`.
#[inline]
pub fn take(data: &[u8], off: usize, len: usize) -> Option<&[u8]> {
    let end = off.checked_add(len)?;
    data.get(off..end)
}

#[inline] pub fn le_u16(b: &[u8]) -> u16 { LE::read_u16(b) }
#[inline] pub fn le_i16(b: &[u8]) -> i16 { LE::read_i16(b) }
#[inline] pub fn le_i32(b: &[u8]) -> i32 { LE::read_i32(b) }

pub fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> { w.write_u64::<LE>(v) }
pub fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> { w.write_u32::<LE>(v) }
pub fn write_u16<W: Write>(w: &mut W, v: u16) -> io::Result<()> { w.write_u16::<LE>(v) }
pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> { r.read_u64::<LE>() }
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> { r.read_u32::<LE>() }
pub fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> { r.read_u16::<LE>() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_rejects_short_and_overflowing_spans() {
        let data = [1u8, 2, 3];
        assert_eq!(take(&data, 1, 2), Some(&data[1..3]));
        assert_eq!(take(&data, 2, 2), None);
        assert_eq!(take(&data, usize::MAX, 2), None);
    }

    #[test]
    fn le_helpers_decode_signed_values() {
        assert_eq!(le_u16(&[0x34, 0x12]), 0x1234);
        assert_eq!(le_i16(&[0xff, 0xff]), -1);
        assert_eq!(le_i32(&[0xfe, 0xff, 0xff, 0xff]), -2);
    }
}
