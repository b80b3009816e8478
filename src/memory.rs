//! Linear memory helpers
//!
//! These functions work on a raw byte slice taken from the guest's exported
//! memory, so they can be used (and tested) without a live instance. Every
//! access is bounds-checked; nothing here reads or writes past the end of the
//! slice.
//!
//! Strings cross the host/guest boundary as UTF-8 bytes followed by a single
//! zero byte.

use crate::error::{LoaderError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// WebAssembly page size in bytes (64KB)
pub const PAGE_SIZE: usize = 65536;

/// Offset used by `write_string` when the caller does not supply one.
pub const DEFAULT_STRING_OFFSET: u32 = 1024;

/// Validate that `[addr, addr + len)` lies inside `data`, returning the start index.
#[inline]
fn check_bounds(data: &[u8], addr: u32, len: usize) -> Result<usize> {
    let start = addr as usize;
    let out_of_bounds = || LoaderError::OutOfBounds {
        offset: addr as u64,
        len: len as u64,
        size: data.len() as u64,
    };
    let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
    if end > data.len() {
        return Err(out_of_bounds());
    }
    Ok(start)
}

/// Copy `s` plus a trailing zero byte into `data` at `offset` and return `offset`.
///
/// Interior zero bytes in `s` are copied as-is; a later `read_string` stops at
/// the first one.
pub fn write_string(data: &mut [u8], s: &str, offset: u32) -> Result<u32> {
    let bytes = s.as_bytes();
    let start = check_bounds(data, offset, bytes.len() + 1)?;
    let end = start + bytes.len();
    data[start..end].copy_from_slice(bytes);
    data[end] = 0;
    Ok(offset)
}

/// Read the zero-terminated string starting at `ptr`.
///
/// The scan stops at the end of `data`; a string with no terminator before
/// then is an error rather than an overrun. Invalid UTF-8 is replaced with
/// U+FFFD.
pub fn read_string(data: &[u8], ptr: u32) -> Result<String> {
    let start = ptr as usize;
    if start >= data.len() {
        return Err(LoaderError::OutOfBounds {
            offset: ptr as u64,
            len: 1,
            size: data.len() as u64,
        });
    }
    let len = data[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(LoaderError::MissingTerminator {
            ptr,
            size: data.len() as u64,
        })?;
    Ok(String::from_utf8_lossy(&data[start..start + len]).into_owned())
}

/// Read `len` bytes starting at `addr`.
pub fn read_bytes(data: &[u8], addr: u32, len: usize) -> Result<Vec<u8>> {
    let start = check_bounds(data, addr, len)?;
    Ok(data[start..start + len].to_vec())
}

/// Write `bytes` starting at `addr`.
pub fn write_bytes(data: &mut [u8], addr: u32, bytes: &[u8]) -> Result<()> {
    let start = check_bounds(data, addr, bytes.len())?;
    data[start..start + bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// Read a u32 from memory (little-endian)
pub fn read_u32(data: &[u8], addr: u32) -> Result<u32> {
    let start = check_bounds(data, addr, 4)?;
    Ok(LittleEndian::read_u32(&data[start..start + 4]))
}

/// Write a u32 to memory (little-endian)
pub fn write_u32(data: &mut [u8], addr: u32, value: u32) -> Result<()> {
    let start = check_bounds(data, addr, 4)?;
    LittleEndian::write_u32(&mut data[start..start + 4], value);
    Ok(())
}

/// Render `len` bytes at `addr` as rows of 16 hex bytes, each prefixed by its address.
pub fn hex_dump(data: &[u8], addr: u32, len: usize) -> Result<String> {
    let bytes = read_bytes(data, addr, len)?;
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let row_addr = addr as usize + row * 16;
        out.push_str(&format!("{row_addr:08x}  {}\n", hex::encode(chunk)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn page() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    #[rstest]
    #[case("")]
    #[case("(+ 1 2)")]
    #[case("héllo wörld")]
    #[case("λx. x 🎵")]
    fn string_round_trip(#[case] input: &str) {
        let mut mem = page();
        let ptr = write_string(&mut mem, input, DEFAULT_STRING_OFFSET).unwrap();
        assert_eq!(ptr, DEFAULT_STRING_OFFSET);
        assert_eq!(read_string(&mem, ptr).unwrap(), input);
    }

    #[test]
    fn write_appends_single_terminator() {
        let mut mem = vec![0xffu8; 16];
        write_string(&mut mem, "abc", 2).unwrap();
        assert_eq!(&mem[..7], &[0xff, 0xff, b'a', b'b', b'c', 0, 0xff]);
    }

    #[test]
    fn write_fits_exactly_at_end() {
        let mut mem = vec![0xffu8; 8];
        assert!(write_string(&mut mem, "abc", 4).is_ok());
        assert_eq!(&mem[4..], b"abc\0");
        assert!(matches!(
            write_string(&mut mem, "abcd", 4),
            Err(LoaderError::OutOfBounds { offset: 4, len: 5, size: 8 })
        ));
    }

    #[test]
    fn write_offset_overflow_is_rejected() {
        let mut mem = page();
        assert!(write_string(&mut mem, "x", u32::MAX).is_err());
    }

    #[test]
    fn read_stops_at_first_zero() {
        let mut mem = page();
        write_string(&mut mem, "first\0second", 0).unwrap();
        assert_eq!(read_string(&mem, 0).unwrap(), "first");
        assert_eq!(read_string(&mem, 6).unwrap(), "second");
    }

    #[test]
    fn read_without_terminator_fails() {
        let mem = vec![b'a'; 32];
        assert!(matches!(
            read_string(&mem, 4),
            Err(LoaderError::MissingTerminator { ptr: 4, size: 32 })
        ));
    }

    #[test]
    fn read_past_end_fails() {
        let mem = vec![0u8; 32];
        assert!(matches!(read_string(&mem, 32), Err(LoaderError::OutOfBounds { .. })));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mem = [b'o', b'k', 0xff, b'!', 0];
        assert_eq!(read_string(&mem, 0).unwrap(), "ok\u{fffd}!");
    }

    #[test]
    fn u32_little_endian() {
        let mut mem = page();
        write_u32(&mut mem, 8, 0x11223344).unwrap();
        assert_eq!(&mem[8..12], &[0x44, 0x33, 0x22, 0x11]);
        assert_eq!(read_u32(&mem, 8).unwrap(), 0x11223344);
        assert!(read_u32(&mem, (PAGE_SIZE - 3) as u32).is_err());
    }

    #[test]
    fn hex_dump_rows() {
        let mut mem = page();
        write_bytes(&mut mem, 16, b"0123456789abcdefXY").unwrap();
        let dump = hex_dump(&mem, 16, 18).unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "00000010  30313233343536373839616263646566");
        assert_eq!(lines[1], "00000020  5859");
    }
}
