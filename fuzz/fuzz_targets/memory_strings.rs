#![no_main]

use libfuzzer_sys::fuzz_target;
use wasm_loader::memory;

// First four bytes pick an offset, the rest is treated as guest memory.
// We don't care about the result - we're looking for panics/crashes
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let offset = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let mut mem = data[4..].to_vec();

    let _ = memory::read_string(&mem, offset);
    let _ = memory::read_u32(&mem, offset);
    let _ = memory::hex_dump(&mem, offset, 32);

    let text = String::from_utf8_lossy(&data[4..]).into_owned();
    if let Ok(ptr) = memory::write_string(&mut mem, &text, offset) {
        let back = memory::read_string(&mem, ptr).expect("written string must read back");
        assert!(text.starts_with(&back));
    }
});
