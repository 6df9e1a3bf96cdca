#![no_main]

use libfuzzer_sys::fuzz_target;

/// Fuzz target that interprets a byte slice as a sequence of pool
/// operations.
///
/// Each operation is encoded as:
///   byte 0: opcode (0 = allocate, 1 = deallocate, 2 = allocate oversized)
///   byte 1-2: size (little-endian u16; opcode 2 scales it past the pool
///             ceiling to exercise the host-allocator path)
///   byte 3: slot index (which tracked pointer to operate on)
///
/// Up to 64 live pointers are tracked, with their requested sizes, since
/// `deallocate` must be given the original size.
const MAX_SLOTS: usize = 64;

fuzz_target!(|data: &[u8]| {
    let mut slots: [*mut u8; MAX_SLOTS] = [std::ptr::null_mut(); MAX_SLOTS];
    let mut sizes: [usize; MAX_SLOTS] = [0; MAX_SLOTS];

    let mut i = 0;
    while i + 4 <= data.len() {
        let opcode = data[i] % 3;
        let encoded = u16::from_le_bytes([data[i + 1], data[i + 2]]) as usize;
        let slot = (data[i + 3] as usize) % MAX_SLOTS;
        i += 4;

        match opcode {
            0 | 2 => {
                if !slots[slot].is_null() {
                    tierpool::deallocate(slots[slot], sizes[slot]);
                }
                let size = if opcode == 2 {
                    // Push past MAX_BYTES so the host path gets coverage.
                    tierpool::MAX_BYTES + 1 + encoded
                } else {
                    encoded
                };
                let ptr = tierpool::allocate(size);
                slots[slot] = ptr;
                sizes[slot] = size;
                if !ptr.is_null() {
                    // Write a pattern over the start of the block.
                    let head = std::cmp::min(size.max(1), 256);
                    unsafe { std::ptr::write_bytes(ptr, 0xAA, head) };
                }
            }
            1 => {
                if !slots[slot].is_null() {
                    tierpool::deallocate(slots[slot], sizes[slot]);
                    slots[slot] = std::ptr::null_mut();
                    sizes[slot] = 0;
                }
            }
            _ => unreachable!(),
        }
    }

    // Free everything still live so runs are leak-free.
    for slot in 0..MAX_SLOTS {
        if !slots[slot].is_null() {
            tierpool::deallocate(slots[slot], sizes[slot]);
        }
    }
});
