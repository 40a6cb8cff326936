#![no_main]
use libfuzzer_sys::fuzz_target;
use rdcu_cmp_core::{compress_chunk, compress_chunk_init, decompress_cmp_entity, CompressionConfig, CompressionMode};
use std::sync::Once;

static INIT: Once = Once::new();

fn fixed_timestamp() -> rdcu_cmp_core::Timestamp48 {
    0
}

fuzz_target!(|data: &[u8]| {
    INIT.call_once(|| {
        let _ = compress_chunk_init(fixed_timestamp, 1);
    });

    // Most arbitrary byte strings are not valid chunk framing at all, so
    // `compress_chunk` is expected to reject nearly all of them with
    // `Err(_)`. The property under fuzzing is that it never panics, and
    // that whenever it does succeed, the result round-trips through
    // `decompress_cmp_entity` back to the original bytes.
    let cfg = CompressionConfig::default().with_mode(CompressionMode::DiffZero);
    let mut dst = vec![0_u8; data.len() * 4 + 256];
    if let Ok(size) = compress_chunk(data, None, None, &mut dst, &cfg) {
        let mut out = Vec::new();
        if decompress_cmp_entity(&dst[..size], None, None, &mut out).is_ok() {
            assert_eq!(out, data);
        }
    }
});
