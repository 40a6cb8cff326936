#![no_main]
use libfuzzer_sys::fuzz_target;
use rdcu_cmp_core::decompress_cmp_entity;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes through the entity decompressor. Err results are
    // expected and fine; what we verify is no panics, no out-of-bounds
    // access, and no infinite loop.

    // No model buffer, no updated-model output.
    {
        let mut out = Vec::new();
        let _ = decompress_cmp_entity(data, None, None, &mut out);
    }

    // A model buffer the same size as the input, in case `data` claims a
    // MODEL_* mode — exercises the per-collection model-slice bookkeeping.
    {
        let model = vec![0_u8; data.len()];
        let mut out = Vec::new();
        let mut updated = Vec::new();
        let _ = decompress_cmp_entity(data, Some(&model), Some(&mut updated), &mut out);
    }
});
