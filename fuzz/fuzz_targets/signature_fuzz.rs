#![no_main]
use libfuzzer_sys::fuzz_target;
use oxisync::signature::Signature;

fuzz_target!(|data: &[u8]| {
    // Anything that parses must write back to the same bytes.
    if let Ok(sig) = Signature::read_from(data) {
        let index = sig.build_index();
        assert_eq!(index.block_count() as usize, sig.len());
        assert_eq!(sig.to_bytes(), data);
    }
});
