#![no_main]
use libfuzzer_sys::fuzz_target;
use oxisync::delta::{DELTA_MAGIC, DeltaReader};
use oxisync::patch::patch_all;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = patch_all(&[], data);

    // Prefix the magic so the command parser is reached.
    let mut delta = DELTA_MAGIC.to_be_bytes().to_vec();
    delta.extend_from_slice(data);
    if let Ok(reader) = DeltaReader::new(delta.as_slice()) {
        for insn in reader {
            if insn.is_err() {
                break;
            }
        }
    }

    if data.len() >= 2 {
        let (basis, _) = data.split_at(data.len() / 2);
        let _ = patch_all(basis, &delta);
    }
});
