#![no_main]
use libfuzzer_sys::fuzz_target;
use oxisync::delta;
use oxisync::hash::HashFamily;
use oxisync::patch::patch_all;
use oxisync::signature::{self, SignatureOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let family = if data[0] & 1 == 0 {
        HashFamily::Md4
    } else {
        HashFamily::Blake2
    };
    let block_len = 1 + u32::from(data[1] % 64);
    let payload = &data[2..];
    let split = payload.len() / 2;
    let (basis, target) = payload.split_at(split);

    let Ok(opts) = SignatureOptions::new(family, block_len, 8) else {
        return;
    };
    let sig = signature::signature_of(basis, opts).unwrap();
    let delta = delta::delta_all(&sig.build_index(), target).unwrap();
    assert_eq!(patch_all(basis, &delta).unwrap(), target);
});
