use oxisync::Error;
use oxisync::delta::{self, DeltaReader, Instruction};
use oxisync::hash::HashFamily;
use oxisync::patch::{self, patch_all};
use oxisync::signature::{self, Signature, SignatureOptions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut v = vec![0u8; len];
    rng.fill(v.as_mut_slice());
    v
}

fn opts(family: HashFamily, block_len: u32, strong_len: u32) -> SignatureOptions {
    SignatureOptions::new(family, block_len, strong_len).unwrap()
}

fn make_delta(basis: &[u8], target: &[u8], o: SignatureOptions) -> Vec<u8> {
    let mut sig_bytes = Vec::new();
    signature::build_signature(basis, &mut sig_bytes, o).unwrap();
    let sig = Signature::read_from(sig_bytes.as_slice()).unwrap();
    delta::delta_all(&sig.build_index(), target).unwrap()
}

fn decode(delta: &[u8]) -> Vec<Instruction> {
    DeltaReader::new(delta)
        .unwrap()
        .collect::<oxisync::Result<Vec<_>>>()
        .unwrap()
}

fn roundtrip(basis: &[u8], target: &[u8], o: SignatureOptions) -> Vec<Instruction> {
    let delta = make_delta(basis, target, o);
    assert_eq!(patch_all(basis, &delta).unwrap(), target);
    decode(&delta)
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn identity_roundtrip_is_all_copies() {
    let basis = random_bytes(1, 100_000);
    for o in [
        SignatureOptions::default(),
        opts(HashFamily::Md4, 512, 8),
        opts(HashFamily::Blake2, 700, 16),
    ] {
        let ins = roundtrip(&basis, &basis, o);
        assert!(
            ins.iter().all(|i| !matches!(i, Instruction::Literal(_))),
            "literal in identity delta with {o:?}"
        );
        // Distinct random blocks are contiguous, so they merge into one COPY.
        assert_eq!(
            ins,
            vec![
                Instruction::Copy {
                    offset: 0,
                    len: basis.len() as u64
                },
                Instruction::End
            ]
        );
    }
}

#[test]
fn general_roundtrip_with_edits() {
    let basis = random_bytes(2, 64 * 1024);
    let mut target = basis.clone();
    // Overwrite, insert and delete at scattered positions.
    target[1000..1100].copy_from_slice(&random_bytes(3, 100));
    target.splice(20_000..20_000, random_bytes(4, 333));
    target.drain(40_000..41_234);
    target.extend_from_slice(b"appended tail");

    for o in [
        SignatureOptions::default(),
        opts(HashFamily::Md4, 256, 16),
        opts(HashFamily::Md4, 1, 16),
    ] {
        let ins = roundtrip(&basis, &target, o);
        let copied: u64 = ins
            .iter()
            .filter(|i| matches!(i, Instruction::Copy { .. }))
            .map(Instruction::output_len)
            .sum();
        assert!(copied > target.len() as u64 / 2, "{o:?} copied {copied}");
    }
}

#[test]
fn unrelated_target_roundtrips() {
    let basis = random_bytes(5, 10_000);
    let target = random_bytes(6, 12_345);
    let ins = roundtrip(&basis, &target, opts(HashFamily::Md4, 128, 16));
    assert_eq!(ins.len(), 2);
    assert!(matches!(&ins[0], Instruction::Literal(d) if d == &target));
}

#[test]
fn reordered_blocks_copy_from_basis_offsets() {
    let basis = random_bytes(7, 4 * 512);
    let mut target = basis[1024..1536].to_vec();
    target.extend_from_slice(&basis[0..512]);
    let ins = roundtrip(&basis, &target, opts(HashFamily::Blake2, 512, 32));
    assert_eq!(
        ins,
        vec![
            Instruction::Copy {
                offset: 1024,
                len: 512
            },
            Instruction::Copy { offset: 0, len: 512 },
            Instruction::End
        ]
    );
}

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

#[test]
fn short_last_block_is_matched() {
    // 2.5 blocks: the last basis block is 256 bytes long.
    let basis = random_bytes(8, 1280);
    let mut target = b"prefix".to_vec();
    target.extend_from_slice(&basis);
    let ins = roundtrip(&basis, &target, opts(HashFamily::Md4, 512, 16));
    assert_eq!(
        ins,
        vec![
            Instruction::Literal(b"prefix".to_vec()),
            Instruction::Copy {
                offset: 0,
                len: 1280
            },
            Instruction::End
        ]
    );
}

#[test]
fn short_last_block_alone_is_matched() {
    let basis = random_bytes(9, 1280);
    let target = basis[1024..].to_vec();
    let ins = roundtrip(&basis, &target, opts(HashFamily::Md4, 512, 16));
    assert_eq!(
        ins,
        vec![
            Instruction::Copy {
                offset: 1024,
                len: 256
            },
            Instruction::End
        ]
    );
}

#[test]
fn empty_basis_gives_one_literal() {
    let target = random_bytes(10, 5000);
    let ins = roundtrip(b"", &target, SignatureOptions::default());
    assert_eq!(ins, vec![Instruction::Literal(target), Instruction::End]);
}

#[test]
fn empty_target_gives_end_only() {
    let basis = random_bytes(11, 5000);
    let delta = make_delta(&basis, b"", SignatureOptions::default());
    assert_eq!(decode(&delta), vec![Instruction::End]);
    assert_eq!(delta.len(), 5);
    assert!(patch_all(&basis, &delta).unwrap().is_empty());
}

#[test]
fn target_shorter_than_one_block() {
    let basis = random_bytes(12, 4096);
    let ins = roundtrip(&basis, b"tiny", SignatureOptions::default());
    assert_eq!(ins, vec![Instruction::Literal(b"tiny".to_vec()), Instruction::End]);
}

// ---------------------------------------------------------------------------
// Tie-break and degenerate signatures
// ---------------------------------------------------------------------------

#[test]
fn zero_basis_resolves_every_match_to_block_zero() {
    let basis = vec![0u8; 2048];
    let o = opts(HashFamily::Md4, 512, 16);

    let sig = signature::signature_of(&basis, o).unwrap();
    assert_eq!(sig.len(), 4);
    assert!(sig.blocks().windows(2).all(|w| w[0] == w[1]));

    let ins = roundtrip(&basis, &basis, o);
    let copy = Instruction::Copy {
        offset: 0,
        len: 512,
    };
    assert_eq!(
        ins,
        vec![
            copy.clone(),
            copy.clone(),
            copy.clone(),
            copy,
            Instruction::End
        ]
    );
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn instruction_lengths_sum_to_target_length() {
    let basis = random_bytes(13, 30_000);
    let mut target = random_bytes(14, 5_000);
    target.extend_from_slice(&basis[3_000..25_000]);
    target.extend_from_slice(&random_bytes(15, 777));

    let delta = make_delta(&basis, &target, opts(HashFamily::Blake2, 1000, 8));
    let total: u64 = decode(&delta).iter().map(Instruction::output_len).sum();
    assert_eq!(total, target.len() as u64);
}

#[test]
fn signature_is_idempotent() {
    let basis = random_bytes(16, 50_000);
    for o in [SignatureOptions::default(), opts(HashFamily::Md4, 333, 5)] {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let sa = signature::build_signature(basis.as_slice(), &mut a, o).unwrap();
        signature::build_signature(basis.as_slice(), &mut b, o).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, sa.to_bytes());
        assert_eq!(a.len() as u64, sa.encoded_len());
    }
}

#[test]
fn delta_stats_describe_the_stream() {
    let basis = random_bytes(17, 8192);
    let mut target = basis.clone();
    target[4000] ^= 0xFF;
    let sig = signature::signature_of(&basis, opts(HashFamily::Md4, 1024, 16)).unwrap();
    let mut out = Vec::new();
    let stats = delta::encode_delta(&sig.build_index(), target.as_slice(), &mut out).unwrap();

    assert_eq!(stats.delta_len, out.len() as u64);
    assert_eq!(stats.target_len, target.len() as u64);
    assert_eq!(stats.copy_bytes + stats.literal_bytes, target.len() as u64);
    assert!(stats.literal_bytes >= 1);
    assert!(stats.copy_cmds >= 2);
}

// ---------------------------------------------------------------------------
// Corruption
// ---------------------------------------------------------------------------

#[test]
fn truncated_basis_is_detected() {
    let basis = random_bytes(18, 10_000);
    let delta = make_delta(&basis, &basis, opts(HashFamily::Md4, 1000, 16));
    let err = patch_all(&basis[..9_000], &delta).unwrap_err();
    assert!(matches!(err, Error::CorruptDelta(_)), "{err}");
}

#[test]
fn truncated_delta_is_detected() {
    let basis = random_bytes(19, 10_000);
    let target = random_bytes(20, 3_000);
    let delta = make_delta(&basis, &target, SignatureOptions::default());
    for cut in [3, 4, 5, 100, delta.len() - 1] {
        let err = patch_all(&basis, &delta[..cut]).unwrap_err();
        assert!(err.is_corrupt(), "cut at {cut}: {err}");
    }
}

#[test]
fn wrong_magic_is_detected() {
    let sig = signature::signature_of(b"abc", SignatureOptions::default()).unwrap();
    // A signature is not a delta.
    let err = patch_all(b"abc", &sig.to_bytes()).unwrap_err();
    assert!(matches!(err, Error::CorruptDelta(_)));
}

#[test]
fn basis_from_a_file_handle() {
    let basis = random_bytes(21, 20_000);
    let mut target = basis[5_000..].to_vec();
    target.extend_from_slice(b"new ending");
    let delta = make_delta(&basis, &target, SignatureOptions::default());

    let mut file = tempfile::tempfile().unwrap();
    std::io::Write::write_all(&mut file, &basis).unwrap();

    let mut out = Vec::new();
    let stats = patch::apply_delta(&mut file, delta.as_slice(), &mut out).unwrap();
    assert_eq!(out, target);
    assert_eq!(stats.output_len, target.len() as u64);
}
