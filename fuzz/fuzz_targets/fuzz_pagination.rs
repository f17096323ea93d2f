#![no_main]
use std::cell::RefCell;

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use nullpipe::pagination::{ESCAPE_LEN, decode_chunks, encode_chunks};
use nullpipe::produce_split_chunks;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const HEADER: usize = 8; // 8-byte split seed

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

/// Fragments the mutator splices into inputs so the escape paths get hit far
/// more often than random bytes would.
static FRAGMENTS: &[&[u8]] = &[
    b"null-page-",
    b"null-page-s",
    b"null-page-m",
    b"null-page-e",
    b"null-pag",
    b"n",
    b"-",
];

fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if size < HEADER || !seed.is_multiple_of(4) {
        return fuzzer_mutate(data, size, max_size);
    }
    let fragment = with_rng(|rng| FRAGMENTS[rng.random_range(0..FRAGMENTS.len())]);
    if size + fragment.len() > max_size {
        return fuzzer_mutate(data, size, max_size);
    }
    let at = with_rng(|rng| rng.random_range(HEADER..=size));
    data.copy_within(at..size, at + fragment.len());
    data[at..at + fragment.len()].copy_from_slice(fragment);
    size + fragment.len()
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

/// Chunk sizes for the encoder and the decoder, derived from a seed.
fn splits(seed: u64, len: usize) -> (Vec<usize>, Vec<usize>) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut draw = |n: usize| (0..n).map(|_| rng.random_range(0..64)).collect::<Vec<_>>();
    let n = len / 4 + 1;
    (draw(n), draw(n))
}

fn roundtrip(data: &[u8]) {
    let mut u = Unstructured::new(data);
    let Ok(seed) = u64::arbitrary(&mut u) else {
        return;
    };
    let payload = u.take_rest();
    let (encode_splits, decode_splits) = splits(seed, payload.len());

    // Any payload survives encoding and decoding under any chunking.
    let encoded = encode_chunks(produce_split_chunks(payload, &encode_splits));
    let decoded = decode_chunks(produce_split_chunks(&encoded, &decode_splits))
        .expect("encoded stream must decode");
    assert_eq!(decoded, payload);

    // Raw bytes either decode or fail, and never differently per chunking.
    let whole = decode_chunks([payload]);
    let bytewise = decode_chunks(payload.chunks(1));
    assert_eq!(whole, bytewise);
    if let Ok(inner) = whole {
        assert!(inner.len() <= payload.len().saturating_sub(2 * ESCAPE_LEN));
    }
}

fuzz_target!(|data: &[u8]| roundtrip(data));
