//! Container codec robustness tests
//!
//! Damaged or hostile input must decode to an error, never a panic or a
//! partially filled container.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use searchd::checksum::compute_checksum;
use searchd::container::{deserialize, serialize};
use searchd::Container;

// =============================================================================
// Test Utilities
// =============================================================================

fn sample() -> Container {
    let mut c = Container::with_uid(7, "listing");
    c.put_string("title", "Pain Management Specialist").unwrap();
    c.put_int("zip", 91301).unwrap();
    c.put_double("latitude", 34.186193).unwrap();
    c.put_bool("active", false).unwrap();
    c
}

/// Random body with a valid trailing checksum, so decoding reaches the parser
fn sealed_random(rng: &mut StdRng, len: usize) -> Vec<u8> {
    let mut buf: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
    if let Some(first) = buf.first_mut() {
        *first = 1;
    }
    let checksum = compute_checksum(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

// =============================================================================
// Damaged Input
// =============================================================================

#[test]
fn test_random_buffers_never_panic() {
    let mut rng = StdRng::seed_from_u64(0x5EA7C4);
    for _ in 0..2000 {
        let len = rng.gen_range(0..256);
        let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        if let Err(err) = deserialize(&data) {
            assert!(err.code().is_corruption());
        }
    }
}

#[test]
fn test_sealed_random_bodies_are_rejected_cleanly() {
    let mut rng = StdRng::seed_from_u64(91301);
    for _ in 0..2000 {
        let len = rng.gen_range(0..128);
        let data = sealed_random(&mut rng, len);
        if let Err(err) = deserialize(&data) {
            assert!(err.code().is_corruption(), "unexpected error: {}", err);
        }
    }
}

#[test]
fn test_oversized_attribute_count_is_truncated_not_allocated() {
    let mut body = vec![1u8];
    body.extend_from_slice(&9u32.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&u32::MAX.to_le_bytes());
    let checksum = compute_checksum(&body);
    body.extend_from_slice(&checksum.to_le_bytes());

    let err = deserialize(&body).unwrap_err();
    assert!(err.code().is_corruption());
}

#[test]
fn test_random_tail_after_valid_record_is_rejected() {
    let mut rng = StdRng::seed_from_u64(7);
    let bytes = serialize(&sample());
    assert_eq!(deserialize(&bytes).unwrap(), sample());

    for _ in 0..200 {
        let mut extended = bytes.clone();
        let extra = rng.gen_range(1..16);
        extended.extend((0..extra).map(|_| rng.gen::<u8>()));
        assert!(deserialize(&extended).is_err());
    }
}
