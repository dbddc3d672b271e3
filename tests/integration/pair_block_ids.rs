use std::collections::BTreeMap;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use adjpack::primitives::bytes::IntCodec;
use adjpack::primitives::rle::BufferSize;
use adjpack::storage::{IdPair, PairBlock};
use adjpack::types::{AdjError, Result};

const SEED: u64 = 0x1d_9a12;

#[test]
fn relationship_to_node_lookups() -> Result<()> {
    for codec in [IntCodec::LengthPrefixed, IntCodec::Base128] {
        let pairs: Vec<IdPair> = (0..50).map(|i| IdPair::new(10 + i, 5 + i)).collect();
        let mut block = PairBlock::new(BufferSize::Small, codec);
        block.set(&pairs)?;
        assert_eq!(block.len(), 50);

        assert_eq!(block.lookup_secondary_by_primary(10)?, Some(5));
        assert_eq!(block.lookup_secondary_by_primary(11)?, Some(6));
        assert_eq!(block.lookup_secondary_by_primary(59)?, Some(54));
        for missing in [0, 9, 60, i64::MAX] {
            assert_eq!(block.lookup_secondary_by_primary(missing)?, None);
        }

        let mut out = vec![IdPair::default(); 64];
        assert_eq!(block.get(&mut out)?, 50);
        assert_eq!(&out[..50], &pairs[..]);
    }
    Ok(())
}

#[test]
fn random_relationship_maps_roundtrip() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    for round in 0..4 {
        let mut map = BTreeMap::new();
        let mut rel = rng.gen_range(0..1_000i64);
        for _ in 0..5_000 {
            rel += rng.gen_range(1..16);
            map.insert(rel, rng.gen_range(0..100_000i64));
        }
        let mut input: Vec<IdPair> = map.iter().map(|(&r, &n)| IdPair::new(r, n)).collect();
        input.shuffle(&mut rng);

        let codec = if round % 2 == 0 {
            IntCodec::Base128
        } else {
            IntCodec::LengthPrefixed
        };
        let mut block = PairBlock::new(BufferSize::Medium, codec);
        block.set(&input)?;

        let decoded = block.to_vec()?;
        let expected: Vec<IdPair> = map.iter().map(|(&r, &n)| IdPair::new(r, n)).collect();
        assert_eq!(decoded, expected);

        for (&rel, &node) in map.iter().step_by(97) {
            assert_eq!(block.lookup_secondary_by_primary(rel)?, Some(node));
        }
        let first = *map.keys().next().expect("non-empty map");
        assert_eq!(block.lookup_secondary_by_primary(first - 1)?, None);
    }
    Ok(())
}

#[test]
fn sequential_ids_collapse_into_runs() -> Result<()> {
    let pairs: Vec<IdPair> = (0..10_000).map(|i| IdPair::new(i, i + 1_000)).collect();
    let mut block = PairBlock::new(BufferSize::Small, IntCodec::Base128);
    block.set(&pairs)?;
    assert_eq!(block.to_vec()?, pairs);
    assert_eq!(block.lookup_secondary_by_primary(9_999)?, Some(10_999));
    Ok(())
}

#[test]
fn a_block_can_be_refilled() -> Result<()> {
    let mut block = PairBlock::new(BufferSize::Small, IntCodec::LengthPrefixed);
    assert_eq!(block.lookup_secondary_by_primary(0)?, None);
    assert!(matches!(
        block.to_vec(),
        Err(AdjError::SequencingViolation(_))
    ));
    block.set(&[IdPair::new(4, 40), IdPair::new(2, 20)])?;
    assert_eq!(block.lookup_secondary_by_primary(4)?, Some(40));
    block.set(&[IdPair::new(7, 1)])?;
    assert_eq!(block.len(), 1);
    assert_eq!(block.lookup_secondary_by_primary(4)?, None);
    assert_eq!(block.to_vec()?, vec![IdPair::new(7, 1)]);
    Ok(())
}
