use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use adjpack::primitives::bytes::IntCodec;
use adjpack::storage::{AdjacencyStore, StoreKind, StoreOptions};
use adjpack::types::{NodeId, RelType, Relationship, Result};

const NODE_COUNT: u64 = 200;
const REL_COUNT: u64 = 1_000;
const HUBS: u64 = 3;
const SEED: u64 = 0x5eed_ad10;

/// Random graph where about a third of all relationships leave one of a few
/// hub nodes, so hub chains outgrow their first block.
fn skewed_graph(seed: u64) -> Vec<Relationship> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..REL_COUNT)
        .map(|_| {
            let source = if rng.gen_bool(0.3) {
                rng.gen_range(0..HUBS)
            } else {
                rng.gen_range(0..NODE_COUNT)
            };
            let target = rng.gen_range(0..NODE_COUNT);
            Relationship::new(NodeId(source), NodeId(target), RelType(rng.gen_range(0..4)))
        })
        .collect()
}

fn expected_lists(rels: &[Relationship]) -> Vec<Vec<NodeId>> {
    let mut lists = vec![Vec::new(); NODE_COUNT as usize];
    for rel in rels {
        for tuple in rel.tuples() {
            lists[tuple.node.0 as usize].push(tuple.target);
        }
    }
    lists
}

fn load(kind: StoreKind, codec: IntCodec, rels: &[Relationship]) -> Result<AdjacencyStore> {
    let mut store = AdjacencyStore::new(kind, StoreOptions::default().codec(codec));
    store.init(NODE_COUNT, REL_COUNT)?;
    for rel in rels {
        store.add_relationship(rel)?;
    }
    assert_eq!(store.appended(), 2 * REL_COUNT);
    Ok(store)
}

#[test]
fn every_variant_returns_targets_in_append_order() -> Result<()> {
    let rels = skewed_graph(SEED);
    let expected = expected_lists(&rels);
    for codec in [IntCodec::LengthPrefixed, IntCodec::Base128] {
        for kind in [StoreKind::PlainArray, StoreKind::ByteArray, StoreKind::PagedBuffer] {
            let mut store = load(kind, codec, &rels)?;
            for (node, targets) in expected.iter().enumerate() {
                assert_eq!(
                    &store.targets(NodeId(node as u64))?,
                    targets,
                    "{kind:?}/{codec:?} node {node}"
                );
            }
            store.close()?;
        }
    }
    Ok(())
}

#[test]
fn hubs_force_reallocation() -> Result<()> {
    let rels = skewed_graph(SEED ^ 0xff);
    for codec in [IntCodec::LengthPrefixed, IntCodec::Base128] {
        for kind in [StoreKind::PlainArray, StoreKind::ByteArray, StoreKind::PagedBuffer] {
            let store = load(kind, codec, &rels)?;
            assert!(store.reallocation_count() > 0, "{kind:?}/{codec:?}");
        }
    }
    Ok(())
}

#[test]
fn paged_chains_cover_hub_lists() -> Result<()> {
    let rels = skewed_graph(SEED.rotate_left(7));
    let expected = expected_lists(&rels);
    let mut store = match load(StoreKind::PagedBuffer, IntCodec::LengthPrefixed, &rels)? {
        AdjacencyStore::PagedBuffer(store) => store,
        other => panic!("unexpected variant {:?}", other.kind()),
    };
    let block_size = store.block_size();
    for hub in 0..HUBS {
        let chain = store.chain(NodeId(hub))?;
        assert!(chain.len() > 1, "hub {hub} fits one block");
        assert_eq!(chain[0].offset, hub as usize * block_size);
        assert!(chain.iter().all(|block| block.used < block_size));
        assert_eq!(&store.targets(NodeId(hub))?, &expected[hub as usize]);
    }
    assert!(store.bytes_written() > 0);
    assert!(store.determine_size() <= store.arena_limit() as u64);
    Ok(())
}

#[test]
fn compressed_variants_undercut_plain_arrays() -> Result<()> {
    let rels = skewed_graph(SEED);
    let plain = load(StoreKind::PlainArray, IntCodec::default(), &rels)?;
    let bytes = load(StoreKind::ByteArray, IntCodec::Base128, &rels)?;
    assert!(bytes.determine_size() < plain.determine_size());
    Ok(())
}
