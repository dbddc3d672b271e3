use std::sync::atomic::Ordering;
use std::sync::{Arc, Once};

use adjpack::primitives::bytes::IntCodec;
use adjpack::storage::{AdjacencyStore, CounterMetrics, Phase, StoreKind, StoreOptions};
use adjpack::types::{AdjError, Direction, NodeId, RelType, Relationship, Result};
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;

const TY: RelType = RelType(7);

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("adjpack=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

fn loaded(kind: StoreKind, options: StoreOptions) -> Result<AdjacencyStore> {
    init_tracing();
    let mut store = AdjacencyStore::new(kind, options);
    store.init(8, 8)?;
    Ok(store)
}

#[test]
fn append_before_init_is_rejected() {
    for kind in StoreKind::ALL {
        let mut store = AdjacencyStore::new(kind, StoreOptions::default());
        assert_eq!(store.phase(), Phase::Created);
        assert_eq!(store.total_nodes(), 0);
        let err = store
            .add_target(NodeId(0), NodeId(1), TY, Direction::Outgoing)
            .unwrap_err();
        assert!(matches!(err, AdjError::SequencingViolation(_)), "{kind:?}");
        assert!(matches!(
            store.targets(NodeId(0)),
            Err(AdjError::SequencingViolation(_))
        ));
    }
}

#[test]
fn init_runs_once() -> Result<()> {
    for kind in StoreKind::ALL {
        let mut store = loaded(kind, StoreOptions::default())?;
        assert_eq!(store.phase(), Phase::Loading);
        let sizing = store.sizing().expect("sized after init");
        assert_eq!(sizing.total_nodes, 8);
        assert_eq!(sizing.max_appends(), 16);
        assert_eq!(store.total_nodes(), 8);
        assert_eq!(store.total_rels(), 8);
        assert_eq!(store.fan_out(), 4);
        assert!(matches!(
            store.init(8, 8),
            Err(AdjError::SequencingViolation(_))
        ));
    }
    Ok(())
}

#[test]
fn zero_nodes_and_bad_options_fail_init() {
    for kind in StoreKind::ALL {
        let mut store = AdjacencyStore::new(kind, StoreOptions::default());
        assert!(matches!(store.init(0, 4), Err(AdjError::Invalid(_))));

        let mut store = AdjacencyStore::new(kind, StoreOptions::default().bytes_per_edge(0));
        assert!(matches!(store.init(4, 4), Err(AdjError::Invalid(_))));
    }
}

#[test]
fn oversized_totals_fail_init_without_panicking() {
    init_tracing();
    for kind in StoreKind::ALL {
        let mut store = AdjacencyStore::new(kind, StoreOptions::default());
        let result = store.init(1, 1 << 62);
        if kind == StoreKind::Null {
            assert!(result.is_ok());
            continue;
        }
        assert!(
            matches!(result, Err(AdjError::CapacityExceeded { .. })),
            "{kind:?}: {result:?}"
        );
        assert_eq!(store.phase(), Phase::Created, "{kind:?}");
        assert!(matches!(
            store.add_target(NodeId(0), NodeId(0), TY, Direction::Outgoing),
            Err(AdjError::SequencingViolation(_))
        ));
    }
}

#[test]
fn out_of_range_ids_are_capacity_errors() -> Result<()> {
    for kind in StoreKind::ALL {
        let mut store = loaded(kind, StoreOptions::default())?;
        for (node, target) in [(8, 0), (0, 8), (u64::MAX, 1)] {
            let err = store
                .add_target(NodeId(node), NodeId(target), TY, Direction::Outgoing)
                .unwrap_err();
            assert!(
                matches!(err, AdjError::CapacityExceeded { limit: 8, .. }),
                "{kind:?}: {err}"
            );
        }
        assert_eq!(store.appended(), 0);
    }
    Ok(())
}

#[test]
fn appends_are_bounded_by_twice_the_relationships() -> Result<()> {
    for kind in StoreKind::ALL {
        let mut store = loaded(kind, StoreOptions::default())?;
        for i in 0..8u64 {
            store.add_relationship(&Relationship::new(NodeId(i), NodeId((i + 1) % 8), TY))?;
        }
        assert_eq!(store.appended(), 16);
        let err = store
            .add_target(NodeId(0), NodeId(0), TY, Direction::Outgoing)
            .unwrap_err();
        assert!(
            matches!(
                err,
                AdjError::CapacityExceeded {
                    limit: 16,
                    requested: 17,
                    ..
                }
            ),
            "{kind:?}: {err}"
        );
    }
    Ok(())
}

#[test]
fn first_read_seals_the_store() -> Result<()> {
    for kind in StoreKind::ALL {
        let mut store = loaded(kind, StoreOptions::default())?;
        store.add_target(NodeId(2), NodeId(3), TY, Direction::Outgoing)?;
        store.targets(NodeId(2))?;
        assert_eq!(store.phase(), Phase::Sealed);
        assert!(matches!(
            store.add_target(NodeId(2), NodeId(4), TY, Direction::Outgoing),
            Err(AdjError::SequencingViolation(_))
        ));
        // reads stay available until close
        store.targets(NodeId(5))?;
    }
    Ok(())
}

#[test]
fn close_ends_the_lifecycle() -> Result<()> {
    for kind in StoreKind::ALL {
        let mut store = loaded(kind, StoreOptions::default())?;
        store.add_target(NodeId(1), NodeId(2), TY, Direction::Incoming)?;
        store.close()?;
        assert_eq!(store.phase(), Phase::Closed);
        assert!(matches!(
            store.add_target(NodeId(1), NodeId(2), TY, Direction::Incoming),
            Err(AdjError::SequencingViolation(_))
        ));
        assert!(matches!(
            store.targets(NodeId(1)),
            Err(AdjError::SequencingViolation(_))
        ));
        assert!(matches!(
            store.close(),
            Err(AdjError::SequencingViolation(_))
        ));
    }
    Ok(())
}

#[test]
fn null_store_holds_nothing() -> Result<()> {
    let mut store = loaded(StoreKind::Null, StoreOptions::default())?;
    for i in 0..8u64 {
        store.add_relationship(&Relationship::new(NodeId(i), NodeId(7 - i), TY))?;
    }
    assert_eq!(store.determine_size(), 0);
    assert_eq!(store.reallocation_count(), 0);
    assert!(store.targets(NodeId(3))?.is_empty());
    store.close()
}

#[test]
fn committed_size_is_positive_after_init() -> Result<()> {
    for kind in [StoreKind::PlainArray, StoreKind::ByteArray, StoreKind::PagedBuffer] {
        let store = loaded(kind, StoreOptions::default())?;
        assert!(store.determine_size() > 0, "{kind:?}");
        assert_eq!(store.kind(), kind);
    }
    Ok(())
}

#[test]
fn metrics_observe_every_append() -> Result<()> {
    for kind in StoreKind::ALL {
        let metrics = Arc::new(CounterMetrics::default());
        let mut store = loaded(kind, StoreOptions::default().metrics(metrics.clone()))?;
        for i in 0..6u64 {
            store.add_relationship(&Relationship::new(NodeId(0), NodeId(i + 1), TY))?;
        }
        assert_eq!(metrics.targets_added.load(Ordering::Relaxed), 12, "{kind:?}");
    }
    Ok(())
}

#[test]
fn options_load_from_a_toml_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.toml");
    std::fs::write(
        &path,
        "codec = \"base128\"\nbytes_per_edge = 8\nmin_fan_out = 2\n",
    )?;
    let options = StoreOptions::from_toml_file(&path)?;
    assert_eq!(options.codec, IntCodec::Base128);
    assert_eq!(options.bytes_per_edge, 8);

    let mut store = AdjacencyStore::new(StoreKind::PagedBuffer, options);
    store.init(4, 2)?;
    assert_eq!(store.sizing().map(|s| s.fan_out), Some(2));
    store.add_target(NodeId(3), NodeId(1), TY, Direction::Outgoing)?;
    assert_eq!(store.targets(NodeId(3))?, vec![NodeId(1)]);

    assert!(matches!(
        StoreOptions::from_toml_file(dir.path().join("missing.toml")),
        Err(AdjError::Io(_))
    ));
    Ok(())
}
