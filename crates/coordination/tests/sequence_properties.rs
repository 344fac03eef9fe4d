//! Property tests for sequential node allocation in MemoryEnsemble
//!
//! The lock's FIFO guarantee rests on sequence numbers being unique and
//! strictly increasing per parent, whatever else happens under that parent.

use metaindex_coordination::{ensure_path, Coordinator, CreateMode, MemoryEnsemble};
use metaindex_core::path::parse_sequence;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    /// Sequential create (ephemeral or persistent)
    Sequential(bool),
    /// Delete the n-th live sequential node, if any
    Delete(usize),
    /// Close the session and continue on a fresh one
    Reconnect,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<bool>().prop_map(Op::Sequential),
        2 => (0usize..8).prop_map(Op::Delete),
        1 => Just(Op::Reconnect),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn sequence_numbers_strictly_increase(ops in prop::collection::vec(arb_op(), 1..60)) {
        let ensemble = MemoryEnsemble::new();
        let mut session = ensemble.connect();
        ensure_path(&session, "/queue").unwrap();

        let mut last: Option<u64> = None;
        let mut live: Vec<String> = Vec::new();
        for op in ops {
            match op {
                Op::Sequential(ephemeral) => {
                    let mode = if ephemeral {
                        CreateMode::EphemeralSequential
                    } else {
                        CreateMode::PersistentSequential
                    };
                    let path = session.create("/queue/item-", b"", mode).unwrap();
                    let seq = parse_sequence(&path).unwrap();
                    if let Some(prev) = last {
                        prop_assert!(seq > prev, "{} after {}", seq, prev);
                    }
                    last = Some(seq);
                    live.push(path);
                }
                Op::Delete(n) => {
                    live.retain(|path| session.exists(path).unwrap());
                    if !live.is_empty() {
                        let path = live.remove(n % live.len());
                        session.delete(&path).unwrap();
                    }
                }
                Op::Reconnect => {
                    session.close();
                    session = ensemble.connect();
                    live.retain(|path| session.exists(path).unwrap());
                }
            }
        }

        // Children always agree with what survived.
        let mut children = session.children("/queue").unwrap();
        children.sort();
        let mut expected: Vec<String> = live
            .iter()
            .filter(|path| session.exists(path).unwrap())
            .map(|path| path.trim_start_matches("/queue/").to_string())
            .collect();
        expected.sort();
        prop_assert_eq!(children, expected);
    }
}
