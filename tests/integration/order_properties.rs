use crate::support::Fixture;
use proptest::prelude::*;
use std::collections::HashMap;
use treeorder::order::record::apply_batch;
use treeorder::order::{BatchTarget, ChangeKind};

fn permutation() -> impl Strategy<Value = Vec<usize>> {
    (1usize..8).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any permutation written through batch moves reloads exactly
    #[test]
    fn written_permutation_survives_reload(perm in permutation()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let fixture = Fixture::empty();
            let root = fixture.root();
            for i in 0..perm.len() {
                std::fs::write(root.join(format!("entry{}", i)), "x").unwrap();
            }
            let initial = fixture.store.load_metadata(root).await.unwrap();
            let target: Vec<String> = perm.iter().map(|&i| initial[i].clone()).collect();

            // bring each target name to the front, last one first
            for name in target.iter().rev() {
                let current = fixture.store.cached_order(root).unwrap();
                let index = current.iter().position(|n| n == name).unwrap();
                fixture
                    .store
                    .update_metadata_lot(ChangeKind::Move, BatchTarget::Parent(root), &[index], Some(0))
                    .await
                    .unwrap();
            }

            fixture.store.evict(root);
            let reloaded = fixture.store.load_metadata(root).await.unwrap();
            assert_eq!(reloaded, target);
            assert_eq!(fixture.metadata_on_disk(root), Some(target));
        });
    }

    /// Batch moves keep every name once and the moved names in their prior order
    #[test]
    fn batch_move_is_a_stable_permutation(
        len in 1usize..10,
        picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..5),
        destination in any::<prop::sample::Index>(),
    ) {
        let order: Vec<String> = (0..len).map(|i| format!("n{}", i)).collect();
        let indices: Vec<usize> = picks.iter().map(|p| p.index(len)).collect();
        let destination = destination.index(len + 1);

        let next = apply_batch(&order, ChangeKind::Move, &[], &indices, Some(destination))
            .unwrap()
            .unwrap_or_else(|| order.clone());

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for name in &next {
            *counts.entry(name.as_str()).or_default() += 1;
        }
        prop_assert_eq!(next.len(), order.len());
        prop_assert!(counts.values().all(|&c| c == 1));

        let mut moved: Vec<usize> = indices.clone();
        moved.sort_unstable();
        moved.dedup();
        let moved_names: Vec<&String> = moved.iter().map(|&i| &order[i]).collect();
        let in_next: Vec<&String> = next.iter().filter(|n| moved_names.contains(n)).collect();
        prop_assert_eq!(in_next, moved_names);
    }
}
