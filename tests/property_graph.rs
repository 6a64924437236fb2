use std::collections::BTreeSet;

use proptest::prelude::*;
use sparks::dag::{Spark, SparkGraph, SparkSet, validate};
use sparks::errors::ValidationError;
use sparks::types::ExecutionPolicy;
use sparks_test_utils::builders::spark;

fn policy_strategy() -> impl Strategy<Value = ExecutionPolicy> {
    prop_oneof![
        Just(ExecutionPolicy::Tracked),
        Just(ExecutionPolicy::Detached),
    ]
}

// Acyclic by construction: spark N may only need sparks 0..N.
fn dag_strategy(max_sparks: usize) -> impl Strategy<Value = Vec<(ExecutionPolicy, Vec<usize>)>> {
    (1..=max_sparks).prop_flat_map(|count| {
        proptest::collection::vec(
            (
                policy_strategy(),
                proptest::collection::vec(any::<usize>(), 0..count),
            ),
            count,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (policy, potential))| {
                    let needs: BTreeSet<usize> = if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    };
                    (policy, needs.into_iter().collect())
                })
                .collect()
        })
    })
}

fn build(shape: &[(ExecutionPolicy, Vec<usize>)]) -> Vec<Spark> {
    shape
        .iter()
        .enumerate()
        .map(|(i, (policy, needs))| {
            let needs: Vec<String> = needs.iter().map(|d| format!("s{d}")).collect();
            let needs: Vec<&str> = needs.iter().map(String::as_str).collect();
            spark(&format!("s{i}"), *policy, &needs)
        })
        .collect()
}

proptest! {
    #[test]
    fn generated_dags_always_validate(shape in dag_strategy(12)) {
        let sparks = build(&shape);
        prop_assert_eq!(validate(&sparks), Ok(()));

        let set = SparkSet::new(sparks).unwrap();
        let graph = SparkGraph::from_set(&set);
        let layers = graph.layers().unwrap();

        let placed: usize = layers.iter().map(Vec::len).sum();
        prop_assert_eq!(placed, set.len());

        // Every need sits in a strictly earlier layer.
        let layer_of = |key: &str| layers.iter().position(|l| l.iter().any(|k| k.as_str() == key));
        for s in set.sparks() {
            let own = layer_of(s.key().as_str()).unwrap();
            for need in s.needs() {
                prop_assert!(layer_of(need.as_str()).unwrap() < own);
            }
        }
    }

    #[test]
    fn back_edge_always_yields_a_closed_cycle(
        shape in dag_strategy(10),
        pick in any::<(usize, usize)>(),
    ) {
        prop_assume!(shape.len() >= 2);

        // Add an edge from a low spark to a higher one that (transitively)
        // needs it, closing a cycle.
        let mut shape = shape;
        let hi = 1 + pick.0 % (shape.len() - 1);
        let lo = pick.1 % hi;
        shape[hi].1.push(lo);
        shape[lo].1.push(hi);

        let err = validate(&build(&shape)).unwrap_err();
        let path = match &err {
            ValidationError::CycleDetected(path) => path.clone(),
            other => return Err(TestCaseError::fail(format!("expected cycle, got {other:?}"))),
        };
        prop_assert!(path.len() >= 2);
        prop_assert_eq!(path.first(), path.last());

        // Each step in the path is a declared need.
        let sparks = build(&shape);
        for pair in path.windows(2) {
            let from = sparks.iter().find(|s| s.key() == &pair[0]).unwrap();
            prop_assert!(from.needs().contains(&pair[1]));
        }
    }
}
