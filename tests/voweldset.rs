//! End-to-end checks against a Finnish-style vowel epenthesis tableau with
//! four constraints and free variation in two of its four inputs.

use poot::{
    Dataset, Entailments, OrderKind, OrderSpace, Ranking, RankingEvaluator, SortBy, Statistics,
};
use std::collections::HashSet;

fn voweldset() -> Dataset {
    let mut d = Dataset::new("voweldset", &["c1", "c2", "c3", "c4"]).unwrap();
    d.add_candidate("ovea", "o-ve-a", true, &[0, 1, 1, 0]).unwrap();
    d.add_candidate("ovea", "o-vee", true, &[0, 0, 0, 1]).unwrap();
    d.add_candidate("idea", "i-de-a", true, &[0, 1, 1, 0]).unwrap();
    d.add_candidate("idea", "i-dee", false, &[1, 0, 0, 1]).unwrap();
    d.add_candidate("lasi-a", "la-si-a", true, &[0, 0, 1, 0]).unwrap();
    d.add_candidate("lasi-a", "la-sii", true, &[0, 0, 0, 1]).unwrap();
    d.add_candidate("rasia", "ra-si-a", true, &[0, 0, 1, 0]).unwrap();
    d.add_candidate("rasia", "ra-sii", false, &[1, 0, 0, 1]).unwrap();
    d
}

fn ranking(pairs: &[(u8, u8)]) -> Ranking {
    Ranking::from_pairs(4, pairs).unwrap()
}

fn expected_compatible() -> Vec<Ranking> {
    vec![
        ranking(&[(1, 2), (1, 3)]),
        ranking(&[(1, 3), (4, 2)]),
        ranking(&[(1, 2), (1, 3), (2, 3)]),
        ranking(&[(1, 2), (1, 3), (4, 2)]),
        ranking(&[(1, 2), (1, 3), (1, 4)]),
        ranking(&[(1, 2), (1, 3), (3, 2)]),
        ranking(&[(1, 2), (1, 3), (3, 2), (4, 2)]),
        ranking(&[(1, 2), (1, 3), (1, 4), (3, 2)]),
        ranking(&[(1, 2), (1, 3), (1, 4), (4, 2)]),
        ranking(&[(1, 2), (1, 3), (1, 4), (2, 3)]),
        ranking(&[(1, 2), (1, 3), (1, 4), (3, 2), (4, 2)]),
    ]
}

fn entailments_from(pairs: &[(&str, &[&str])]) -> Entailments {
    pairs
        .iter()
        .map(|&(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

#[test]
fn compatible_partial_grammars() {
    let space = OrderSpace::build(4).unwrap();
    let dset = voweldset();
    let eval = RankingEvaluator::new(&space, &dset).unwrap();

    let compatible = eval.compatible_rankings(OrderKind::Partial, None).unwrap();
    assert_eq!(compatible.len(), 11);
    let found: HashSet<Ranking> = compatible.into_iter().collect();
    let expected: HashSet<Ranking> = expected_compatible().into_iter().collect();
    assert_eq!(found, expected);
}

#[test]
fn classical_mode_finds_no_grammar() {
    // Both outputs of "ovea" are optimal, which no single total order can
    // deliver.
    let space = OrderSpace::build(4).unwrap();
    let dset = voweldset();
    let eval = RankingEvaluator::new(&space, &dset).unwrap();
    assert!(eval
        .compatible_rankings(OrderKind::Total, None)
        .unwrap()
        .is_empty());
}

#[test]
fn global_statistics() {
    let space = OrderSpace::build(4).unwrap();
    let dset = voweldset();
    let eval = RankingEvaluator::new(&space, &dset).unwrap();
    let compatible = eval.compatible_rankings(OrderKind::Partial, None).unwrap();

    let stats = eval.statistics(&compatible);
    assert_eq!(
        stats,
        Statistics {
            num_poots: 11,
            num_total_poots: 219,
            percent_poots: 11.0 / 219.0 * 100.0,
            num_cots: 0,
            num_total_cots: 24,
            percent_cots: 0.0,
        }
    );
}

#[test]
fn sorting_by_size_and_rank_volume() {
    let space = OrderSpace::build(4).unwrap();
    let dset = voweldset();
    let eval = RankingEvaluator::new(&space, &dset).unwrap();
    let mut compatible = eval.compatible_rankings(OrderKind::Partial, None).unwrap();

    space.sort_rankings(&mut compatible, SortBy::Size);
    let sizes: Vec<usize> = compatible.iter().map(|r| r.size()).collect();
    assert_eq!(sizes, vec![2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5]);
    assert_eq!(
        compatible[10],
        ranking(&[(1, 2), (1, 3), (1, 4), (3, 2), (4, 2)])
    );

    // The loosest grammar extends to the most total orders.
    space.sort_rankings(&mut compatible, SortBy::RankVolume);
    assert_eq!(compatible[10], ranking(&[(1, 2), (1, 3)]));
    assert_eq!(space.rank_volume(&compatible[10]), 8);
    assert_eq!(space.rank_volume(&ranking(&[(1, 3), (4, 2)])), 6);
}

#[test]
fn grammar_strings() {
    let dset = voweldset();
    assert_eq!(
        dset.ranking_to_string(&ranking(&[(1, 2), (1, 3)])),
        "{(c1, c2), (c1, c3)}"
    );
    // The closure pair (1, 2) is implied by (1, 3) and (3, 2) and drops
    // out of the displayed reduction.
    assert_eq!(
        dset.ranking_to_string(&ranking(&[(1, 3), (3, 2)])),
        "{(c1, c3), (c3, c2)}"
    );
}

#[test]
fn apriori_restricts_the_compatible_set() {
    let space = OrderSpace::build(4).unwrap();
    let dset = voweldset();
    let eval = RankingEvaluator::new(&space, &dset).unwrap();

    let unrestricted = eval.compatible_rankings(OrderKind::Partial, None).unwrap();
    let apriori = dset.apriori_from_pairs(&[("c1", "c2")]).unwrap();
    let restricted = eval
        .compatible_rankings(OrderKind::Partial, Some(&apriori))
        .unwrap();

    assert_eq!(restricted.len(), 10);
    let unrestricted: HashSet<Ranking> = unrestricted.into_iter().collect();
    for grammar in &restricted {
        assert!(unrestricted.contains(grammar));
        assert!(grammar.refines(&apriori));
    }
    assert!(!restricted.contains(&ranking(&[(1, 3), (4, 2)])));

    // The empty a-priori ranking restricts nothing.
    let empty = Ranking::empty(4).unwrap();
    let trivial = eval
        .compatible_rankings(OrderKind::Partial, Some(&empty))
        .unwrap();
    assert_eq!(trivial.len(), 11);
}

#[test]
fn cot_stats_for_the_loosest_grammar() {
    let space = OrderSpace::build(4).unwrap();
    let dset = voweldset();
    let eval = RankingEvaluator::new(&space, &dset).unwrap();

    let stats = eval
        .cot_stats_by_candidate(&ranking(&[(1, 2), (1, 3)]))
        .unwrap();
    let inputs: Vec<&String> = stats.keys().collect();
    assert_eq!(inputs, vec!["idea", "lasi-a", "ovea", "rasia"]);

    let expect = |input: &str| -> Vec<(&str, usize, f64)> {
        stats[input]
            .iter()
            .map(|row| (row.output.as_str(), row.num_cot, row.per_cot))
            .collect()
    };
    assert_eq!(
        expect("idea"),
        vec![("i-de-a", 8, 100.0), ("i-dee", 0, 0.0)]
    );
    assert_eq!(
        expect("lasi-a"),
        vec![("la-si-a", 5, 62.5), ("la-sii", 3, 37.5)]
    );
    assert_eq!(expect("ovea"), vec![("o-ve-a", 4, 50.0), ("o-vee", 4, 50.0)]);
    assert_eq!(
        expect("rasia"),
        vec![("ra-si-a", 8, 100.0), ("ra-sii", 0, 0.0)]
    );
}

#[test]
fn global_entailments() {
    let space = OrderSpace::build(4).unwrap();
    let dset = voweldset();
    let eval = RankingEvaluator::new(&space, &dset).unwrap();

    let expected = entailments_from(&[
        ("idea, i-de-a", &["idea, i-de-a", "rasia, ra-si-a"]),
        ("idea, i-dee", &["idea, i-dee", "ovea, o-vee"]),
        ("lasi-a, la-si-a", &["lasi-a, la-si-a", "rasia, ra-si-a"]),
        ("lasi-a, la-sii", &["lasi-a, la-sii", "ovea, o-vee"]),
        (
            "ovea, o-ve-a",
            &[
                "idea, i-de-a",
                "lasi-a, la-si-a",
                "ovea, o-ve-a",
                "rasia, ra-si-a",
            ],
        ),
        ("ovea, o-vee", &["ovea, o-vee"]),
        ("rasia, ra-si-a", &["rasia, ra-si-a"]),
        (
            "rasia, ra-sii",
            &[
                "idea, i-dee",
                "lasi-a, la-sii",
                "ovea, o-vee",
                "rasia, ra-sii",
            ],
        ),
    ]);
    assert_eq!(eval.entailments(None).unwrap(), expected);

    // Every outcome entails itself.
    for (outcome, entailed) in &expected {
        assert!(entailed.contains(outcome));
    }
}

#[test]
fn apriori_entailment_delta() {
    let space = OrderSpace::build(4).unwrap();
    let dset = voweldset();
    let eval = RankingEvaluator::new(&space, &dset).unwrap();
    let apriori = dset.apriori_from_pairs(&[("c1", "c2")]).unwrap();

    let (global, delta) = eval.compute_entailments(Some(&apriori)).unwrap();
    assert_eq!(global, eval.entailments(None).unwrap());
    assert_eq!(
        delta,
        entailments_from(&[
            ("idea, i-dee", &["lasi-a, la-sii", "rasia, ra-sii"]),
            ("lasi-a, la-si-a", &["idea, i-de-a"]),
            ("rasia, ra-si-a", &["idea, i-de-a"]),
        ])
    );

    // Under the a-priori ranking, "idea, i-de-a" and "rasia, ra-si-a" are
    // mutually entailing, which callers can spot from the bidirectional
    // edges of the restricted relation.
    let restricted = eval.entailments(Some(&apriori)).unwrap();
    assert!(restricted["idea, i-de-a"].contains(&"rasia, ra-si-a".to_string()));
    assert!(restricted["rasia, ra-si-a"].contains(&"idea, i-de-a".to_string()));

    // Without an a-priori ranking the delta is empty.
    let (_, none_delta) = eval.compute_entailments(None).unwrap();
    assert!(none_delta.is_empty());
}
