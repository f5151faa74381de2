use archevo::engines::selection::{Elite, Roulette, Selection, SelectionExt};
use archevo::FitnessRecord;
use std::collections::HashMap;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_elite_yields_best_first() {
    let records = vec![
        FitnessRecord::new(666.0, "worst"),
        FitnessRecord::new(0.7, "best"),
        FitnessRecord::new(13.0, "second"),
        FitnessRecord::new(25.0, "third"),
    ];
    let mut elite = Elite.limit(2);
    let picked: Vec<&str> = elite.select(&records).map(Result::unwrap).collect();
    assert_eq!(picked, vec!["best", "second"]);
}

#[test]
fn test_roulette_frequencies_follow_inverse_fitness() {
    init_logging();
    let weights = [0.5, 0.3, 0.15, 0.05];
    let records: Vec<FitnessRecord<usize>> = weights
        .iter()
        .enumerate()
        .map(|(i, w)| FitnessRecord::new(1.0 / w, i))
        .collect();

    let draws = 100_000;
    let mut roulette = Roulette::new(2024);
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for picked in roulette.select(&records).take(draws) {
        *counts.entry(picked.unwrap()).or_insert(0) += 1;
    }

    for (i, expected) in weights.iter().enumerate() {
        let observed = counts.get(&i).copied().unwrap_or(0) as f64 / draws as f64;
        assert!(
            (observed - expected).abs() < 1e-2,
            "candidate {}: observed {:.4}, expected {:.4}",
            i,
            observed,
            expected
        );
    }
}

#[test]
fn test_fixed_age_drops_survivor_on_fourth_call() {
    init_logging();
    let mut selection = Elite.fixed_age(3, |c: &String| c.clone());

    for round in 1..=4 {
        // the survivor always ranks first, a newcomer joins every round
        let records = vec![
            FitnessRecord::new(0.1, "survivor".to_string()),
            FitnessRecord::new(0.5, format!("newcomer_{}", round)),
        ];
        let picked: Vec<String> = selection.select(&records).map(Result::unwrap).collect();
        if round < 4 {
            assert_eq!(picked[0], "survivor", "round {}", round);
        } else {
            assert_eq!(picked, vec!["newcomer_4".to_string()]);
        }
    }
}

#[test]
fn test_distinct_keeps_first_occurrences() {
    let sequence = "a b c a c d e b f";
    let records: Vec<FitnessRecord<&str>> = sequence
        .split(' ')
        .enumerate()
        .map(|(i, c)| FitnessRecord::new(i as f64, c))
        .collect();

    let mut distinct = Elite.distinct(|c: &&str| c.to_string());
    let picked: Vec<&str> = distinct.select(&records).map(Result::unwrap).collect();
    assert_eq!(picked.join(" "), "a b c d e f");
}
