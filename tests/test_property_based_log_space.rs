//! Property-based tests for log-space accumulation
//! Tests invariants of log-sum-exp and of hard-assignment training across random inputs

use nb_kmer_class::{log_add, Assignment, ClassModel, KmerCountGenome};
use proptest::prelude::*;

type Model = ClassModel<u16, KmerCountGenome<u16>>;

fn relative_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn loaded_model(kmer_size: usize) -> Model {
    let mut model = Model::new("prop", kmer_size, "/nonexistent/prop.nb").unwrap();
    model.load().unwrap();
    model
}

fn genomes_strategy() -> impl Strategy<Value = Vec<Vec<(u16, u64)>>> {
    prop::collection::vec(prop::collection::vec((0u16..64, 1u64..1000), 1..20), 1..8)
}

proptest! {
    #[test]
    fn property_log_add_matches_direct_sum(exponents in prop::collection::vec(-30.0f64..30.0, 1..20)) {
        let direct: f64 = exponents.iter().map(|e| e.exp()).sum::<f64>().ln();
        let result = log_add(&exponents).unwrap();
        prop_assert!(relative_close(result, direct));
    }

    #[test]
    fn property_log_add_single_term_is_identity(e in -1e6f64..1e6) {
        prop_assert_eq!(log_add(&[e]), Some(e));
    }

    #[test]
    fn property_log_add_permutation_invariant(exponents in prop::collection::vec(-50.0f64..50.0, 1..20)) {
        let mut reversed = exponents.clone();
        reversed.reverse();
        let mut sorted = exponents.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let forward = log_add(&exponents).unwrap();
        prop_assert!(relative_close(forward, log_add(&reversed).unwrap()));
        prop_assert!(relative_close(forward, log_add(&sorted).unwrap()));
    }

    #[test]
    fn property_log_add_ignores_negative_infinity(exponents in prop::collection::vec(-30.0f64..30.0, 1..10)) {
        let mut padded = exponents.clone();
        padded.push(f64::NEG_INFINITY);
        padded.insert(0, f64::NEG_INFINITY);

        let result = log_add(&padded).unwrap();
        prop_assert!(!result.is_nan());
        prop_assert!(relative_close(result, log_add(&exponents).unwrap()));
    }

    #[test]
    fn property_hard_training_tracks_linear_totals(genomes in genomes_strategy(), kmer_size in 1usize..6) {
        let mut model = loaded_model(kmer_size);
        let mut expected_total = 1u64 << (2 * kmer_size);
        let mut expected_features = std::collections::HashMap::new();

        for (i, counts) in genomes.iter().enumerate() {
            for &(feature, count) in counts {
                *expected_features.entry(feature).or_insert(0u64) += count;
                expected_total += count;
            }
            let genome = KmerCountGenome::from_counts(format!("g{i}"), counts.iter().copied());
            model.add_genome(genome, Assignment::Hard).unwrap();
            // Interleave reads so consolidation happens mid-training
            let _ = model.feature_total_log().unwrap();
        }

        prop_assert!(relative_close(model.genome_count_log().unwrap(), (genomes.len() as f64).ln()));
        prop_assert!(relative_close(model.feature_total_log().unwrap(), (expected_total as f64).ln()));
        for (feature, count) in &expected_features {
            prop_assert!(relative_close(model.feature_count_log(feature).unwrap(), (*count as f64).ln()));
        }
        prop_assert_eq!(model.feature_count().unwrap(), expected_features.len());
    }

    #[test]
    fn property_serialize_round_trip_is_bit_exact(genomes in genomes_strategy()) {
        let mut model = loaded_model(3);
        for (i, counts) in genomes.iter().enumerate() {
            model.add_genome(
                KmerCountGenome::from_counts(format!("g{i}"), counts.iter().copied()),
                Assignment::Hard,
            ).unwrap();
        }
        let text = model.to_text().unwrap();

        let mut restored = Model::new("prop", 3, "/nonexistent/restored.nb").unwrap();
        restored.from_text(&text).unwrap();

        prop_assert_eq!(model.genome_count_log().unwrap().to_bits(), restored.genome_count_log().unwrap().to_bits());
        prop_assert_eq!(model.feature_total_log().unwrap().to_bits(), restored.feature_total_log().unwrap().to_bits());
        for feature in 0u16..64 {
            prop_assert_eq!(model.feature_exists(&feature).unwrap(), restored.feature_exists(&feature).unwrap());
            prop_assert_eq!(
                model.feature_count_log(&feature).unwrap().to_bits(),
                restored.feature_count_log(&feature).unwrap().to_bits()
            );
        }
    }

    #[test]
    fn property_queue_equals_direct_training(genomes in genomes_strategy()) {
        let mut direct = loaded_model(2);
        let mut queued = loaded_model(2);

        for (i, counts) in genomes.iter().enumerate() {
            let genome = KmerCountGenome::from_counts(format!("g{i}"), counts.iter().copied());
            direct.add_genome(genome.clone(), Assignment::Hard).unwrap();
            queued.queue_genome(genome);
        }
        prop_assert_eq!(queued.add_genomes_in_queue().unwrap(), genomes.len());

        prop_assert_eq!(direct.genome_count_log().unwrap().to_bits(), queued.genome_count_log().unwrap().to_bits());
        prop_assert_eq!(direct.feature_total_log().unwrap().to_bits(), queued.feature_total_log().unwrap().to_bits());
        for feature in 0u16..64 {
            prop_assert_eq!(
                direct.feature_count_log(&feature).unwrap().to_bits(),
                queued.feature_count_log(&feature).unwrap().to_bits()
            );
        }
    }
}
