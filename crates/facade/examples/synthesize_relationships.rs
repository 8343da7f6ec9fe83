use dp_relational::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const N1: usize = 200;
const N2: usize = 150;

// Two categorical attributes per table; workloads are the two-way marginals
// between one attribute of each table.
fn build_manager(rng: &mut ChaCha8Rng) -> InMemoryQueryManager {
    let cards1 = [3usize, 4];
    let cards2 = [2usize, 5];
    let attrs1: Vec<Vec<usize>> = cards1
        .iter()
        .map(|&c| (0..N1).map(|_| rng.gen_range(0..c)).collect())
        .collect();
    let attrs2: Vec<Vec<usize>> = cards2
        .iter()
        .map(|&c| (0..N2).map(|_| rng.gen_range(0..c)).collect())
        .collect();

    // Original relationships favour rows sharing category 0 of the first attributes.
    let mut pairs = Vec::new();
    for i in 0..N1 {
        for _ in 0..rng.gen_range(1..=3) {
            let j = rng.gen_range(0..N2);
            if attrs1[0][i] == 0 || attrs2[0][j] == 0 || rng.gen_bool(0.2) {
                pairs.push((i, j));
            }
        }
    }
    pairs.sort_unstable();
    pairs.dedup();

    let mut workloads = Vec::new();
    for (a, &c1) in cards1.iter().enumerate() {
        for (b, &c2) in cards2.iter().enumerate() {
            let offsets = WorkloadOffsets::from_categories(&attrs1[a], &attrs2[b], c2);
            let w = Workload::from_relationships(
                format!("t1.a{a} x t2.a{b}"),
                c1 * c2,
                &offsets,
                &pairs,
                offsets.clone(),
            )
            .expect("offsets cover every row");
            workloads.push(w);
        }
    }

    InMemoryQueryManager::new(
        RelationalShape {
            n_syn1: N1,
            n_syn2: N2,
            n_relationship_synth: pairs.len(),
            n_relationship_orig: pairs.len(),
            dmax: 3,
            one_to_many: false,
        },
        workloads,
    )
    .expect("consistent shapes")
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("dp_relational=info")
        .init();

    let mut data_rng = ChaCha8Rng::seed_from_u64(7);
    let qm = build_manager(&mut data_rng);

    let cfg = RelationalSynthConfig::default()
        .with_epsilon(4.0)
        .with_rounds(10)
        .with_k_new_queries(1)
        .with_k_choose_from(4)
        .with_subtable_size(5_000)
        .with_slices_per_iter(2)
        .with_seed(42);

    let mut synth = RelationalSynthesizer::from_seed(cfg).expect("valid config");
    let b = synth
        .run(&qm, |qm, b, t| {
            let eval = evaluate_relationships(qm, b).expect("matching shape");
            println!("round {t:>2}: mean L1 error {:.4}", eval.mean_error);
        })
        .expect("synthesis succeeds");

    println!(
        "selected workloads: {:?}",
        synth
            .selected_workloads()
            .iter()
            .map(|&w| qm.workload_name(w).to_string())
            .collect::<Vec<_>>()
    );
    println!("first relationships: {:?}", b.pairs().take(5).collect::<Vec<_>>());
}
