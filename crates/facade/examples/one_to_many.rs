use dp_relational::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("dp_relational=debug")
        .init();

    let (n1, n2) = (120, 40);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let codes1: Vec<usize> = (0..n1).map(|_| rng.gen_range(0..3)).collect();
    let codes2: Vec<usize> = (0..n2).map(|_| rng.gen_range(0..4)).collect();
    // Each table-1 row picks a partner whose category matches its own when possible.
    let pairs: Vec<(usize, usize)> = (0..n1)
        .map(|i| {
            let matching: Vec<usize> = (0..n2).filter(|&j| codes2[j] == codes1[i]).collect();
            if matching.is_empty() {
                (i, rng.gen_range(0..n2))
            } else {
                (i, matching[rng.gen_range(0..matching.len())])
            }
        })
        .collect();

    let offsets = WorkloadOffsets::from_categories(&codes1, &codes2, 4);
    let workload = Workload::from_relationships("c1 x c2", 12, &offsets, &pairs, offsets.clone())
        .expect("offsets cover every row");
    let qm = InMemoryQueryManager::new(
        RelationalShape {
            n_syn1: n1,
            n_syn2: n2,
            n_relationship_synth: n1,
            n_relationship_orig: n1,
            dmax: 1,
            one_to_many: true,
        },
        vec![workload],
    )
    .expect("consistent shapes");

    let cfg = RelationalSynthConfig::default()
        .with_mode(AssignmentMode::one_to_many())
        .with_epsilon(2.0)
        .with_rounds(5)
        .with_subtable_size(400);
    let b = learn_relationship_vector(&qm, &cfg, &mut rng, |qm, b, t| {
        let eval = evaluate_relationships(qm, b).expect("matching shape");
        println!("round {t}: L1 error {:.4}", eval.mean_error);
    })
    .expect("synthesis succeeds");

    let unmatched = (0..n1).filter(|&i| b.partners(i).len() != 1).count();
    println!("rows without exactly one partner: {unmatched}");
}
