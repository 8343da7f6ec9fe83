use dp_relational::{cdp_eps, cdp_rho, PrivacyParams, RelationalSynthConfig};

fn main() {
    let delta = 1e-5;
    for eps in [0.5, 1.0, 2.0, 4.0] {
        let rho = cdp_rho(eps, delta).expect("valid budget");
        let back = cdp_eps(rho, delta).expect("valid rho");
        println!("eps={eps:<4} rho={rho:.6} eps(rho)={back:.4}");
    }

    let cfg = RelationalSynthConfig::default().with_rounds(20);
    let params = PrivacyParams::derive(&cfg.budget(4, 5_000)).expect("valid budget");
    println!(
        "T={} epsilon0={:.5} exp_mech_factor={:.3} gm_stddev={:.3e}",
        cfg.rounds, params.epsilon0, params.exp_mech_factor, params.gm_stddev
    );
}
