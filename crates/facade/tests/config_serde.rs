use dp_relational::{AnswerScope, AssignmentMode, Device, RelationalSynthConfig};

#[test]
fn partial_document_fills_defaults() {
    let cfg: RelationalSynthConfig =
        serde_json::from_str(r#"{ "epsilon": 2.5, "rounds": 10 }"#).expect("valid json");
    assert_eq!(cfg.epsilon, 2.5);
    assert_eq!(cfg.rounds, 10);
    assert_eq!(cfg.delta, 1e-5);
    assert_eq!(cfg.k_new_queries, 3);
    assert_eq!(cfg.mode, AssignmentMode::Standard);
    assert_eq!(cfg.device, Device::Cpu);
    assert!(cfg.validate().is_ok());
}

#[test]
fn one_to_many_mode_defaults_its_ratio() {
    let cfg: RelationalSynthConfig = serde_json::from_str(
        r#"{ "mode": { "kind": "one_to_many" }, "answer_scope": "full", "seed": 4 }"#,
    )
    .expect("valid json");
    assert_eq!(cfg.mode, AssignmentMode::one_to_many());
    assert_eq!(cfg.answer_scope, AnswerScope::Full);
    assert_eq!(cfg.seed, Some(4));
}

#[test]
fn serialized_config_reads_back() {
    let cfg = RelationalSynthConfig::default()
        .with_mode(AssignmentMode::OneToMany {
            expansion_ratio: 4.0,
        })
        .with_queries_to_reuse(Some(8))
        .with_seed(1);
    let text = serde_json::to_string(&cfg).expect("serializable");
    let back: RelationalSynthConfig = serde_json::from_str(&text).expect("valid json");
    assert_eq!(back, cfg);
}
