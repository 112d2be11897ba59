//! Property tests: the validator's guarantees hold for arbitrary plans.

use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::{json, Value};

use marketlab_runner::plan::{validate_plan, Step, EVAL_DAYS, SIGNAL_DAYS};

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-500i64..5000).prop_map(|n| json!(n)),
        (-10.0f64..10.0).prop_map(|f| json!(f)),
        "[a-zA-Z0-9 ]{0,6}".prop_map(Value::String),
        (-50i64..500).prop_map(|n| Value::String(n.to_string())),
    ]
}

fn arb_list() -> impl Strategy<Value = Value> {
    prop::collection::vec(arb_scalar(), 0..15).prop_map(Value::Array)
}

fn arb_args() -> impl Strategy<Value = Value> {
    (
        arb_scalar(),
        arb_list(),
        arb_scalar(),
        arb_scalar(),
        arb_scalar(),
        arb_list(),
        arb_list(),
        arb_scalar(),
        arb_scalar(),
    )
        .prop_map(|(symbol, symbols, days, fast, slow, fv, sv, split, top_k)| {
            json!({
                "symbol": symbol,
                "symbols": symbols,
                "days": days,
                "fast": fast,
                "slow": slow,
                "fast_values": fv,
                "slow_values": sv,
                "split": split,
                "top_k": top_k,
            })
        })
}

fn arb_step() -> impl Strategy<Value = Value> {
    let tool = prop_oneof![
        Just(json!("screen")),
        Just(json!("analyze")),
        Just(json!("optimize_backtest")),
        Just(json!("backtest")),
        Just(json!("delete_db")),
        Just(json!(42)),
        Just(Value::Null),
    ];
    (tool, prop_oneof![arb_args(), arb_scalar()]).prop_map(|(tool, args)| json!({"tool": tool, "args": args}))
}

fn arb_plan() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => prop::collection::vec(arb_step(), 0..12).prop_map(|steps| json!({"steps": steps})),
        1 => arb_scalar(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn validated_plans_respect_invariants(raw in arb_plan(), max_steps in 0usize..10) {
        let out = validate_plan(&raw, max_steps);
        let steps = &out.plan.steps;

        prop_assert!(steps.len() <= 6);
        prop_assert!(steps.len() <= max_steps.max(1));

        let keys: HashSet<String> = steps.iter().map(Step::canonical_key).collect();
        prop_assert_eq!(keys.len(), steps.len());

        for step in steps {
            prop_assert!(Step::TOOLS.contains(&step.tool()));
            match step {
                Step::Screen { symbols, days } => {
                    prop_assert!(symbols.len() <= 50);
                    prop_assert!(symbols.iter().all(|s| !s.is_empty() && *s == s.to_uppercase()));
                    prop_assert!((SIGNAL_DAYS.0..=SIGNAL_DAYS.1).contains(&i64::from(*days)));
                }
                Step::Analyze { symbol, days } => {
                    prop_assert!(!symbol.is_empty());
                    prop_assert!((SIGNAL_DAYS.0..=SIGNAL_DAYS.1).contains(&i64::from(*days)));
                }
                Step::OptimizeBacktest { symbol, days, fast_values, slow_values, split, top_k } => {
                    prop_assert!(!symbol.is_empty());
                    prop_assert!((EVAL_DAYS.0..=EVAL_DAYS.1).contains(&i64::from(*days)));
                    prop_assert!(!fast_values.is_empty() && fast_values.len() <= 8);
                    prop_assert!(!slow_values.is_empty() && slow_values.len() <= 8);
                    prop_assert!(fast_values.windows(2).all(|w| w[0] < w[1]));
                    prop_assert!(slow_values.windows(2).all(|w| w[0] < w[1]));
                    prop_assert!(fast_values.iter().all(|v| (2..=200).contains(v)));
                    prop_assert!(slow_values.iter().all(|v| (5..=400).contains(v)));
                    prop_assert!((0.5..=0.9).contains(split));
                    prop_assert!((1..=10).contains(top_k));
                }
                Step::Backtest { symbol, fast, slow, days } => {
                    prop_assert!(!symbol.is_empty());
                    prop_assert!(fast < slow);
                    prop_assert!((2..=200).contains(fast));
                    prop_assert!((5..=400).contains(slow));
                    prop_assert!((EVAL_DAYS.0..=EVAL_DAYS.1).contains(&i64::from(*days)));
                }
            }
        }
    }

    #[test]
    fn validation_is_idempotent(raw in arb_plan()) {
        let once = validate_plan(&raw, 6);
        let reserialized = serde_json::to_value(&once.plan).unwrap();
        let twice = validate_plan(&reserialized, 6);
        prop_assert_eq!(&once.plan.steps, &twice.plan.steps);
        prop_assert!(twice.notes.is_empty());
    }
}
