//! Property tests for cardinality inference and multiset evaluation.

use proptest::prelude::*;
use setql_core::model::{
    cartesian_product, conditional_dedup, CMMode, Cardinal, Expr, MultiSetVal, ObjectId,
    QualifiedName, ResultTp, Tp, Val, CARD_ONE,
};
use setql_core::resolver::call_mode;
use setql_core::{DBSchema, Engine, EngineConfig, FuncParam, FuncSignature, MemoryDatabase};

// ============== Generators ==============

fn arb_cardinal() -> impl Strategy<Value = Cardinal> {
    prop_oneof![Just(Cardinal::Zero), Just(Cardinal::One), Just(Cardinal::Inf)]
}

fn arb_mode() -> impl Strategy<Value = CMMode> {
    (arb_cardinal(), arb_cardinal()).prop_map(|(a, b)| CMMode::new(a, b))
}

fn arb_scalar() -> impl Strategy<Value = Val> {
    prop_oneof![
        any::<bool>().prop_map(Val::bool),
        (-1000i64..1000).prop_map(Val::int),
        "[a-z]{0,6}".prop_map(Val::str),
    ]
}

fn arb_slots() -> impl Strategy<Value = Vec<Vec<i64>>> {
    prop::collection::vec(prop::collection::vec(-50i64..50, 0..4), 0..4)
}

fn arb_ref_picks() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..5, 0..12)
}

fn singleton_sig(arity: usize) -> FuncSignature {
    FuncSignature::new(
        (0..arity)
            .map(|i| FuncParam::singleton(format!("p{}", i), Tp::Any))
            .collect(),
        ResultTp::new(Tp::Any, CARD_ONE),
    )
}

fn engine() -> Engine<MemoryDatabase> {
    Engine::new(MemoryDatabase::new(DBSchema::with_std()), EngineConfig::default())
}

// ============== Properties ==============

proptest! {
    #[test]
    fn prop_call_mode_is_product_of_singleton_args(a in arb_mode(), b in arb_mode()) {
        let f = QualifiedName::from("default::f");
        prop_assert_eq!(call_mode(&f, &singleton_sig(2), &[a, b]), a * b);
    }

    #[test]
    fn prop_set_of_arguments_do_not_multiply(a in arb_mode(), b in arb_mode()) {
        let f = QualifiedName::from("default::f");
        let sig = FuncSignature::new(
            vec![FuncParam::set_of("s", Tp::Any), FuncParam::singleton("x", Tp::Any)],
            ResultTp::new(Tp::Any, CARD_ONE),
        );
        prop_assert_eq!(call_mode(&f, &sig, &[a, b]), b);
    }

    #[test]
    fn prop_mode_admits_its_own_bounds(m in arb_mode()) {
        prop_assert!(m.lower <= m.upper);
        prop_assert!(m.widen(CARD_ONE).admits(1));
    }

    #[test]
    fn prop_cartesian_size_is_product(slots in arb_slots()) {
        let vals: Vec<Vec<Val>> = slots
            .iter()
            .map(|s| s.iter().copied().map(Val::int).collect())
            .collect();
        let expected: usize = slots.iter().map(Vec::len).product();
        let rows = cartesian_product(&vals);
        prop_assert_eq!(rows.len(), expected);
        prop_assert!(rows.iter().all(|row| row.len() == slots.len()));
    }

    #[test]
    fn prop_array_construction_enumerates_every_combination(slots in arb_slots()) {
        prop_assume!(!slots.is_empty());
        let expr = Expr::Array(
            slots
                .iter()
                .map(|s| Expr::MultiSet(s.iter().map(|i| Expr::lit(*i)).collect()))
                .collect(),
        );
        let result = engine().execute(&expr).unwrap();
        let expected: usize = slots.iter().map(Vec::len).product();
        prop_assert_eq!(result.len(), expected);
    }

    #[test]
    fn prop_pure_queries_are_idempotent(items in prop::collection::vec(-100i64..100, 0..8)) {
        let mut engine = engine();
        let expr = Expr::for_each(
            Expr::MultiSet(items.iter().map(|i| Expr::lit(*i)).collect()),
            "x",
            Expr::call("*", vec![Expr::var("x"), Expr::lit(2i64)]),
        );
        let first = engine.execute(&expr).unwrap();
        let second = engine.execute(&expr).unwrap();
        prop_assert_eq!(first.len(), items.len());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_dedup_keeps_first_occurrence_of_each_reference(picks in arb_ref_picks()) {
        let ids: Vec<ObjectId> = (0..5).map(|_| ObjectId::fresh()).collect();
        let refs: Vec<Val> = picks.iter().map(|&i| Val::bare_ref(ids[i])).collect();

        let mut expected = Vec::new();
        for &i in &picks {
            if !expected.contains(&ids[i]) {
                expected.push(ids[i]);
            }
        }
        let deduped: Vec<ObjectId> = conditional_dedup(refs)
            .iter()
            .filter_map(Val::ref_id)
            .collect();
        prop_assert_eq!(deduped, expected);
    }

    #[test]
    fn prop_dedup_leaves_non_references_alone(vals in prop::collection::vec(arb_scalar(), 0..10)) {
        let mut mixed = vals.clone();
        mixed.push(Val::bare_ref(ObjectId::fresh()));
        let len = mixed.len();
        prop_assert_eq!(conditional_dedup(mixed).len(), len);
        let m = MultiSetVal::ConditionalDedup(vals.clone());
        prop_assert_eq!(m.vals().len(), vals.len());
    }
}
