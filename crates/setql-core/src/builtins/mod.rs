//! The `std` module: builtin functions and operators.

mod impls;

use setql_model::{
    CMMode, Expr, QualifiedName, ResultTp, Tp, CARD_ANY, CARD_AT_MOST_ONE, CARD_ONE,
};

use crate::schema::{BuiltinImpl, FuncDef, FuncParam, FuncSignature};

const ASSERT_SINGLE_MESSAGE: &str =
    "assert_single violation: more than one element returned by an expression";
const ASSERT_EXISTS_MESSAGE: &str = "assert_exists violation: expression returned an empty set";

fn def(params: Vec<FuncParam>, ret: Tp, mode: CMMode, implementation: BuiltinImpl) -> FuncDef {
    FuncDef::builtin(
        FuncSignature::new(params, ResultTp::new(ret, mode)),
        implementation,
    )
}

fn binary(l: Tp, r: Tp, ret: Tp, implementation: BuiltinImpl) -> FuncDef {
    def(
        vec![FuncParam::singleton("l", l), FuncParam::singleton("r", r)],
        ret,
        CARD_ONE,
        implementation,
    )
}

fn t0() -> Tp {
    Tp::SomeTp(0)
}

/// Every builtin overload, in declaration order.
pub fn std_functions() -> Vec<(QualifiedName, FuncDef)> {
    let bool_set = || vec![FuncParam::set_of("vals", Tp::bool())];
    let fns = vec![
        ("all", def(bool_set(), Tp::bool(), CARD_ONE, impls::all)),
        ("any", def(bool_set(), Tp::bool(), CARD_ONE, impls::any)),
        (
            "array_agg",
            def(
                vec![FuncParam::set_of("s", t0())],
                Tp::array(t0()),
                CARD_ONE,
                impls::array_agg,
            ),
        ),
        (
            "array_unpack",
            def(
                vec![FuncParam::singleton("array", Tp::array(t0()))],
                t0(),
                CARD_ANY,
                impls::array_unpack,
            ),
        ),
        (
            "count",
            def(
                vec![FuncParam::set_of("s", Tp::Any)],
                Tp::int(),
                CARD_ONE,
                impls::count,
            ),
        ),
        (
            "enumerate",
            def(
                vec![FuncParam::set_of("s", t0())],
                Tp::UnnamedTuple(vec![Tp::int(), t0()]),
                CARD_ANY,
                impls::enumerate,
            ),
        ),
        (
            "len",
            def(
                vec![FuncParam::singleton("str", Tp::str())],
                Tp::int(),
                CARD_ONE,
                impls::len,
            ),
        ),
        (
            "len",
            def(
                vec![FuncParam::singleton("array", Tp::array(Tp::Any))],
                Tp::int(),
                CARD_ONE,
                impls::len,
            ),
        ),
        (
            "sum",
            def(
                vec![FuncParam::set_of("s", Tp::int())],
                Tp::int(),
                CARD_ONE,
                impls::sum_int,
            ),
        ),
        (
            "sum",
            def(
                vec![FuncParam::set_of("s", Tp::float())],
                Tp::float(),
                CARD_ONE,
                impls::sum_float,
            ),
        ),
        (
            "assert_single",
            def(
                vec![
                    FuncParam::set_of("input", t0()),
                    FuncParam::singleton("message", Tp::str()),
                ],
                t0(),
                CARD_AT_MOST_ONE,
                impls::assert_single,
            )
            .with_default("message", Expr::lit(ASSERT_SINGLE_MESSAGE)),
        ),
        (
            "assert_exists",
            def(
                vec![
                    FuncParam::set_of("input", t0()),
                    FuncParam::singleton("message", Tp::str()),
                ],
                t0(),
                CARD_ANY,
                impls::assert_exists,
            )
            .with_default("message", Expr::lit(ASSERT_EXISTS_MESSAGE)),
        ),
        (
            "datetime_current",
            def(vec![], Tp::datetime(), CARD_ONE, impls::datetime_current),
        ),
        (
            "str_split",
            def(
                vec![
                    FuncParam::singleton("s", Tp::str()),
                    FuncParam::singleton("delimiter", Tp::str()),
                ],
                Tp::array(Tp::str()),
                CARD_ONE,
                impls::str_split,
            ),
        ),
        (
            "str_upper",
            def(
                vec![FuncParam::singleton("s", Tp::str())],
                Tp::str(),
                CARD_ONE,
                impls::str_upper,
            ),
        ),
        (
            "str_lower",
            def(
                vec![FuncParam::singleton("s", Tp::str())],
                Tp::str(),
                CARD_ONE,
                impls::str_lower,
            ),
        ),
        (
            "to_json",
            def(
                vec![FuncParam::singleton("s", Tp::str())],
                Tp::json(),
                CARD_ONE,
                impls::to_json,
            ),
        ),
        ("random", def(vec![], Tp::float(), CARD_ONE, impls::random)),
        (
            "exists",
            def(
                vec![FuncParam::set_of("s", Tp::Any)],
                Tp::bool(),
                CARD_ONE,
                impls::exists,
            ),
        ),
        (
            "distinct",
            def(
                vec![FuncParam::set_of("s", t0())],
                t0(),
                CARD_ANY,
                impls::distinct,
            ),
        ),
        (
            "not",
            def(
                vec![FuncParam::singleton("v", Tp::bool())],
                Tp::bool(),
                CARD_ONE,
                impls::not,
            ),
        ),
        ("and", binary(Tp::bool(), Tp::bool(), Tp::bool(), impls::and)),
        ("or", binary(Tp::bool(), Tp::bool(), Tp::bool(), impls::or)),
        ("=", binary(t0(), t0(), Tp::bool(), impls::eq)),
        ("!=", binary(t0(), t0(), Tp::bool(), impls::ne)),
        ("<", binary(t0(), t0(), Tp::bool(), impls::lt)),
        (">", binary(t0(), t0(), Tp::bool(), impls::gt)),
        ("<=", binary(t0(), t0(), Tp::bool(), impls::le)),
        (">=", binary(t0(), t0(), Tp::bool(), impls::ge)),
        ("+", binary(Tp::int(), Tp::int(), Tp::int(), impls::add_int)),
        ("+", binary(Tp::float(), Tp::float(), Tp::float(), impls::add_float)),
        ("-", binary(Tp::int(), Tp::int(), Tp::int(), impls::sub_int)),
        ("-", binary(Tp::float(), Tp::float(), Tp::float(), impls::sub_float)),
        ("*", binary(Tp::int(), Tp::int(), Tp::int(), impls::mul_int)),
        ("*", binary(Tp::float(), Tp::float(), Tp::float(), impls::mul_float)),
        ("++", binary(Tp::str(), Tp::str(), Tp::str(), impls::concat)),
        (
            "??",
            def(
                vec![
                    FuncParam::optional("l", t0()),
                    FuncParam::set_of("r", t0()),
                ],
                t0(),
                CARD_ANY,
                impls::coalesce,
            ),
        ),
        (
            "IN",
            def(
                vec![
                    FuncParam::singleton("e", t0()),
                    FuncParam::set_of("s", t0()),
                ],
                Tp::bool(),
                CARD_ONE,
                impls::member_of,
            ),
        ),
    ];
    fns.into_iter()
        .map(|(name, def)| (QualifiedName::std(name), def))
        .collect()
}
