//! Static typing: subtype lattice, cast table and type synthesis.

pub mod cast;
pub mod check;
pub mod subtype;

pub use check::{check_expr, synthesize, TcCtx};
pub use subtype::{
    collect_is_subtype_with_instantiation, instantiate, is_nominal_subtype, is_subtype,
    is_subtype_with_instantiation, refine_link_props, Candidates, Instantiation,
};
