//! Evaluation trace recording.
//!
//! When a trace sink is attached, the evaluator records one node per
//! evaluated sub-expression, nested the way the calls were nested.

use std::fmt;

use setql_model::{multiset_to_json, Expr, MultiSetVal};

/// One evaluated sub-expression.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceNode {
    pub expr: Expr,
    /// `None` when evaluation of this node failed.
    pub result: Option<MultiSetVal>,
    pub children: Vec<TraceNode>,
}

/// Tree of evaluated sub-expressions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalTrace {
    roots: Vec<TraceNode>,
    /// Child indices from the roots down to the node being evaluated.
    path: Vec<usize>,
}

impl EvalTrace {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_children(&mut self) -> &mut Vec<TraceNode> {
        let mut children = &mut self.roots;
        for &i in &self.path {
            children = &mut children[i].children;
        }
        children
    }

    /// Start recording `expr` as a child of the node being evaluated.
    pub fn enter(&mut self, expr: &Expr) {
        let children = self.open_children();
        children.push(TraceNode {
            expr: expr.clone(),
            result: None,
            children: Vec::new(),
        });
        let idx = children.len() - 1;
        self.path.push(idx);
    }

    /// Finish the node opened by the matching [`enter`](Self::enter).
    pub fn exit(&mut self, result: Option<&MultiSetVal>) {
        let Some(idx) = self.path.pop() else {
            return;
        };
        let node = &mut self.open_children()[idx];
        node.result = result.cloned();
    }

    pub fn roots(&self) -> &[TraceNode] {
        &self.roots
    }

    /// Total number of recorded nodes.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[TraceNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        count(&self.roots)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn render(f: &mut fmt::Formatter<'_>, node: &TraceNode, depth: usize) -> fmt::Result {
    write!(f, "{:indent$}{}", "", node.expr.kind_name(), indent = depth * 2)?;
    match &node.result {
        Some(result) => writeln!(f, " => {}", multiset_to_json(result))?,
        None => writeln!(f, " => <error>")?,
    }
    for child in &node.children {
        render(f, child, depth + 1)?;
    }
    Ok(())
}

impl fmt::Display for EvalTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for root in &self.roots {
            render(f, root, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use setql_model::Val;

    #[test]
    fn test_nesting_mirrors_calls() {
        let outer = Expr::union(Expr::lit(1i64), Expr::lit(2i64));
        let mut trace = EvalTrace::new();
        trace.enter(&outer);
        trace.enter(&Expr::lit(1i64));
        trace.exit(Some(&MultiSetVal::singleton(Val::int(1))));
        trace.enter(&Expr::lit(2i64));
        trace.exit(None);
        trace.exit(Some(&MultiSetVal::from(vec![Val::int(1), Val::int(2)])));

        assert_eq!(trace.roots().len(), 1);
        assert_eq!(trace.node_count(), 3);
        let root = &trace.roots()[0];
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[1].result, None);
        assert_eq!(
            trace.to_string(),
            "Union => [1,2]\n  ScalarLit => [1]\n  ScalarLit => <error>\n"
        );
    }

    #[test]
    fn test_unbalanced_exit_is_ignored() {
        let mut trace = EvalTrace::new();
        trace.exit(None);
        assert!(trace.is_empty());
    }
}
