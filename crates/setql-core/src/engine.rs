//! Statement driver.
//!
//! Runs each statement through type checking and evaluation, then commits
//! its writes. A failed statement leaves no writes behind.

use setql_model::{Expr, MultiSetVal, ResultTp};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EvalError;
use crate::eval::{Env, Evaluator};
use crate::storage::Database;
use crate::trace::EvalTrace;
use crate::typing::check_expr;

/// Outcome of running several statements in order.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Results of the statements that committed, in order.
    pub results: Vec<MultiSetVal>,
    /// The failing statement's position and error, if any.
    pub error: Option<(usize, EvalError)>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Owns a database and runs statements against it.
pub struct Engine<D: Database> {
    db: D,
    config: EngineConfig,
    last_trace: Option<EvalTrace>,
}

impl<D: Database> Engine<D> {
    pub fn new(db: D, config: EngineConfig) -> Self {
        Self {
            db,
            config,
            last_trace: None,
        }
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Type check a statement without running it.
    pub fn check(&self, expr: &Expr) -> Result<(ResultTp, Expr), EvalError> {
        check_expr(self.db.schema(), self.config.ambiguity, expr)
    }

    /// Run one statement and commit its writes.
    ///
    /// On error, uncommitted writes are discarded.
    pub fn execute(&mut self, expr: &Expr) -> Result<MultiSetVal, EvalError> {
        debug!(kind = expr.kind_name(), "evaluating statement");
        let result = self.run(expr).and_then(|vals| {
            self.db.commit_dml()?;
            Ok(vals)
        });
        match result {
            Ok(vals) => {
                debug!(results = vals.len(), "statement finished");
                Ok(vals)
            }
            Err(e) => {
                self.db.abort_dml();
                debug!(error = %e, "statement failed");
                Err(e)
            }
        }
    }

    fn run(&mut self, expr: &Expr) -> Result<MultiSetVal, EvalError> {
        self.last_trace = None;
        let checked;
        let expr = if self.config.type_check {
            checked = self.check(expr)?.1;
            &checked
        } else {
            expr
        };
        let mut trace = self.config.trace.then(EvalTrace::new);
        let result = {
            let mut evaluator = Evaluator::new(&mut self.db).ambiguity(self.config.ambiguity);
            if let Some(trace) = trace.as_mut() {
                evaluator = evaluator.with_trace(trace);
            }
            evaluator.eval(&Env::new(), expr)
        };
        self.last_trace = trace;
        result
    }

    /// Run statements in order, stopping at the first failure.
    pub fn execute_all(&mut self, stmts: &[Expr]) -> BatchOutcome {
        let mut results = Vec::with_capacity(stmts.len());
        for (i, stmt) in stmts.iter().enumerate() {
            match self.execute(stmt) {
                Ok(vals) => results.push(vals),
                Err(e) => {
                    return BatchOutcome {
                        results,
                        error: Some((i, e)),
                    }
                }
            }
        }
        BatchOutcome {
            results,
            error: None,
        }
    }

    /// Trace of the most recent statement, when tracing is enabled.
    pub fn last_trace(&self) -> Option<&EvalTrace> {
        self.last_trace.as_ref()
    }
}
