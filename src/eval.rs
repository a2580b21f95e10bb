//! The tree-walking reference evaluator.
//!
//! Walks the expression tree directly instead of going through the IR and
//! the register VM. Used to cross-check the VM (same programs, same stdout)
//! and as a baseline for interpreting straight out of the parser. Unlike the
//! IR generator, a call's arity is checked here at call time, not ahead of
//! time — there is no separate lowering pass to catch it earlier.

use std::io::Write;

use crate::back::builtins;
use crate::common::{Id, Map};
use crate::error::RuntimeError;
use crate::front::ast::{BinOp, Expr, ExprKind, MonOp, Program};
use crate::value::Value;

struct FuncDef {
    params: Vec<Id>,
    body: Vec<Expr>,
}

/// `(value, propagated)`: `propagated` is true exactly when a `return` fired
/// somewhere underneath and hasn't yet been absorbed by an enclosing
/// function call.
type EvalResult = Result<(Value, bool), RuntimeError>;

pub struct Evaluator {
    envs: Vec<Map<Id, Value>>,
    funcs: Map<Id, FuncDef>,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator {
            envs: vec![Map::new()],
            funcs: Map::new(),
        }
    }

    /// Run every top-level item in order, writing `print` output to `out`.
    pub fn run(&mut self, program: &Program, out: &mut dyn Write) -> Result<(), RuntimeError> {
        for item in &program.items {
            self.eval_expr(item, out)?;
        }
        Ok(())
    }

    fn env(&self) -> &Map<Id, Value> {
        self.envs.last().expect("environment stack is never empty")
    }

    fn env_mut(&mut self) -> &mut Map<Id, Value> {
        self.envs.last_mut().expect("environment stack is never empty")
    }

    fn push_env(&mut self) {
        let copy = self.env().clone();
        self.envs.push(copy);
    }

    fn pop_env(&mut self) {
        self.envs.pop();
    }

    fn eval_block(&mut self, body: &[Expr], out: &mut dyn Write) -> EvalResult {
        let mut last = Value::Int(0);
        for stmt in body {
            let (value, returned) = self.eval_expr(stmt, out)?;
            last = value;
            if returned {
                return Ok((last, true));
            }
        }
        Ok((last, false))
    }

    fn eval_expr(&mut self, e: &Expr, out: &mut dyn Write) -> EvalResult {
        log::trace!("evaluating {:?}", e.kind);
        match &e.kind {
            ExprKind::Empty => Ok((Value::Int(0), e.returnable)),

            ExprKind::Const(value) => Ok((value.clone(), e.returnable)),

            ExprKind::Var(name) => {
                let value = self
                    .env()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnboundName { name: name.to_string() })?;
                Ok((value, e.returnable))
            }

            ExprKind::Monadic { op, right } => {
                let (value, _) = self.eval_expr(right, out)?;
                match op {
                    MonOp::Print => {
                        writeln!(out, "{}", value.to_display()).expect("write to output");
                        Ok((value, false))
                    }
                    MonOp::Neg => Ok((value.neg()?, e.returnable)),
                    MonOp::Not => Ok((value.not()?, e.returnable)),
                    MonOp::Size => Ok((value.size()?, e.returnable)),
                }
            }

            ExprKind::Binary { op, left, right } => {
                let (lhs, _) = self.eval_expr(left, out)?;
                let (rhs, _) = self.eval_expr(right, out)?;
                Ok((apply_binop(*op, &lhs, &rhs)?, e.returnable))
            }

            ExprKind::Assign { name, right, .. } => {
                let (value, _) = self.eval_expr(right, out)?;
                self.env_mut().insert(name.clone(), value.clone());
                Ok((value, false))
            }

            ExprKind::If { cond, then_body, else_body } => {
                let (cond_val, _) = self.eval_expr(cond, out)?;
                let taken = match cond_val {
                    Value::Bool(b) => b,
                    other => {
                        return Err(RuntimeError::BadBranchCondition { got: other.type_tag() })
                    }
                };
                let branch = if taken { then_body } else { else_body };
                self.eval_block(branch, out)
            }

            ExprKind::While { cond, body } => {
                let mut last = Value::Int(0);
                loop {
                    let (cond_val, _) = self.eval_expr(cond, out)?;
                    let keep_going = match cond_val {
                        Value::Bool(b) => b,
                        other => {
                            return Err(RuntimeError::BadBranchCondition { got: other.type_tag() })
                        }
                    };
                    if !keep_going {
                        break;
                    }
                    let (value, returned) = self.eval_block(body, out)?;
                    last = value;
                    if returned {
                        return Ok((last, true));
                    }
                }
                Ok((last, false))
            }

            ExprKind::ListLit { elements } => {
                let mut items = Vec::with_capacity(elements.len());
                for el in elements {
                    items.push(self.eval_expr(el, out)?.0);
                }
                Ok((Value::List(items), e.returnable))
            }

            ExprKind::ListAccess { collection, index } => {
                let (collection, _) = self.eval_expr(collection, out)?;
                let (index, _) = self.eval_expr(index, out)?;
                Ok((collection.index(&index)?, e.returnable))
            }

            ExprKind::ListModify { collection, index, value } => {
                let (collection, _) = self.eval_expr(collection, out)?;
                let (index, _) = self.eval_expr(index, out)?;
                let (value, _) = self.eval_expr(value, out)?;
                Ok((collection.replace(&index, value)?, false))
            }

            ExprKind::FuncDef { name, params, body } => {
                self.funcs.insert(
                    name.clone(),
                    FuncDef { params: params.clone(), body: body.clone() },
                );
                Ok((Value::Int(0), false))
            }

            ExprKind::FuncCall { name, args } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval_expr(arg, out)?.0);
                }

                if let Some(spec) = builtins::lookup_by_name(name.as_str()) {
                    if evaluated.len() != spec.params.len() {
                        return Err(RuntimeError::ArityMismatch {
                            name: name.to_string(),
                            expected: spec.params.len(),
                            got: evaluated.len(),
                        });
                    }
                    let result = builtins::dispatch_builtin(spec.fid, &evaluated)?;
                    return Ok((result, e.returnable));
                }

                let Some(func) = self.funcs.get(name) else {
                    return Err(RuntimeError::UnboundName { name: name.to_string() });
                };
                if evaluated.len() != func.params.len() {
                    return Err(RuntimeError::ArityMismatch {
                        name: name.to_string(),
                        expected: func.params.len(),
                        got: evaluated.len(),
                    });
                }

                let params = func.params.clone();
                let body = func.body.clone();

                self.push_env();
                for (param, value) in params.iter().zip(evaluated.into_iter()) {
                    self.env_mut().insert(param.clone(), value);
                }
                let (return_val, _) = self.eval_block(&body, out)?;
                self.pop_env();

                Ok((return_val, e.returnable))
            }
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

fn apply_binop(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinOp::Add => lhs.add(rhs),
        BinOp::Sub => lhs.sub(rhs),
        BinOp::Mul => lhs.mul(rhs),
        BinOp::Div => lhs.div(rhs),
        BinOp::Pow => lhs.pow(rhs),
        BinOp::Mod => lhs.rem(rhs),
        BinOp::Eq => lhs.eq_value(rhs),
        BinOp::Neq => lhs.neq_value(rhs),
        BinOp::Gt => lhs.gt(rhs),
        BinOp::Gte => lhs.ge(rhs),
        BinOp::Lt => lhs.lt(rhs),
        BinOp::Lte => lhs.le(rhs),
        BinOp::And => lhs.and(rhs),
        BinOp::Or => lhs.or(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse;
    use pretty_assertions::assert_eq;

    fn run_src(src: &str) -> String {
        let program = parse(src).unwrap();
        let mut eval = Evaluator::new();
        let mut out = Vec::new();
        eval.run(&program, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn arithmetic_and_print() {
        assert_eq!(run_src("let x = 3; let y = 4; print(x * y + 1);"), "13\n");
    }

    #[test]
    fn list_index_assignment() {
        assert_eq!(
            run_src("let arr = [1,2,3]; arr[1] = 99; print(arr);"),
            "[1, 99, 3]\n"
        );
    }

    #[test]
    fn recursive_function_call() {
        let src = "function fact(n) { if (n <= 1) { return 1; } else { return n * fact(n - 1); } } print(fact(5));";
        assert_eq!(run_src(src), "120\n");
    }

    #[test]
    fn callee_mutations_do_not_leak_to_caller() {
        let src = "function bump(n) { n = n + 1; return n; } let x = 5; let y = bump(x); print(x); print(y);";
        assert_eq!(run_src(src), "5\n6\n");
    }

    #[test]
    fn append_and_remove_builtins() {
        let src = "let a = [1,2,3]; a = append(a, 4); a = remove(a, 0); print(a);";
        assert_eq!(run_src(src), "[2, 3, 4]\n");
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error_here_not_a_parse_error() {
        let program = parse("function f(a, b) { return a; } f(1);").unwrap();
        let mut eval = Evaluator::new();
        let mut out = Vec::new();
        let err = eval.run(&program, &mut out).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::ArityMismatch { name: "f".to_string(), expected: 2, got: 1 }
        );
    }

    #[test]
    fn unbound_name_is_reported() {
        let program = parse("ghost(1);").unwrap();
        let mut eval = Evaluator::new();
        let mut out = Vec::new();
        let err = eval.run(&program, &mut out).unwrap_err();
        assert_eq!(err, RuntimeError::UnboundName { name: "ghost".to_string() });
    }

    #[test]
    fn while_loop_early_return_inside_function() {
        let src = "function firstEven(n) { let i = 0; while (i < n) { if (i % 2 == 0) { return i; } i = i + 1; } return -1; } print(firstEven(7));";
        assert_eq!(run_src(src), "0\n");
    }
}
