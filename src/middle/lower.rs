//! The IR generator: expression tree → flat instruction stream.
//!
//! Driver contract: lower each top-level expression, append `END`, then
//! drain the queue of function bodies seeded by `FuncDef` nodes, emitting
//! each at the current tail and resolving its table entry's `start_addr`.
//! This keeps `main` code first and confines function bodies to a region
//! only reachable via `JUMPF`.

use crate::back::builtins;
use crate::common::{Id, Map};
use crate::error::RuntimeError;
use crate::front::ast::{BinOp, Expr, ExprKind, MonOp, Program as AstProgram};

use super::ir::{FunctionInfo, Instruction, Op, Program, T0, V0};

struct PendingFunc {
    func_table_idx: usize,
    params: Vec<Id>,
    body: Vec<Expr>,
}

struct Lowering {
    prog: Program,
    curr_reg: i64,
    ident_index: Map<Id, usize>,
    func_index: Map<Id, usize>,
    pending: Vec<PendingFunc>,
}

/// Lower a parsed program into IR, ready for the VM.
pub fn lower(program: &AstProgram) -> Result<Program, RuntimeError> {
    let mut gen = Lowering {
        prog: Program::new(),
        curr_reg: 0,
        ident_index: Map::new(),
        func_index: Map::new(),
        pending: Vec::new(),
    };

    for item in &program.items {
        gen.lower_stmt(item)?;
    }
    gen.emit(Op::End, 0, 0, 0);

    let mut i = 0;
    while i < gen.pending.len() {
        let start = gen.prog.instructions.len();
        let func_table_idx = gen.pending[i].func_table_idx;
        gen.prog.functions[func_table_idx].start_addr = start;
        log::debug!(
            "emitting queued function {} at {start}",
            gen.prog.functions[func_table_idx].name
        );
        let body = gen.pending[i].body.clone();
        for stmt in &body {
            gen.lower_stmt(stmt)?;
        }
        gen.emit(Op::Ret, 0, 0, 0);
        i += 1;
    }

    Ok(gen.prog)
}

impl Lowering {
    fn alloc(&mut self) -> i64 {
        let r = self.curr_reg;
        self.curr_reg += 1;
        r
    }

    fn ident_idx(&mut self, name: &Id) -> i64 {
        if let Some(&idx) = self.ident_index.get(name) {
            return idx as i64;
        }
        let idx = self.prog.idents.len();
        self.prog.idents.push(name.clone());
        self.ident_index.insert(name.clone(), idx);
        idx as i64
    }

    /// Unconditionally appends a fresh identifier-table entry. Call-site
    /// parameter binding uses this instead of `ident_idx`: each call-site
    /// `STORE_VAR` gets its own table entry for the parameter name, even if
    /// that name was already registered by an earlier call or variable use.
    fn push_ident(&mut self, name: &Id) -> i64 {
        let idx = self.prog.idents.len();
        self.prog.idents.push(name.clone());
        idx as i64
    }

    fn const_idx(&mut self, value: crate::value::Value) -> i64 {
        self.prog.consts.push(value);
        (self.prog.consts.len() - 1) as i64
    }

    fn emit(&mut self, op: Op, a1: i64, a2: i64, a3: i64) -> usize {
        self.prog.instructions.push(Instruction::new(op, a1, a2, a3));
        self.prog.instructions.len() - 1
    }

    fn patch_jump_target(&mut self, pos: usize, target: i64) {
        self.prog.instructions[pos].a1 = target;
    }

    fn patch_jnt_target(&mut self, pos: usize, target: i64) {
        self.prog.instructions[pos].a2 = target;
    }

    fn tail(&mut self, returnable: bool, dst: i64) {
        if returnable {
            self.emit(Op::Move, V0, dst, 0);
            self.emit(Op::Ret, 0, 0, 0);
        }
    }

    fn lower_stmt(&mut self, e: &Expr) -> Result<(), RuntimeError> {
        self.lower_expr(e)?;
        Ok(())
    }

    fn lower_expr(&mut self, e: &Expr) -> Result<i64, RuntimeError> {
        log::trace!("lowering {:?}", e.kind);
        match &e.kind {
            ExprKind::Empty => {
                if e.returnable {
                    self.emit(Op::Ret, 0, 0, 0);
                } else {
                    self.emit(Op::Nop, 0, 0, 0);
                }
                Ok(0)
            }

            ExprKind::Const(value) => {
                let dst = self.alloc();
                let idx = self.const_idx(value.clone());
                self.emit(Op::LoadConst, dst, idx, 0);
                self.tail(e.returnable, dst);
                Ok(dst)
            }

            ExprKind::Var(name) => {
                let dst = self.alloc();
                let idx = self.ident_idx(name);
                self.emit(Op::LoadVar, dst, idx, 0);
                self.tail(e.returnable, dst);
                Ok(dst)
            }

            ExprKind::Assign {
                name,
                right,
                is_reassign: _,
            } => {
                let r = self.lower_expr(right)?;
                let idx = self.ident_idx(name);
                self.emit(Op::StoreVar, idx, r, 0);
                Ok(r)
            }

            ExprKind::Monadic { op, right } => {
                let r = self.lower_expr(right)?;
                match op {
                    MonOp::Print => {
                        self.emit(Op::Print, r, 0, 0);
                        Ok(r)
                    }
                    MonOp::Neg | MonOp::Not | MonOp::Size => {
                        let dst = self.alloc();
                        let opcode = match op {
                            MonOp::Neg => Op::Neg,
                            MonOp::Not => Op::Not,
                            MonOp::Size => Op::Size,
                            MonOp::Print => unreachable!(),
                        };
                        self.emit(opcode, dst, r, 0);
                        self.tail(e.returnable, dst);
                        Ok(dst)
                    }
                }
            }

            ExprKind::Binary { op, left, right } => {
                let r1 = self.lower_expr(left)?;
                let r2 = self.lower_expr(right)?;
                let dst = self.alloc();
                self.emit(map_binop(*op), dst, r1, r2);
                self.tail(e.returnable, dst);
                Ok(dst)
            }

            ExprKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let cond_r = self.lower_expr(cond)?;
                let jnt_pos = self.emit(Op::Jnt, cond_r, -1, 0);
                for stmt in then_body {
                    self.lower_stmt(stmt)?;
                }
                let jump_pos = self.emit(Op::Jump, -1, 0, 0);
                let else_start = self.prog.instructions.len() as i64;
                self.patch_jnt_target(jnt_pos, else_start);
                for stmt in else_body {
                    self.lower_stmt(stmt)?;
                }
                let after = self.prog.instructions.len() as i64;
                self.patch_jump_target(jump_pos, after);
                Ok(0)
            }

            ExprKind::While { cond, body } => {
                let start = self.prog.instructions.len() as i64;
                let cond_r = self.lower_expr(cond)?;
                let jnt_pos = self.emit(Op::Jnt, cond_r, -1, 0);
                for stmt in body {
                    self.lower_stmt(stmt)?;
                }
                self.emit(Op::Jump, start, 0, 0);
                let after = self.prog.instructions.len() as i64;
                self.patch_jnt_target(jnt_pos, after);
                Ok(0)
            }

            ExprKind::ListLit { elements } => {
                let dst = self.alloc();
                self.emit(Op::InitList, dst, 0, 0);
                for el in elements {
                    let r = self.lower_expr(el)?;
                    self.emit(Op::Append, dst, r, 0);
                }
                self.tail(e.returnable, dst);
                Ok(dst)
            }

            ExprKind::ListAccess { collection, index } => {
                let r1 = self.lower_expr(collection)?;
                let r2 = self.lower_expr(index)?;
                let dst = self.alloc();
                self.emit(Op::Access, dst, r1, r2);
                self.tail(e.returnable, dst);
                Ok(dst)
            }

            ExprKind::ListModify {
                collection,
                index,
                value,
            } => {
                let r1 = self.lower_expr(collection)?;
                let r2 = self.lower_expr(index)?;
                let r3 = self.lower_expr(value)?;
                self.emit(Op::Modify, r1, r2, r3);
                let dst = self.alloc();
                self.emit(Op::Move, dst, T0, 0);
                Ok(dst)
            }

            ExprKind::FuncDef { name, params, body } => {
                let func_table_idx = self.prog.functions.len();
                self.prog.functions.push(FunctionInfo {
                    name: name.clone(),
                    start_addr: usize::MAX,
                    params: params.clone(),
                });
                self.func_index.insert(name.clone(), func_table_idx);
                log::debug!("queued function {name} with {} parameter(s)", params.len());
                self.pending.push(PendingFunc {
                    func_table_idx,
                    params: params.clone(),
                    body: body.clone(),
                });
                Ok(0)
            }

            ExprKind::FuncCall { name, args } => {
                let (fid, params) = self.resolve_call(name)?;
                if args.len() != params.len() {
                    return Err(RuntimeError::ArityMismatch {
                        name: name.to_string(),
                        expected: params.len(),
                        got: args.len(),
                    });
                }

                self.emit(Op::Push, 0, 0, 0);
                for (arg, param) in args.iter().zip(params.iter()) {
                    let r = self.lower_expr(arg)?;
                    let idx = self.push_ident(param);
                    self.emit(Op::StoreVar, idx, r, 0);
                }
                self.emit(Op::Jumpf, fid, 0, 0);

                let dst = self.alloc();
                self.emit(Op::Move, dst, V0, 0);
                self.tail(e.returnable, dst);
                Ok(dst)
            }
        }
    }

    /// Resolve a call target to its `JUMPF` id and declared parameter
    /// names, checking built-ins first (fixed negative ids).
    fn resolve_call(&self, name: &Id) -> Result<(i64, Vec<Id>), RuntimeError> {
        if let Some(spec) = builtins::lookup_by_name(name.as_str()) {
            let params = spec
                .params
                .iter()
                .map(|p| Id::new(p.to_string()))
                .collect();
            return Ok((spec.fid, params));
        }
        if let Some(&idx) = self.func_index.get(name) {
            return Ok((idx as i64, self.prog.functions[idx].params.clone()));
        }
        Err(RuntimeError::UnboundName {
            name: name.to_string(),
        })
    }
}

fn map_binop(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
        BinOp::Pow => Op::Pow,
        BinOp::Mod => Op::Mod,
        BinOp::Eq => Op::Eq,
        BinOp::Neq => Op::Neq,
        BinOp::Gt => Op::Gt,
        BinOp::Gte => Op::Gte,
        BinOp::Lt => Op::Lt,
        // `Lte` is its own opcode, never aliased to `Gte`.
        BinOp::Lte => Op::Lte,
        BinOp::And => Op::And,
        BinOp::Or => Op::Or,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn lower_src(src: &str) -> Program {
        lower(&parse(src).unwrap()).unwrap()
    }

    #[test]
    fn const_lowers_to_load_const_and_appends_table_entry() {
        let prog = lower_src("let x = 3;");
        assert_eq!(prog.consts, vec![Value::Int(3)]);
        assert!(prog
            .instructions
            .iter()
            .any(|i| i.op == Op::LoadConst && i.a2 == 0));
    }

    #[test]
    fn lte_maps_to_distinct_opcode_not_gte() {
        let prog = lower_src("let ok = 1 <= 2;");
        assert!(prog.instructions.iter().any(|i| i.op == Op::Lte));
        assert!(!prog.instructions.iter().any(|i| i.op == Op::Gte));
    }

    #[test]
    fn if_patches_jnt_and_jump_within_bounds() {
        let prog = lower_src("if (true) { let a = 1; } else { let b = 2; }");
        let len = prog.instructions.len() as i64;
        for insn in &prog.instructions {
            if insn.op == Op::Jnt || insn.op == Op::Jump {
                assert!(insn.a2 <= len || insn.a1 <= len);
            }
        }
    }

    #[test]
    fn while_jumps_back_to_condition() {
        let prog = lower_src("let i = 0; while (i < 3) { i = i + 1; }");
        let jump = prog.instructions.iter().find(|i| i.op == Op::Jump).unwrap();
        assert!((jump.a1 as usize) < prog.instructions.len());
    }

    #[test]
    fn function_def_queues_body_after_end() {
        let prog = lower_src("function f(a) { return a; } f(1);");
        assert_eq!(prog.functions.len(), 1);
        let end_pos = prog
            .instructions
            .iter()
            .position(|i| i.op == Op::End)
            .unwrap();
        assert!(prog.functions[0].start_addr > end_pos);
    }

    #[test]
    fn call_arity_mismatch_is_a_lowering_error() {
        let program = parse("function f(a, b) { return a; } f(1);").unwrap();
        let err = lower(&program).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::ArityMismatch {
                name: "f".to_string(),
                expected: 2,
                got: 1,
            }
        );
    }

    #[test]
    fn builtin_arity_mismatch_is_a_lowering_error() {
        let program = parse("append([1]);").unwrap();
        let err = lower(&program).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::ArityMismatch {
                name: "append".to_string(),
                expected: 2,
                got: 1,
            }
        );
    }

    #[test]
    fn unknown_function_is_unbound_name() {
        let program = parse("ghost(1);").unwrap();
        let err = lower(&program).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::UnboundName {
                name: "ghost".to_string()
            }
        );
    }
}
