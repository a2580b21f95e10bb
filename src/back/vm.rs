//! The register VM.
//!
//! Fetch-decode-execute loop over the flat instruction stream produced by
//! `middle::lower`. `V0` and `T0` are VM-wide registers; everything else
//! lives in the current activation frame, which `PUSH` clones wholesale
//! (register file and environment) to give call-by-value-of-the-whole-frame
//! semantics — a callee's writes never leak back to its caller.

use std::io::Write;

use crate::back::builtins;
use crate::common::{Id, Map};
use crate::error::RuntimeError;
use crate::middle::ir::{Op, Program, T0, V0};
use crate::value::Value;

#[derive(Clone, Default)]
struct Frame {
    registers: Map<i64, Value>,
    env: Map<Id, Value>,
    return_addr: usize,
}

pub struct Vm {
    prog: Program,
    frames: Vec<Frame>,
    v0: Value,
    t0: Value,
    pc: usize,
}

impl Vm {
    pub fn new(prog: Program) -> Self {
        Vm {
            prog,
            frames: vec![Frame::default()],
            v0: Value::Int(0),
            t0: Value::Int(0),
            pc: 0,
        }
    }

    fn frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty while running")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty while running")
    }

    fn get_reg(&self, reg: i64) -> Value {
        match reg {
            V0 => self.v0.clone(),
            T0 => self.t0.clone(),
            n => self
                .frame()
                .registers
                .get(&n)
                .cloned()
                .expect("register read before write"),
        }
    }

    fn set_reg(&mut self, reg: i64, value: Value) {
        match reg {
            V0 => self.v0 = value,
            T0 => self.t0 = value,
            n => {
                self.frame_mut().registers.insert(n, value);
            }
        }
    }

    fn env_get(&self, name: &Id) -> Result<Value, RuntimeError> {
        self.frame().env.get(name).cloned().ok_or_else(|| RuntimeError::UnboundName {
            name: name.to_string(),
        })
    }

    fn env_set(&mut self, name: Id, value: Value) {
        self.frame_mut().env.insert(name, value);
    }

    /// Run until `END`, a function-level `RET` pops the last frame, or an
    /// error aborts execution. Print output goes to `out` in program order.
    pub fn run(&mut self, out: &mut dyn Write) -> Result<(), RuntimeError> {
        loop {
            if self.pc >= self.prog.instructions.len() {
                break;
            }
            let insn = self.prog.instructions[self.pc];
            log::trace!("pc={} op={:?} a1={} a2={} a3={}", self.pc, insn.op, insn.a1, insn.a2, insn.a3);

            match insn.op {
                Op::End => break,
                Op::Nop => {
                    self.pc += 1;
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow | Op::Mod | Op::Eq | Op::Neq
                | Op::Gt | Op::Gte | Op::Lt | Op::Lte | Op::And | Op::Or => {
                    let lhs = self.get_reg(insn.a2);
                    let rhs = self.get_reg(insn.a3);
                    let result = apply_binop(insn.op, &lhs, &rhs)?;
                    self.set_reg(insn.a1, result);
                    self.pc += 1;
                }
                Op::Neg | Op::Not | Op::Size => {
                    let operand = self.get_reg(insn.a2);
                    let result = match insn.op {
                        Op::Neg => operand.neg()?,
                        Op::Not => operand.not()?,
                        Op::Size => operand.size()?,
                        _ => unreachable!(),
                    };
                    self.set_reg(insn.a1, result);
                    self.pc += 1;
                }
                Op::Print => {
                    let value = self.get_reg(insn.a1);
                    writeln!(out, "{}", value.to_display()).expect("write to output");
                    self.pc += 1;
                }
                Op::LoadConst => {
                    let value = self.prog.consts[insn.a2 as usize].clone();
                    self.set_reg(insn.a1, value);
                    self.pc += 1;
                }
                Op::LoadVar => {
                    let name = self.prog.idents[insn.a2 as usize].clone();
                    let value = self.env_get(&name)?;
                    self.set_reg(insn.a1, value);
                    self.pc += 1;
                }
                Op::StoreVar => {
                    let name = self.prog.idents[insn.a1 as usize].clone();
                    let value = self.get_reg(insn.a2);
                    self.env_set(name, value);
                    self.pc += 1;
                }
                Op::Move => {
                    let value = self.get_reg(insn.a2);
                    self.set_reg(insn.a1, value);
                    self.pc += 1;
                }
                Op::InitList => {
                    self.set_reg(insn.a1, Value::List(Vec::new()));
                    self.pc += 1;
                }
                Op::Append => {
                    let elem = self.get_reg(insn.a2);
                    let mut list = self.get_reg(insn.a1);
                    list.append_in_place(elem)?;
                    self.set_reg(insn.a1, list);
                    self.pc += 1;
                }
                Op::Access => {
                    let collection = self.get_reg(insn.a2);
                    let index = self.get_reg(insn.a3);
                    let value = collection.index(&index)?;
                    self.set_reg(insn.a1, value);
                    self.pc += 1;
                }
                Op::Modify => {
                    let collection = self.get_reg(insn.a1);
                    let index = self.get_reg(insn.a2);
                    let new_value = self.get_reg(insn.a3);
                    self.t0 = collection.replace(&index, new_value)?;
                    self.pc += 1;
                }
                Op::Jump => {
                    self.pc = insn.a1 as usize;
                }
                Op::Jnt => {
                    let cond = self.get_reg(insn.a1);
                    match cond {
                        Value::Bool(true) => self.pc += 1,
                        Value::Bool(false) => self.pc = insn.a2 as usize,
                        other => {
                            return Err(RuntimeError::BadBranchCondition {
                                got: other.type_tag(),
                            })
                        }
                    }
                }
                Op::Push => {
                    let cloned = self.frame().clone();
                    self.frames.push(cloned);
                    log::debug!("push: frame stack depth {}", self.frames.len());
                    self.pc += 1;
                }
                Op::Jumpf => {
                    let fid = insn.a1;
                    self.frame_mut().return_addr = self.pc + 1;
                    if fid < 0 {
                        let spec = builtins::lookup_by_fid(fid)
                            .ok_or(RuntimeError::UnknownBuiltin { id: fid })?;
                        let mut args = Vec::with_capacity(spec.params.len());
                        for param in spec.params {
                            args.push(self.env_get(&Id::new(param.to_string()))?);
                        }
                        self.v0 = builtins::dispatch_builtin(fid, &args)?;
                        let frame = self.frames.pop().expect("frame pushed before JUMPF");
                        self.pc = frame.return_addr;
                    } else {
                        self.pc = self.prog.functions[fid as usize].start_addr;
                    }
                }
                Op::Ret => {
                    let frame = self.frames.pop().expect("RET without a matching PUSH");
                    self.pc = frame.return_addr;
                    log::debug!("ret: frame stack depth {}", self.frames.len());
                }
            }
        }
        Ok(())
    }
}

fn apply_binop(op: Op, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        Op::Add => lhs.add(rhs),
        Op::Sub => lhs.sub(rhs),
        Op::Mul => lhs.mul(rhs),
        Op::Div => lhs.div(rhs),
        Op::Pow => lhs.pow(rhs),
        Op::Mod => lhs.rem(rhs),
        Op::Eq => lhs.eq_value(rhs),
        Op::Neq => lhs.neq_value(rhs),
        Op::Gt => lhs.gt(rhs),
        Op::Gte => lhs.ge(rhs),
        Op::Lt => lhs.lt(rhs),
        Op::Lte => lhs.le(rhs),
        Op::And => lhs.and(rhs),
        Op::Or => lhs.or(rhs),
        _ => unreachable!("apply_binop called with a non-binary opcode"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse;
    use crate::middle::lower::lower;
    use pretty_assertions::assert_eq;

    fn run_src(src: &str) -> String {
        let program = parse(src).unwrap();
        let ir = lower(&program).unwrap();
        let mut vm = Vm::new(ir);
        let mut out = Vec::new();
        vm.run(&mut out).unwrap();
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
    fn while_loop_string_concat() {
        let src = r#"let s = ""; let i = 0; while (i < 3) { s = s + "ab"; i = i + 1; } print(s);"#;
        assert_eq!(run_src(src), "ababab\n");
    }

    #[test]
    fn type_and_size_builtins() {
        let src = r#"print(type([1, 2])); print(type("x")); print(size("hello"));"#;
        assert_eq!(run_src(src), "list\nstring\n5\n");
    }

    #[test]
    fn append_and_remove_builtins() {
        let src = "let a = [1,2,3]; a = append(a, 4); a = remove(a, 0); print(a);";
        assert_eq!(run_src(src), "[2, 3, 4]\n");
    }

    #[test]
    fn divide_by_zero_aborts() {
        let program = parse("print(5 / 0);").unwrap();
        let ir = lower(&program).unwrap();
        let mut vm = Vm::new(ir);
        let mut out = Vec::new();
        assert_eq!(vm.run(&mut out).unwrap_err(), RuntimeError::DivideByZero);
    }

    #[test]
    fn callee_mutations_do_not_leak_to_caller() {
        let src = "function bump(n) { n = n + 1; return n; } let x = 5; let y = bump(x); print(x); print(y);";
        assert_eq!(run_src(src), "5\n6\n");
    }
}
