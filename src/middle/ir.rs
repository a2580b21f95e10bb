//! The instruction set and program tables.
//!
//! Registers are `i64`: non-negative values are ordinary pseudo-registers
//! allocated by the lowering pass; three sentinels are reserved — `PC`
//! (`-1`), `V0` (`-2`, the cross-frame return-value register) and `T0`
//! (`-3`, a scratch register used by `MODIFY`).

use crate::common::Id;
use crate::value::Value;

pub const PC: i64 = -1;
pub const V0: i64 = -2;
pub const T0: i64 = -3;

/// Advisory instruction shape. The VM dispatches on `op` alone; `itype`
/// exists purely for the `--output-ir` pretty-printer and documentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsnType {
    IType,
    RType,
    JType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
    Neg,
    Not,
    Size,
    Print,
    Nop,
    End,
    LoadConst,
    LoadVar,
    StoreVar,
    Move,
    InitList,
    Append,
    Access,
    Modify,
    Jump,
    Jnt,
    Jumpf,
    Push,
    Ret,
}

impl Op {
    fn itype(self) -> InsnType {
        match self {
            Op::Jump | Op::Jnt | Op::Jumpf => InsnType::JType,
            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Pow
            | Op::Mod
            | Op::Eq
            | Op::Neq
            | Op::Gt
            | Op::Gte
            | Op::Lt
            | Op::Lte
            | Op::And
            | Op::Or
            | Op::Neg
            | Op::Not
            | Op::Size
            | Op::Print
            | Op::InitList
            | Op::Append
            | Op::Access
            | Op::Modify
            | Op::Move => InsnType::RType,
            Op::Nop
            | Op::End
            | Op::LoadConst
            | Op::LoadVar
            | Op::StoreVar
            | Op::Push
            | Op::Ret => InsnType::IType,
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Pow => "POW",
            Op::Mod => "MOD",
            Op::Eq => "EQ",
            Op::Neq => "NEQ",
            Op::Gt => "GT",
            Op::Gte => "GTE",
            Op::Lt => "LT",
            Op::Lte => "LTE",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Neg => "NEG",
            Op::Not => "NOT",
            Op::Size => "SIZE",
            Op::Print => "PRINT",
            Op::Nop => "NOP",
            Op::End => "END",
            Op::LoadConst => "LOAD_CONST",
            Op::LoadVar => "LOAD_VAR",
            Op::StoreVar => "STORE_VAR",
            Op::Move => "MOVE",
            Op::InitList => "INIT_LIST",
            Op::Append => "APPEND",
            Op::Access => "ACCESS",
            Op::Modify => "MODIFY",
            Op::Jump => "JUMP",
            Op::Jnt => "JNT",
            Op::Jumpf => "JUMPF",
            Op::Push => "PUSH",
            Op::Ret => "RET",
        }
    }
}

/// One instruction. `a1`/`a2`/`a3` are interpreted per `op`: register
/// indices, constant/identifier table indices, addresses, or unused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub itype: InsnType,
    pub op: Op,
    pub a1: i64,
    pub a2: i64,
    pub a3: i64,
}

impl Instruction {
    pub fn new(op: Op, a1: i64, a2: i64, a3: i64) -> Self {
        Instruction {
            itype: op.itype(),
            op,
            a1,
            a2,
            a3,
        }
    }
}

/// An entry in the function table: resolved once its body is emitted at
/// program tail, once its body has been emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: Id,
    pub start_addr: usize,
    pub params: Vec<Id>,
}

impl FunctionInfo {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// The fully lowered program: instruction stream plus the three tables the
/// VM and the pretty-printer read by index.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub idents: Vec<Id>,
    pub consts: Vec<Value>,
    pub functions: Vec<FunctionInfo>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Render in the `--output-ir` format: one line per
    /// instruction, a leading program counter, mnemonic, operand rendering;
    /// function entries get a preceding label line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let labels: std::collections::BTreeMap<usize, &Id> = self
            .functions
            .iter()
            .map(|f| (f.start_addr, &f.name))
            .collect();
        out.push_str("main:\n");
        for (pc, insn) in self.instructions.iter().enumerate() {
            if let Some(name) = labels.get(&pc) {
                out.push_str(&format!("{name}:\n"));
            }
            out.push_str(&format!(
                "{:4}  {:<10} {} {} {}\n",
                pc,
                insn.op.mnemonic(),
                reg_string(insn.a1),
                reg_string(insn.a2),
                reg_string(insn.a3),
            ));
        }
        out
    }
}

/// Register operand rendering for `--output-ir`: sentinels as `PC`/`V0`/`T0`,
/// everything else as `Rn`.
pub fn reg_string(reg: i64) -> String {
    match reg {
        PC => "PC".to_string(),
        V0 => "V0".to_string(),
        T0 => "T0".to_string(),
        n => format!("R{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sentinel_rendering() {
        assert_eq!(reg_string(PC), "PC");
        assert_eq!(reg_string(V0), "V0");
        assert_eq!(reg_string(T0), "T0");
        assert_eq!(reg_string(4), "R4");
    }

    #[test]
    fn render_labels_function_entries() {
        let mut prog = Program::new();
        prog.instructions.push(Instruction::new(Op::End, 0, 0, 0));
        prog.instructions
            .push(Instruction::new(Op::Ret, 0, 0, 0));
        prog.functions.push(FunctionInfo {
            name: Id::new("f".to_string()),
            start_addr: 1,
            params: Vec::new(),
        });
        let rendered = prog.render();
        assert!(rendered.contains("main:"));
        assert!(rendered.contains("f:"));
        assert!(rendered.contains("END"));
        assert!(rendered.contains("RET"));
    }
}
