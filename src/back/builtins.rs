//! Host-implemented built-in functions.
//!
//! Four functions are wired in under fixed negative function ids, unified
//! with user-function calls through the same `JUMPF` opcode. This module
//! owns both halves: the metadata table the IR generator consults when
//! lowering a call site (name → id/arity/parameter names) and the actual
//! dispatch over `Value`s that the VM and the tree evaluator both call.

use crate::error::RuntimeError;
use crate::value::Value;

pub struct BuiltinSpec {
    pub name: &'static str,
    pub fid: i64,
    pub params: &'static [&'static str],
}

pub const BUILTINS: &[BuiltinSpec] = &[
    BuiltinSpec {
        name: "append",
        fid: -1,
        params: &["arr_val", "ele_val"],
    },
    BuiltinSpec {
        name: "remove",
        fid: -2,
        params: &["arr_val", "idx_val"],
    },
    BuiltinSpec {
        name: "type",
        fid: -3,
        params: &["val"],
    },
    BuiltinSpec {
        name: "string",
        fid: -4,
        params: &["val"],
    },
];

pub fn lookup_by_name(name: &str) -> Option<&'static BuiltinSpec> {
    BUILTINS.iter().find(|b| b.name == name)
}

pub fn lookup_by_fid(fid: i64) -> Option<&'static BuiltinSpec> {
    BUILTINS.iter().find(|b| b.fid == fid)
}

/// Run a built-in by id over its already-evaluated arguments, in the order
/// declared by its `BuiltinSpec::params`.
pub fn dispatch_builtin(fid: i64, args: &[Value]) -> Result<Value, RuntimeError> {
    match fid {
        -1 => append(&args[0], args[1].clone()),
        -2 => remove(&args[0], &args[1]),
        -3 => Ok(Value::String(args[0].type_tag().to_string())),
        -4 => Ok(Value::String(stringify(&args[0]))),
        _ => Err(RuntimeError::UnknownBuiltin { id: fid }),
    }
}

fn append(arr_val: &Value, ele_val: Value) -> Result<Value, RuntimeError> {
    match arr_val {
        Value::List(items) => {
            let mut out = items.clone();
            out.push(ele_val);
            Ok(Value::List(out))
        }
        _ => Err(RuntimeError::TypeMismatch {
            op: "append".to_string(),
            lhs: arr_val.type_tag(),
            rhs: Some(ele_val.type_tag()),
        }),
    }
}

fn remove(arr_val: &Value, idx_val: &Value) -> Result<Value, RuntimeError> {
    let items = match arr_val {
        Value::List(items) => items,
        _ => {
            return Err(RuntimeError::TypeMismatch {
                op: "remove".to_string(),
                lhs: arr_val.type_tag(),
                rhs: Some(idx_val.type_tag()),
            })
        }
    };
    let idx = match idx_val {
        Value::Int(i) => *i,
        _ => {
            return Err(RuntimeError::TypeMismatch {
                op: "remove".to_string(),
                lhs: arr_val.type_tag(),
                rhs: Some(idx_val.type_tag()),
            })
        }
    };
    if idx < 0 || idx as usize >= items.len() {
        return Err(RuntimeError::IndexOutOfBounds {
            index: idx,
            len: items.len(),
        });
    }
    let mut out = items.clone();
    out.remove(idx as usize);
    Ok(Value::List(out))
}

/// `string()`'s deliberately-preserved quirk: a list always stringifies to
/// the literal word `"list"`, never a bracketed rendering.
fn stringify(val: &Value) -> String {
    match val {
        Value::List(_) => "list".to_string(),
        other => other.to_display(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn append_is_non_mutating_and_returns_new_list() {
        let arr = Value::List(vec![Value::Int(1), Value::Int(2)]);
        let result = dispatch_builtin(-1, &[arr.clone(), Value::Int(3)]).unwrap();
        assert_eq!(
            result,
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(arr, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn remove_drops_the_element_at_index() {
        let arr = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = dispatch_builtin(-2, &[arr, Value::Int(0)]).unwrap();
        assert_eq!(result, Value::List(vec![Value::Int(2), Value::Int(3)]));
    }

    #[test]
    fn remove_out_of_bounds_is_index_error() {
        let arr = Value::List(vec![Value::Int(1)]);
        let err = dispatch_builtin(-2, &[arr, Value::Int(5)]).unwrap_err();
        assert_eq!(err, RuntimeError::IndexOutOfBounds { index: 5, len: 1 });
    }

    #[test]
    fn type_tag_builtin() {
        assert_eq!(
            dispatch_builtin(-3, &[Value::List(vec![])]).unwrap(),
            Value::String("list".to_string())
        );
        assert_eq!(
            dispatch_builtin(-3, &[Value::String("x".into())]).unwrap(),
            Value::String("string".to_string())
        );
    }

    #[test]
    fn string_of_list_is_the_literal_word_list() {
        assert_eq!(
            dispatch_builtin(-4, &[Value::List(vec![Value::Int(1)])]).unwrap(),
            Value::String("list".to_string())
        );
        assert_eq!(
            dispatch_builtin(-4, &[Value::Int(7)]).unwrap(),
            Value::String("7".to_string())
        );
    }

    #[test]
    fn unknown_builtin_id() {
        let err = dispatch_builtin(-99, &[]).unwrap_err();
        assert_eq!(err, RuntimeError::UnknownBuiltin { id: -99 });
    }

    #[test]
    fn lookup_tables_agree_on_fid() {
        for spec in BUILTINS {
            assert_eq!(lookup_by_name(spec.name).unwrap().fid, spec.fid);
            assert_eq!(lookup_by_fid(spec.fid).unwrap().name, spec.name);
        }
    }
}
