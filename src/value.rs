//! The dynamically-typed runtime value.
//!
//! `Value` is a tagged union over four variants. It owns its `String`/`List`
//! payloads directly (no reference counting, no GC), so cloning a `Value`
//! deep-copies lists and strings.

use crate::error::RuntimeError;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Bool(bool),
    String(String),
    List(Vec<Value>),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display())
    }
}

impl Value {
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// The type tag used by the `type` builtin and in error messages.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// Stringify for `print` / top-level `string()`: strings are bare, lists
    /// quote their string elements.
    pub fn to_display(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => Value::list_display(items),
        }
    }

    fn list_display(items: &[Value]) -> String {
        let rendered: Vec<String> = items
            .iter()
            .map(|v| match v {
                Value::String(s) => format!("\"{s}\""),
                other => other.to_display(),
            })
            .collect();
        format!("[{}]", rendered.join(", "))
    }

    fn type_mismatch(op: &str, lhs: &Value, rhs: &Value) -> RuntimeError {
        RuntimeError::TypeMismatch {
            op: op.to_string(),
            lhs: lhs.type_tag(),
            rhs: Some(rhs.type_tag()),
        }
    }

    fn unary_type_mismatch(op: &str, operand: &Value) -> RuntimeError {
        RuntimeError::TypeMismatch {
            op: op.to_string(),
            lhs: operand.type_tag(),
            rhs: None,
        }
    }

    pub fn add(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut out = a.clone();
                out.extend(b.clone());
                Ok(Value::List(out))
            }
            _ => Err(Value::type_mismatch("+", self, rhs)),
        }
    }

    pub fn sub(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            _ => Err(Value::type_mismatch("-", self, rhs)),
        }
    }

    pub fn mul(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            (Value::String(s), Value::Int(n)) => Ok(Value::String(repeat_str(s, *n))),
            (Value::List(items), Value::Int(n)) => Ok(Value::List(repeat_list(items, *n))),
            _ => Err(Value::type_mismatch("*", self, rhs)),
        }
    }

    pub fn div(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivideByZero),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
            _ => Err(Value::type_mismatch("/", self, rhs)),
        }
    }

    pub fn rem(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivideByZero),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
            _ => Err(Value::type_mismatch("%", self, rhs)),
        }
    }

    pub fn pow(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) if *b >= 0 => Ok(Value::Int(a.pow(*b as u32))),
            _ => Err(Value::type_mismatch("**", self, rhs)),
        }
    }

    pub fn lt(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
            _ => Err(Value::type_mismatch("<", self, rhs)),
        }
    }

    pub fn le(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
            _ => Err(Value::type_mismatch("<=", self, rhs)),
        }
    }

    pub fn gt(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
            _ => Err(Value::type_mismatch(">", self, rhs)),
        }
    }

    pub fn ge(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
            _ => Err(Value::type_mismatch(">=", self, rhs)),
        }
    }

    /// Structural equality; lists compare element-wise.
    pub fn values_equal(&self, rhs: &Value) -> Result<bool, RuntimeError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.values_equal(y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Err(Value::type_mismatch("==", self, rhs)),
        }
    }

    pub fn eq_value(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        Ok(Value::Bool(self.values_equal(rhs)?))
    }

    pub fn neq_value(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        Ok(Value::Bool(!self.values_equal(rhs)?))
    }

    pub fn and(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
            _ => Err(Value::type_mismatch("&&", self, rhs)),
        }
    }

    pub fn or(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
            _ => Err(Value::type_mismatch("||", self, rhs)),
        }
    }

    pub fn neg(&self) -> Result<Value, RuntimeError> {
        match self {
            Value::Int(i) => Ok(Value::Int(-i)),
            _ => Err(Value::unary_type_mismatch("-", self)),
        }
    }

    pub fn not(&self) -> Result<Value, RuntimeError> {
        match self {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            _ => Err(Value::unary_type_mismatch("!", self)),
        }
    }

    pub fn size(&self) -> Result<Value, RuntimeError> {
        match self {
            Value::String(s) => Ok(Value::Int(s.chars().count() as i32)),
            Value::List(items) => Ok(Value::Int(items.len() as i32)),
            _ => Err(Value::unary_type_mismatch("size", self)),
        }
    }

    pub fn index(&self, idx: &Value) -> Result<Value, RuntimeError> {
        let i = match idx {
            Value::Int(i) => *i,
            _ => {
                return Err(Value::type_mismatch("[]", self, idx));
            }
        };
        match self {
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let elem = bounds_check(i, chars.len())?;
                Ok(Value::String(chars[elem].to_string()))
            }
            Value::List(items) => {
                let elem = bounds_check(i, items.len())?;
                Ok(items[elem].clone())
            }
            _ => Err(Value::type_mismatch("[]", self, idx)),
        }
    }

    /// List-element replacement: returns the updated collection,
    /// it does not mutate `self`. The VM's `MODIFY` opcode uses this and
    /// writes the result back through the register file itself.
    pub fn replace(&self, idx: &Value, new_val: Value) -> Result<Value, RuntimeError> {
        let i = match idx {
            Value::Int(i) => *i,
            _ => return Err(Value::type_mismatch("[]=", self, idx)),
        };
        match self {
            Value::List(items) => {
                let elem = bounds_check(i, items.len())?;
                let mut out = items.clone();
                out[elem] = new_val;
                Ok(Value::List(out))
            }
            Value::String(s) => {
                let mut chars: Vec<char> = s.chars().collect();
                let elem = bounds_check(i, chars.len())?;
                let repl = match &new_val {
                    Value::String(r) if r.chars().count() == 1 => r.chars().next().unwrap(),
                    _ => return Err(Value::type_mismatch("[]=", self, &new_val)),
                };
                chars[elem] = repl;
                Ok(Value::String(chars.into_iter().collect()))
            }
            _ => Err(RuntimeError::TypeMismatch {
                op: "[]=".to_string(),
                lhs: self.type_tag(),
                rhs: Some(new_val.type_tag()),
            }),
        }
    }

    /// Append to a list in place (VM `APPEND`); fails on non-list receivers.
    pub fn append_in_place(&mut self, elem: Value) -> Result<(), RuntimeError> {
        match self {
            Value::List(items) => {
                items.push(elem);
                Ok(())
            }
            _ => Err(RuntimeError::TypeMismatch {
                op: "append".to_string(),
                lhs: self.type_tag(),
                rhs: Some(elem.type_tag()),
            }),
        }
    }
}

fn bounds_check(i: i32, len: usize) -> Result<usize, RuntimeError> {
    if i < 0 || i as usize >= len {
        Err(RuntimeError::IndexOutOfBounds { index: i, len })
    } else {
        Ok(i as usize)
    }
}

fn repeat_str(s: &str, n: i32) -> String {
    if n <= 0 {
        String::new()
    } else {
        s.repeat(n as usize)
    }
}

fn repeat_list(items: &[Value], n: i32) -> Vec<Value> {
    if n <= 0 {
        Vec::new()
    } else {
        let mut out = Vec::with_capacity(items.len() * n as usize);
        for _ in 0..n {
            out.extend(items.iter().cloned());
        }
        out
    }
}
