//! The dynamically-typed data view templates render against.

use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// A host callback bindable as a template-visible function.
///
/// Invoked with an optional `this` binding (the object the name was resolved
/// through) and an ordered argument list; returns the call's result.
pub type HostFn = Rc<dyn Fn(Option<&Value>, &[Value]) -> Value>;

/// The value type a template's view, and every value reached while resolving
/// a dotted name within it, is expressed in.
#[derive(Clone, Default)]
pub enum Value {
    /// The absence of a value. Lookups that find nothing also report as this.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. Templates do not distinguish integers from floats.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered list.
    Array(Vec<Value>),
    /// A keyed mapping with insertion order preserved.
    Object(IndexMap<String, Value>),
    /// A host-provided callable.
    Function(HostFn),
    /// A computation that has not resolved yet.
    Deferred(Rc<crate::host::Deferred>),
}

impl Value {
    /// Builds an empty object view, the default used when `render` is called
    /// with no view at all.
    pub fn empty_object() -> Self {
        Value::Object(IndexMap::new())
    }

    /// Returns true if this value is undefined in the template sense (`Null`
    /// or an absent lookup result; `false`, `0`, and `""` are *not* null).
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Evaluates the value's truthiness the way `if` and `each` do: `Null`,
    /// `false`, `0`, and `""` are falsy; empty arrays/objects are truthy
    /// (presence of the collection itself is what is tested).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Deferred(_) => true,
        }
    }

    /// Returns true if this value is callable.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Calls this value as a function. Panics if not callable; callers must
    /// check [`Value::is_callable`] first.
    pub fn call(&self, this: Option<&Value>, args: &[Value]) -> Value {
        match self {
            Value::Function(f) => f(this, args),
            _ => Value::Null,
        }
    }

    /// Looks up a key on this value if it is an object, or an index if it is
    /// an array; returns `None` (not `Value::Null`) when the value has no
    /// such member at all, which callers use to decide whether to keep
    /// walking up the context chain.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => map.get(key).cloned(),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            _ => None,
        }
    }

    /// Returns the number of entries, for the `arrayLength` helper.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            Value::String(s) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Returns true if `needle` is present in this value when treated as an
    /// array, for the `inArray` helper.
    pub fn contains(&self, needle: &Value) -> bool {
        match self {
            Value::Array(items) => items.iter().any(|item| item.loosely_equals(needle)),
            _ => false,
        }
    }

    /// Loose equality matching the `===`/`!==` conditional operators, which
    /// compare by value rather than by reference.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            _ => false,
        }
    }

    /// Compares two values for ordering, used by `<`, `<=`, `>`, `>=`.
    /// Numbers compare numerically; everything else compares as a string.
    pub fn partial_cmp(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            _ => self.to_display_string().partial_cmp(&other.to_display_string()),
        }
    }

    /// Parses a string as an integer, the way `lookupWithReserved` does for
    /// any numerically-parseable literal.
    pub fn parse_integer(s: &str) -> Option<Value> {
        s.trim().parse::<i64>().ok().map(|n| Value::Number(n as f64))
    }

    /// Stringifies the value the way the default escaper does before
    /// escaping: numbers without a trailing `.0`, booleans as `true`/`false`,
    /// `Null` as an empty string.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Deferred(_) => {
                String::new()
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => write!(f, "Array({items:?})"),
            Value::Object(map) => write!(f, "Object({map:?})"),
            Value::Function(_) => write!(f, "Function(..)"),
            Value::Deferred(_) => write!(f, "Deferred(..)"),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}
