//! query::eval
//!
//! Interpreter for parsed expressions over YAML values.
//!
//! Every expression is a generator: it maps one input value to zero or more
//! output values. Binary operators produce the cartesian product of their
//! operands' outputs.
//!
//! Assignment, update and `del` work on *paths*: an expression used on the
//! left of `=` / `|=` or inside `del` is evaluated to the list of locations
//! it addresses instead of the values there. Missing locations are created
//! on assignment, with intermediate mappings built through `null`.

use serde_yaml::{Mapping, Number, Value};

use super::parser::{Builtin, Expr};
use super::{QueryError, Scope};

/// One step of a path into a document.
#[derive(Debug, Clone, PartialEq)]
pub enum PathElem {
    Key(Value),
    Index(i64),
}

type Path = Vec<PathElem>;

/// Evaluate `expr` against `input`.
pub fn eval(expr: &Expr, input: &Value, scope: &Scope) -> Result<Vec<Value>, QueryError> {
    match expr {
        Expr::Identity => Ok(vec![input.clone()]),
        Expr::Literal(value) => Ok(vec![value.clone()]),
        Expr::Var(name) => scope
            .get(name)
            .map(|value| vec![Value::String(value.to_string())])
            .ok_or_else(|| QueryError::UndefinedVariable(name.clone())),

        Expr::Field(target, name) => {
            let key = Value::String(name.clone());
            eval(target, input, scope)?
                .iter()
                .map(|value| index(value, &key))
                .collect()
        }
        Expr::Index(target, key) => {
            let keys = eval(key, input, scope)?;
            let mut out = Vec::new();
            for value in eval(target, input, scope)? {
                for key in &keys {
                    out.push(index(&value, key)?);
                }
            }
            Ok(out)
        }
        Expr::Iterate(target) => {
            let mut out = Vec::new();
            for value in eval(target, input, scope)? {
                match untag(&value) {
                    Value::Sequence(items) => out.extend(items.iter().cloned()),
                    Value::Mapping(map) => out.extend(map.values().cloned()),
                    Value::Null => {}
                    other => {
                        return Err(QueryError::Eval(format!(
                            "cannot iterate over {}",
                            type_name(other)
                        )))
                    }
                }
            }
            Ok(out)
        }

        Expr::Pipe(left, right) => {
            let mut out = Vec::new();
            for value in eval(left, input, scope)? {
                out.extend(eval(right, &value, scope)?);
            }
            Ok(out)
        }
        Expr::Comma(left, right) => {
            let mut out = eval(left, input, scope)?;
            out.extend(eval(right, input, scope)?);
            Ok(out)
        }
        Expr::Alt(left, right) => {
            let truthy: Vec<Value> = eval(left, input, scope)
                .unwrap_or_default()
                .into_iter()
                .filter(is_truthy)
                .collect();
            if truthy.is_empty() {
                eval(right, input, scope)
            } else {
                Ok(truthy)
            }
        }
        Expr::Eq(left, right) => binary(left, right, input, scope, |a, b| {
            Ok(Value::Bool(values_equal(a, b)))
        }),
        Expr::Ne(left, right) => binary(left, right, input, scope, |a, b| {
            Ok(Value::Bool(!values_equal(a, b)))
        }),
        Expr::Add(left, right) => binary(left, right, input, scope, add),

        Expr::Assign(lhs, rhs) => {
            let targets = paths(lhs, input, scope)?;
            let mut out = Vec::new();
            for value in eval(rhs, input, scope)? {
                let mut doc = input.clone();
                for path in &targets {
                    set_path(&mut doc, path, value.clone())?;
                }
                out.push(doc);
            }
            Ok(out)
        }
        Expr::Update(lhs, update) => {
            let mut doc = input.clone();
            let mut removed = Vec::new();
            for path in paths(lhs, input, scope)? {
                let current = get_path(&doc, &path);
                match eval(update, &current, scope)?.into_iter().next() {
                    Some(value) => set_path(&mut doc, &path, value)?,
                    None => removed.push(path),
                }
            }
            delete_paths(&mut doc, removed);
            Ok(vec![doc])
        }

        Expr::Object(entries) => {
            let mut objects = vec![Mapping::new()];
            for (key, value) in entries {
                let keys = eval(key, input, scope)?;
                let values = eval(value, input, scope)?;
                let mut next = Vec::with_capacity(objects.len() * keys.len() * values.len());
                for object in &objects {
                    for key in &keys {
                        for value in &values {
                            let mut object = object.clone();
                            object.insert(key.clone(), value.clone());
                            next.push(object);
                        }
                    }
                }
                objects = next;
            }
            Ok(objects.into_iter().map(Value::Mapping).collect())
        }
        Expr::Array(inner) => {
            let items = match inner {
                Some(inner) => eval(inner, input, scope)?,
                None => Vec::new(),
            };
            Ok(vec![Value::Sequence(items)])
        }

        Expr::Call(builtin, args) => call(*builtin, args, input, scope),
    }
}

fn call(
    builtin: Builtin,
    args: &[Expr],
    input: &Value,
    scope: &Scope,
) -> Result<Vec<Value>, QueryError> {
    match (builtin, args) {
        (Builtin::Keys, []) => match untag(input) {
            Value::Mapping(map) => Ok(vec![Value::Sequence(map.keys().cloned().collect())]),
            Value::Sequence(items) => Ok(vec![Value::Sequence(
                (0..items.len() as i64).map(|i| Value::Number(i.into())).collect(),
            )]),
            other => Err(QueryError::Eval(format!(
                "{} has no keys",
                type_name(other)
            ))),
        },
        (Builtin::Length, []) => {
            let length = match untag(input) {
                Value::Null => Value::Number(0.into()),
                Value::String(s) => Value::Number((s.chars().count() as u64).into()),
                Value::Sequence(items) => Value::Number((items.len() as u64).into()),
                Value::Mapping(map) => Value::Number((map.len() as u64).into()),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Value::Number(i.unsigned_abs().into()),
                    None => Value::Number(n.as_f64().unwrap_or(f64::NAN).abs().into()),
                },
                other => {
                    return Err(QueryError::Eval(format!(
                        "{} has no length",
                        type_name(other)
                    )))
                }
            };
            Ok(vec![length])
        }
        (Builtin::Select, [cond]) => {
            let keep = eval(cond, input, scope)?.iter().filter(|v| is_truthy(v)).count();
            Ok(std::iter::repeat(input.clone()).take(keep).collect())
        }
        (Builtin::Del, [target]) => {
            let mut doc = input.clone();
            delete_paths(&mut doc, paths(target, input, scope)?);
            Ok(vec![doc])
        }
        (builtin, args) => Err(QueryError::Eval(format!(
            "{builtin:?} called with {} arguments",
            args.len()
        ))),
    }
}

fn binary(
    left: &Expr,
    right: &Expr,
    input: &Value,
    scope: &Scope,
    op: impl Fn(&Value, &Value) -> Result<Value, QueryError>,
) -> Result<Vec<Value>, QueryError> {
    let lefts = eval(left, input, scope)?;
    let rights = eval(right, input, scope)?;
    let mut out = Vec::with_capacity(lefts.len() * rights.len());
    for r in &rights {
        for l in &lefts {
            out.push(op(l, r)?);
        }
    }
    Ok(out)
}

/// Evaluate `expr` to the locations it addresses within `input`.
pub fn paths(expr: &Expr, input: &Value, scope: &Scope) -> Result<Vec<Path>, QueryError> {
    match expr {
        Expr::Identity => Ok(vec![Vec::new()]),
        Expr::Field(target, name) => Ok(paths(target, input, scope)?
            .into_iter()
            .map(|mut path| {
                path.push(PathElem::Key(Value::String(name.clone())));
                path
            })
            .collect()),
        Expr::Index(target, key) => {
            let keys = eval(key, input, scope)?;
            let mut out = Vec::new();
            for path in paths(target, input, scope)? {
                for key in &keys {
                    let elem = match key {
                        Value::Number(n) => PathElem::Index(index_of(n)?),
                        other => PathElem::Key(other.clone()),
                    };
                    let mut path = path.clone();
                    path.push(elem);
                    out.push(path);
                }
            }
            Ok(out)
        }
        Expr::Iterate(target) => {
            let mut out = Vec::new();
            for path in paths(target, input, scope)? {
                let value = get_path(input, &path);
                let children: Vec<PathElem> = match untag(&value) {
                    Value::Sequence(items) => {
                        (0..items.len() as i64).map(PathElem::Index).collect()
                    }
                    Value::Mapping(map) => map.keys().cloned().map(PathElem::Key).collect(),
                    Value::Null => Vec::new(),
                    other => {
                        return Err(QueryError::Eval(format!(
                            "cannot iterate over {}",
                            type_name(other)
                        )))
                    }
                };
                for child in children {
                    let mut path = path.clone();
                    path.push(child);
                    out.push(path);
                }
            }
            Ok(out)
        }
        Expr::Pipe(left, right) => {
            let mut out = Vec::new();
            for prefix in paths(left, input, scope)? {
                let value = get_path(input, &prefix);
                for suffix in paths(right, &value, scope)? {
                    let mut path = prefix.clone();
                    path.extend(suffix);
                    out.push(path);
                }
            }
            Ok(out)
        }
        Expr::Comma(left, right) => {
            let mut out = paths(left, input, scope)?;
            out.extend(paths(right, input, scope)?);
            Ok(out)
        }
        Expr::Call(Builtin::Select, args) => {
            let [cond] = args.as_slice() else {
                return Err(QueryError::Eval("select takes one argument".to_string()));
            };
            let keep = eval(cond, input, scope)?.iter().filter(|v| is_truthy(v)).count();
            Ok(vec![Vec::new(); keep])
        }
        other => Err(QueryError::Eval(format!(
            "invalid path expression: {}",
            describe(other)
        ))),
    }
}

fn describe(expr: &Expr) -> &'static str {
    match expr {
        Expr::Literal(_) => "literal",
        Expr::Var(_) => "variable",
        Expr::Alt(..) => "alternative",
        Expr::Eq(..) | Expr::Ne(..) => "comparison",
        Expr::Add(..) => "addition",
        Expr::Assign(..) | Expr::Update(..) => "assignment",
        Expr::Object(_) => "object construction",
        Expr::Array(_) => "array construction",
        Expr::Call(..) => "function call",
        _ => "expression",
    }
}

/// Read the value at `path`. Missing locations read as null.
pub fn get_path(value: &Value, path: &[PathElem]) -> Value {
    let mut current = value;
    for elem in path {
        let next = match (untag(current), elem) {
            (Value::Mapping(map), PathElem::Key(key)) => map.get(key),
            (Value::Sequence(items), PathElem::Index(i)) => {
                normalize(*i, items.len()).and_then(|i| items.get(i))
            }
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Write `new` at `path`, creating mappings and padding sequences as needed.
pub fn set_path(target: &mut Value, path: &[PathElem], new: Value) -> Result<(), QueryError> {
    let Some((elem, rest)) = path.split_first() else {
        *target = new;
        return Ok(());
    };

    if target.is_null() {
        *target = match elem {
            PathElem::Key(_) => Value::Mapping(Mapping::new()),
            PathElem::Index(_) => Value::Sequence(Vec::new()),
        };
    }

    let kind = type_name(target);
    let slot = match (untag_mut(target), elem) {
        (Value::Mapping(map), PathElem::Key(key)) => {
            if !map.contains_key(key) {
                map.insert(key.clone(), Value::Null);
            }
            map.get_mut(key)
        }
        (Value::Sequence(items), PathElem::Index(i)) => {
            let len = items.len();
            let index = normalize(*i, len).ok_or_else(|| {
                QueryError::Eval(format!("index {i} out of range for array of length {len}"))
            })?;
            if index >= len {
                items.resize(index + 1, Value::Null);
            }
            items.get_mut(index)
        }
        (_, PathElem::Key(key)) => {
            return Err(QueryError::Eval(format!(
                "cannot index {kind} with {}",
                render_key(key)
            )))
        }
        (_, PathElem::Index(i)) => {
            return Err(QueryError::Eval(format!("cannot index {kind} with {i}")))
        }
    };

    match slot {
        Some(slot) => set_path(slot, rest, new),
        None => Err(QueryError::Eval(format!("cannot assign into {kind}"))),
    }
}

/// Remove every path. Later sequence indices go first so earlier ones stay valid.
fn delete_paths(doc: &mut Value, mut targets: Vec<Path>) {
    targets.sort_by(|a, b| compare_paths(b, a));
    for path in targets {
        delete_path(doc, &path);
    }
}

fn delete_path(doc: &mut Value, path: &[PathElem]) {
    let Some((last, parents)) = path.split_last() else {
        *doc = Value::Null;
        return;
    };

    let mut current = doc;
    for elem in parents {
        let next = match (untag_mut(current), elem) {
            (Value::Mapping(map), PathElem::Key(key)) => map.get_mut(key),
            (Value::Sequence(items), PathElem::Index(i)) => {
                let len = items.len();
                normalize(*i, len).and_then(move |i| items.get_mut(i))
            }
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return,
        }
    }

    match (untag_mut(current), last) {
        (Value::Mapping(map), PathElem::Key(key)) => {
            if map.contains_key(key) {
                *map = std::mem::take(map)
                    .into_iter()
                    .filter(|(k, _)| k != key)
                    .collect();
            }
        }
        (Value::Sequence(items), PathElem::Index(i)) => {
            if let Some(i) = normalize(*i, items.len()).filter(|i| *i < items.len()) {
                items.remove(i);
            }
        }
        _ => {}
    }
}

fn compare_paths(a: &[PathElem], b: &[PathElem]) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b) {
        if let (PathElem::Index(x), PathElem::Index(y)) = (x, y) {
            match x.cmp(y) {
                std::cmp::Ordering::Equal => {}
                other => return other,
            }
        }
    }
    a.len().cmp(&b.len())
}

fn index(value: &Value, key: &Value) -> Result<Value, QueryError> {
    match (untag(value), key) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Mapping(map), key) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        (Value::Sequence(items), Value::Number(n)) => {
            let i = index_of(n)?;
            Ok(normalize(i, items.len())
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
        (other, key) => Err(QueryError::Eval(format!(
            "cannot index {} with {}",
            type_name(other),
            render_key(key)
        ))),
    }
}

fn index_of(n: &Number) -> Result<i64, QueryError> {
    n.as_i64()
        .ok_or_else(|| QueryError::Eval(format!("array index must be an integer, got {n}")))
}

/// Resolve a possibly negative index. Indices past the end are kept.
fn normalize(i: i64, len: usize) -> Option<usize> {
    if i >= 0 {
        usize::try_from(i).ok()
    } else {
        let back = usize::try_from(i.unsigned_abs()).ok()?;
        len.checked_sub(back)
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, QueryError> {
    match (untag(left), untag(right)) {
        (Value::Null, other) | (other, Value::Null) => Ok(other.clone()),
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                if let Some(sum) = a.checked_add(b) {
                    return Ok(Value::Number(sum.into()));
                }
            }
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            Ok(Value::Number((a + b).into()))
        }
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::Sequence(a), Value::Sequence(b)) => {
            Ok(Value::Sequence(a.iter().chain(b).cloned().collect()))
        }
        (Value::Mapping(a), Value::Mapping(b)) => {
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Ok(Value::Mapping(merged))
        }
        (a, b) => Err(QueryError::Eval(format!(
            "cannot add {} and {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

/// Structural equality where `1` equals `1.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (untag(a), untag(b)) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Sequence(x), Value::Sequence(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Mapping(x), Value::Mapping(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        (x, y) => x == y,
    }
}

fn is_truthy(value: &Value) -> bool {
    !matches!(untag(value), Value::Null | Value::Bool(false))
}

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

fn untag_mut(value: &mut Value) -> &mut Value {
    match value {
        Value::Tagged(tagged) => untag_mut(&mut tagged.value),
        other => other,
    }
}

fn type_name(value: &Value) -> &'static str {
    match untag(value) {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "array",
        Value::Mapping(_) => "object",
        Value::Tagged(_) => "tagged value",
    }
}

fn render_key(key: &Value) -> String {
    match key {
        Value::String(s) => format!("{s:?}"),
        Value::Number(n) => n.to_string(),
        other => type_name(other).to_string(),
    }
}
