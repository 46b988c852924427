// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Built-in `Math`, `String`, and `Array` functions.

use understory_object::Object;

pub(crate) type Builtin = fn(&[Object]) -> Object;

pub(crate) fn lookup(name: &str) -> Option<Builtin> {
    let function: Builtin = match name {
        "Math.abs" => |a| unary_math(a, f64::abs),
        "Math.ceil" => |a| unary_math(a, f64::ceil),
        "Math.floor" => |a| unary_math(a, f64::floor),
        "Math.round" => |a| unary_math(a, |x| (x + 0.5).floor()),
        "Math.sqrt" => |a| unary_math(a, f64::sqrt),
        "Math.sign" => |a| {
            unary_math(a, |x| {
                if x.is_nan() || x == 0.0 { x } else { x.signum() }
            })
        },
        "Math.min" => |a| fold_math(a, f64::INFINITY, f64::min),
        "Math.max" => |a| fold_math(a, f64::NEG_INFINITY, f64::max),
        "Math.clamp" => math_clamp,
        "String.length" => |a| Object::from(arg(a, 0).as_string().chars().count()),
        "String.toUpperCase" => |a| Object::from(arg(a, 0).as_string().to_uppercase()),
        "String.toLowerCase" => |a| Object::from(arg(a, 0).as_string().to_lowercase()),
        "String.slice" => string_slice,
        "Array.length" => |a| Object::from(arg(a, 0).as_array().len()),
        "Array.indexOf" => array_index_of,
        "Array.slice" => array_slice,
        _ => return None,
    };
    Some(function)
}

fn arg(args: &[Object], index: usize) -> Object {
    args.get(index).cloned().unwrap_or_default()
}

fn unary_math(args: &[Object], f: fn(f64) -> f64) -> Object {
    Object::from(f(arg(args, 0).as_number()))
}

fn fold_math(args: &[Object], seed: f64, f: fn(f64, f64) -> f64) -> Object {
    let mut result = seed;
    for value in args {
        let n = value.as_number();
        if n.is_nan() {
            return Object::from(f64::NAN);
        }
        result = f(result, n);
    }
    Object::from(result)
}

fn math_clamp(args: &[Object]) -> Object {
    let low = arg(args, 0).as_number();
    let value = arg(args, 1).as_number();
    let high = arg(args, 2).as_number();
    if low.is_nan() || value.is_nan() || high.is_nan() {
        return Object::from(f64::NAN);
    }
    Object::from(value.max(low).min(high))
}

/// Resolves JavaScript style `slice(start, end)` bounds against `len`.
fn slice_bounds(len: usize, start: &Object, end: &Object) -> (usize, usize) {
    let resolve = |value: &Object, default: usize| -> usize {
        if value.is_null() {
            return default;
        }
        let i = value.as_int();
        let magnitude = usize::try_from(i.unsigned_abs()).unwrap_or(usize::MAX);
        if i < 0 {
            len.saturating_sub(magnitude)
        } else {
            magnitude.min(len)
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}

fn string_slice(args: &[Object]) -> Object {
    let chars: Vec<char> = arg(args, 0).as_string().chars().collect();
    let (start, end) = slice_bounds(chars.len(), &arg(args, 1), &arg(args, 2));
    Object::from(chars[start..end].iter().collect::<String>())
}

fn array_slice(args: &[Object]) -> Object {
    let items = arg(args, 0).as_array();
    let (start, end) = slice_bounds(items.len(), &arg(args, 1), &arg(args, 2));
    Object::from(items[start..end].to_vec())
}

fn array_index_of(args: &[Object]) -> Object {
    let needle = arg(args, 1);
    let position = arg(args, 0).as_array().iter().position(|item| *item == needle);
    match position {
        Some(i) => Object::from(i),
        None => Object::from(-1),
    }
}
