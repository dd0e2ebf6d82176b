//! Well-known combinators and the classical bases built from them.

use crate::basis::{Basis, Combinator};

/// Names accepted by [`by_name`].
pub const NAMES: &[&str] = &["sk", "ski", "bckw", "iota", "church", "schonfinkel"];

fn define(name: char, arguments: &str, definition: &str) -> Combinator {
    Combinator {
        name,
        arguments: arguments.chars().collect(),
        definition: definition.to_owned(),
    }
}

/// Identity: `I x = x`.
pub fn i() -> Combinator {
    define('I', "x", "x")
}

/// Constancy: `K x y = x`.
pub fn k() -> Combinator {
    define('K', "xy", "x")
}

/// Interchange: `T x y z = xzy`.
pub fn t() -> Combinator {
    define('T', "xyz", "xzy")
}

/// Composition: `Z x y z = x(yz)`.
pub fn z() -> Combinator {
    define('Z', "xyz", "x(yz)")
}

/// Fusion: `S x y z = xz(yz)`.
pub fn s() -> Combinator {
    define('S', "xyz", "xz(yz)")
}

pub fn b() -> Combinator {
    define('B', "xyz", "x(yz)")
}

pub fn c() -> Combinator {
    define('C', "xyz", "xzy")
}

pub fn w() -> Combinator {
    define('W', "xy", "xyy")
}

/// `i x = xSK`. Its body refers to `S` and `K`, so it only works in a basis
/// that also defines them.
pub fn iota_i() -> Combinator {
    define('i', "x", "xSK")
}

pub fn zero() -> Combinator {
    define('0', "fx", "x")
}

pub fn succ() -> Combinator {
    define('S', "nfx", "f(nfx)")
}

pub fn plus() -> Combinator {
    define('P', "mnfx", "mf(nfx)")
}

pub fn mult() -> Combinator {
    define('M', "mnfx", "m(nf)x")
}

pub fn exp() -> Combinator {
    define('E', "mnfx", "nmfx")
}

/// Schönfinkel's original five.
pub fn schonfinkel() -> Basis {
    Basis::from_iter([i(), k(), t(), z(), s()])
}

pub fn sk() -> Basis {
    Basis::from_iter([s(), k()])
}

pub fn ski() -> Basis {
    Basis::from_iter([s(), k(), i()])
}

pub fn bckw() -> Basis {
    Basis::from_iter([b(), c(), k(), w()])
}

pub fn iota() -> Basis {
    Basis::from_iter([s(), k(), iota_i()])
}

/// Church numerals: `0`, successor `S`, plus `P`, times `M`, exponent `E`.
pub fn church() -> Basis {
    Basis::from_iter([zero(), succ(), plus(), mult(), exp()])
}

pub fn by_name(name: &str) -> Option<Basis> {
    Some(match name.to_ascii_lowercase().as_str() {
        "sk" => sk(),
        "ski" => ski(),
        "bckw" => bckw(),
        "iota" => iota(),
        "church" => church(),
        "schonfinkel" | "schönfinkel" => schonfinkel(),
        _ => return None,
    })
}
