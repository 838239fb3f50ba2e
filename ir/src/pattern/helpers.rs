//! Helper predicates for rule actions.
//!
//! Rule actions receive graph handles from the binder; these helpers
//! look at the constants behind them.

use crate::graph::{ArgId, Graph};
use crate::tensor::ConstTensor;

/// Check if an arg is a constant whose elements are all zero.
#[inline]
pub fn is_zero(graph: &Graph, arg: ArgId) -> bool {
    graph.constant_value(arg).is_some_and(ConstTensor::is_all_zero)
}

/// Exponent `e` with `value == 2^e`, for positive finite powers of two.
pub fn power_of_two_exponent(value: f32) -> Option<i32> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    let exp = value.log2().round() as i32;
    (2f32.powi(exp) == value).then_some(exp)
}
