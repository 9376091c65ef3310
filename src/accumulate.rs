//! Aggregate accumulators: one small capability — `accumulate(value) ->
//! took_it` — parameterized over the declared numeric domain, rather than
//! four near-identical hand-written scan routines.
//!
//! Null values never participate in any aggregate; this matches the
//! ordinary convention of SQL-style aggregate functions and keeps the
//! null-sorts-lowest rule used by [`crate::value::cmp_mixed`] (needed for
//! `sort`) from silently making every min() return null whenever one is
//! present.

use crate::value::{cmp_mixed, Value, ValueKind, ValueType};

/// Which numeric representation an aggregate should accumulate into,
/// selected by the column's declared value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericDomain {
    Int,
    Float,
    Double,
    /// Declared type is `Mixed` (or `Decimal`): accumulate in `f64` and
    /// report the result as `Value::Double`.
    Mixed,
}

impl NumericDomain {
    pub fn for_declared(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Int => NumericDomain::Int,
            ValueType::Float => NumericDomain::Float,
            ValueType::Double => NumericDomain::Double,
            _ => NumericDomain::Mixed,
        }
    }

    /// The typed zero reported by `sum` over an empty collection.
    pub fn zero(self) -> Value {
        match self {
            NumericDomain::Int => Value::Int(0),
            NumericDomain::Float => Value::Float(0.0),
            NumericDomain::Double | NumericDomain::Mixed => Value::Double(0.0),
        }
    }
}

/// Accumulates a running sum, tracking how many values actually
/// participated (were non-null and numeric).
pub struct SumAccumulator {
    domain: NumericDomain,
    int_sum: i64,
    float_sum: f32,
    double_sum: f64,
    count: usize,
}

impl SumAccumulator {
    pub fn new(domain: NumericDomain) -> Self {
        SumAccumulator {
            domain,
            int_sum: 0,
            float_sum: 0.0,
            double_sum: 0.0,
            count: 0,
        }
    }

    /// Folds `value` in. Returns whether it participated.
    pub fn accumulate(&mut self, value: &Value) -> bool {
        if value.is_null() {
            return false;
        }
        let Some(n) = value.as_numeric() else {
            return false;
        };
        match self.domain {
            NumericDomain::Int => self.int_sum += n as i64,
            NumericDomain::Float => self.float_sum += n as f32,
            NumericDomain::Double | NumericDomain::Mixed => self.double_sum += n,
        }
        self.count += 1;
        true
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Consumes the accumulator, returning the typed sum.
    pub fn finish(self) -> Value {
        match self.domain {
            NumericDomain::Int => Value::Int(self.int_sum),
            NumericDomain::Float => Value::Float(self.float_sum),
            NumericDomain::Double => Value::Double(self.double_sum),
            NumericDomain::Mixed => Value::Double(self.double_sum),
        }
    }
}

/// Computes an average as sum/count, returning `Value::Null` if nothing
/// participated.
pub struct AvgAccumulator(SumAccumulator);

impl AvgAccumulator {
    pub fn new(domain: NumericDomain) -> Self {
        AvgAccumulator(SumAccumulator::new(domain))
    }

    pub fn accumulate(&mut self, value: &Value) -> bool {
        self.0.accumulate(value)
    }

    pub fn finish(self) -> Value {
        let count = self.0.count();
        if count == 0 {
            return Value::Null;
        }
        let sum = self.0.finish();
        let total = sum.as_numeric().expect("sum of numerics is numeric");
        match self.0.domain {
            NumericDomain::Int => Value::Double(total / count as f64),
            NumericDomain::Float => Value::Float((total / count as f64) as f32),
            NumericDomain::Double | NumericDomain::Mixed => Value::Double(total / count as f64),
        }
    }
}

/// Which extremum an [`ExtremumAccumulator`] is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

/// Tracks the running min/max over the total order of [`cmp_mixed`],
/// skipping nulls, and remembers the absolute position of the first entry
/// that achieved it (ties broken by traversal order).
pub struct ExtremumAccumulator {
    which: Extremum,
    best: Option<Value>,
    best_ndx: Option<usize>,
}

impl ExtremumAccumulator {
    pub fn new(which: Extremum) -> Self {
        ExtremumAccumulator {
            which,
            best: None,
            best_ndx: None,
        }
    }

    /// Folds `value`, found at absolute position `ndx`, in.
    pub fn accumulate(&mut self, ndx: usize, value: &Value) -> bool {
        if value.is_null() {
            return false;
        }
        let better = match &self.best {
            None => true,
            Some(cur) => match self.which {
                Extremum::Min => cmp_mixed(value, cur) == std::cmp::Ordering::Less,
                Extremum::Max => cmp_mixed(value, cur) == std::cmp::Ordering::Greater,
            },
        };
        if better {
            self.best = Some(value.clone());
            self.best_ndx = Some(ndx);
        }
        true
    }

    /// Returns the extremum value (or `Value::Null` if nothing
    /// participated) and the absolute position it was found at.
    pub fn finish(self) -> (Value, Option<usize>) {
        (self.best.unwrap_or(Value::Null), self.best_ndx)
    }
}

/// True if `kind` is something [`SumAccumulator`]/[`ExtremumAccumulator`]
/// can meaningfully fold in (numeric, for sum; anything non-null, for
/// min/max).
pub fn is_numeric_kind(kind: ValueKind) -> bool {
    matches!(
        kind,
        ValueKind::Int | ValueKind::Float | ValueKind::Double | ValueKind::Decimal
    )
}
