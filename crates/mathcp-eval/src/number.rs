//! Numeric values produced by evaluation.

use std::fmt;

/// An integer stays exact until it meets a float or a division.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, Number::Int(_))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(x) => f.write_str(&format_float(x)),
        }
    }
}

/// Shortest round-trip rendering. Floats always carry a `.` or an
/// exponent so they never read as integers; magnitudes outside
/// `[1e-4, 1e16)` switch to exponent form (`1e-05`, `1e+16`).
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let repr = format!("{x:e}");
        if let Some((mantissa, exponent)) = repr.split_once('e') {
            if let Ok(exp) = exponent.parse::<i32>() {
                let sign = if exp < 0 { '-' } else { '+' };
                return format!("{mantissa}e{sign}{:02}", exp.abs());
            }
        }
        return repr;
    }

    let repr = format!("{x}");
    if repr.contains('.') {
        repr
    } else {
        format!("{repr}.0")
    }
}
