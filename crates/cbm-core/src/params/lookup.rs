//! Piecewise-linear lookup table — the representation for growth curves
//! (age → merchantable volume, spec.md §3 "Growth curves").
//!
//! Outside the defined range, values are clamped to the endpoint values
//! (spec.md §4.5 "extending the last defined volume for ages beyond the
//! table").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupTable {
    pub name: String,
    /// x values — must be strictly increasing.
    pub x: Vec<f64>,
    /// y values — same length as x.
    pub y: Vec<f64>,
}

impl LookupTable {
    pub fn new(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        assert_eq!(x.len(), y.len(), "LookupTable x and y must have equal length");
        assert!(x.len() >= 2, "LookupTable must have at least 2 points");
        Self { name: name.into(), x, y }
    }

    /// Evaluate at `x_in` using piecewise-linear interpolation, clamped
    /// to `[x[0], x[n-1]]` outside the defined range.
    pub fn eval(&self, x_in: f64) -> f64 {
        let x_clamped = x_in.clamp(self.x[0], *self.x.last().unwrap());

        let pos = self.x.partition_point(|&xi| xi <= x_clamped);
        if pos == 0 {
            return self.y[0];
        }
        if pos >= self.x.len() {
            return *self.y.last().unwrap();
        }

        let x0 = self.x[pos - 1];
        let x1 = self.x[pos];
        let y0 = self.y[pos - 1];
        let y1 = self.y[pos];
        let t = (x_clamped - x0) / (x1 - x0);
        y0 + t * (y1 - y0)
    }

    /// Volume at an integer age, ages beyond the table extend the last
    /// defined value (spec.md §4.5).
    pub fn eval_age(&self, age: u32) -> f64 {
        self.eval(age as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_interpolation() {
        let t = LookupTable::new("test", vec![0.0, 1.0, 2.0], vec![0.0, 10.0, 20.0]);
        assert!((t.eval(0.5) - 5.0).abs() < 1e-9);
        assert!((t.eval(1.5) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn clamps_outside_range() {
        let t = LookupTable::new("test", vec![0.0, 1.0], vec![5.0, 10.0]);
        assert!((t.eval(-1.0) - 5.0).abs() < 1e-9);
        assert!((t.eval(2.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn age_beyond_table_extends_last_value() {
        let t = LookupTable::new("curve", vec![0.0, 50.0, 100.0, 150.0], vec![0.0, 100.0, 150.0, 200.0]);
        assert_eq!(t.eval_age(200), 200.0);
        assert_eq!(t.eval_age(151), t.eval_age(150));
    }
}
