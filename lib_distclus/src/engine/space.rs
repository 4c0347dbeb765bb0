//! Distance and combination rules engines delegate to.

use super::Elemt;

/// A metric space over elements.
pub trait Space: Send + Sync + std::fmt::Debug {
    /// Distance between two elements of the same dimension.
    fn dist(&self, a: &[f64], b: &[f64]) -> f64;

    /// Weighted barycenter of `elemts`. `None` when the input is empty.
    fn combine(&self, elemts: &[(&[f64], f64)]) -> Option<Elemt>;

    /// Dimension of an element as this space sees it.
    fn dim(&self, elemt: &[f64]) -> usize {
        elemt.len()
    }
}

/// Euclidean space; combination is the weighted arithmetic mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct Real;

impl Space for Real {
    fn dist(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }

    fn combine(&self, elemts: &[(&[f64], f64)]) -> Option<Elemt> {
        let (first, _) = elemts.first()?;
        let mut acc = vec![0.0; first.len()];
        let mut total = 0.0;
        for (elemt, weight) in elemts {
            for (a, x) in acc.iter_mut().zip(elemt.iter()) {
                *a += x * weight;
            }
            total += weight;
        }
        if total <= 0.0 {
            return None;
        }
        acc.iter_mut().for_each(|a| *a /= total);
        Some(acc)
    }
}
