//! MNA matrix assembly and solving.

use crate::error::{CircuitError, Result};

use super::PIVOT_EPSILON;

/// Dense nodal system G·v = b.
///
/// Rows and columns are the non-ground nodes of a topology. Stamp helpers
/// take `Option<usize>` indices where `None` is the ground node, whose
/// row and column are left out of the system.
#[derive(Debug, Clone)]
pub struct MnaMatrix {
    /// System matrix G (row-major)
    pub a: Vec<f64>,
    /// Source vector b
    pub z: Vec<f64>,
    /// Solution vector v
    pub x: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// LU decomposition of G
    pub lu: Vec<f64>,
    /// Pivot indices for LU decomposition
    pub pivots: Vec<usize>,
}

impl MnaMatrix {
    /// Create a zeroed system with `size` unknowns.
    pub fn new(size: usize) -> Self {
        Self {
            a: vec![0.0; size * size],
            z: vec![0.0; size],
            x: vec![0.0; size],
            size,
            lu: vec![0.0; size * size],
            pivots: vec![0; size],
        }
    }

    /// Clear the matrix and source vector to zero.
    pub fn clear(&mut self) {
        self.a.fill(0.0);
        self.z.fill(0.0);
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Add to source vector element, ignoring ground.
    pub fn add_source(&mut self, row: Option<usize>, value: f64) {
        if let Some(i) = row {
            self.z[i] += value;
        }
    }

    /// Stamp a conductance between two nodes.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Stamp a current source between two nodes.
    /// Current is drawn out of n+ and delivered into n-.
    pub fn stamp_current_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, current: f64) {
        self.add_source(n_pos, -current);
        self.add_source(n_neg, current);
    }

    /// Stamp a voltage source V[n+] - V[n-] = E as a Norton pair: a large
    /// conductance `g` between the nodes with a current g·E pushed into n+.
    ///
    /// The pinned difference deviates from E by I/g for a load current I.
    pub fn stamp_voltage_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, voltage: f64, g: f64) {
        self.stamp_conductance(n_pos, n_neg, g);
        self.stamp_current_source(n_pos, n_neg, -g * voltage);
    }

    /// Add `epsilon` to every diagonal entry so that floating nodes stay solvable.
    pub fn regularize(&mut self, epsilon: f64) {
        for i in 0..self.size {
            self.add(i, i, epsilon);
        }
    }

    /// Perform LU decomposition with partial pivoting.
    pub fn factor(&mut self) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);

        for i in 0..n {
            self.pivots[i] = i;
        }

        for k in 0..n {
            // Find pivot
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if !(max_val >= PIVOT_EPSILON) {
                return Err(CircuitError::SingularMatrix);
            }

            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }

        Ok(())
    }

    /// Solve the system using the pre-computed LU decomposition.
    pub fn solve(&mut self) -> Result<()> {
        let n = self.size;

        // Apply pivot permutation to z
        for i in 0..n {
            self.x[i] = self.z[self.pivots[i]];
        }

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
            self.x[i] /= self.lu[i * n + i];
        }

        if self.x.iter().any(|v| !v.is_finite()) {
            return Err(CircuitError::SingularMatrix);
        }
        Ok(())
    }

    /// Get the voltage at a matrix index (handling ground).
    pub fn voltage(&self, node: Option<usize>) -> f64 {
        match node {
            Some(i) => self.x[i],
            None => 0.0,
        }
    }
}
