use anyhow::{anyhow, ensure, Result};
use faer::{prelude::*, solvers::PartialPivLu, Mat};

/// Trait for solving dense linear systems (Ax = b).
///
/// The DC power flow builds one reduced susceptance matrix per island and
/// hands it here. A singular system must come back as an error, never as a
/// vector of infinities.
pub trait LinearSystemBackend: Send + Sync {
    /// Solve the linear system Ax = b
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>>;

    fn name(&self) -> &'static str;
}

fn check_system(matrix: &[Vec<f64>], rhs: &[f64]) -> Result<()> {
    let n = matrix.len();
    ensure!(
        rhs.len() == n,
        "rhs length ({}) does not match matrix dimension {}",
        rhs.len(),
        n
    );
    ensure!(
        matrix.iter().all(|row| row.len() == n),
        "matrix must be square"
    );
    Ok(())
}

fn check_solution(solution: Vec<f64>) -> Result<Vec<f64>> {
    if solution.iter().all(|x| x.is_finite()) {
        Ok(solution)
    } else {
        Err(anyhow!("singular matrix: solution is not finite"))
    }
}

/// Gaussian elimination with partial pivoting.
#[derive(Debug, Clone, Default)]
pub struct GaussSolver;

impl LinearSystemBackend for GaussSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        check_system(matrix, rhs)?;
        let n = matrix.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut a = matrix.to_vec();
        let mut b = rhs.to_vec();

        for i in 0..n {
            let mut pivot = i;
            for row in i + 1..n {
                if a[row][i].abs() > a[pivot][i].abs() {
                    pivot = row;
                }
            }
            if pivot != i {
                a.swap(i, pivot);
                b.swap(i, pivot);
            }

            let diag = a[i][i];
            if diag.abs() < 1e-12 {
                return Err(anyhow!("singular matrix (pivot {i})"));
            }

            for value in a[i][i..].iter_mut() {
                *value /= diag;
            }
            b[i] /= diag;

            let pivot_segment = a[i][i..].to_vec();
            for row in (0..n).filter(|&row| row != i) {
                let factor = a[row][i];
                if factor == 0.0 {
                    continue;
                }
                for (target, &p) in a[row][i..].iter_mut().zip(pivot_segment.iter()) {
                    *target -= factor * p;
                }
                b[row] -= factor * b[i];
            }
        }

        check_solution(b)
    }

    fn name(&self) -> &'static str {
        "gauss"
    }
}

/// LU with partial pivoting from `faer`.
#[derive(Debug, Clone, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        check_system(matrix, rhs)?;
        let n = matrix.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let mat = Mat::from_fn(n, n, |i, j| matrix[i][j]);
        let rhs_mat = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&rhs_mat);

        check_solution((0..n).map(|i| sol.read(i, 0)).collect())
    }

    fn name(&self) -> &'static str {
        "faer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backends() -> Vec<Box<dyn LinearSystemBackend>> {
        vec![Box::new(GaussSolver), Box::new(FaerSolver)]
    }

    #[test]
    fn test_backends_agree_on_pivoting_system() {
        // zero in the leading position forces a row swap
        let matrix = vec![
            vec![0.0, 2.0, 1.0],
            vec![1.0, 1.0, 0.0],
            vec![2.0, 0.0, 3.0],
        ];
        let rhs = vec![7.0, 3.0, 11.0];
        for backend in backends() {
            let x = backend.solve(&matrix, &rhs).unwrap();
            let expected = [1.0, 2.0, 3.0];
            for (got, want) in x.iter().zip(expected) {
                assert!((got - want).abs() < 1e-9, "{}: {x:?}", backend.name());
            }
        }
    }

    #[test]
    fn test_gauss_rejects_singular_matrix() {
        let matrix = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(GaussSolver.solve(&matrix, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        for backend in backends() {
            assert!(backend.solve(&[vec![1.0]], &[1.0, 2.0]).is_err());
            assert!(backend
                .solve(&[vec![1.0, 0.0], vec![1.0]], &[1.0, 2.0])
                .is_err());
        }
    }

    #[test]
    fn test_empty_system() {
        for backend in backends() {
            assert!(backend.solve(&[], &[]).unwrap().is_empty());
        }
    }
}
