//! Feature scaling implementations

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{MushroomError, Result};

/// Per-column parameters of a fitted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    scale: f64,
}

/// Column-wise scaler over dense matrices.
///
/// Each column is divided by its population standard deviation without
/// centering, so zeros stay zero. A constant column keeps scale 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Default for Scaler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scaler {
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit per-column parameters
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        self.params = x
            .axis_iter(Axis(1))
            .map(|col| self.compute_params(&col.to_owned()))
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale a matrix with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (mut col, params) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| v / params.scale);
        }
        Ok(out)
    }

    /// Scale a single row in place
    pub fn transform_row(&self, row: &mut Array1<f64>) -> Result<()> {
        self.check_width(row.len())?;
        for (v, params) in row.iter_mut().zip(&self.params) {
            *v /= params.scale;
        }
        Ok(())
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if !self.is_fitted {
            return Err(MushroomError::ModelNotFitted);
        }
        if width != self.params.len() {
            return Err(MushroomError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", width),
            });
        }
        Ok(())
    }

    fn compute_params(&self, col: &Array1<f64>) -> ScalerParams {
        let std = col.std(0.0);
        ScalerParams {
            scale: if std == 0.0 { 1.0 } else { std },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_without_centering_preserves_zeros() {
        let x = array![[1.0, 0.0], [0.0, 0.0], [1.0, 0.0], [0.0, 0.0]];
        let mut scaler = Scaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        // std of [1,0,1,0] is 0.5
        assert_eq!(scaled[[0, 0]], 2.0);
        assert_eq!(scaled[[1, 0]], 0.0);
        // constant column keeps scale 1.0
        assert_eq!(scaled.column(1).to_vec(), vec![0.0; 4]);
    }

    #[test]
    fn test_row_matches_matrix() {
        let x = array![[1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 1.0, 0.0]];
        let mut scaler = Scaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        let mut row = x.row(1).to_owned();
        scaler.transform_row(&mut row).unwrap();
        assert_eq!(row, scaled.row(1));
    }

    #[test]
    fn test_width_mismatch() {
        let mut scaler = Scaler::new();
        scaler.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(MushroomError::ShapeError { .. })
        ));
    }
}
