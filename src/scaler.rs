use ndarray::{ArrayView2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

/// Per-column min-max scaling to `[0, 1]`.
///
/// Constant columns keep a unit scale, so they map to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    scale: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit on a feature matrix (rows = samples). The label is never part of `x`.
    pub fn fit(x: ArrayView2<'_, f32>) -> Self {
        let mut min = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for col in x.axis_iter(Axis(1)) {
            let (lo, hi) = col.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                let v = f64::from(v);
                (lo.min(v), hi.max(v))
            });
            let (lo, hi) = if lo.is_finite() { (lo, hi) } else { (0.0, 0.0) };
            let range = hi - lo;
            min.push(lo);
            scale.push(if range > 0.0 { 1.0 / range } else { 1.0 });
        }
        Self { min, scale }
    }

    pub fn n_features(&self) -> usize {
        self.min.len()
    }

    /// Scale one row in place. Values outside the fitted range extrapolate.
    pub fn transform_row(&self, row: &mut [f32]) {
        self.transform_view(ArrayViewMut1::from(row))
    }

    pub fn transform_view(&self, mut row: ArrayViewMut1<'_, f32>) {
        debug_assert_eq!(row.len(), self.min.len());
        for ((v, lo), s) in row.iter_mut().zip(&self.min).zip(&self.scale) {
            *v = ((f64::from(*v) - lo) * s) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_and_transform() {
        let x = array![[0.0f32, 100.0, 1.0], [10.0, 300.0, 1.0], [5.0, 200.0, 1.0]];
        let scaler = MinMaxScaler::fit(x.view());
        assert_eq!(scaler.n_features(), 3);

        let mut row = [5.0f32, 300.0, 1.0];
        scaler.transform_row(&mut row);
        assert_eq!(row, [0.5, 1.0, 0.0]);
    }

    #[test]
    fn test_one_hot_columns_stay_binary() {
        let x = array![[0.0f32], [1.0], [0.0]];
        let scaler = MinMaxScaler::fit(x.view());
        let mut on = [1.0f32];
        let mut off = [0.0f32];
        scaler.transform_row(&mut on);
        scaler.transform_row(&mut off);
        assert_eq!((on[0], off[0]), (1.0, 0.0));
    }

    #[test]
    fn test_unseen_range_extrapolates() {
        let x = array![[10.0f32], [20.0]];
        let scaler = MinMaxScaler::fit(x.view());
        let mut row = [30.0f32];
        scaler.transform_row(&mut row);
        assert_eq!(row[0], 2.0);
    }

    #[test]
    fn test_view_and_slice_paths_agree() {
        let x = array![[1.0f32, 7.0], [3.0, 9.0]];
        let scaler = MinMaxScaler::fit(x.view());

        let mut m = x.clone();
        scaler.transform_view(m.row_mut(0));
        let mut r = [1.0f32, 7.0];
        scaler.transform_row(&mut r);
        assert_eq!(m.row(0).to_vec(), r.to_vec());
    }
}
