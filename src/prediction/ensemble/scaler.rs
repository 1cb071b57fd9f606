// src/prediction/ensemble/scaler.rs

/// Per-feature standardization. Zero-variance columns get std 1 so they pass
/// through centered instead of dividing by zero.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl StandardScaler {
    pub fn fit(&mut self, x: &[Vec<f32>]) {
        let n_features = x.first().map(|r| r.len()).unwrap_or(0);
        let n = x.len().max(1) as f64;

        let mut mean = vec![0.0f64; n_features];
        for row in x {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += *v as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0f64; n_features];
        for row in x {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (*v as f64 - m).powi(2);
            }
        }

        self.mean = mean.iter().map(|m| *m as f32).collect();
        self.std = var
            .iter()
            .map(|s| {
                let sd = (s / n).sqrt();
                if sd < 1e-12 {
                    1.0
                } else {
                    sd as f32
                }
            })
            .collect();
    }

    pub fn transform(&self, row: &[f32]) -> Vec<f32> {
        row.iter()
            .enumerate()
            .map(|(i, v)| match (self.mean.get(i), self.std.get(i)) {
                (Some(m), Some(s)) => (v - m) / s,
                _ => *v,
            })
            .collect()
    }

    pub fn fit_transform(&mut self, x: &[Vec<f32>]) -> Vec<Vec<f32>> {
        self.fit(x);
        x.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_columns() {
        let x = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let mut scaler = StandardScaler::default();
        let out = scaler.fit_transform(&x);
        assert!((out[0][0] + 1.0).abs() < 1e-6);
        assert!((out[1][0] - 1.0).abs() < 1e-6);
        // constant column is centered, not NaN
        assert_eq!(out[0][1], 0.0);
        assert_eq!(out[1][1], 0.0);
    }
}
