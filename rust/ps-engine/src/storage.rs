//! Solver buffers, optionally compressed.
//!
//! Regrets (regret matching+) and strategy sums are never negative, so the
//! compressed form stores each entry as a `u16` scaled by the vector maximum.

#[derive(Debug, Clone)]
pub enum Storage {
    Full(Vec<f32>),
    Compressed { data: Vec<u16>, scale: f32 },
}

impl Storage {
    pub fn zeros(len: usize, compressed: bool) -> Self {
        if compressed {
            Storage::Compressed {
                data: vec![0; len],
                scale: 0.0,
            }
        } else {
            Storage::Full(vec![0.0; len])
        }
    }

    pub fn bytes_per_entry(compressed: bool) -> u64 {
        if compressed {
            std::mem::size_of::<u16>() as u64
        } else {
            std::mem::size_of::<f32>() as u64
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Storage::Full(v) => v.len(),
            Storage::Compressed { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load(&self) -> Vec<f32> {
        match self {
            Storage::Full(v) => v.clone(),
            Storage::Compressed { data, scale } => {
                data.iter().map(|&q| q as f32 * scale).collect()
            }
        }
    }

    /// Overwrite with `values` (negative entries are clamped to zero).
    pub fn store(&mut self, values: &[f32]) {
        debug_assert_eq!(values.len(), self.len());
        match self {
            Storage::Full(v) => {
                for (dst, &x) in v.iter_mut().zip(values) {
                    *dst = x.max(0.0);
                }
            }
            Storage::Compressed { data, scale } => {
                let max = values.iter().copied().fold(0.0f32, f32::max);
                *scale = max / u16::MAX as f32;
                for (dst, &x) in data.iter_mut().zip(values) {
                    *dst = if max > 0.0 {
                        ((x.max(0.0) / max) * u16::MAX as f32).round() as u16
                    } else {
                        0
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_storage_keeps_proportions() {
        let mut s = Storage::zeros(4, true);
        s.store(&[0.0, 1.0, 2.5, 10.0]);
        let back = s.load();
        assert_eq!(back[0], 0.0);
        assert!((back[3] - 10.0).abs() < 1e-3);
        assert!((back[2] / back[3] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn negative_entries_clamp_to_zero() {
        let mut s = Storage::zeros(2, false);
        s.store(&[-1.0, 3.0]);
        assert_eq!(s.load(), vec![0.0, 3.0]);
    }
}
