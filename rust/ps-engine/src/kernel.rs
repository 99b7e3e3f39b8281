//! Dot-product kernels, one per engine variant.

const LANES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Scalar,
    /// Eight independent accumulators; vectorizes on SIMD hosts.
    Lanes,
}

impl Kernel {
    #[inline]
    pub fn dot(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Kernel::Scalar => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Kernel::Lanes => dot_lanes(a, b),
        }
    }
}

fn dot_lanes(a: &[f32], b: &[f32]) -> f32 {
    let ca = a.chunks_exact(LANES);
    let cb = b.chunks_exact(LANES);
    let tail: f32 = ca
        .remainder()
        .iter()
        .zip(cb.remainder())
        .map(|(x, y)| x * y)
        .sum();
    let mut acc = [0.0f32; LANES];
    for (xa, xb) in ca.zip(cb) {
        for k in 0..LANES {
            acc[k] += xa[k] * xb[k];
        }
    }
    acc.iter().sum::<f32>() + tail
}
