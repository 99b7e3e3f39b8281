//! Host capability probe for the accelerated variant.

use ps_core::{CapabilityProbe, ProbeError};

/// Runtime CPU feature detection.
///
/// x86_64 needs AVX2, aarch64 needs NEON, wasm32 needs the `simd128` target
/// feature. Anything else reports no support.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl CapabilityProbe for HostProbe {
    fn accelerated_supported(&self) -> Result<bool, ProbeError> {
        Ok(detect())
    }
}

#[cfg(target_arch = "x86_64")]
fn detect() -> bool {
    std::arch::is_x86_feature_detected!("avx2")
}

#[cfg(target_arch = "aarch64")]
fn detect() -> bool {
    std::arch::is_aarch64_feature_detected!("neon")
}

#[cfg(target_arch = "wasm32")]
fn detect() -> bool {
    cfg!(target_feature = "simd128")
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "wasm32")))]
fn detect() -> bool {
    false
}
