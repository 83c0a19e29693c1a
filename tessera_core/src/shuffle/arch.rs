//! Runtime selection among the vector kernel sets.

use super::Implementation;

#[cfg(target_arch = "x86_64")]
use super::{avx2, sse2};

#[cfg(target_arch = "aarch64")]
use super::neon;

/// Best variant supported by the running CPU, if any beats the portable one.
pub(super) fn detect() -> Option<Implementation> {
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") {
            return Some(avx2::IMPLEMENTATION);
        }
        if std::arch::is_x86_feature_detected!("sse2") {
            return Some(sse2::IMPLEMENTATION);
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            return Some(neon::IMPLEMENTATION);
        }
    }
    None
}

/// Every variant this CPU can run, for cross-checking in tests.
#[cfg(test)]
pub(super) fn available() -> Vec<Implementation> {
    let mut all = Vec::new();
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("sse2") {
            all.push(sse2::IMPLEMENTATION);
        }
        if std::arch::is_x86_feature_detected!("avx2") {
            all.push(avx2::IMPLEMENTATION);
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            all.push(neon::IMPLEMENTATION);
        }
    }
    all
}
