/// runs `f` once, compiled for the widest vector extension the cpu reports
///
/// the lane loops of the interpreter are plain `for i in 0..N` loops, inlining them into one of these
/// trampolines is what lets the compiler vectorize them
#[inline(always)]
pub fn dispatch<F: FnOnce()>(f: F) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return unsafe { with_avx2(f) };
        }

        if is_x86_feature_detected!("sse4.1") {
            return unsafe { with_sse41(f) };
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            return unsafe { with_neon(f) };
        }
    }

    f()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn with_avx2<F: FnOnce()>(f: F) {
    f()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
unsafe fn with_sse41<F: FnOnce()>(f: F) {
    f()
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn with_neon<F: FnOnce()>(f: F) {
    f()
}
