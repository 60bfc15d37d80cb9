//! Monotonic timestamps on the clock head-pose queries are made against

/// Nanoseconds since boot, including time spent suspended
#[cfg(any(target_os = "android", target_os = "linux"))]
pub fn boot_time_nanos() -> i64 {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // CLOCK_BOOTTIME is always available on these targets
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut ts) };
    if rc != 0 {
        log::warn!("clock: clock_gettime(CLOCK_BOOTTIME) failed");
        return 0;
    }
    ts.tv_sec as i64 * 1_000_000_000 + ts.tv_nsec as i64
}

/// Nanoseconds since the first call, for hosts without a boot clock
#[cfg(not(any(target_os = "android", target_os = "linux")))]
pub fn boot_time_nanos() -> i64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_goes_backwards() {
        let a = boot_time_nanos();
        let b = boot_time_nanos();
        assert!(b >= a);
        assert!(a >= 0);
    }
}
