//! Maps a (access kind, size) pair to the name of the access-helper this
//! pass should emit a `CCALL` to. The helpers themselves live in
//! `shadowtrace-access` and are named to match (`read4`, `write1`,
//! `fpu_read_check`, ...).

/// Resolve the load-helper name for a given transfer size. Sizes outside
/// `{1,2,4,8}` are a misuse of [`crate::classify::OpClass::Load`] — FPU/
/// vector-sized reads must classify as `FpuRead` instead.
pub fn load_helper_name(size: u32) -> Option<&'static str> {
    match size {
        1 => Some("read1"),
        2 => Some("read2"),
        4 => Some("read4"),
        8 => Some("read8"),
        _ => None,
    }
}

/// Resolve the store-helper name for a given transfer size.
pub fn store_helper_name(size: u32) -> Option<&'static str> {
    match size {
        1 => Some("write1"),
        2 => Some("write2"),
        4 => Some("write4"),
        8 => Some("write8"),
        _ => None,
    }
}

/// Name of the FPU/vector read-check helper, uniform across sizes (8, 10,
/// 16, 28, 108, 512).
pub const FPU_READ_HELPER: &str = "fpu_read_check";

/// Name of the FPU/vector write-check helper.
pub const FPU_WRITE_HELPER: &str = "fpu_write_check";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sizes_resolve() {
        assert_eq!(load_helper_name(4), Some("read4"));
        assert_eq!(store_helper_name(1), Some("write1"));
    }

    #[test]
    fn unknown_size_is_none() {
        assert_eq!(load_helper_name(16), None);
        assert_eq!(store_helper_name(3), None);
    }
}
