//! Flattening a path into a single filesystem-safe component.

use std::path::Path;

/// Replace every path separator in `path` with `__`, producing a single
/// component suitable for placing under a flat build directory.
///
/// `src/drivers/uart.c` becomes `src__drivers__uart.c`. Used for
/// `build_dir_linearized` object placement (§4.7) and unconditionally for
/// `.d` dependency-file names (§4.8), which always live flattened under
/// `build_dir` regardless of the configured object-placement mode.
pub fn linearize(path: &Path) -> String
{
    path.to_string_lossy().replace(['/', '\\'], "__")
}

#[cfg(test)]
mod tests
{
    use super::*;
    use std::path::Path;

    #[test]
    fn replaces_both_separator_styles()
    {
        assert_eq!(linearize(Path::new("src/drivers/uart.c")), "src__drivers__uart.c");
        assert_eq!(linearize(Path::new("src\\drivers\\uart.c")), "src__drivers__uart.c");
    }

    #[test]
    fn single_component_is_unchanged()
    {
        assert_eq!(linearize(Path::new("a.c")), "a.c");
    }
}
