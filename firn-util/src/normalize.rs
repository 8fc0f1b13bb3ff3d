//! Normalizing target names.

/// Fold `\` into `/` so that target names are comparable across platforms.
///
/// Registry lookups and registrations both pass names through this function
/// first, so `a\b` and `a/b` are indistinguishable as target names.
pub fn normalize_name(name: &str) -> String
{
    name.replace('\\', "/")
}
