//! Parsing compiler-emitted Make-style `.d` dependency files.

/// Parse the dependency list out of the contents of a `.d` file.
///
/// Follows the Make convention: `target: dep1 dep2 \` with backslash-newline
/// continuations. The target and the colon are discarded; backslash-newlines
/// and plain newlines both become spaces; runs of whitespace collapse to a
/// single separator.
pub fn parse(contents: &str) -> Vec<String>
{
    let after_colon = match contents.find(':') {
        Some(idx) => &contents[idx + 1 ..],
        None => return Vec::new(),
    };

    let flattened = after_colon.replace("\\\n", " ").replace('\n', " ");
    flattened.split_whitespace().map(str::to_owned).collect()
}
