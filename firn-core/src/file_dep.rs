//! Leaf dependencies on plain files.

use {
    crate::target::is_phony,
    firn_util::mtime,
    std::path::{Path, PathBuf},
};

/// A leaf pseudo-target wrapping a plain source file.
///
/// Created during [dependency resolution][`crate::target::Target::resolve_deps`]
/// whenever a raw dependency name does not match any registered target —
/// it is then assumed to be a plain input file belonging to the target that
/// named it (`consumer`). See §4.1.
#[derive(Clone, PartialEq)]
pub struct FileDep
{
    /// The path to the file this leaf represents.
    pub path: PathBuf,
    /// The name of the target that depends on this file.
    pub consumer: String,
}

impl FileDep
{
    /// Create a new file dependency.
    pub fn new(path: impl Into<PathBuf>, consumer: impl Into<String>) -> Self
    {
        Self { path: path.into(), consumer: consumer.into() }
    }

    /// The path this dependency represents, unless its consumer is phony.
    ///
    /// A phony consumer has no file of its own to resolve this relative to,
    /// so this deliberately returns `None` rather than the (possibly
    /// misleading) raw path — consumers that care about the path itself
    /// should read `self.path` directly.
    pub fn target_name(&self) -> Option<&Path>
    {
        if is_phony(&self.consumer) {
            None
        } else {
            Some(&self.path)
        }
    }

    /// Whether this dependency is newer than its consumer.
    ///
    /// Always `true` if the consumer is phony: a phony target has no output
    /// file to compare a timestamp against, so it is conservatively treated
    /// as always needing whatever rebuilds a real file dependency would
    /// trigger. See §4.1.
    pub fn build(&self) -> bool
    {
        if is_phony(&self.consumer) {
            return true;
        }
        mtime(&self.path) > mtime(Path::new(&self.consumer))
    }
}

#[cfg(test)]
mod tests
{
    use {super::*, std::fs, tempfile::tempdir};

    #[test]
    fn phony_consumer_is_always_stale()
    {
        let dep = FileDep::new("/does/not/exist", "#phony_all");
        assert!(dep.build());
        assert_eq!(dep.target_name(), None);
    }

    #[test]
    fn newer_source_than_consumer_is_stale()
    {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.c");
        let object = dir.path().join("a.o");
        fs::write(&object, b"old").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&source, b"new").unwrap();

        let now = std::time::SystemTime::now();
        fs::File::options().write(true).open(&object).unwrap()
            .set_modified(now - std::time::Duration::from_secs(10)).unwrap();
        fs::File::options().write(true).open(&source).unwrap()
            .set_modified(now).unwrap();

        let dep = FileDep::new(&source, object.to_str().unwrap());
        assert!(dep.build());
    }

    #[test]
    fn missing_source_does_not_force_rebuild_of_existing_consumer()
    {
        let dir = tempdir().unwrap();
        let consumer = dir.path().join("a.o");
        fs::write(&consumer, b"exists").unwrap();

        let dep = FileDep::new(dir.path().join("gone.c"), consumer.to_str().unwrap());
        assert!(!dep.build());
    }

    #[test]
    fn missing_consumer_is_older_than_existing_dependency()
    {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.c");
        fs::write(&source, b"x").unwrap();

        let dep = FileDep::new(&source, dir.path().join("gone.o").to_str().unwrap());
        assert!(dep.build());
    }
}
