//! Detecting tool-configuration changes between runs.
//!
//! Each *component class* (`comp`, `link`) has a fixed set of configuration
//! fields; a canonical serialization of their current values is compared,
//! case-insensitively, to the one persisted from the previous run. See §4.5.

use std::{
    fs,
    io::{self, ErrorKind::NotFound},
    path::Path,
};

/// Configuration fingerprinted for the `comp` component class.
#[derive(Clone, Debug)]
pub struct CompConfig
{
    pub compile_command: String,
    pub assemble_command: String,
    pub c_depend_command: String,
    pub asm_depend_command: String,
    pub object_extension: String,
}

/// Configuration fingerprinted for the `link` component class.
#[derive(Clone, Debug)]
pub struct LinkConfig
{
    pub link_command: String,
}

/// A component class whose configuration can be fingerprinted.
pub trait Fingerprintable
{
    /// The file suffix this class persists under: `.builddata.<class_name>`.
    fn class_name(&self) -> &'static str;

    /// A stable, key-ordered serialization of the current field values.
    fn canonical(&self) -> String;
}

impl Fingerprintable for CompConfig
{
    fn class_name(&self) -> &'static str
    {
        "comp"
    }

    fn canonical(&self) -> String
    {
        format!(
            "compile_command={}\nassemble_command={}\nc_depend_command={}\n\
             asm_depend_command={}\nobject_extension={}\n",
            self.compile_command,
            self.assemble_command,
            self.c_depend_command,
            self.asm_depend_command,
            self.object_extension,
        )
    }
}

impl Fingerprintable for LinkConfig
{
    fn class_name(&self) -> &'static str
    {
        "link"
    }

    fn canonical(&self) -> String
    {
        format!("link_command={}\n", self.link_command)
    }
}

/// Path to the persisted fingerprint file for `class`, under `build_dir`.
pub fn fingerprint_path(build_dir: &Path, class: &impl Fingerprintable) -> std::path::PathBuf
{
    build_dir.join(format!(".builddata.{}", class.class_name()))
}

/// Compare `class`'s current configuration to what was persisted last run,
/// then persist the current configuration.
///
/// Returns `true` iff a previous fingerprint existed and differed
/// (case-insensitively) from the current one. See §4.5.
///
/// In clean mode the previous fingerprint is not read (comparison always
/// reports `false`), but the current configuration is still written, per
/// step 3 of §4.5 ("always, even if unchanged"); [`remove`] is what actually
/// deletes the fingerprint files at the end of a clean build.
pub fn compare_and_store(
    build_dir: &Path,
    class: &impl Fingerprintable,
    clean_mode: bool,
) -> io::Result<bool>
{
    let path = fingerprint_path(build_dir, class);
    let current = class.canonical();

    let previous = if clean_mode {
        None
    } else {
        match fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == NotFound => None,
            Err(err) => return Err(err),
        }
    };

    let changed = previous.as_ref()
        .is_some_and(|prev| prev.to_lowercase() != current.to_lowercase());

    fs::write(&path, &current)?;

    if changed {
        tracing::info!(class = class.class_name(), "configuration changed since last run");
    }

    Ok(changed)
}

/// Remove both `.builddata.comp` and `.builddata.link` under `build_dir`.
///
/// Used at the end of a clean build (§4.5). Missing files are not an error.
pub fn remove_all(build_dir: &Path) -> io::Result<()>
{
    for suffix in ["comp", "link"] {
        match fs::remove_file(build_dir.join(format!(".builddata.{suffix}"))) {
            Ok(()) => {},
            Err(err) if err.kind() == NotFound => {},
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use {super::*, tempfile::tempdir};

    fn comp(flag: &str) -> CompConfig
    {
        CompConfig {
            compile_command: format!("cc -c {flag}"),
            assemble_command: "as".into(),
            c_depend_command: "cc -MM".into(),
            asm_depend_command: "as -M".into(),
            object_extension: "o".into(),
        }
    }

    #[test]
    fn first_run_never_reports_change()
    {
        let dir = tempdir().unwrap();
        let changed = compare_and_store(dir.path(), &comp("-O2"), false).unwrap();
        assert!(!changed);
    }

    #[test]
    fn unchanged_config_reports_no_change()
    {
        let dir = tempdir().unwrap();
        compare_and_store(dir.path(), &comp("-O2"), false).unwrap();
        let changed = compare_and_store(dir.path(), &comp("-O2"), false).unwrap();
        assert!(!changed);
    }

    #[test]
    fn changed_config_reports_change()
    {
        let dir = tempdir().unwrap();
        compare_and_store(dir.path(), &comp("-O2"), false).unwrap();
        let changed = compare_and_store(dir.path(), &comp("-O3"), false).unwrap();
        assert!(changed);
    }

    #[test]
    fn comparison_is_case_insensitive()
    {
        let dir = tempdir().unwrap();
        compare_and_store(dir.path(), &comp("-O2"), false).unwrap();
        let changed = compare_and_store(dir.path(), &comp("-o2"), false).unwrap();
        assert!(!changed);
    }

    #[test]
    fn clean_mode_never_reports_change_but_still_writes()
    {
        let dir = tempdir().unwrap();
        compare_and_store(dir.path(), &comp("-O2"), false).unwrap();
        let changed = compare_and_store(dir.path(), &comp("-O3"), true).unwrap();
        assert!(!changed);
        assert!(fingerprint_path(dir.path(), &comp("-O3")).exists());
    }

    #[test]
    fn remove_all_is_idempotent_on_missing_files()
    {
        let dir = tempdir().unwrap();
        remove_all(dir.path()).unwrap();
        remove_all(dir.path()).unwrap();
    }
}
