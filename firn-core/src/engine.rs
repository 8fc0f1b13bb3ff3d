//! The build driver: target storage, the staleness algorithm, and the
//! two-phase header-dependency pipeline.
//!
//! Everything else in this crate is inert data; `Engine` is what actually
//! walks the graph. See §4 of the specification for the algorithm this
//! module implements step by step.

use {
    crate::{
        command::{expand_template, Command},
        dep_file,
        error::BuildError,
        fingerprint::{self, CompConfig, LinkConfig},
        options::{validate_choice, OptionRegistry, OptionSpec, OptionValue},
        registry::{Registry, TargetId},
        target::{Dep, HookContext, ResolvedDep, Target, TargetKind},
    },
    firn_util::{linearize, mtime, shell_command, MISSING_MTIME},
    std::{
        cell::RefCell,
        collections::HashMap,
        fs, io,
        path::{Path, PathBuf},
        rc::Rc,
    },
};

/// Where object files and other generated intermediates are placed (§4.7).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode
{
    /// Next to the source file, sharing its directory.
    KeepDir,
    /// Directly under `build_dir`, keeping only the source's file name.
    BuildDir,
    /// Under `build_dir`, with the source's full relative path flattened
    /// into the file name so that two sources with the same basename in
    /// different directories cannot collide.
    BuildDirLinearized,
}

/// Whether a stale target prints its fully-expanded command or a short
/// kind-plus-name label (§4.3 "Display").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DisplayMode
{
    All,
    Summary,
}

/// One source file to be compiled or assembled into an executable, as
/// passed to [`Engine::make_exe_target`] (§4.8).
pub struct Source
{
    pub path: PathBuf,
    /// Whether a header-dependency target should be generated for this
    /// source and spliced in ahead of its compile/assemble target.
    pub make_dep_target: bool,
}

/// The build driver.
///
/// Owns every target ever constructed (via `registry`), the accumulated
/// cross-build state (fingerprints, `dep_results`), and the handful of
/// configuration knobs exposed through `options` (§6, §12).
pub struct Engine
{
    pub registry: Registry,
    /// Forces every target's command to run regardless of staleness; set
    /// directly by a caller, or by [`Engine::fingerprint_comp`] when the
    /// compiler configuration changed since the previous run (§4.5).
    pub global_force_rebuild: bool,
    /// When set, every non-phony target's output is removed instead of
    /// rebuilt, and fingerprints are deleted at the end of the build (§4.5,
    /// scenario S6).
    pub clean_mode: bool,
    pub disp_mode: DisplayMode,
    pub build_mode: BuildMode,
    pub build_dir: PathBuf,
    output_dir_created: bool,
    // Populated by a dep target's post-hook, read by the compile target's
    // pre-hook, for the source the two targets share. Shared via `Rc` so
    // that hook closures don't need a back-reference to the engine itself
    // (see the "Cyclic references" design note).
    dep_results: Rc<RefCell<HashMap<PathBuf, Vec<String>>>>,
    options: OptionRegistry,
}

impl Engine
{
    /// A new engine rooted at `build_dir`, with `summary` display and
    /// `build_dir`-mode object placement, and the standard option set
    /// registered (§6, §12).
    pub fn new(build_dir: impl Into<PathBuf>) -> Self
    {
        let mut options = OptionRegistry::new();
        options.register(OptionSpec {
            name: "disp_mode",
            help: "print the expanded command (all) or a short label (summary) for each stale target",
            default: OptionValue::Str("summary".into()),
            allowed: Some(&["all", "summary"]),
            validate: validate_choice(&["all", "summary"]),
        });
        options.register(OptionSpec {
            name: "build_mode",
            help: "where intermediate object files are placed",
            default: OptionValue::Str("build_dir".into()),
            allowed: Some(&["keep_dir", "build_dir", "build_dir_linearized"]),
            validate: validate_choice(&["keep_dir", "build_dir", "build_dir_linearized"]),
        });
        options.register(OptionSpec {
            name: "build_dir",
            help: "directory holding object files, dep files, and fingerprints",
            default: OptionValue::Str("build".into()),
            allowed: None,
            validate: Box::new(|v| if v.is_empty() {
                Err("build_dir must not be empty".into())
            } else {
                Ok(OptionValue::Str(v.to_owned()))
            }),
        });

        Self {
            registry: Registry::new(),
            global_force_rebuild: false,
            clean_mode: false,
            disp_mode: DisplayMode::Summary,
            build_mode: BuildMode::BuildDir,
            build_dir: build_dir.into(),
            output_dir_created: false,
            dep_results: Rc::new(RefCell::new(HashMap::new())),
            options,
        }
    }

    /// The option registry, for `--help`-style rendering (§12).
    pub fn options(&self) -> &OptionRegistry
    {
        &self.options
    }

    /// Validate and apply a named option (§12). Unknown options and invalid
    /// values are reported the same way [`OptionRegistry::validate`] reports
    /// them; `name` must be one of the options registered in [`Engine::new`].
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), BuildError>
    {
        let validated = self.options.validate(name, value)?;
        match (name, validated) {
            ("disp_mode", OptionValue::Str(s)) => {
                self.disp_mode = if s == "all" { DisplayMode::All } else { DisplayMode::Summary };
            },
            ("build_mode", OptionValue::Str(s)) => {
                self.build_mode = match s.as_str() {
                    "keep_dir" => BuildMode::KeepDir,
                    "build_dir_linearized" => BuildMode::BuildDirLinearized,
                    _ => BuildMode::BuildDir,
                };
            },
            ("build_dir", OptionValue::Str(s)) => {
                self.build_dir = PathBuf::from(s);
                self.output_dir_created = false;
            },
            _ => unreachable!("registered option without a matching arm"),
        }
        Ok(())
    }

    fn ensure_build_dir(&mut self) -> Result<(), BuildError>
    {
        if self.output_dir_created {
            return Ok(());
        }
        fs::create_dir_all(&self.build_dir)
            .map_err(|err| BuildError::CreateBuildDir(self.build_dir.clone(), err))?;
        self.output_dir_created = true;
        Ok(())
    }

    /// Build `target_name` and everything it transitively depends on (§4.4).
    ///
    /// Resets the per-build `already_run` bookkeeping, ensures `build_dir`
    /// exists, then drives [`Engine::build_target`]. In clean mode, removes
    /// the persisted fingerprints once the traversal finishes (§4.5, S6).
    pub fn build(&mut self, target_name: &str) -> Result<bool, BuildError>
    {
        self.registry.reset_run_state();
        self.ensure_build_dir()?;

        let id = self.registry.lookup(target_name).ok_or_else(|| {
            let mut available: Vec<&str> = self.registry.names().collect();
            available.sort_unstable();
            BuildError::TargetNotFound {
                name: target_name.to_owned(),
                available: available.join("\n"),
            }
        })?;

        let stale = self.build_target(id)?;

        if self.clean_mode {
            fingerprint::remove_all(&self.build_dir)?;
        }

        Ok(stale)
    }

    /// Drive a single target through the staleness algorithm (§4.3).
    ///
    /// Recurses into every dependency first (depth-first, so the leaves of
    /// the graph run before the targets that consume them); returns whether
    /// the target's command ran and should count as "stale" to its own
    /// parent.
    pub fn build_target(&mut self, id: TargetId) -> Result<bool, BuildError>
    {
        let name = self.registry.name_of(id).to_owned();

        if self.registry.already_run(&name) {
            tracing::debug!(target = %name, "no-op, already memoized");
            return Ok(false);
        }

        let mut target = self.registry.take(id)?;
        let target_path = target.target_path().map(Path::to_path_buf);

        let initial = target_path.as_deref()
            .map(|p| !matches!(fs::metadata(p), Ok(meta) if meta.is_file()))
            .unwrap_or(false)
            || self.global_force_rebuild;

        let (mut resolved, mut depends, mut run_command) =
            self.resolve_and_fold(&target, target_path.as_deref(), initial)?;

        if let Some(mut hook) = target.pre_hook.take() {
            let before = target.raw_deps.clone();
            {
                let mut ctx = HookContext {
                    target_name: &target.name,
                    will_run_command: run_command,
                    raw_deps: &mut target.raw_deps,
                };
                hook(&mut ctx);
            }
            if target.raw_deps != before {
                let (r2, d2, rc2) = self.resolve_and_fold(&target, target_path.as_deref(), initial)?;
                resolved = r2;
                depends = d2;
                run_command = rc2;
            }
            target.pre_hook = Some(hook);
        }

        run_command |= target.force_rebuild;
        run_command |= self.clean_mode;

        let mut keep = true;

        if run_command {
            self.display(&target, &depends, resolved.first());
            tracing::info!(kind = target.kind.label(), target = %target.name, "target rebuilt");

            if self.clean_mode {
                if let Some(path) = &target_path {
                    match fs::remove_file(path) {
                        Ok(()) => {},
                        Err(err) if err.kind() == io::ErrorKind::NotFound => {
                            tracing::warn!(target = %target.name, "failed!");
                        },
                        Err(err) => return Err(BuildError::Io(err)),
                    }
                }
            } else if let Some(command) = &target.command {
                match command {
                    Command::Template(template) => {
                        let first = resolved.first()
                            .and_then(|dep| dep.target_name(&self.registry))
                            .map(Path::to_path_buf);
                        let expanded = expand_template(template, &target.name, &depends, first.as_deref());
                        let status = shell_command(&expanded).status().map_err(BuildError::Io)?;
                        match status.code() {
                            Some(0) => {},
                            other => {
                                let code = other.unwrap_or(-1);
                                return Err(BuildError::CommandFailed {
                                    target: target.name.clone(),
                                    status: code,
                                    last_command: Some(expanded),
                                });
                            },
                        }
                    },
                    Command::Thunk(thunk) => {
                        let code = thunk(&target.name, &resolved, &self.registry, target.extra_args.as_ref());
                        match code {
                            0 => {},
                            1 => keep = false,
                            other => {
                                return Err(BuildError::CommandFailed {
                                    target: target.name.clone(),
                                    status: other,
                                    last_command: None,
                                });
                            },
                        }
                    },
                }
            }
        }

        if let Some(mut hook) = target.post_hook.take() {
            let mut ctx = HookContext {
                target_name: &target.name,
                will_run_command: run_command,
                raw_deps: &mut target.raw_deps,
            };
            hook(&mut ctx);
            target.post_hook = Some(hook);
        }

        self.registry.mark_run(name);
        target.resolved_deps = resolved;
        self.registry.put(id, target);

        Ok(run_command && keep)
    }

    /// Resolve `target`'s deps against the registry, recursing into every
    /// target dependency first, and fold the three staleness contributions
    /// of §4.3 step 4 into a single `run_command` bool plus a `depends`
    /// string for template expansion.
    fn resolve_and_fold(
        &mut self,
        target: &Target,
        target_path: Option<&Path>,
        mut run_command: bool,
    ) -> Result<(Vec<ResolvedDep>, String, bool), BuildError>
    {
        let resolved = target.resolve_deps(&self.registry);
        let mut depends = String::new();

        for dep in &resolved {
            let child_stale = match dep {
                ResolvedDep::Target(child_id) => self.build_target(*child_id)?,
                ResolvedDep::FileDep(file_dep) => file_dep.build(),
            };
            run_command |= child_stale;

            if let ResolvedDep::Target(child_id) = dep {
                if let Some(child_path) = self.registry.get(*child_id).target_path() {
                    let child_mtime = mtime(child_path);
                    let self_mtime = target_path.map(mtime).unwrap_or(MISSING_MTIME);
                    run_command |= child_mtime > self_mtime;
                }
            }

            if let Some(path) = dep.target_name(&self.registry) {
                if !depends.is_empty() {
                    depends.push(' ');
                }
                depends.push_str(&path.to_string_lossy());
            }
        }

        Ok((resolved, depends, run_command))
    }

    fn display(&self, target: &Target, depends: &str, first: Option<&ResolvedDep>)
    {
        if self.disp_mode == DisplayMode::All {
            if let Some(Command::Template(template)) = &target.command {
                let first_path = first
                    .and_then(|dep| dep.target_name(&self.registry))
                    .map(Path::to_path_buf);
                let expanded = expand_template(template, &target.name, depends, first_path.as_deref());
                println!("{expanded}");
                return;
            }
        }
        println!("{:>6} {}", target.kind.label(), target.name);
    }

    /// Fingerprint a `comp` configuration against the previous run, setting
    /// [`Engine::global_force_rebuild`] if it changed (§4.5).
    ///
    /// Must be called before the build traversal that should be affected by
    /// the change starts; [`Engine::make_exe_target`] calls this itself.
    pub fn fingerprint_comp(&mut self, comp: &CompConfig) -> Result<(), BuildError>
    {
        if fingerprint::compare_and_store(&self.build_dir, comp, self.clean_mode)? {
            self.global_force_rebuild = true;
        }
        Ok(())
    }

    // -- §4.6: command-template factory methods --------------------------

    pub fn compile_command_template(compiler: &str, flags: &[String]) -> String
    {
        let flags = flags.join(" ");
        format!("{compiler} -c {flags} -o $(TARGET) $(FIRST)")
    }

    pub fn assemble_command_template(assembler: &str, flags: &[String]) -> String
    {
        let flags = flags.join(" ");
        format!("{assembler} {flags} -o $(TARGET) $(FIRST)")
    }

    pub fn c_depend_command_template(compiler: &str, defines: &[String], includes: &[String]) -> String
    {
        let defines: Vec<String> = defines.iter().map(|d| format!("-D{d}")).collect();
        let includes: Vec<String> = includes.iter().map(|i| format!("-I{i}")).collect();
        format!("{compiler} -E -MM {} {} $(FIRST) > $(TARGET)", defines.join(" "), includes.join(" "))
    }

    pub fn asm_depend_command_template(assembler: &str, includes: &[String]) -> String
    {
        let includes: Vec<String> = includes.iter().map(|i| format!("-I{i}")).collect();
        format!("{assembler} -M {} $(FIRST) > $(TARGET)", includes.join(" "))
    }

    pub fn link_command_template(linker: &str, flags: &[String], libs: &[String]) -> String
    {
        let flags = flags.join(" ");
        let libs: Vec<String> = libs.iter().map(|l| format!("-l{l}")).collect();
        format!("{linker} {flags} -o $(TARGET) $(DEPENDS) {}", libs.join(" "))
    }

    // -- §4.7: object-file placement ---------------------------------------

    /// Where the object file for `source` lives, under the current
    /// [`BuildMode`].
    pub fn object_path(&self, source: &Path, object_extension: &str) -> PathBuf
    {
        match self.build_mode {
            BuildMode::KeepDir => source.with_extension(object_extension),
            BuildMode::BuildDir => {
                let file_name = source.file_name().unwrap_or_else(|| std::ffi::OsStr::new(""));
                self.build_dir.join(file_name).with_extension(object_extension)
            },
            BuildMode::BuildDirLinearized => {
                let linearized = linearize(source);
                self.build_dir.join(linearized).with_extension(object_extension)
            },
        }
    }

    /// Where the `.d` header-dependency file for `source` lives. Always
    /// linearized under `build_dir`, regardless of [`BuildMode`], so that
    /// two sources sharing a basename never clobber each other's dep file
    /// even in `keep_dir` mode (§4.8).
    pub fn dep_path(&self, source: &Path) -> PathBuf
    {
        self.build_dir.join(format!("{}.d", linearize(source)))
    }

    fn is_assembly_source(path: &Path) -> bool
    {
        matches!(
            path.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase).as_deref(),
            Some("s") | Some("asm")
        )
    }

    /// Append the platform executable extension if `exe_name` has none
    /// (§4.8 point 3). A no-op everywhere but Windows, where executables
    /// are conventionally suffixed `.exe`.
    fn apply_exe_extension(exe_name: &str) -> String
    {
        if cfg!(windows) && Path::new(exe_name).extension().is_none() {
            format!("{exe_name}.exe")
        } else {
            exe_name.to_owned()
        }
    }

    // -- §4.8: the two-phase header-dependency pipeline ---------------------

    /// Wire up a full compile-and-link pipeline for an executable: one dep
    /// target and one compile/assemble target per source, then a link
    /// target depending on every object.
    ///
    /// Returns the id of the link target. See §4.8 and the "Two-phase
    /// dependency refinement" design note for why the dep targets and the
    /// `dep_results` map exist at all instead of just depending on the
    /// sources directly.
    pub fn make_exe_target(
        &mut self,
        exe_name: &str,
        sources: &[Source],
        comp: &CompConfig,
        link: &LinkConfig,
    ) -> Result<TargetId, BuildError>
    {
        self.fingerprint_comp(comp)?;
        let link_changed = fingerprint::compare_and_store(&self.build_dir, link, self.clean_mode)?;

        let mut object_ids = Vec::with_capacity(sources.len());

        for source in sources {
            let is_asm = Self::is_assembly_source(&source.path);

            let dep_id = if source.make_dep_target {
                let dep_path = self.dep_path(&source.path);
                let dep_command = if is_asm {
                    comp.asm_depend_command.clone()
                } else {
                    comp.c_depend_command.clone()
                };

                let mut dep_target = Target::new(dep_path.to_string_lossy().into_owned(), TargetKind::Depend);
                dep_target.raw_deps = match fs::read_to_string(&dep_path) {
                    Ok(contents) => Dep::Raw(dep_file::parse(&contents).join(" ")),
                    Err(_) => Dep::Raw(source.path.to_string_lossy().into_owned()),
                };
                dep_target.command = Some(Command::Template(dep_command));

                let dep_results = Rc::clone(&self.dep_results);
                let source_path = source.path.clone();
                dep_target.post_hook = Some(Box::new(move |ctx| {
                    if let Ok(contents) = fs::read_to_string(ctx.target_name) {
                        dep_results.borrow_mut().insert(source_path.clone(), dep_file::parse(&contents));
                    }
                }));

                Some(self.registry.register(dep_target))
            } else {
                None
            };

            let object_path = self.object_path(&source.path, &comp.object_extension);
            let compile_command = if is_asm {
                comp.assemble_command.clone()
            } else {
                comp.compile_command.clone()
            };
            let compile_kind = if is_asm { TargetKind::Assemble } else { TargetKind::Compile };

            let mut compile_target = Target::new(object_path.to_string_lossy().into_owned(), compile_kind);
            compile_target.command = Some(Command::Template(compile_command));
            compile_target.raw_deps = match dep_id {
                Some(dep_id) => Dep::Node(ResolvedDep::Target(dep_id)),
                None => Dep::Raw(source.path.to_string_lossy().into_owned()),
            };

            if dep_id.is_some() {
                let dep_results = Rc::clone(&self.dep_results);
                let source_path = source.path.clone();
                compile_target.pre_hook = Some(Box::new(move |ctx| {
                    if let Some(headers) = dep_results.borrow().get(&source_path) {
                        *ctx.raw_deps = Dep::Raw(headers.join(" "));
                    }
                }));
            }

            object_ids.push(self.registry.register(compile_target));
        }

        let mut link_target = Target::new(Self::apply_exe_extension(exe_name), TargetKind::Link);
        link_target.command = Some(Command::Template(link.link_command.clone()));
        link_target.raw_deps = Dep::Nested(
            object_ids.iter().map(|id| Dep::Node(ResolvedDep::Target(*id))).collect(),
        );
        link_target.force_rebuild = link_changed;

        Ok(self.registry.register(link_target))
    }
}

#[cfg(test)]
mod tests
{
    use {
        super::*,
        crate::target::ExtraArgs,
        std::sync::{atomic::{AtomicUsize, Ordering}, Arc},
        tempfile::tempdir,
    };

    fn counting_thunk(counter: Arc<AtomicUsize>) -> Command
    {
        Command::Thunk(Arc::new(move |_name: &str, _deps: &[ResolvedDep], _registry: &Registry, _extra: Option<&ExtraArgs>| {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        }))
    }

    #[test]
    fn compile_command_template_has_all_three_tokens()
    {
        let template = Engine::compile_command_template("cc", &["-O2".into()]);
        assert!(template.contains("$(TARGET)"));
        assert!(template.contains("$(FIRST)"));
    }

    #[test]
    fn link_command_template_uses_depends_not_first()
    {
        let template = Engine::link_command_template("cc", &[], &["m".into()]);
        assert!(template.contains("$(DEPENDS)"));
        assert!(template.contains("-lm"));
    }

    #[test]
    fn object_path_keep_dir_stays_beside_source()
    {
        let mut engine = Engine::new("/build");
        engine.build_mode = BuildMode::KeepDir;
        let path = engine.object_path(Path::new("src/a.c"), "o");
        assert_eq!(path, Path::new("src/a.o"));
    }

    #[test]
    fn object_path_build_dir_drops_source_directory()
    {
        let mut engine = Engine::new("build");
        engine.build_mode = BuildMode::BuildDir;
        let path = engine.object_path(Path::new("src/nested/a.c"), "o");
        assert_eq!(path, Path::new("build/a.o"));
    }

    #[test]
    fn object_path_linearized_disambiguates_same_basename()
    {
        let mut engine = Engine::new("build");
        engine.build_mode = BuildMode::BuildDirLinearized;
        let a = engine.object_path(Path::new("src/one/a.c"), "o");
        let b = engine.object_path(Path::new("src/two/a.c"), "o");
        assert_ne!(a, b);
    }

    #[test]
    fn missing_target_errors_with_available_names()
    {
        let dir = tempdir().unwrap();
        let mut engine = Engine::new(dir.path());
        engine.registry.register(Target::new("#phony_all", TargetKind::Phony));
        let err = engine.build("nonexistent").unwrap_err();
        assert!(matches!(err, BuildError::TargetNotFound { available, .. } if available.contains("#phony_all")));
    }

    #[test]
    fn stale_target_with_no_output_file_runs_once()
    {
        let dir = tempdir().unwrap();
        let mut engine = Engine::new(dir.path());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut target = Target::new(dir.path().join("out.bin").to_string_lossy().into_owned(), TargetKind::Generic);
        target.command = Some(counting_thunk(Arc::clone(&counter)));
        engine.registry.register(target);

        let ran = engine.build(&dir.path().join("out.bin").to_string_lossy()).unwrap();
        assert!(ran);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fresh_output_with_no_deps_does_not_rerun()
    {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        fs::write(&out, b"already built").unwrap();
        let mut engine = Engine::new(dir.path());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut target = Target::new(out.to_string_lossy().into_owned(), TargetKind::Generic);
        target.command = Some(counting_thunk(Arc::clone(&counter)));
        engine.registry.register(target);

        let ran = engine.build(&out.to_string_lossy()).unwrap();
        assert!(!ran);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn already_run_target_is_not_visited_twice_in_one_build()
    {
        let dir = tempdir().unwrap();
        let mut engine = Engine::new(dir.path());
        let counter = Arc::new(AtomicUsize::new(0));

        let shared = dir.path().join("shared.o");
        let mut shared_target = Target::new(shared.to_string_lossy().into_owned(), TargetKind::Generic);
        shared_target.command = Some(counting_thunk(Arc::clone(&counter)));
        let shared_id = engine.registry.register(shared_target);

        let mut a = Target::new(dir.path().join("a.bin").to_string_lossy().into_owned(), TargetKind::Generic);
        a.raw_deps = Dep::Node(ResolvedDep::Target(shared_id));
        engine.registry.register(a);

        let mut top = Target::new("#phony_all", TargetKind::Phony);
        top.raw_deps = Dep::Raw(format!("{} {}", dir.path().join("a.bin").display(), shared.display()));
        engine.registry.register(top);

        engine.build("#phony_all").unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn global_force_rebuild_reruns_fresh_target()
    {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        fs::write(&out, b"already built").unwrap();
        let mut engine = Engine::new(dir.path());
        engine.global_force_rebuild = true;
        let counter = Arc::new(AtomicUsize::new(0));

        let mut target = Target::new(out.to_string_lossy().into_owned(), TargetKind::Generic);
        target.command = Some(counting_thunk(Arc::clone(&counter)));
        engine.registry.register(target);

        let ran = engine.build(&out.to_string_lossy()).unwrap();
        assert!(ran);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clean_mode_removes_output_instead_of_running_command()
    {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        fs::write(&out, b"already built").unwrap();
        let mut engine = Engine::new(dir.path());
        engine.clean_mode = true;
        let counter = Arc::new(AtomicUsize::new(0));

        let mut target = Target::new(out.to_string_lossy().into_owned(), TargetKind::Generic);
        target.command = Some(counting_thunk(Arc::clone(&counter)));
        engine.registry.register(target);

        engine.build(&out.to_string_lossy()).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!out.exists());
    }

    #[test]
    fn thunk_returning_one_is_not_marked_stale_to_parent()
    {
        let dir = tempdir().unwrap();
        let mut engine = Engine::new(dir.path());

        let mut child = Target::new(dir.path().join("child.o").to_string_lossy().into_owned(), TargetKind::Generic);
        child.command = Some(Command::Thunk(Arc::new(|_, _, _, _| 1)));
        engine.registry.register(child);

        let ran = engine.build(&dir.path().join("child.o").to_string_lossy()).unwrap();
        assert!(!ran);
    }

    #[test]
    fn dependency_cycle_is_reported_not_infinite_looped()
    {
        let dir = tempdir().unwrap();
        let mut engine = Engine::new(dir.path());

        let a_name = dir.path().join("a.bin").to_string_lossy().into_owned();
        let b_name = dir.path().join("b.bin").to_string_lossy().into_owned();

        let mut a = Target::new(a_name.clone(), TargetKind::Generic);
        a.raw_deps = Dep::Raw(b_name.clone());
        engine.registry.register(a);

        let mut b = Target::new(b_name, TargetKind::Generic);
        b.raw_deps = Dep::Raw(a_name.clone());
        engine.registry.register(b);

        let err = engine.build(&a_name).unwrap_err();
        assert!(matches!(err, BuildError::Cycle(_)));
    }

    #[test]
    fn make_exe_target_wires_dep_compile_and_link_targets()
    {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.c");
        fs::write(&source, b"int main(void) { return 0; }\n").unwrap();

        let mut engine = Engine::new(dir.path());
        let comp = CompConfig {
            compile_command: Engine::compile_command_template("cc", &[]),
            assemble_command: Engine::assemble_command_template("as", &[]),
            c_depend_command: Engine::c_depend_command_template("cc", &[], &[]),
            asm_depend_command: Engine::asm_depend_command_template("as", &[]),
            object_extension: "o".into(),
        };
        let link = LinkConfig { link_command: Engine::link_command_template("cc", &[], &[]) };

        let exe = dir.path().join("a.out").to_string_lossy().into_owned();
        let link_id = engine.make_exe_target(
            &exe,
            &[Source { path: source.clone(), make_dep_target: true }],
            &comp,
            &link,
        ).unwrap();

        assert_eq!(engine.registry.name_of(link_id), firn_util::normalize_name(&exe));
        assert!(matches!(engine.registry.get(link_id).kind, TargetKind::Link));
        assert_eq!(engine.registry.get(link_id).resolved_deps.len(), 0);

        let dep_path = engine.dep_path(&source);
        assert!(engine.registry.lookup(&dep_path.to_string_lossy()).is_some());
    }

    use std::sync::Mutex;

    /// A `Command::Thunk` that records `label` in `log` and writes `contents`
    /// to `write_path`, standing in for a real compiler/linker invocation.
    fn logging_thunk(label: &'static str, log: Arc<Mutex<Vec<String>>>, write_path: PathBuf, contents: &'static [u8]) -> Command
    {
        Command::Thunk(Arc::new(move |_name: &str, _deps: &[ResolvedDep], _registry: &Registry, _extra: Option<&ExtraArgs>| {
            log.lock().unwrap().push(label.to_owned());
            fs::write(&write_path, contents).unwrap();
            0
        }))
    }

    /// Wire a dep/compile/link pipeline by hand, mirroring
    /// [`Engine::make_exe_target`]'s wiring exactly but with
    /// [`Command::Thunk`] stand-ins instead of shelled-out compiler
    /// templates, so the staleness algorithm can be exercised end to end
    /// without a real toolchain.
    fn wire_exe_with_thunks(
        engine: &mut Engine,
        source: &Path,
        dep_path: &Path,
        object_path: &Path,
        exe_path: &Path,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> TargetId
    {
        let mut dep_target = Target::new(dep_path.to_string_lossy().into_owned(), TargetKind::Depend);
        dep_target.raw_deps = match fs::read_to_string(dep_path) {
            Ok(contents) => Dep::Raw(dep_file::parse(&contents).join(" ")),
            Err(_) => Dep::Raw(source.to_string_lossy().into_owned()),
        };
        dep_target.command = Some(logging_thunk("dep", Arc::clone(log), dep_path.to_path_buf(), b"obj: source\n"));

        let dep_results = Rc::clone(&engine.dep_results);
        let source_path = source.to_path_buf();
        dep_target.post_hook = Some(Box::new(move |ctx| {
            if let Ok(contents) = fs::read_to_string(ctx.target_name) {
                dep_results.borrow_mut().insert(source_path.clone(), dep_file::parse(&contents));
            }
        }));
        let dep_id = engine.registry.register(dep_target);

        let mut compile_target = Target::new(object_path.to_string_lossy().into_owned(), TargetKind::Compile);
        compile_target.raw_deps = Dep::Node(ResolvedDep::Target(dep_id));
        compile_target.command = Some(logging_thunk("compile", Arc::clone(log), object_path.to_path_buf(), b"obj"));

        let dep_results = Rc::clone(&engine.dep_results);
        let source_path = source.to_path_buf();
        compile_target.pre_hook = Some(Box::new(move |ctx| {
            if let Some(headers) = dep_results.borrow().get(&source_path) {
                *ctx.raw_deps = Dep::Raw(headers.join(" "));
            }
        }));
        let compile_id = engine.registry.register(compile_target);

        let mut link_target = Target::new(exe_path.to_string_lossy().into_owned(), TargetKind::Link);
        link_target.raw_deps = Dep::Node(ResolvedDep::Target(compile_id));
        link_target.command = Some(logging_thunk("link", Arc::clone(log), exe_path.to_path_buf(), b"exe"));

        engine.registry.register(link_target)
    }

    #[test]
    fn build_drives_two_phase_pipeline_through_cold_warm_touch_and_forced_rebuild()
    {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.c");
        fs::write(&source, b"int main(void) { return 0; }\n").unwrap();

        let mut engine = Engine::new(dir.path());
        let dep_path = engine.dep_path(&source);
        let object_path = engine.object_path(&source, "o");
        let exe_path = dir.path().join("a.out");
        let log = Arc::new(Mutex::new(Vec::new()));

        let link_id = wire_exe_with_thunks(&mut engine, &source, &dep_path, &object_path, &exe_path, &log);
        let exe_name = exe_path.to_string_lossy().into_owned();

        // S1: cold build runs all three commands, in dependency order.
        let ran = engine.build(&exe_name).unwrap();
        assert!(ran);
        assert_eq!(*log.lock().unwrap(), vec!["dep", "compile", "link"]);

        // S2: nothing changed, so the warm rebuild is a total no-op.
        log.lock().unwrap().clear();
        let ran = engine.build(&exe_name).unwrap();
        assert!(!ran);
        assert!(log.lock().unwrap().is_empty());

        // S3: touching the source past every generated output forces the
        // whole chain to redo its work, since each output is now older than
        // its dependency.
        log.lock().unwrap().clear();
        let future = std::time::SystemTime::now() + std::time::Duration::from_secs(10);
        fs::File::options().write(true).open(&source).unwrap().set_modified(future).unwrap();
        let ran = engine.build(&exe_name).unwrap();
        assert!(ran);
        assert_eq!(*log.lock().unwrap(), vec!["dep", "compile", "link"]);

        // S4: nothing touched, but a forced rebuild (standing in for a
        // changed compiler-flag fingerprint) still reruns every command.
        log.lock().unwrap().clear();
        engine.global_force_rebuild = true;
        let ran = engine.build(&exe_name).unwrap();
        assert!(ran);
        assert_eq!(*log.lock().unwrap(), vec!["dep", "compile", "link"]);

        assert!(matches!(engine.registry.get(link_id).kind, TargetKind::Link));
    }
}
