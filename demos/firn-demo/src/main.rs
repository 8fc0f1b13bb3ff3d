//! A manual wiring example for `firn-core`.
//!
//! Hand-builds a small two-source firmware project (`main.c`, `startup.s`
//! linked into `firmware.elf`) and drives it through [`Engine::build`].
//! This is the process-exit boundary referred to in `firn_core::error`: the
//! core only ever returns a `Result`, and something embedding it decides
//! what to do with the error — here, print it and exit non-zero.

use firn_core::{CompConfig, Dep, Engine, LinkConfig, ResolvedDep, Source, Target, TargetKind};

fn main()
{
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let mut goal = "#phony_all".to_owned();
    let mut engine = Engine::new("build");

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--clean" => engine.clean_mode = true,
            "--force" => engine.global_force_rebuild = true,
            "--disp-mode" => {
                let value = args.next().unwrap_or_else(|| "summary".to_owned());
                if let Err(err) = engine.set_option("disp_mode", &value) {
                    eprintln!("{err}");
                    std::process::exit(1);
                }
            },
            other => goal = other.to_owned(),
        }
    }

    if let Err(err) = run(&mut engine, &goal) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(engine: &mut Engine, goal: &str) -> Result<(), firn_core::BuildError>
{
    let comp = CompConfig {
        compile_command: Engine::compile_command_template("cc", &["-O2".into(), "-Wall".into()]),
        assemble_command: Engine::assemble_command_template("as", &["-mcpu=cortex-m4".into()]),
        c_depend_command: Engine::c_depend_command_template("cc", &[], &["include".into()]),
        asm_depend_command: Engine::asm_depend_command_template("as", &["include".into()]),
        object_extension: "o".into(),
    };
    let link = LinkConfig {
        link_command: Engine::link_command_template("ld", &["-Tlink.ld".into()], &["c".into()]),
    };

    let sources = [
        Source { path: "src/main.c".into(), make_dep_target: true },
        Source { path: "src/startup.s".into(), make_dep_target: false },
    ];

    let link_id = engine.make_exe_target("build/firmware.elf", &sources, &comp, &link)?;

    let mut all = Target::new("#phony_all", TargetKind::Phony);
    all.raw_deps = Dep::Node(ResolvedDep::Target(link_id));
    engine.registry.register(all);

    let ran = engine.build(goal)?;
    tracing::info!(goal, ran, "build finished");
    Ok(())
}
