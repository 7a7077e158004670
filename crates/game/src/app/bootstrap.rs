use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{
    resolve_app_paths, InputSource, JsonFileStore, KeyValueStore, LoopConfig, MemoryStore,
    SceneKey, SceneMachine, SceneWorld,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay;

const SESSION_FILE_ENV_VAR: &str = "MARROW_SESSION_FILE";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CliOptions {
    pub(crate) max_ticks: Option<u64>,
    pub(crate) session_file: Option<PathBuf>,
    pub(crate) import_session: Option<PathBuf>,
    pub(crate) script_file: Option<PathBuf>,
    pub(crate) start_scene: SceneKey,
    pub(crate) realtime: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            max_ticks: None,
            session_file: None,
            import_session: None,
            script_file: None,
            start_scene: SceneKey::BoneField,
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CliCommand {
    Run(CliOptions),
    Help,
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) machine: SceneMachine,
    pub(crate) input: Box<dyn InputSource>,
    pub(crate) realtime: bool,
}

pub(crate) fn parse_args(args: &[String]) -> Result<CliCommand, String> {
    let mut options = CliOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        let flag = args[index].as_str();
        match flag {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "--realtime" => {
                options.realtime = true;
                index += 1;
                continue;
            }
            _ => {}
        }

        let value = || {
            args.get(index + 1)
                .ok_or_else(|| format!("missing value for {flag}"))
        };
        match flag {
            "--ticks" => {
                let value = value()?;
                options.max_ticks = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("invalid --ticks value '{value}' (expected u64)"))?,
                );
            }
            "--session" => options.session_file = Some(PathBuf::from(value()?)),
            "--import-session" => options.import_session = Some(PathBuf::from(value()?)),
            "--script" => options.script_file = Some(PathBuf::from(value()?)),
            "--scene" => {
                let value = value()?;
                options.start_scene = match SceneKey::from_token(value) {
                    Some(key @ (SceneKey::BoneField | SceneKey::Ascent)) => key,
                    _ => {
                        return Err(format!(
                            "invalid --scene value '{value}' (expected bone_field or ascent)"
                        ))
                    }
                };
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
        index += 2;
    }
    Ok(CliCommand::Run(options))
}

pub(crate) fn usage_text() -> String {
    [
        "marrow - headless bone field and ascent simulation",
        "",
        "Usage:",
        "  marrow [--ticks <u64>] [--scene <bone_field|ascent>] [--session <file>]",
        "         [--import-session <file>] [--script <file>] [--realtime]",
        "",
        "Options:",
        "  --ticks           stop after this many render ticks (default 18000)",
        "  --scene           scene to start in (default bone_field)",
        "  --session         JSON file holding the persisted session keys",
        "  --import-session  seed the session from a snapshot written by a previous run",
        "  --script          tick-stamped input script (default: built-in walkthrough)",
        "  --realtime        pace ticks against the wall clock",
        "",
        "Environment:",
        "  MARROW_ROOT          project root holding assets/layouts",
        "  MARROW_SESSION_FILE  session file used when --session is absent",
        "  RUST_LOG             log filter (default info)",
    ]
    .join("\n")
}

pub(crate) fn build_app(options: CliOptions) -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Marrow Startup ===");

    let layouts_dir = match resolve_app_paths() {
        Ok(paths) => {
            info!(root = %paths.root.display(), "project_root_resolved");
            Some(paths.layouts_dir)
        }
        Err(error) => {
            warn!(error = %error, "project_root_unresolved_using_embedded_layouts");
            None
        }
    };

    let mut store = open_store(options.session_file.or_else(session_file_from_env));
    if let Some(path) = options.import_session.as_deref() {
        import_session(path, store.as_mut())?;
    }

    let mut machine = gameplay::build_scene_machine(SceneWorld::new(store), layouts_dir.as_deref())
        .map_err(|error| error.to_string())?;
    machine
        .start(options.start_scene)
        .map_err(|error| error.to_string())?;

    let defaults = LoopConfig::default();
    let config = LoopConfig {
        max_sim_ticks: options.max_ticks.unwrap_or(defaults.max_sim_ticks),
        ..defaults
    };

    let input: Box<dyn InputSource> = match options.script_file.as_deref() {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|error| {
                format!("failed to read script file '{}': {error}", path.display())
            })?;
            Box::new(gameplay::parse_input_script(&content)?)
        }
        None => Box::new(gameplay::bone_field_to_ascent(config.target_tps)),
    };

    Ok(AppWiring {
        config,
        machine,
        input,
        realtime: options.realtime,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn session_file_from_env() -> Option<PathBuf> {
    env::var(SESSION_FILE_ENV_VAR)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

fn open_store(session_file: Option<PathBuf>) -> Box<dyn KeyValueStore> {
    match session_file {
        Some(path) => {
            info!(path = %path.display(), "session_store_file");
            Box::new(JsonFileStore::open_or_fresh(path))
        }
        None => {
            info!("session_store_memory");
            Box::new(MemoryStore::new())
        }
    }
}

fn import_session(path: &Path, store: &mut dyn KeyValueStore) -> Result<(), String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read session snapshot '{}': {error}", path.display()))?;
    let snapshot = gameplay::parse_session_snapshot_json(&raw)?;
    snapshot.seed_store(store);
    info!(
        path = %path.display(),
        carry_over_total = snapshot.carry_over_total,
        remaining_seconds = snapshot.remaining_seconds,
        "session_imported"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn no_arguments_run_the_default_walkthrough() {
        assert_eq!(
            parse_args(&[]),
            Ok(CliCommand::Run(CliOptions::default()))
        );
    }

    #[test]
    fn all_flags_parse() {
        let parsed = parse_args(&args(&[
            "--ticks",
            "600",
            "--scene",
            "ascent",
            "--session",
            "save/session.json",
            "--import-session",
            "snap.json",
            "--script",
            "walk.txt",
            "--realtime",
        ]));
        assert_eq!(
            parsed,
            Ok(CliCommand::Run(CliOptions {
                max_ticks: Some(600),
                session_file: Some(PathBuf::from("save/session.json")),
                import_session: Some(PathBuf::from("snap.json")),
                script_file: Some(PathBuf::from("walk.txt")),
                start_scene: SceneKey::Ascent,
                realtime: true,
            }))
        );
    }

    #[test]
    fn help_wins_anywhere() {
        assert_eq!(
            parse_args(&args(&["--ticks", "5", "--help"])),
            Ok(CliCommand::Help)
        );
        assert_eq!(parse_args(&args(&["-h"])), Ok(CliCommand::Help));
    }

    #[test]
    fn bad_arguments_are_reported() {
        assert_eq!(
            parse_args(&args(&["--ticks"])),
            Err("missing value for --ticks".to_string())
        );
        assert_eq!(
            parse_args(&args(&["--ticks", "soon"])),
            Err("invalid --ticks value 'soon' (expected u64)".to_string())
        );
        assert_eq!(
            parse_args(&args(&["--scene", "repair"])),
            Err("invalid --scene value 'repair' (expected bone_field or ascent)".to_string())
        );
        assert_eq!(
            parse_args(&args(&["--fast"])),
            Err("unknown argument '--fast'".to_string())
        );
    }

    #[test]
    fn usage_lists_every_flag() {
        let usage = usage_text();
        for flag in [
            "--ticks",
            "--scene",
            "--session",
            "--import-session",
            "--script",
            "--realtime",
        ] {
            assert!(usage.contains(flag), "usage is missing {flag}");
        }
    }
}
