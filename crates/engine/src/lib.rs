use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
mod atomic_io;
pub mod content;
pub mod store;

pub use app::{
    clamp_frame_delta, plan_sim_steps, run_headless, run_realtime, ActionStates, AppError,
    CameraRig, Cadence, DebugInfoSnapshot, InputAction, InputSnapshot, InputSource, KeyTracker,
    LoopConfig, LoopMetricsSnapshot, MetricsHandle, Notification, RunSummary, Scene, SceneCommand,
    SceneError, SceneKey, SceneMachine, SceneWorld, ScriptEvent, ScriptedInput, StepPlan,
};
pub use content::{
    compile_scene_layout, load_scene_layout, AgentSpawnDef, CollectibleDef, LayoutError,
    LayoutErrorCode, LayoutWarning, PlatformDef, PortalDef, SceneLayout, SourceLocation,
};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};

pub const ROOT_ENV_VAR: &str = "MARROW_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub layouts_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot read {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("executable path {0} has no parent directory")]
    ExeHasNoParent(PathBuf),
    #[error("{var}={path} has no assets/layouts directory next to a Cargo.toml")]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "no directory above {start_dir} holds Cargo.toml and assets/layouts; \
set {var} to the project root"
    )]
    RootNotFound {
        start_dir: PathBuf,
        var: &'static str,
    },
}

/// Locates the project root from `MARROW_ROOT` or by walking up from the
/// executable. Nothing is created on disk.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let candidate = canonical_or_raw(Path::new(&value));
            if !holds_layouts(&candidate) {
                return Err(StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path: candidate,
                });
            }
            candidate
        }
        Err(env::VarError::NotPresent) => search_from_executable()?,
        Err(source) => {
            return Err(StartupError::EnvVar {
                var: ROOT_ENV_VAR,
                source,
            })
        }
    };
    let layouts_dir = layouts_dir_of(&root);
    Ok(AppPaths { root, layouts_dir })
}

fn search_from_executable() -> Result<PathBuf, StartupError> {
    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    let start_dir = match exe.parent() {
        Some(dir) => dir.to_path_buf(),
        None => return Err(StartupError::ExeHasNoParent(exe)),
    };
    start_dir
        .ancestors()
        .find(|dir| holds_layouts(dir))
        .map(canonical_or_raw)
        .ok_or_else(|| StartupError::RootNotFound {
            start_dir: canonical_or_raw(&start_dir),
            var: ROOT_ENV_VAR,
        })
}

fn layouts_dir_of(root: &Path) -> PathBuf {
    root.join("assets").join("layouts")
}

fn holds_layouts(dir: &Path) -> bool {
    dir.join("Cargo.toml").is_file() && layouts_dir_of(dir).is_dir()
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
