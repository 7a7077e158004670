mod cadence;
mod input;
mod loop_runner;
mod metrics;
mod scene;

pub use cadence::Cadence;
pub use input::{ActionStates, InputAction, KeyTracker};
pub use loop_runner::{
    clamp_frame_delta, plan_sim_steps, run_headless, run_realtime, AppError, InputSource,
    LoopConfig, RunSummary, ScriptEvent, ScriptedInput, StepPlan,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{
    CameraRig, DebugInfoSnapshot, InputSnapshot, Notification, Scene, SceneCommand, SceneError,
    SceneKey, SceneMachine, SceneWorld,
};
