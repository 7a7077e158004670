use std::process::ExitCode;

use engine::{run_headless, run_realtime, MetricsHandle};
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::gameplay::stored_session_summary;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut machine,
        mut input,
        realtime,
    } = app;
    let metrics = MetricsHandle::default();

    let result = if realtime {
        run_realtime(&config, &mut machine, input.as_mut(), &metrics)
    } else {
        run_headless(&config, &mut machine, input.as_mut(), &metrics)
    };
    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "run_failed");
            return ExitCode::FAILURE;
        }
    };

    let session = stored_session_summary(machine.world().store());
    info!(
        ticks_run = summary.ticks_run,
        completed = summary.completed,
        final_scene = ?summary.final_scene,
        scene_switches = summary.scene_switches,
        failed_switches = summary.failed_switches,
        carry_over_total = session.carry_over_total,
        phase = session.phase.as_token(),
        remaining_seconds = session.remaining_seconds,
        "run_finished"
    );
    match session.to_json() {
        Ok(json) => println!("{json}"),
        Err(err) => warn!(error = %err, "session_summary_encode_failed"),
    }

    ExitCode::SUCCESS
}
