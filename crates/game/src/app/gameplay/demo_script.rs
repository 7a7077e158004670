use engine::{ScriptEvent, ScriptedInput};
use glam::{Vec2, Vec3};

/// Walk through both scenes: teleport onto a bone and collect it, jump, stroll,
/// teleport next to the portal and use it, then climb in the ascent until the
/// ascension completes.
pub(crate) fn bone_field_to_ascent(target_tps: u32) -> ScriptedInput {
    let tps = target_tps.max(1) as f32;
    let at = |seconds: f32| (seconds * tps).round() as u64;

    let mut script = ScriptedInput::new()
        .at(0, ScriptEvent::CameraForward(Vec3::new(0.0, -0.3, -1.0)))
        .at(at(0.02), ScriptEvent::GroundClick(Vec2::new(15.0, 15.0)))
        .tap("x", at(2.2))
        .hold("w", at(2.5), at(3.0))
        .at(at(3.4), ScriptEvent::GroundClick(Vec2::new(-27.0, 5.0)))
        .tap("e", at(4.4));
    for press in 0..15 {
        script = script.tap("x", at(11.0 + press as f32 * 0.2));
    }
    script
}

fn script_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn parse_number<T: std::str::FromStr>(line_no: usize, what: &str, raw: &str) -> Result<T, String> {
    raw.parse::<T>()
        .map_err(|_| format!("line {line_no}: invalid {what} '{raw}'"))
}

/// Parses a tick-stamped input script, one event per line:
///
/// ```text
/// # tick verb args...
/// 0   camera 0 -0.3 -1
/// 1   click 15 15
/// 130 tap x
/// 150 hold w 180
/// 200 down d
/// 220 up d
/// 300 release
/// ```
pub(crate) fn parse_input_script(content: &str) -> Result<ScriptedInput, String> {
    let mut script = ScriptedInput::new();
    for (line_no, line) in script_lines(content) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let tick = parse_number::<u64>(line_no, "tick", parts[0])?;
        let verb = parts
            .get(1)
            .ok_or_else(|| format!("line {line_no}: missing event after tick {tick}"))?;
        let args = &parts[2..];
        let expect_args = |count: usize| -> Result<(), String> {
            if args.len() == count {
                Ok(())
            } else {
                Err(format!(
                    "line {line_no}: '{verb}' expects {count} argument(s), got {}",
                    args.len()
                ))
            }
        };

        script = match *verb {
            "down" => {
                expect_args(1)?;
                script.at(tick, ScriptEvent::KeyDown(args[0].to_string()))
            }
            "up" => {
                expect_args(1)?;
                script.at(tick, ScriptEvent::KeyUp(args[0].to_string()))
            }
            "tap" => {
                expect_args(1)?;
                script.tap(args[0], tick)
            }
            "hold" => {
                expect_args(2)?;
                let until = parse_number::<u64>(line_no, "end tick", args[1])?;
                if until <= tick {
                    return Err(format!(
                        "line {line_no}: hold must end after tick {tick}, got {until}"
                    ));
                }
                script.hold(args[0], tick, until)
            }
            "click" => {
                expect_args(2)?;
                let x = parse_number::<f32>(line_no, "x", args[0])?;
                let z = parse_number::<f32>(line_no, "z", args[1])?;
                script.at(tick, ScriptEvent::GroundClick(Vec2::new(x, z)))
            }
            "camera" => {
                expect_args(3)?;
                let forward = Vec3::new(
                    parse_number::<f32>(line_no, "x", args[0])?,
                    parse_number::<f32>(line_no, "y", args[1])?,
                    parse_number::<f32>(line_no, "z", args[2])?,
                );
                script.at(tick, ScriptEvent::CameraForward(forward))
            }
            "release" => {
                expect_args(0)?;
                script.at(tick, ScriptEvent::ReleaseAll)
            }
            other => {
                return Err(format!(
                    "line {line_no}: unknown event '{other}' (expected down, up, tap, hold, click, camera, release)"
                ))
            }
        };
    }
    Ok(script)
}
