use atty::Stream;
use color_eyre::Result;
use frozenpkg_core::{CommandStatus, ExecutionOutcome, FreezeCommand};
use serde_json::{json, Value};

use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

/// Prints `outcome` and returns the process exit code.
pub fn emit_output(
    opts: &OutputOptions,
    command: &FreezeCommand,
    outcome: &ExecutionOutcome,
) -> Result<i32> {
    let code = outcome.status.exit_code();
    if opts.json {
        let payload = json_response(command, outcome, code);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }
    if opts.quiet {
        if outcome.status != CommandStatus::Ok {
            eprintln!("{}", outcome.message);
        }
        return Ok(code);
    }

    let style = Style::new(opts.no_color, atty::is(Stream::Stdout));
    println!("{}", style.status(outcome.status, &outcome.message));
    if outcome.status == CommandStatus::Ok {
        for line in report_lines(&outcome.details) {
            println!("{}", style.dimmed(&line));
        }
    } else {
        if let Some(state) = string_field(&outcome.details, "state") {
            println!("  stopped after: {state}");
        }
        if let Some(error) = string_field(&outcome.details, "error") {
            println!("  cause: {error}");
        }
        if let Some(hint) = string_field(&outcome.details, "hint") {
            println!("{}", style.info(&format!("Hint: {hint}")));
        }
    }
    Ok(code)
}

pub fn json_response(command: &FreezeCommand, outcome: &ExecutionOutcome, code: i32) -> Value {
    json!({
        "command": command.format.label(),
        "status": outcome.status,
        "exit_code": code,
        "message": outcome.message,
        "details": outcome.details,
    })
}

fn string_field<'a>(details: &'a Value, key: &str) -> Option<&'a str> {
    details.get(key).and_then(Value::as_str)
}

/// Short human summary of a successful run's report.
fn report_lines(details: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(report) = details.get("report") else {
        return lines;
    };
    if let Some(version) = report.get("python_version").and_then(Value::as_str) {
        lines.push(format!("  python {version}"));
    }
    for (key, label) in [("packages", "package"), ("scripts", "script")] {
        for entry in report.get(key).and_then(Value::as_array).into_iter().flatten() {
            let name = entry.get(0).and_then(Value::as_str).unwrap_or("?");
            let outcome = entry
                .get(1)
                .and_then(|outcome| outcome.get("outcome"))
                .and_then(Value::as_str)
                .unwrap_or("?");
            lines.push(format!("  {label} {name}: {outcome}"));
        }
    }
    for entry in report
        .get("failed_extras")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let source = entry.get(0).and_then(Value::as_str).unwrap_or("?");
        lines.push(format!("  extra {source}: failed"));
    }
    if let Some(scratch) = string_field(details, "scratch") {
        lines.push(format!("  scratch kept at {scratch}"));
    }
    lines
}
