// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::process::Command;

use graph::JobContext;

///
/// Runs a shell command in the job's working directory, echoing it first. A non-zero exit status
/// is an error.
///
pub fn sh(command: &str, context: &JobContext) -> Result<(), String> {
    log::info!("{command}");
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(&context.working_dir)
        .status()
        .map_err(|err| format!("Failed to run `{command}`: {err}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("`{command}` exited with {status}"))
    }
}

/// Like `sh`, but captures and returns stdout.
pub fn sh_capture(command: &str, context: &JobContext) -> Result<String, String> {
    log::info!("{command}");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(&context.working_dir)
        .output()
        .map_err(|err| format!("Failed to run `{command}`: {err}"))?;
    if !output.status.success() {
        return Err(format!(
            "`{command}` exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim_end()
        ));
    }
    String::from_utf8(output.stdout)
        .map_err(|err| format!("`{command}` produced non-UTF-8 output: {err}"))
}
