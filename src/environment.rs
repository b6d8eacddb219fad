use std::{
    path::Path,
    process::{Command, Stdio},
};

use tracing::{error, info};

use crate::error::{Error, Result};

/// Check that the merge executable runs (`<program> -version` exits 0).
///
/// yt-dlp needs it to join the separate video and audio streams.
pub fn check_merge_tool(program: &Path) -> Result<()> {
    let name = program.display().to_string();
    let missing = |reason: String| {
        error!(program = %name, %reason, "merge tool is not installed or not found in PATH");
        Error::MergeToolMissing {
            program: name.clone(),
            reason,
        }
    };

    let status = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| missing(e.to_string()))?;

    if status.success() {
        info!(program = %name, "merge tool is installed");
        Ok(())
    } else {
        Err(missing(format!("`-version` exited with {status}")))
    }
}
