//! A resolved "where did the last import leave off" marker, common to both
//! the git and SVN dialects: an author, a commit time, and (for git) the
//! revision the next import should be built `from`.

use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tip {
    pub author: String,
    pub time: SystemTime,
    /// The git commit hash the importer's first synthesized commit should
    /// be recorded as `from`. Always `None` for the SVN dialect, which has
    /// no equivalent notion of a parent to link against explicitly.
    pub commit: Option<String>,
}

pub(crate) fn run(command: &mut std::process::Command, label: &str) -> Result<String, crate::Error> {
    let output = command.output().map_err(|err| crate::Error::Spawn {
        command: label.to_string(),
        err,
    })?;

    if !output.status.success() {
        return Err(crate::Error::ExitStatus {
            command: label.to_string(),
            code: output.status.code(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
