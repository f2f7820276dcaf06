use std::{
    ffi::OsString,
    os::unix::prelude::OsStrExt,
    process::Command,
    time::{Duration, UNIX_EPOCH},
};

use structopt::StructOpt;

use crate::tip::{self, Tip};

/// Options needed to probe a git repository for where a previous import
/// left off. Flatten this into a binary's top-level options with
/// `#[structopt(flatten)]`.
#[derive(Clone, Debug, StructOpt)]
pub struct GitOpt {
    #[structopt(long = "git", default_value = "git", help = "path to the git command")]
    pub git_command: OsString,

    #[structopt(short = "-g", long, help = "path to the Git repository to import into")]
    pub git_repo: OsString,
}

/// Ensures `git` is executable and `git_repo` is a valid repository, the way
/// `git rev-parse` with no further arguments does: it succeeds silently
/// against any repository and fails otherwise.
pub fn preflight(opt: &GitOpt) -> Result<(), crate::Error> {
    let label = format!(
        "{} -C {} rev-parse",
        String::from_utf8_lossy(opt.git_command.as_bytes()),
        String::from_utf8_lossy(opt.git_repo.as_bytes())
    );

    tip::run(
        Command::new(&opt.git_command)
            .arg("-C")
            .arg(&opt.git_repo)
            .arg("rev-parse"),
        &label,
    )?;

    Ok(())
}

/// Finds the tip of `git_ref` (or, if `resume_from` is given, the
/// tip-equivalent commit to resume from instead): its author, commit time,
/// and hash.
///
/// This mirrors `cvs2gitdump.py`'s incremental mode, which runs `git log
/// --max-count 1 --date=raw --format=%ae%n%ad%n%H` against either the
/// target branch or an explicitly given revision, in order to find the CVS
/// changeset that the previous import's last commit corresponds to.
pub fn tip(opt: &GitOpt, git_ref: &str, resume_from: Option<&str>) -> Result<Tip, crate::Error> {
    let target = resume_from.unwrap_or(git_ref);
    let label = format!("git log --max-count 1 {}", target);

    let stdout = tip::run(
        Command::new(&opt.git_command)
            .arg("--git-dir")
            .arg(&opt.git_repo)
            .arg("-c")
            .arg("i18n.logOutputEncoding=UTF-8")
            .arg("log")
            .arg("--max-count")
            .arg("1")
            .arg("--date=raw")
            .arg("--format=%ae%n%ad%n%H")
            .arg(target),
        &label,
    )?;

    let mut lines = stdout.lines();
    let author = lines.next().ok_or_else(|| crate::Error::UnexpectedOutput {
        command: label.clone(),
        reason: "missing author line".to_string(),
    })?;
    let date = lines.next().ok_or_else(|| crate::Error::UnexpectedOutput {
        command: label.clone(),
        reason: "missing date line".to_string(),
    })?;
    let commit = lines.next().ok_or_else(|| crate::Error::UnexpectedOutput {
        command: label.clone(),
        reason: "missing commit line".to_string(),
    })?;

    let epoch: u64 = date
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| crate::Error::UnexpectedOutput {
            command: label.clone(),
            reason: format!("unparseable --date=raw output: {:?}", date),
        })?;

    Ok(Tip {
        author: author.to_string(),
        time: UNIX_EPOCH + Duration::from_secs(epoch),
        commit: Some(commit.to_string()),
    })
}

/// Strips a trailing `@domain` (case-insensitively) from an author email,
/// since CVS itself has no notion of an email domain: committer identities
/// in the `,v` files are bare usernames.
pub fn strip_email_domain(author: &str, domain: &str) -> String {
    let suffix = format!("@{}", domain);
    if author.to_lowercase().ends_with(&suffix.to_lowercase()) {
        author[..author.len() - suffix.len()].to_string()
    } else {
        author.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_email_domain_matching_suffix() {
        assert_eq!(strip_email_domain("jdoe@example.com", "example.com"), "jdoe");
    }

    #[test]
    fn test_strip_email_domain_case_insensitive() {
        assert_eq!(strip_email_domain("jdoe@EXAMPLE.com", "example.com"), "jdoe");
    }

    #[test]
    fn test_strip_email_domain_non_matching_suffix_unchanged() {
        assert_eq!(strip_email_domain("jdoe@other.com", "example.com"), "jdoe@other.com");
    }
}
