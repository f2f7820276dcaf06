use std::{ffi::OsString, process::Command, time::SystemTime};

use chrono::{DateTime, Utc};
use structopt::StructOpt;

use crate::tip::{self, Tip};

/// Options needed to probe an SVN repository for where a previous import
/// left off. Flatten this into a binary's top-level options with
/// `#[structopt(flatten)]`.
#[derive(Clone, Debug, StructOpt)]
pub struct SvnOpt {
    #[structopt(long = "svnlook", default_value = "svnlook", help = "path to the svnlook command")]
    pub svnlook_command: OsString,

    #[structopt(
        short = "-s",
        long,
        help = "path to the SVN repository (not a working copy) to import into"
    )]
    pub svn_repo: OsString,

    #[structopt(
        short = "-p",
        long,
        help = "path within the SVN repository that commits are recorded under"
    )]
    pub svn_path: String,
}

/// Finds the most recent revision touching `opt.svn_path` in the target
/// repository and returns its author and commit time, skipping revisions
/// committed by `svnadmin` (property-only housekeeping revisions left
/// behind by `svnadmin load`, the way the original importer's own `author
/// == 'svnadmin'` check does).
///
/// The original dumper walked the repository's FS layer directly via the
/// `svn` Python bindings, scoping its history walk to `self.root` (the
/// configured `svnpath`) via `fs.node_history`; `svnlook history` is the
/// command-line equivalent of that same scoped, local, non-networked walk
/// and is used here instead, since those bindings have no Rust equivalent
/// in this corpus's dependency stack.
pub fn tip(opt: &SvnOpt) -> Result<Option<Tip>, crate::Error> {
    let youngest_label = format!("svnlook youngest {}", String::from_utf8_lossy(as_bytes(&opt.svn_repo)));
    let youngest = tip::run(
        Command::new(&opt.svnlook_command).arg("youngest").arg(&opt.svn_repo),
        &youngest_label,
    )?;
    let youngest: i64 = youngest.trim().parse().map_err(|_| crate::Error::UnexpectedOutput {
        command: youngest_label.clone(),
        reason: format!("unparseable revision number: {:?}", youngest),
    })?;

    for rev in history_revisions(opt, youngest)? {
        let author = revision_property(opt, rev, "author")?;
        if author.trim() == "svnadmin" {
            continue;
        }

        let date = revision_property(opt, rev, "date")?;
        let time = parse_svnlook_date(&date)?;

        return Ok(Some(Tip {
            author: author.trim().to_string(),
            time,
            commit: None,
        }));
    }

    Ok(None)
}

/// Lists every revision up to and including `rev` that touched
/// `opt.svn_path`, newest first, via `svnlook history`. Unlike the whole
/// repository's revision count, this is exactly the set of revisions a
/// prior run of this importer (or CVS history replayed into this same
/// `svnpath`) could have produced, so a later global revision touching
/// some unrelated part of the tree never gets mistaken for this importer's
/// own tip.
fn history_revisions(opt: &SvnOpt, rev: i64) -> Result<Vec<i64>, crate::Error> {
    let label = format!(
        "svnlook history -r{} {} {}",
        rev,
        String::from_utf8_lossy(as_bytes(&opt.svn_repo)),
        opt.svn_path
    );
    let stdout = tip::run(
        Command::new(&opt.svnlook_command)
            .arg("history")
            .arg("-r")
            .arg(rev.to_string())
            .arg(&opt.svn_repo)
            .arg(&opt.svn_path),
        &label,
    )?;

    let mut revisions: Vec<i64> = stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|token| token.parse::<i64>().ok())
        .collect();
    revisions.sort_unstable_by(|a, b| b.cmp(a));
    revisions.dedup();

    Ok(revisions)
}

fn revision_property(opt: &SvnOpt, rev: i64, which: &str) -> Result<String, crate::Error> {
    let label = format!("svnlook {} -r{} {}", which, rev, String::from_utf8_lossy(as_bytes(&opt.svn_repo)));
    tip::run(
        Command::new(&opt.svnlook_command)
            .arg(which)
            .arg("-r")
            .arg(rev.to_string())
            .arg(&opt.svn_repo),
        &label,
    )
}

/// Parses the first, machine-sortable portion of `svnlook date`'s output
/// (`2020-01-02 15:04:05 +0000 (Thu, 02 Jan 2020)`), ignoring the trailing
/// human-readable parenthetical.
fn parse_svnlook_date(raw: &str) -> Result<SystemTime, crate::Error> {
    let primary = raw.splitn(2, " (").next().unwrap_or(raw).trim();
    let parsed = DateTime::parse_from_str(primary, "%Y-%m-%d %H:%M:%S %z").map_err(|_| {
        crate::Error::UnexpectedOutput {
            command: "svnlook date".to_string(),
            reason: format!("unparseable date: {:?}", raw),
        }
    })?;
    Ok(parsed.with_timezone(&Utc).into())
}

fn as_bytes(s: &OsString) -> &[u8] {
    use std::os::unix::prelude::OsStrExt;
    s.as_os_str().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_svnlook_date() {
        let time = parse_svnlook_date("2020-01-02 15:04:05 +0000 (Thu, 02 Jan 2020)").unwrap();
        assert_eq!(
            time.duration_since(std::time::UNIX_EPOCH).unwrap().as_secs(),
            1577977445
        );
    }

    #[test]
    fn test_parse_svnlook_date_rejects_garbage() {
        assert!(parse_svnlook_date("not a date").is_err());
    }
}
