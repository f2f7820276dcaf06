//! Totally orders clustered changesets, applies the trailing safety window
//! and the incremental resume scan, and dispatches each surviving changeset
//! to one of the two output dialects.
//!
//! Both dialects share everything up to the point of writing an individual
//! changeset: the total order, the tag attribution, the safety window and
//! the resume scan are all dialect-agnostic. Only `emit_git` and `emit_svn`
//! know how to turn a changeset into wire bytes.

use std::{
    collections::HashMap,
    io::Write,
    time::{Duration, SystemTime},
};

use changeset::ChangesetKey;
use encoding_rs::Encoding;
use git_fast_import::{
    Blob, CommitBuilder, FileCommand, Identity, Mode as GitMode, Tag as GitTag, Writer as GitWriter,
};
use git_cvs_fast_import_process::Tip;
use keyword::{Keywords, RevisionMeta};
use log::info;
use svn_dump::Dumper;

use crate::checkout::Checkout;

/// Changesets whose `max_time` falls within this many seconds of the
/// globally latest `max_time` are withheld unless `-a` is given: protects
/// against emitting a commit while a CVS commit is still landing across
/// several `,v` files.
const TRAIL_SAFETY_WINDOW: Duration = Duration::from_secs(600);

pub(crate) struct EmitConfig {
    pub email_domain: Option<String>,
    pub dump_all: bool,
    pub encodings: Vec<String>,
    pub keywords: Keywords,
}

/// The changesets surviving the safety window and resume scan, in emission
/// order, each paired with the tag names (if any) that should be recorded
/// alongside it.
pub(crate) struct Plan<'a> {
    pub entries: Vec<(&'a ChangesetKey<usize>, Vec<&'a str>)>,
}

/// Builds the emission plan: totals the order (already done by the caller
/// via `Clusterer::into_changesets`), trims the trailing safety window,
/// resolves the incremental resume point, and attaches tags.
///
/// Returns an error if `resume_tip` is given but no changeset in the
/// sequence matches it: per the resume contract, the engine must never
/// silently re-emit history it cannot place precisely.
pub(crate) fn plan<'a>(
    changesets: &'a [ChangesetKey<usize>],
    resume_tip: Option<&Tip>,
    dump_all: bool,
) -> anyhow::Result<Plan<'a>> {
    let tag_index = changeset::build_tag_index(changesets);
    let mut tags_by_index: HashMap<usize, Vec<&str>> = HashMap::new();
    for (tag, &idx) in tag_index.iter() {
        tags_by_index.entry(idx).or_default().push(tag.as_str());
    }

    let cutoff = resolve_window(changesets, dump_all);
    let start = resolve_resume(changesets, resume_tip)?;

    let mut entries = Vec::new();
    for (i, changeset) in changesets.iter().enumerate().take(cutoff).skip(start) {
        let tags = tags_by_index.remove(&i).unwrap_or_default();
        entries.push((changeset, tags));
    }

    Ok(Plan { entries })
}

/// The exclusive end index of changesets that survive the trailing safety
/// window.
fn resolve_window(changesets: &[ChangesetKey<usize>], dump_all: bool) -> usize {
    if changesets.is_empty() {
        return 0;
    }

    if dump_all {
        return changesets.len();
    }

    let latest = changesets
        .iter()
        .map(ChangesetKey::max_time)
        .max()
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let cutoff = latest
        .checked_sub(TRAIL_SAFETY_WINDOW)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    changesets.iter().take_while(|c| c.max_time() <= cutoff).count()
}

/// The inclusive start index to resume from, given a resolved target-repo
/// tip. Returns `0` (start from the beginning) if no tip was given.
fn resolve_resume(changesets: &[ChangesetKey<usize>], resume_tip: Option<&Tip>) -> anyhow::Result<usize> {
    let tip = match resume_tip {
        Some(tip) => tip,
        None => return Ok(0),
    };

    for (i, changeset) in changesets.iter().enumerate() {
        if changeset.min_time() == tip.time && changeset.author() == tip.author {
            return Ok(i + 1);
        }
    }

    anyhow::bail!(
        "could not find a changeset matching the target repository's tip (author {:?} at {:?}); refusing to resume",
        tip.author,
        tip.time
    )
}

/// Decodes `log` through the configured cascade of candidate encodings
/// (strict for every label but the last, which always succeeds in lossy
/// replacement mode), and re-encodes the result as UTF-8.
pub(crate) fn decode_log(log: &[u8], encodings: &[String]) -> String {
    for (i, label) in encodings.iter().enumerate() {
        let is_last = i == encodings.len() - 1;
        let encoding = match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => encoding,
            None => continue,
        };

        let (text, _, had_errors) = encoding.decode(log);
        if !had_errors || is_last {
            return text.into_owned();
        }
    }

    String::from_utf8_lossy(log).into_owned()
}

fn email_for(author: &str, domain: Option<&str>) -> String {
    match domain {
        Some(domain) => format!("{}@{}", author, domain),
        None => author.to_string(),
    }
}

/// Expands keywords for every live revision in `changeset` and emits blobs
/// for them, returning a path -> FileCommand map ready to attach to a
/// commit (DAG dialect) or apply in sequence (dump dialect, via its own
/// `write_file`/`delete_file` calls instead).
fn expanded_content<'a>(
    revision: &'a changeset::FileRevision<usize>,
    checkouts: &'a [Checkout],
    keywords: &Keywords,
) -> Option<Vec<u8>> {
    let id = revision.content?;
    let checkout = &checkouts[id];
    let meta = RevisionMeta {
        revision: &checkout.revision,
        date: checkout.date,
        author: &checkout.author,
        state: &checkout.state,
        log: &revision.log,
        rcs_path: &checkout.rcs_path,
    };
    Some(keyword::expand(&checkout.content, keywords, checkout.keyword_mode, &meta))
}

/// Writes a plan to a `git fast-import` stream.
///
/// When `resume_tip` is set, the first commit touching `branch_ref`
/// deliberately omits a `from` line: `git fast-import` parents a branch's
/// first commit onto the ref's current tip automatically when the branch
/// already exists and no `from` is given, which is exactly the chaining an
/// incremental import needs. The writer's `Mark` type cannot be constructed
/// from an arbitrary commit hash outside this crate, so there is no way to
/// spell that chain out explicitly even if we wanted to.
pub(crate) fn emit_git<W>(
    writer: &mut GitWriter<W>,
    branch_ref: &str,
    plan: &Plan,
    checkouts: &[Checkout],
    resume_tip: Option<&Tip>,
    config: &EmitConfig,
) -> anyhow::Result<()>
where
    W: Write + std::fmt::Debug,
{
    if let Some(tip) = resume_tip {
        info!(
            "resuming onto {} from commit {:?} ({} at {:?})",
            branch_ref, tip.commit, tip.author, tip.time
        );
    }

    for (changeset, tags) in &plan.entries {
        let mut file_commands = Vec::new();

        for revision in changeset.revs() {
            let path = revision.path.to_string_lossy().into_owned();
            match expanded_content(revision, checkouts, &config.keywords) {
                Some(content) => {
                    let mark = writer.command(Blob::new(&content))?;
                    let executable = revision
                        .content
                        .map(|id| checkouts[id].executable)
                        .unwrap_or(false);
                    file_commands.push(FileCommand::Modify {
                        mode: if executable { GitMode::Executable } else { GitMode::Normal },
                        mark,
                        path,
                    });
                }
                None => file_commands.push(FileCommand::Delete { path }),
            }
        }

        let email = email_for(changeset.author(), config.email_domain.as_deref());
        let identity = Identity::new(None, email.clone(), changeset.min_time())?;
        let log = changeset
            .revs()
            .first()
            .map(|r| decode_log(&r.log, &config.encodings))
            .unwrap_or_default();

        let mut builder = CommitBuilder::new(branch_ref.to_string());
        builder.committer(identity).message(log);
        for command in file_commands {
            builder.add_file_command(command);
        }

        let mark = writer.command(builder.build()?)?;

        for tag in tags {
            let tagger = Identity::new(None, email.clone(), changeset.min_time())?;
            writer.command(GitTag::new(
                format!("refs/tags/{}", tag),
                mark,
                tagger,
                String::new(),
            ))?;
        }
    }

    Ok(())
}

/// Writes a plan to an SVN dump stream. Revision numbers are assigned
/// sequentially starting at `start_revision`; the dump dialect has no
/// branch concept, so every changeset (whether its `branch()` is `HEAD`,
/// `VENDOR`, or anything else) lands on the same linear tree, mirroring the
/// reference dumper's own behaviour.
pub(crate) fn emit_svn<W>(
    dumper: &mut Dumper<W>,
    plan: &Plan,
    checkouts: &[Checkout],
    start_revision: u64,
    config: &EmitConfig,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut revision = start_revision;

    for (changeset, _tags) in &plan.entries {
        let log = changeset
            .revs()
            .first()
            .map(|r| decode_log(&r.log, &config.encodings))
            .unwrap_or_default();
        let email = email_for(changeset.author(), config.email_domain.as_deref());

        dumper.begin_revision(revision, &email, changeset.min_time(), log.as_bytes())?;

        for revision_entry in changeset.revs() {
            let path = dumper.node_path(&revision_entry.path.to_string_lossy());
            match expanded_content(revision_entry, checkouts, &config.keywords) {
                Some(content) => {
                    let executable = revision_entry
                        .content
                        .map(|id| checkouts[id].executable)
                        .unwrap_or(false);
                    dumper.write_file(&path, &content, executable)?;
                }
                None => {
                    dumper.delete_file(&path)?;
                }
            }
        }

        revision += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn cluster(branch: &str, author: &str, secs: u64) -> changeset::ChangesetKey<usize> {
        let mut clusterer = changeset::Clusterer::new(Duration::from_secs(300));
        clusterer.add_revision(
            OsString::from("f"),
            Some(0),
            branch.to_string(),
            author.to_string(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            b"msg",
            None,
            vec![],
        );
        clusterer.into_changesets().into_iter().next().unwrap()
    }

    #[test]
    fn test_resolve_window_trims_trailing_changesets() {
        let changesets = vec![cluster("HEAD", "alice", 0), cluster("HEAD", "alice", 10_000)];
        assert_eq!(resolve_window(&changesets, false), 1);
    }

    #[test]
    fn test_resolve_window_dump_all_keeps_everything() {
        let changesets = vec![cluster("HEAD", "alice", 0), cluster("HEAD", "alice", 10_000)];
        assert_eq!(resolve_window(&changesets, true), 2);
    }

    #[test]
    fn test_resolve_resume_finds_matching_tip() {
        let changesets = vec![cluster("HEAD", "alice", 0), cluster("HEAD", "bob", 1_000)];
        let tip = Tip {
            author: "alice".to_string(),
            time: SystemTime::UNIX_EPOCH,
            commit: Some("deadbeef".to_string()),
        };
        assert_eq!(resolve_resume(&changesets, Some(&tip)).unwrap(), 1);
    }

    #[test]
    fn test_resolve_resume_errs_when_tip_not_found() {
        let changesets = vec![cluster("HEAD", "alice", 0)];
        let tip = Tip {
            author: "nobody".to_string(),
            time: SystemTime::UNIX_EPOCH + Duration::from_secs(99),
            commit: None,
        };
        assert!(resolve_resume(&changesets, Some(&tip)).is_err());
    }

    #[test]
    fn test_decode_log_falls_back_to_lossy_on_last_encoding() {
        let invalid_utf8 = vec![0xff, 0xfe, b'h', b'i'];
        let text = decode_log(&invalid_utf8, &["utf-8".to_string(), "iso-8859-1".to_string()]);
        assert!(text.ends_with("hi"));
    }
}
