//! Changeset reconstruction: groups a stream of per-file revisions into
//! globally ordered changesets that approximate the original atomic commits.
//!
//! CVS has no concept of a repository-wide commit: every file revision is an
//! independent record with its own timestamp. [`Clusterer`] re-derives the
//! grouping by treating file revisions with the same author, log message and
//! branch, committed within a small time window of each other, as one
//! changeset.

use std::{
    collections::HashMap,
    ffi::OsString,
    fmt::Debug,
    time::{Duration, SystemTime},
};

use thiserror::Error;

mod key;
pub use key::ChangesetKey;

/// A single file's contribution to a changeset.
///
/// `content` identifies the blob for this revision; `None` means the file was
/// deleted (the RCS revision's state was `dead`).
#[derive(Debug, Clone)]
pub struct FileRevision<ID>
where
    ID: Debug + Clone,
{
    pub path: OsString,
    pub content: Option<ID>,
    pub tags: Vec<String>,
    /// The raw log message bytes for this specific revision, kept alongside
    /// the rolling hash used for clustering so the emitter can recover the
    /// actual commit message text from whichever revision ends up first in
    /// the merged changeset's revision list.
    pub log: Vec<u8>,
}

/// Ingests a stream of file revisions and yields the changesets detected
/// within them, keyed by the equivalence relation in [`ChangesetKey`].
#[derive(Debug)]
pub struct Clusterer<ID>
where
    ID: Debug + Clone,
{
    fuzz: Duration,
    buckets: HashMap<u64, Vec<ChangesetKey<ID>>>,
}

impl<ID> Clusterer<ID>
where
    ID: Debug + Clone,
{
    pub fn new(fuzz: Duration) -> Self {
        Self {
            fuzz,
            buckets: HashMap::new(),
        }
    }

    /// Adds a single selected file revision to the clusterer.
    ///
    /// `log` is the raw log message bytes, used to compute the rolling hash;
    /// the changeset that first absorbs a given log message keeps its own
    /// copy for later emission.
    #[allow(clippy::too_many_arguments)]
    pub fn add_revision(
        &mut self,
        path: OsString,
        content: Option<ID>,
        branch: String,
        author: String,
        time: SystemTime,
        log: &[u8],
        commitid: Option<String>,
        tags: Vec<String>,
    ) {
        let revision = FileRevision {
            path,
            content,
            tags,
            log: log.to_vec(),
        };

        let mut candidate =
            ChangesetKey::new(branch, author, time, commitid, log, self.fuzz, revision);

        loop {
            let bucket = self.buckets.entry(candidate.hash_key()).or_default();

            let merge_at = bucket
                .iter()
                .position(|existing| existing.should_merge_with(&candidate));

            match merge_at {
                Some(index) => {
                    let existing = bucket.remove(index);
                    candidate = existing.merged_with(candidate);
                    // Re-query: widening may have made `candidate` now
                    // equivalent to a different open key (possibly in the
                    // same bucket, since branch/author/log_hash never change
                    // across a merge).
                }
                None => {
                    bucket.push(candidate);
                    break;
                }
            }
        }
    }

    /// Consumes the clusterer, returning every detected changeset in
    /// emission order (per the comparator in [`ChangesetKey`]).
    pub fn into_changesets(self) -> Vec<ChangesetKey<ID>> {
        let mut changesets: Vec<_> = self.buckets.into_values().flatten().collect();
        changesets.sort_by(|a, b| a.cmp_order(b));
        changesets
    }
}

/// Attaches tag names to the changeset that most recently touched the tagged
/// revision ("latest changeset wins" by `max_time`).
///
/// Building the index after clustering is complete, rather than
/// incrementally during ingestion, is a deliberate simplification: since
/// every changeset's `max_time` is stable once clustering has converged,
/// resolving winners in one pass over the final set gives the same result
/// the incremental description would, without tracking a movable "current
/// changeset" handle across merges.
pub fn build_tag_index<ID>(changesets: &[ChangesetKey<ID>]) -> HashMap<String, usize>
where
    ID: Debug + Clone,
{
    let mut index: HashMap<String, usize> = HashMap::new();

    for (i, changeset) in changesets.iter().enumerate() {
        for revision in changeset.revs() {
            for tag in &revision.tags {
                match index.get(tag) {
                    Some(&existing) if changesets[existing].max_time() >= changeset.max_time() => {}
                    _ => {
                        index.insert(tag.clone(), i);
                    }
                }
            }
        }
    }

    index
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file does not exist in this changeset: {0}")]
    FileNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_fuzz_cluster_and_gap() {
        // S4: files within the fuzz window and matching author/log collapse
        // into one changeset.
        let mut clusterer = Clusterer::new(Duration::from_secs(300));
        for (i, t) in [0u64, 10, 20, 30, 40].into_iter().enumerate() {
            clusterer.add_revision(
                OsString::from(format!("file{}", i)),
                Some(i),
                "HEAD".into(),
                "alice".into(),
                ts(t),
                b"a shared commit",
                None,
                vec![],
            );
        }
        let changesets = clusterer.into_changesets();
        assert_eq!(changesets.len(), 1);
        assert_eq!(changesets[0].revs().len(), 5);

        // S5: a gap larger than fuzz keeps them separate.
        let mut clusterer = Clusterer::new(Duration::from_secs(300));
        clusterer.add_revision(
            OsString::from("foo"),
            Some(1),
            "HEAD".into(),
            "alice".into(),
            ts(0),
            b"msg",
            None,
            vec![],
        );
        clusterer.add_revision(
            OsString::from("bar"),
            Some(2),
            "HEAD".into(),
            "alice".into(),
            ts(600),
            b"msg",
            None,
            vec![],
        );
        let changesets = clusterer.into_changesets();
        assert_eq!(changesets.len(), 2);
    }

    #[test]
    fn test_commitid_merges_regardless_of_time() {
        let mut clusterer: Clusterer<u32> = Clusterer::new(Duration::from_secs(300));
        clusterer.add_revision(
            OsString::from("foo"),
            Some(1),
            "HEAD".into(),
            "alice".into(),
            ts(0),
            b"first message",
            Some("abc123".into()),
            vec![],
        );
        clusterer.add_revision(
            OsString::from("bar"),
            Some(2),
            "HEAD".into(),
            "alice".into(),
            ts(10_000),
            b"different message entirely",
            Some("abc123".into()),
            vec![],
        );
        let changesets = clusterer.into_changesets();
        assert_eq!(changesets.len(), 1);
        assert_eq!(changesets[0].revs().len(), 2);
    }

    #[test]
    fn test_differing_commitid_never_merges() {
        let mut clusterer: Clusterer<u32> = Clusterer::new(Duration::from_secs(300));
        clusterer.add_revision(
            OsString::from("foo"),
            Some(1),
            "HEAD".into(),
            "alice".into(),
            ts(0),
            b"msg",
            Some("aaa".into()),
            vec![],
        );
        clusterer.add_revision(
            OsString::from("bar"),
            Some(2),
            "HEAD".into(),
            "alice".into(),
            ts(1),
            b"msg",
            Some("bbb".into()),
            vec![],
        );
        let changesets = clusterer.into_changesets();
        assert_eq!(changesets.len(), 2);
    }

    #[test]
    fn test_tag_attribution_picks_latest() {
        let mut clusterer: Clusterer<u32> = Clusterer::new(Duration::from_secs(300));
        clusterer.add_revision(
            OsString::from("early"),
            Some(1),
            "HEAD".into(),
            "alice".into(),
            ts(0),
            b"early commit",
            None,
            vec!["RELEASE_1".into()],
        );
        clusterer.add_revision(
            OsString::from("late"),
            Some(2),
            "HEAD".into(),
            "bob".into(),
            ts(100_000),
            b"late commit",
            None,
            vec!["RELEASE_1".into()],
        );

        let changesets = clusterer.into_changesets();
        assert_eq!(changesets.len(), 2);

        let index = build_tag_index(&changesets);
        let winner = index["RELEASE_1"];
        assert_eq!(changesets[winner].author(), "bob");
    }
}
