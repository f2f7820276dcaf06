use std::{
    cmp::Ordering,
    collections::hash_map::DefaultHasher,
    ffi::OsStr,
    fmt::Debug,
    hash::{Hash, Hasher},
    time::{Duration, SystemTime},
};

use crate::{Error, FileRevision};

/// The unit of clustering: a group of per-file revisions believed to
/// correspond to one original CVS commit.
#[derive(Debug, Clone)]
pub struct ChangesetKey<ID>
where
    ID: Debug + Clone,
{
    branch: String,
    author: String,
    min_time: SystemTime,
    max_time: SystemTime,
    commitid: Option<String>,
    log_hash: u32,
    fuzz: Duration,
    revs: Vec<FileRevision<ID>>,
}

impl<ID> ChangesetKey<ID>
where
    ID: Debug + Clone,
{
    pub(crate) fn new(
        branch: String,
        author: String,
        time: SystemTime,
        commitid: Option<String>,
        log: &[u8],
        fuzz: Duration,
        revision: FileRevision<ID>,
    ) -> Self {
        Self {
            branch,
            author,
            min_time: time,
            max_time: time,
            commitid,
            log_hash: rolling_hash(log),
            fuzz,
            revs: vec![revision],
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn min_time(&self) -> SystemTime {
        self.min_time
    }

    pub fn max_time(&self) -> SystemTime {
        self.max_time
    }

    pub fn commitid(&self) -> Option<&str> {
        self.commitid.as_deref()
    }

    pub fn revs(&self) -> &[FileRevision<ID>] {
        &self.revs
    }

    /// Returns the content for the given path as it stands at the end of
    /// this changeset (the last revision absorbed for that path), or an
    /// error if the path was never touched by this changeset.
    pub fn content(&self, path: &OsStr) -> Result<Option<&ID>, Error> {
        self.revs
            .iter()
            .rev()
            .find(|rev| rev.path == path)
            .map(|rev| rev.content.as_ref())
            .ok_or_else(|| Error::FileNotFound(path.to_string_lossy().into_owned()))
    }

    /// The bucket key used by the open-changeset set: `hash(branch + "/" +
    /// author) * 31 + log_hash`. Immutable across merges, since `branch`,
    /// `author` and `log_hash` never change once a key is constructed.
    pub(crate) fn hash_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.branch.hash(&mut hasher);
        hasher.write_u8(b'/');
        self.author.hash(&mut hasher);
        let branch_author_hash = hasher.finish();

        branch_author_hash.wrapping_mul(31).wrapping_add(self.log_hash as u64)
    }

    /// Whether `other` should be merged into `self` under the clustering
    /// equivalence relation.
    ///
    /// This mirrors the comparator in `cmp_order`, except for one case: two
    /// changesets whose time windows are disjoint by more than `fuzz` are
    /// never merge candidates, even though the comparator may still report
    /// them as tied (when their `mid` delta happens to be zero) for the
    /// purposes of producing a stable final sort order.
    pub(crate) fn should_merge_with(&self, other: &Self) -> bool {
        // Rule 1: commitid is decisive, regardless of time distance.
        if let (Some(a), Some(b)) = (&self.commitid, &other.commitid) {
            return a == b;
        }

        // Rule 2: time windows disjoint beyond fuzz never merge.
        let fuzz = self.fuzz.max(other.fuzz).as_secs() as i64;
        let delta_lo = secs(other.min_time) - secs(self.max_time);
        let delta_hi = secs(self.min_time) - secs(other.max_time);
        if delta_lo > fuzz || delta_hi > fuzz {
            return false;
        }

        // Rule 3: exactly one side carries a commitid -> different commits.
        if self.commitid.is_some() != other.commitid.is_some() {
            return false;
        }

        // Rule 4: identity by content.
        self.log_hash == other.log_hash && self.branch == other.branch && self.author == other.author
    }

    /// Merges `other` into `self`, widening the time window and appending
    /// `other`'s revisions. `self`'s `branch`/`author`/`log_hash`/`commitid`
    /// are preserved: a changeset's identity never changes once it has
    /// absorbed its first revision.
    pub(crate) fn merged_with(mut self, mut other: Self) -> Self {
        self.min_time = self.min_time.min(other.min_time);
        self.max_time = self.max_time.max(other.max_time);
        self.commitid = self.commitid.or(other.commitid.take());
        self.revs.append(&mut other.revs);
        self
    }

    /// The total-ordering comparator used both to decide equivalence (a
    /// result of `Ordering::Equal` from `should_merge_with`'s perspective
    /// ignores the fuzz-disjoint special case; see its docs) and, at
    /// emission time, to lay out the final changeset sequence.
    pub fn cmp_order(&self, other: &Self) -> Ordering {
        let mid = secs(self.min_time) - secs(other.min_time);

        // Rule 1: commitid decisive.
        if let (Some(a), Some(b)) = (&self.commitid, &other.commitid) {
            return if a == b {
                Ordering::Equal
            } else if mid != 0 {
                mid.cmp(&0)
            } else {
                a.cmp(b)
            };
        }

        // Rule 2: time window gating.
        let fuzz = self.fuzz.max(other.fuzz).as_secs() as i64;
        let delta_lo = secs(other.min_time) - secs(self.max_time);
        let delta_hi = secs(self.min_time) - secs(other.max_time);
        if delta_lo > fuzz || delta_hi > fuzz {
            return if mid == 0 { Ordering::Equal } else { mid.cmp(&0) };
        }

        // Rule 3: single-sided commitid.
        if self.commitid.is_some() != other.commitid.is_some() {
            return if mid != 0 {
                mid.cmp(&0)
            } else {
                self.commitid.is_some().cmp(&other.commitid.is_some())
            };
        }

        // Rule 4: identity by content, lexicographic fallback.
        if self.log_hash == other.log_hash && self.branch == other.branch && self.author == other.author
        {
            return Ordering::Equal;
        }
        if mid != 0 {
            return mid.cmp(&0);
        }
        (self.log_hash, &self.branch, &self.author).cmp(&(other.log_hash, &other.branch, &other.author))
    }
}

fn secs(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// `h <- 31*h + b` for each byte, per the spec's rolling log-message hash.
fn rolling_hash(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |h, &b| h.wrapping_mul(31).wrapping_add(b as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_hash_matches_spec_formula() {
        let mut h = 0u32;
        for b in b"hello" {
            h = h.wrapping_mul(31).wrapping_add(*b as u32);
        }
        assert_eq!(rolling_hash(b"hello"), h);
    }

    #[test]
    fn test_min_max_invariant_after_merge() {
        let a: ChangesetKey<u32> = ChangesetKey::new(
            "HEAD".into(),
            "alice".into(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(100),
            None,
            b"msg",
            Duration::from_secs(300),
            FileRevision {
                path: "foo".into(),
                content: Some(1),
                tags: vec![],
                log: b"msg".to_vec(),
            },
        );
        let b: ChangesetKey<u32> = ChangesetKey::new(
            "HEAD".into(),
            "alice".into(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(50),
            None,
            b"msg",
            Duration::from_secs(300),
            FileRevision {
                path: "bar".into(),
                content: Some(2),
                tags: vec![],
                log: b"msg".to_vec(),
            },
        );
        let merged = a.merged_with(b);
        assert!(merged.min_time <= merged.max_time);
        assert_eq!(merged.min_time, SystemTime::UNIX_EPOCH + Duration::from_secs(50));
        assert_eq!(merged.max_time, SystemTime::UNIX_EPOCH + Duration::from_secs(100));
    }
}
