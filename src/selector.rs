//! The revision selector: walks a single RCS file's delta tree to
//! reconstruct full text, then classifies each revision as trunk, vendor,
//! or irrelevant, following the same state machine CVS's own importers use
//! to decide which revisions represent real commits versus a vendor-branch
//! bookkeeping artifact.
//!
//! Reconstruction and classification are deliberately two separate passes:
//! a revision that classification will reject may still be a link in the
//! diff chain that a later, accepted revision depends on, so every revision
//! reachable from `head` has to be visited regardless of whether it
//! survives.

use std::{cmp::Reverse, collections::HashMap, ffi::OsString, path::Path};

use comma_v::{Delta, File as RcsFile, Num};

use crate::{branch_map::BranchMap, checkout::Checkout};

#[derive(Debug)]
pub(crate) struct SelectedRevision {
    pub path: OsString,
    pub branch: String,
    pub author: String,
    pub time: std::time::SystemTime,
    pub log: Vec<u8>,
    pub commitid: Option<String>,
    pub tags: Vec<String>,
    pub dead: bool,
    pub checkout: Checkout,
}

/// Walks and classifies every revision in `cv`, returning the ones that
/// represent real CVS commits (trunk or vendor-branch revisions) in the
/// order they should be offered to the clusterer.
pub(crate) fn select(
    rcs_path: &Path,
    real_path: &Path,
    cv: &RcsFile,
) -> anyhow::Result<Vec<SelectedRevision>> {
    let contents = reconstruct(cv)?;
    let branch_map = BranchMap::build(&cv.admin);
    let keywords_mode = keyword::mode_from_flags(cv.admin.expand.as_ref().map(|v| v.0.as_slice()));
    let executable = is_executable(rcs_path).unwrap_or(false);
    let rcs_path_str = rcs_path.to_string_lossy().into_owned();

    let mut revisions: Vec<&Num> = cv.delta.keys().collect();
    revisions.sort_by(|a, b| {
        let da = &cv.delta[*a];
        let db = &cv.delta[*b];
        da.date.cmp(&db.date).then_with(|| Reverse(*a).cmp(&Reverse(*b)))
    });

    let mut out = Vec::new();
    let mut state = ClassifierState::default();

    for revision in revisions {
        let delta = &cv.delta[revision];
        let dead = is_dead(delta);

        if !classify(revision, dead, &mut state) {
            continue;
        }

        let content = contents.get(revision).cloned().unwrap_or_default();
        let log = cv
            .delta_text
            .get(revision)
            .map(|dt| dt.log.0.clone())
            .unwrap_or_default();

        let checkout = Checkout {
            content,
            revision: revision.to_string(),
            date: delta.date,
            author: String::from_utf8_lossy(&delta.author).into_owned(),
            state: delta
                .state
                .as_ref()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .unwrap_or_default(),
            executable,
            rcs_path: rcs_path_str.clone(),
            keyword_mode: keywords_mode,
        };

        out.push(SelectedRevision {
            path: real_path.as_os_str().to_owned(),
            branch: branch_map.branch_for(revision),
            author: String::from_utf8_lossy(&delta.author).into_owned(),
            time: delta.date,
            log,
            commitid: delta
                .commit_id
                .as_ref()
                .map(|s| String::from_utf8_lossy(s).into_owned()),
            tags: branch_map.tags_for(revision).to_vec(),
            dead,
            checkout,
        });
    }

    Ok(out)
}

fn is_dead(delta: &Delta) -> bool {
    delta.state.as_ref().map(|s| s.0 == b"dead").unwrap_or(false)
}

#[derive(Default)]
struct ClassifierState {
    have_initial_revision: bool,
    novendor: bool,
    last_vendor_status_dead: Option<bool>,
}

/// Ports the vendor/trunk revision classification state machine used by
/// `cvs2gitdump.py`/`cvs2svndump.py`: decides whether a revision represents
/// a real commit (on the vendor branch or the trunk) or should be skipped
/// entirely (a branch revision, or a vendor-branch artifact CVS itself
/// wouldn't surface as a commit).
fn classify(revision: &Num, dead: bool, state: &mut ClassifierState) -> bool {
    let parts = match revision {
        Num::Commit(parts) => parts,
        Num::Branch(_) => return false,
    };

    match parts.as_slice() {
        [1, 1, 1, 1] => {
            // Record vendor status even when this import is skipped (already
            // emitted, or dead): a later `1.N` trunk revision still needs to
            // know whether the vendor side agreed the file was dead.
            state.last_vendor_status_dead = Some(dead);
            if state.have_initial_revision || dead {
                return false;
            }
            state.have_initial_revision = true;
            true
        }
        [1, 1, 1, n] if *n > 1 => {
            if state.novendor {
                return false;
            }
            state.last_vendor_status_dead = Some(dead);
            true
        }
        [a, b] => {
            if *a == 1 && *b == 1 {
                if state.have_initial_revision || dead {
                    return false;
                }
                state.have_initial_revision = true;
            } else if *a == 1 && *b != 1 {
                state.novendor = true;
            }

            let collapse = state.last_vendor_status_dead == Some(true) && dead;
            state.last_vendor_status_dead = None;
            !collapse
        }
        _ => false,
    }
}

/// Reconstructs the full text of every revision reachable from `head`,
/// applying each delta's ed script (or, for branch tips, cloning the
/// accumulated text so sibling branches don't corrupt each other's state).
fn reconstruct(cv: &RcsFile) -> anyhow::Result<HashMap<Num, Vec<u8>>> {
    let mut out = HashMap::new();

    let head = match cv.head() {
        Some(head) => head.clone(),
        None => return Ok(out),
    };

    let mut stack: Vec<(Num, Option<rcs_ed::File>)> = vec![(head, None)];

    while let Some((mut revision, mut contents)) = stack.pop() {
        loop {
            let (delta, delta_text) = match cv.revision(&revision) {
                Some(v) => v,
                None => break,
            };

            let mut file = match contents.take() {
                Some(mut file) => {
                    let commands =
                        rcs_ed::Script::parse(delta_text.text.as_cursor()).into_command_list()?;
                    file.apply_in_place(&commands)?;
                    file
                }
                None => rcs_ed::File::new(delta_text.text.as_cursor())?,
            };

            out.insert(revision.clone(), file.as_bytes());

            for branch_revision in delta.branches.iter() {
                stack.push((branch_revision.clone(), Some(file.clone())));
            }

            contents = Some(file);
            match &delta.next {
                Some(next) => revision = next.clone(),
                None => break,
            }
        }
    }

    Ok(out)
}

fn is_executable(path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)?;
    Ok(metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(parts: &[u64]) -> Num {
        Num::Commit(parts.to_vec())
    }

    #[test]
    fn test_s1_two_trunk_revisions_both_emitted() {
        let mut state = ClassifierState::default();
        assert!(classify(&commit(&[1, 1]), false, &mut state));
        assert!(classify(&commit(&[1, 2]), false, &mut state));
    }

    #[test]
    fn test_s2_vendor_then_trunk_both_emitted() {
        let mut state = ClassifierState::default();
        assert!(classify(&commit(&[1, 1, 1, 1]), false, &mut state));
        assert!(classify(&commit(&[1, 2]), false, &mut state));
    }

    #[test]
    fn test_s3_dead_vendor_then_dead_trunk_collapses() {
        let mut state = ClassifierState::default();
        // 1.1.1.1 precedes 1.1 at equal timestamps under the walk order.
        assert!(!classify(&commit(&[1, 1, 1, 1]), true, &mut state));
        assert!(!classify(&commit(&[1, 1]), true, &mut state));
    }

    #[test]
    fn test_dead_vendor_initial_then_alive_trunk_1_1_still_emits() {
        // The vendor import never really "happened" from CVS's point of
        // view, so a live 1.1 afterwards is still the file's real initial
        // revision.
        let mut state = ClassifierState::default();
        assert!(!classify(&commit(&[1, 1, 1, 1]), true, &mut state));
        assert!(classify(&commit(&[1, 1]), false, &mut state));
    }

    #[test]
    fn test_dead_vendor_initial_then_dead_later_vendor_import_collapses() {
        // Regression: a dead 1.1.1.1 must still update `last_vendor_status`
        // so a later dead 1.N on trunk correctly collapses against it.
        let mut state = ClassifierState::default();
        assert!(!classify(&commit(&[1, 1, 1, 1]), true, &mut state));
        assert!(!classify(&commit(&[1, 2]), true, &mut state));
    }

    #[test]
    fn test_later_vendor_import_skipped_once_trunk_seen() {
        let mut state = ClassifierState::default();
        assert!(classify(&commit(&[1, 1]), false, &mut state));
        assert!(classify(&commit(&[1, 2]), false, &mut state));
        // novendor is now latched; a later vendor import is an artifact.
        assert!(!classify(&commit(&[1, 1, 1, 2]), false, &mut state));
    }

    #[test]
    fn test_branch_revisions_always_skipped() {
        let mut state = ClassifierState::default();
        assert!(!classify(&Num::Branch(vec![1, 1, 2]), false, &mut state));
    }

    #[test]
    fn test_duplicate_initial_revision_skipped() {
        let mut state = ClassifierState::default();
        assert!(classify(&commit(&[1, 1]), false, &mut state));
        // A second 1.1 (shouldn't occur in real data, but the latch must
        // still hold) is not re-emitted.
        assert!(!classify(&commit(&[1, 1]), false, &mut state));
    }
}
