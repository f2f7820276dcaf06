//! Discovers `,v` files under a CVS root and turns them into selected
//! revisions ready for the clusterer.
//!
//! Parsing and selection are embarrassingly parallel across files (each
//! `,v` file is an independent delta tree with its own classification state
//! machine), so this fans discovered paths out to a small worker pool over a
//! `flume` channel and funnels the results back to a single collector
//! thread, per the pre-stage parallelism the clustering model explicitly
//! allows.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use changeset::Clusterer;
use walkdir::WalkDir;

use crate::{checkout::Checkout, path::munge_raw_path, selector};

pub(crate) struct WalkResult {
    pub checkouts: Vec<Checkout>,
    pub clusterer: Clusterer<usize>,
}

/// Walks `cvsroot` (or, if `modules` is non-empty, just those sub-paths of
/// it), parsing and selecting every `,v` file found and feeding the results
/// into a fresh clusterer.
pub(crate) fn walk(
    cvsroot: &Path,
    modules: &[PathBuf],
    fuzz: Duration,
    jobs: usize,
) -> anyhow::Result<WalkResult> {
    let roots: Vec<PathBuf> = if modules.is_empty() {
        vec![cvsroot.to_path_buf()]
    } else {
        modules.iter().map(|module| cvsroot.join(module)).collect()
    };

    let paths = discover(&roots);

    let (work_tx, work_rx) = flume::unbounded::<PathBuf>();
    let (result_tx, result_rx) = flume::unbounded::<anyhow::Result<Vec<selector::SelectedRevision>>>();

    let total = paths.len();
    for path in paths {
        work_tx.send(path)?;
    }
    drop(work_tx);

    std::thread::scope(|scope| {
        for _ in 0..jobs.max(1) {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(path) = work_rx.recv() {
                    let result = parse_one(&path, cvsroot);
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut checkouts = Vec::new();
        let mut clusterer = Clusterer::new(fuzz);

        for _ in 0..total {
            let revisions = result_rx.recv()??;
            for revision in revisions {
                let content = if revision.dead {
                    None
                } else {
                    let id = checkouts.len();
                    checkouts.push(revision.checkout);
                    Some(id)
                };

                clusterer.add_revision(
                    revision.path,
                    content,
                    revision.branch,
                    revision.author,
                    revision.time,
                    &revision.log,
                    revision.commitid,
                    revision.tags,
                );
            }
        }

        Ok(WalkResult { checkouts, clusterer })
    })
}

fn parse_one(path: &Path, prefix: &Path) -> anyhow::Result<Vec<selector::SelectedRevision>> {
    let bytes = fs::read(path)
        .map_err(|err| anyhow::anyhow!("failed to read {}: {}", path.display(), err))?;
    let cv = comma_v::parse(&bytes)
        .map_err(|err| anyhow::anyhow!("failed to parse {}: {}", path.display(), err))?;

    let real_path = munge_raw_path(path, prefix);
    selector::select(path, &real_path, &cv)
        .map_err(|err| anyhow::anyhow!("failed to select revisions for {}: {}", path.display(), err))
}

/// Finds every `,v` file under `roots`, in an arbitrary order (the
/// clusterer's merge-and-requery loop is order-independent: classification
/// state is confined to a single file's delta tree).
fn discover(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for root in roots {
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if is_comma_v(path) {
                paths.push(path.to_path_buf());
            }
        }
    }

    paths
}

fn is_comma_v(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(",v"))
        .unwrap_or(false)
}
