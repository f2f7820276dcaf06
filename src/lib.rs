//! Reconstructs changesets from a CVS repository's `,v` files and emits them
//! as either a `git fast-import` stream or an SVN repository dump.
//!
//! The two binaries in this crate (`git-import`, `svn-import`) are thin CLI
//! wrappers around [`run_git_import`] and [`run_svn_import`]: everything that
//! isn't argument parsing lives here, so it can be exercised without going
//! through a subprocess.

mod branch_map;
mod checkout;
mod emit;
mod opt;
mod path;
mod selector;
mod walk;

use std::{
    io::Write,
    path::{Path, PathBuf},
    process::Command,
};

pub use opt::CommonOpt;

use git_cvs_fast_import_process::{git_tip, preflight, strip_email_domain, svn_tip, GitOpt, SvnOpt, Tip};
use git_fast_import::Writer as GitWriter;
use keyword::Keywords;
use svn_dump::Dumper;

/// Everything needed to drive an import into the DAG-VCS (`git
/// fast-import`) dialect.
pub struct GitImportOptions {
    pub common: CommonOpt,
    /// The branch ref commits are written onto.
    pub branch: String,
    /// The existing git repository to import into, if this is an
    /// incremental run.
    pub git_repo: Option<PathBuf>,
    /// Overrides the `git` executable used to probe `git_repo`.
    pub git_command: Option<PathBuf>,
    /// An explicit commit-ish to resume from, instead of `branch`'s current
    /// tip.
    pub resume_from: Option<String>,
    /// Path to the mark file `git fast-import` should read/write. Defaults
    /// to `.git-cvs-fast-import.marks` inside `git_repo` when one is given,
    /// and to a relative file in the current directory otherwise.
    pub mark_file: Option<PathBuf>,
}

/// Everything needed to drive an import into the centralized-VCS (SVN dump)
/// dialect.
pub struct SvnImportOptions {
    pub common: CommonOpt,
    /// The existing SVN repository (not a working copy) to probe for an
    /// incremental run's resume point.
    pub svn_repo: Option<PathBuf>,
    /// Overrides the `svnlook` executable used to probe `svn_repo`.
    pub svnlook_command: Option<PathBuf>,
    /// The dump-tree-relative root every emitted path is nested under.
    pub svn_path: Option<String>,
}

/// Runs a full import into the `git fast-import` dialect, writing the
/// stream to `out`.
pub fn run_git_import<W>(opts: GitImportOptions, out: W) -> anyhow::Result<()>
where
    W: Write + std::fmt::Debug,
{
    opts.common.validate_modules()?;

    let branch_ref = format!("refs/heads/{}", opts.branch);

    let resume_tip = match &opts.git_repo {
        Some(git_repo) => {
            let git_opt = GitOpt {
                git_command: opts
                    .git_command
                    .clone()
                    .map(Into::into)
                    .unwrap_or_else(|| "git".into()),
                git_repo: git_repo.clone().into(),
            };

            preflight(&git_opt)?;
            let tip = git_tip(&git_opt, &branch_ref, opts.resume_from.as_deref())?;
            Some(strip_domain(tip, opts.common.email_domain.as_deref()))
        }
        None => None,
    };

    log::info!("** walk cvs tree");
    let walked = walk::walk(
        &opts.common.cvsroot,
        &opts.common.modules,
        opts.common.fuzz_duration(),
        num_cpus::get(),
    )?;
    let changesets = walked.clusterer.into_changesets();
    log::info!("** cvs has {} changeset", changesets.len());

    let plan = emit::plan(&changesets, resume_tip.as_ref(), opts.common.dump_all)?;

    let mut keywords = Keywords::new();
    for keyword in &opts.common.keywords {
        keywords.add_id_alias(keyword.clone());
    }

    let config = emit::EmitConfig {
        email_domain: opts.common.email_domain.clone(),
        dump_all: opts.common.dump_all,
        encodings: opts.common.encodings.clone(),
        keywords,
    };

    let mark_file = opts.mark_file.clone().unwrap_or_else(|| {
        opts.git_repo
            .as_deref()
            .unwrap_or_else(|| Path::new("."))
            .join(".git-cvs-fast-import.marks")
    });

    let mut writer = GitWriter::new(out, mark_file)?;
    emit::emit_git(&mut writer, &branch_ref, &plan, &walked.checkouts, resume_tip.as_ref(), &config)?;

    log::info!("** dumped");
    Ok(())
}

/// Runs a full import into the SVN dump dialect, writing the stream to
/// `out`.
pub fn run_svn_import<W>(opts: SvnImportOptions, out: W) -> anyhow::Result<()>
where
    W: Write,
{
    opts.common.validate_modules()?;

    let (resume_tip, start_revision) = match &opts.svn_repo {
        Some(svn_repo) => {
            let svnlook_command = opts
                .svnlook_command
                .clone()
                .map(Into::into)
                .unwrap_or_else(|| "svnlook".into());
            let svn_opt = SvnOpt {
                svnlook_command,
                svn_repo: svn_repo.clone().into(),
                svn_path: opts.svn_path.clone().unwrap_or_default(),
            };

            let tip = svn_tip(&svn_opt)?.map(|tip| strip_domain(tip, opts.common.email_domain.as_deref()));
            let next = svnlook_youngest(&svn_opt.svnlook_command, svn_repo)?.map(|n| n + 1);
            (tip, next.unwrap_or(1))
        }
        None => (None, 1),
    };

    log::info!("** walk cvs tree");
    let walked = walk::walk(
        &opts.common.cvsroot,
        &opts.common.modules,
        opts.common.fuzz_duration(),
        num_cpus::get(),
    )?;
    let changesets = walked.clusterer.into_changesets();
    log::info!("** cvs has {} changeset", changesets.len());

    let plan = emit::plan(&changesets, resume_tip.as_ref(), opts.common.dump_all)?;

    let mut keywords = Keywords::new();
    for keyword in &opts.common.keywords {
        keywords.add_id_alias(keyword.clone());
    }

    let config = emit::EmitConfig {
        email_domain: opts.common.email_domain.clone(),
        dump_all: opts.common.dump_all,
        encodings: opts.common.encodings.clone(),
        keywords,
    };

    let root = opts.svn_path.as_deref().unwrap_or("");
    let mut dumper = Dumper::new(out, root)?;
    emit::emit_svn(&mut dumper, &plan, &walked.checkouts, start_revision, &config)?;

    log::info!("** dumped");
    Ok(())
}

fn strip_domain(tip: Tip, domain: Option<&str>) -> Tip {
    match domain {
        Some(domain) => Tip {
            author: strip_email_domain(&tip.author, domain),
            ..tip
        },
        None => tip,
    }
}

/// Finds the current youngest revision in an SVN repository, using the same
/// `svnlook youngest` invocation `git_cvs_fast_import_process::svn_tip`
/// makes internally (which discards the revision number itself, since it
/// only needs the tip author/time).
fn svnlook_youngest(svnlook_command: &std::ffi::OsStr, svn_repo: &Path) -> anyhow::Result<Option<u64>> {
    let output = Command::new(svnlook_command).arg("youngest").arg(svn_repo).output()?;
    if !output.status.success() {
        anyhow::bail!(
            "svnlook youngest {} exited with status {:?}",
            svn_repo.display(),
            output.status.code()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let rev: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("unparseable svnlook youngest output: {:?}", raw))?;

    Ok(Some(rev))
}
