//! Imports a CVS repository into a `git fast-import` stream on stdout.

use std::{io, path::PathBuf};

use git_cvs_fast_import::{run_git_import, CommonOpt, GitImportOptions};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "git-import", about = "Imports a CVS repository as a git fast-import stream")]
struct Opt {
    #[structopt(flatten)]
    common: CommonOpt,

    #[structopt(help = "an existing git repository to resume an incremental import into")]
    target: Option<PathBuf>,

    #[structopt(
        short = "b",
        long = "branch",
        default_value = "master",
        help = "target branch name"
    )]
    branch: String,

    #[structopt(
        short = "l",
        long = "resume-from",
        help = "explicit commit-ish to resume from, instead of the branch's current tip"
    )]
    resume_from: Option<String>,

    #[structopt(long = "git", help = "path to the git command")]
    git_command: Option<PathBuf>,

    #[structopt(long = "mark-file", help = "path to the git fast-import mark file")]
    mark_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    flexi_logger::Logger::try_with_env_or_str("info")?.start()?;

    let opts = GitImportOptions {
        common: opt.common,
        branch: opt.branch,
        git_repo: opt.target,
        git_command: opt.git_command,
        resume_from: opt.resume_from,
        mark_file: opt.mark_file,
    };

    run_git_import(opts, io::stdout())
}
