//! Imports a CVS repository into an SVN repository dump on stdout.

use std::{io, path::PathBuf};

use git_cvs_fast_import::{run_svn_import, CommonOpt, SvnImportOptions};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "svn-import", about = "Imports a CVS repository as an SVN repository dump")]
struct Opt {
    #[structopt(flatten)]
    common: CommonOpt,

    #[structopt(help = "an existing SVN repository to resume an incremental import into")]
    svnroot: Option<PathBuf>,

    #[structopt(help = "the dump-tree-relative root every emitted path is nested under")]
    svnpath: Option<String>,

    #[structopt(long = "svnlook", help = "path to the svnlook command")]
    svnlook_command: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    flexi_logger::Logger::try_with_env_or_str("info")?.start()?;

    let opts = SvnImportOptions {
        common: opt.common,
        svn_repo: opt.svnroot,
        svnlook_command: opt.svnlook_command,
        svn_path: opt.svnpath,
    };

    run_svn_import(opts, io::stdout())
}
