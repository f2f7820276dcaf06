//! Command-line options shared by both import dialects.

use std::{ffi::OsString, path::PathBuf, time::Duration};

use structopt::StructOpt;

/// Options common to the DAG-VCS and centralized-VCS importer binaries.
///
/// Public so that each binary's own `structopt` struct can `#[structopt(flatten)]`
/// it alongside its dialect-specific flags.
#[derive(Debug, StructOpt)]
pub struct CommonOpt {
    #[structopt(short = "z", long, default_value = "300", help = "time fuzz in seconds")]
    pub fuzz: u64,

    #[structopt(
        short = "e",
        long = "email-domain",
        help = "domain to append to author names to form committer emails"
    )]
    pub email_domain: Option<String>,

    #[structopt(
        short = "E",
        long = "encodings",
        use_delimiter = true,
        default_value = "utf-8,iso-8859-1",
        help = "candidate encodings for decoding log messages, tried in order"
    )]
    pub encodings: Vec<String>,

    #[structopt(
        short = "k",
        long = "keyword",
        help = "register an additional keyword as an Id-like alias"
    )]
    pub keywords: Vec<String>,

    #[structopt(
        short = "m",
        long = "module",
        help = "restrict the walk to a sub-path of the CVS root"
    )]
    pub modules: Vec<PathBuf>,

    #[structopt(short = "a", long = "all", help = "disable the trailing safety window")]
    pub dump_all: bool,

    #[structopt(help = "path to the CVS root to import from")]
    pub cvsroot: PathBuf,
}

impl CommonOpt {
    pub(crate) fn fuzz_duration(&self) -> Duration {
        Duration::from_secs(self.fuzz)
    }

    /// Rejects `.git` as a module path: it would collide with the target
    /// DAG-VCS repository's own metadata directory if the walk ever crossed
    /// into it.
    pub(crate) fn validate_modules(&self) -> anyhow::Result<()> {
        for module in &self.modules {
            if module.components().any(|c| c.as_os_str() == OsString::from(".git")) {
                anyhow::bail!("module path {:?} is not allowed to contain .git", module);
            }
        }

        Ok(())
    }
}
