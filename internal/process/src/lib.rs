//! Resolving where a previous import left off, for both supported output
//! dialects.
//!
//! Neither `git fast-import` nor the SVN dump format are driven through a
//! long-lived child process any more: both writers take anything
//! implementing `std::io::Write`, so the importer binaries write straight to
//! their own stdout (or a file) instead of piping into a spawned VCS
//! process. What's left here is the preflight/tip-probing logic the
//! original importers ran against the *target* repository before deciding
//! how far back an incremental import needs to go.

mod error;
mod git;
mod svn;
mod tip;

pub use self::error::Error;
pub use self::git::{preflight, strip_email_domain, tip as git_tip, GitOpt};
pub use self::svn::{tip as svn_tip, SvnOpt};
pub use self::tip::Tip;
