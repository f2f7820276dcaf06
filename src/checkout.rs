//! The payload carried by a selected file revision until emission time.
//!
//! Keyword expansion has to happen after ordering and the incremental resume
//! scan have both completed (so a failed scan never leaves partial output
//! behind), which means every accepted revision's raw checkout bytes have to
//! be retained, alongside the metadata needed to expand keywords and build
//! the eventual blob/commit, until the emitter gets to it.

use std::time::SystemTime;

use keyword::Mode;

#[derive(Debug, Clone)]
pub(crate) struct Checkout {
    /// The reconstructed full text of this revision, before keyword
    /// expansion.
    pub content: Vec<u8>,
    pub revision: String,
    pub date: SystemTime,
    pub author: String,
    pub state: String,
    pub executable: bool,
    /// The physical path of the `,v` file on disk, used (unmunged) as the
    /// `$RCSfile$`/`$Source$`/`$Header$` substitution value.
    pub rcs_path: String,
    pub keyword_mode: Mode,
}
