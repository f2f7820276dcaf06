//! Per-file branch and tag resolution, built from an RCS file's `symbols`
//! table.
//!
//! RCS has no first-class notion of "the vendor branch" or "a release tag":
//! those are conventions layered on top of dotted revision numbers and the
//! admin section's symbol table. [`BranchMap`] re-derives them per file:
//!
//! * `1` (the trunk) is always `HEAD`.
//! * Any three-component branch symbol (`1.1.1`, or a deeper magic-zero
//!   branch that collapses to three components once the zero is stripped)
//!   is treated as the vendor branch. The selector only ever asks about
//!   trunk and vendor revisions, so the two cases this conflates - a literal
//!   three-component branch and a magic-zero-collapsed one - are never
//!   distinguished downstream anyway.
//! * Any other branch symbol keeps its own tag name, for completeness, even
//!   though the importer currently only walks `HEAD` and `VENDOR`.
//! * A two-component symbol whose branch is `HEAD` is a revision tag
//!   candidate (CVS's closest equivalent of a lightweight tag).

use std::collections::HashMap;

use comma_v::{Admin, Num, Sym};

pub(crate) const HEAD: &str = "HEAD";
pub(crate) const VENDOR: &str = "VENDOR";

#[derive(Debug)]
pub(crate) struct BranchMap {
    branches: HashMap<Num, String>,
    tags: HashMap<Num, Vec<String>>,
}

impl BranchMap {
    pub(crate) fn build(admin: &Admin) -> Self {
        let mut branches: HashMap<Num, String> = HashMap::new();

        // CVS always numbers the trunk "1" and the vendor branch "1.1.1",
        // whether or not either has a symbol pointing at it.
        branches.insert(Num::Branch(vec![1]), HEAD.to_string());
        branches.insert(Num::Branch(vec![1, 1, 1]), VENDOR.to_string());

        if let Some(head) = &admin.head {
            branches.insert(head.to_branch(), HEAD.to_string());
        }

        for (sym, num) in admin.symbols.iter() {
            if let Num::Branch(parts) = num {
                if parts.len() == 3 {
                    branches.insert(num.clone(), VENDOR.to_string());
                } else {
                    branches
                        .entry(num.clone())
                        .or_insert_with(|| sym_to_string(sym));
                }
            }
        }

        let mut tags: HashMap<Num, Vec<String>> = HashMap::new();
        for (sym, num) in admin.symbols.iter() {
            if let Num::Commit(_) = num {
                let on_head = branches
                    .get(&num.to_branch())
                    .map(|name| name == HEAD)
                    .unwrap_or(false);
                if on_head {
                    tags.entry(num.clone()).or_default().push(sym_to_string(sym));
                }
            }
        }

        Self { branches, tags }
    }

    /// The logical branch name (`HEAD`, `VENDOR`, or a named branch) that a
    /// revision belongs to.
    pub(crate) fn branch_for(&self, revision: &Num) -> String {
        let branch = revision.to_branch();
        self.branches
            .get(&branch)
            .cloned()
            .unwrap_or_else(|| branch.to_string())
    }

    /// Revision tags attached to exactly this revision number.
    pub(crate) fn tags_for(&self, revision: &Num) -> &[String] {
        self.tags.get(revision).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn sym_to_string(sym: &Sym) -> String {
    String::from_utf8_lossy(sym).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap as StdHashMap, str::FromStr};

    fn admin_with(head: &str, symbols: &[(&str, &str)]) -> Admin {
        let mut map = StdHashMap::new();
        for (name, rev) in symbols {
            map.insert(Sym::from(name.as_bytes().to_vec()), Num::from_str(rev).unwrap());
        }
        Admin {
            head: Some(Num::from_str(head).unwrap()),
            branch: None,
            access: vec![],
            symbols: map,
            locks: StdHashMap::new(),
            strict: false,
            integrity: None,
            comment: None,
            expand: None,
        }
    }

    #[test]
    fn test_vendor_branch_detected() {
        let admin = admin_with("1.3", &[("VENDOR_BRANCH", "1.1.1")]);
        let map = BranchMap::build(&admin);
        assert_eq!(map.branch_for(&Num::from_str("1.1.1.2").unwrap()), VENDOR);
        assert_eq!(map.branch_for(&Num::from_str("1.2").unwrap()), HEAD);
    }

    #[test]
    fn test_magic_zero_vendor_branch() {
        // "1.1.0.1" collapses (drop the magic zero) to Branch([1,1,1]),
        // same representation as a literal three-component vendor branch.
        let admin = admin_with("1.3", &[("VENDOR_BRANCH", "1.1.0.1")]);
        let map = BranchMap::build(&admin);
        assert_eq!(map.branch_for(&Num::from_str("1.1.1.4").unwrap()), VENDOR);
    }

    #[test]
    fn test_revision_tag_candidate_on_head() {
        let admin = admin_with("1.2", &[("RELEASE_1_0", "1.2")]);
        let map = BranchMap::build(&admin);
        assert_eq!(map.tags_for(&Num::from_str("1.2").unwrap()), &["RELEASE_1_0".to_string()]);
    }

    #[test]
    fn test_two_component_tag_on_non_head_branch_not_a_candidate() {
        let admin = admin_with("1.2", &[("SIDE", "1.1.3"), ("SIDE_TAG", "1.1.3.1")]);
        let map = BranchMap::build(&admin);
        assert!(map.tags_for(&Num::from_str("1.1.3.1").unwrap()).is_empty());
    }
}
