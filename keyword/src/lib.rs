//! RCS keyword expansion (`rcsfile(5)`'s `$Author$`, `$Log$`, and friends).
//!
//! This mirrors the per-line substitution algorithm RCS and CVS both
//! implement: each recognised keyword, written as `$Keyword$` or
//! `$Keyword: ... $` in checked-out file content, is rewritten with the
//! revision's metadata substituted in, according to the `-k` expansion mode
//! recorded in the `,v` file's admin section.

use std::{collections::HashMap, time::SystemTime};

use bitflags::bitflags;
use chrono::{Datelike, TimeZone, Utc};

bitflags! {
    /// Which pieces of revision metadata a keyword pulls in.
    pub struct Attr: u16 {
        const AUTHOR   = 1 << 0;
        const DATE     = 1 << 1;
        const LOG      = 1 << 2;
        const NAME     = 1 << 3;
        const RCSFILE  = 1 << 4;
        const REVISION = 1 << 5;
        const SOURCE   = 1 << 6;
        const STATE    = 1 << 7;
        const FULLPATH = 1 << 8;
        const MDOCDATE = 1 << 9;
        const LOCKER   = 1 << 10;

        const ID = Self::RCSFILE.bits | Self::REVISION.bits | Self::DATE.bits
            | Self::AUTHOR.bits | Self::STATE.bits;
        const HEADER = Self::ID.bits | Self::FULLPATH.bits;
    }
}

bitflags! {
    /// The `-kkv`/`-kv`/`-ko`/`-kb` family of expansion modes, decoded from
    /// the `,v` file's `expand` admin field.
    pub struct Mode: u8 {
        /// Suppress expansion entirely (`-kb`).
        const NONE = 1 << 0;
        /// Include the keyword name (`$Keyword: ...$` rather than `$...$`).
        const NAME = 1 << 1;
        /// Include the keyword's value.
        const VAL = 1 << 2;
        /// Include the locker's name (`-kkvl`).
        const LKR = 1 << 3;
        /// Generate the unexpanded, "old" keyword string (`-ko`).
        const OLD = 1 << 4;
        /// The flag string itself was malformed.
        const ERR = 1 << 5;

        const DEFAULT = Self::NAME.bits | Self::VAL.bits;
        const KVL = Self::NAME.bits | Self::VAL.bits | Self::LKR.bits;
    }
}

/// Decodes a `,v` file's `expand` admin field into a [`Mode`].
///
/// An unrecognised flag character sets [`Mode::ERR`], but since RCS treats
/// that as "couldn't parse the expansion mode", we fall back to the default
/// `kv` behaviour rather than refusing to expand anything.
pub fn mode_from_flags(flags: Option<&[u8]>) -> Mode {
    let flags = match flags {
        Some(flags) if !flags.is_empty() => flags,
        _ => return Mode::DEFAULT,
    };

    let mut mode = Mode::empty();
    for &fc in flags {
        match fc {
            b'k' => mode |= Mode::NAME,
            b'v' => mode |= Mode::VAL,
            b'l' => mode |= Mode::LKR,
            b'o' => {
                if flags.len() != 1 {
                    mode |= Mode::ERR;
                }
                mode |= Mode::OLD;
            }
            b'b' => {
                if flags.len() != 1 {
                    mode |= Mode::ERR;
                }
                mode |= Mode::NONE;
            }
            _ => mode |= Mode::ERR,
        }
    }

    if mode.contains(Mode::ERR) && !mode.intersects(Mode::NAME | Mode::VAL | Mode::OLD | Mode::NONE) {
        mode = Mode::DEFAULT | Mode::ERR;
    }

    mode
}

/// The table of keyword names recognised during expansion.
///
/// Starts out with the RCS built-ins; additional `Id`-shaped aliases can be
/// registered with [`Keywords::add_id_alias`] (the `-k` CLI flag).
#[derive(Debug, Clone)]
pub struct Keywords {
    table: HashMap<Vec<u8>, Attr>,
}

impl Default for Keywords {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(b"Author".to_vec(), Attr::AUTHOR);
        table.insert(b"Date".to_vec(), Attr::DATE);
        table.insert(b"Header".to_vec(), Attr::HEADER);
        table.insert(b"Id".to_vec(), Attr::ID);
        table.insert(b"Log".to_vec(), Attr::LOG);
        table.insert(b"Name".to_vec(), Attr::NAME);
        table.insert(b"RCSfile".to_vec(), Attr::RCSFILE);
        table.insert(b"Revision".to_vec(), Attr::REVISION);
        table.insert(b"Source".to_vec(), Attr::SOURCE);
        table.insert(b"State".to_vec(), Attr::STATE);
        table.insert(b"Mdocdate".to_vec(), Attr::MDOCDATE);
        table.insert(b"Locker".to_vec(), Attr::LOCKER);

        Self { table }
    }
}

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` as an additional alias for `$Id$`-shaped expansion.
    /// Mirrors `-k keyword` in the original importers, which let a CVS
    /// vendor's local keyword (e.g. `OpenBSD`) behave like `$Id$`.
    pub fn add_id_alias<S: Into<String>>(&mut self, name: S) {
        self.table.insert(name.into().into_bytes(), Attr::ID);
    }

    fn find<'b>(&'b self, line: &[u8]) -> Option<(usize, usize, &'b [u8])> {
        let mut i = 0;
        while i < line.len() {
            if line[i] == b'$' {
                for name in self.table.keys() {
                    let end = i + 1 + name.len();
                    if end <= line.len()
                        && &line[i + 1..end] == name.as_slice()
                        && end < line.len()
                        && (line[end] == b'$' || line[end] == b':')
                    {
                        return Some((i, end, name.as_slice()));
                    }
                }
            }
            i += 1;
        }
        None
    }
}

/// The per-revision metadata substituted into keyword values.
#[derive(Debug, Clone)]
pub struct RevisionMeta<'a> {
    pub revision: &'a str,
    pub date: SystemTime,
    pub author: &'a str,
    pub state: &'a str,
    pub log: &'a [u8],
    /// The path used for `$RCSfile$`/`$Header$`/`$Source$` substitution: the
    /// `,v` file's own path, not the munged working-tree path.
    pub rcs_path: &'a str,
}

const MAX_KEYWORD_VALUE_LEN: usize = 255;

/// Expands every recognised keyword occurrence in `content` (the revision's
/// checked-out full text) according to `mode`.
///
/// If `mode` indicates suppressed or old-style expansion, `content` is
/// returned unchanged: those modes never touch the checked-out bytes.
pub fn expand(content: &[u8], keywords: &Keywords, mode: Mode, meta: &RevisionMeta) -> Vec<u8> {
    if mode.intersects(Mode::NONE | Mode::OLD) {
        return content.to_vec();
    }

    let lines: Vec<&[u8]> = content.split(|&b| b == b'\n').collect();
    let mut out: Vec<Vec<u8>> = Vec::with_capacity(lines.len());

    for line in lines {
        let (expanded, extra) = expand_line(line, keywords, mode, meta);
        out.push(expanded);
        if let Some(extra) = extra {
            out.push(extra);
        }
    }

    out.join(&b'\n')
}

fn expand_line(line: &[u8], keywords: &Keywords, mode: Mode, meta: &RevisionMeta) -> (Vec<u8>, Option<Vec<u8>>) {
    let mut line = line;
    let mut line0: Vec<u8> = Vec::new();
    let mut logbuf: Option<Vec<u8>> = None;

    while let Some((start, name_end, name)) = keywords.find(line) {
        // Find the closing `$` (or, for a bare `$Keyword$`, the same `$`
        // that already terminated the name).
        let close = match line[name_end..].iter().position(|&b| b == b'$') {
            Some(offset) => name_end + offset,
            None => break,
        };

        let prefix = &line[..start];
        let attr = keywords
            .table
            .get(name)
            .copied()
            .unwrap_or_else(Attr::empty);

        let mut expbuf: Vec<u8> = Vec::new();
        if mode.contains(Mode::NAME) {
            expbuf.push(b'$');
            expbuf.extend_from_slice(name);
            if mode.contains(Mode::VAL) {
                expbuf.extend_from_slice(b": ");
            }
        }

        if mode.contains(Mode::VAL) {
            if attr.contains(Attr::RCSFILE) {
                if attr.contains(Attr::FULLPATH) {
                    expbuf.extend_from_slice(meta.rcs_path.as_bytes());
                } else {
                    expbuf.extend_from_slice(basename(meta.rcs_path).as_bytes());
                }
                expbuf.push(b' ');
            }
            if attr.contains(Attr::REVISION) {
                expbuf.extend_from_slice(meta.revision.as_bytes());
                expbuf.push(b' ');
            }
            if attr.contains(Attr::DATE) {
                expbuf.extend_from_slice(format_date(meta.date).as_bytes());
            }
            if attr.contains(Attr::MDOCDATE) {
                expbuf.extend_from_slice(format_mdocdate(meta.date).as_bytes());
            }
            if attr.contains(Attr::AUTHOR) {
                expbuf.extend_from_slice(meta.author.as_bytes());
                expbuf.push(b' ');
            }
            if attr.contains(Attr::STATE) {
                expbuf.extend_from_slice(meta.state.as_bytes());
                expbuf.push(b' ');
            }
            if attr.contains(Attr::LOG) {
                let filename = if attr.contains(Attr::FULLPATH) {
                    meta.rcs_path.to_string()
                } else {
                    basename(meta.rcs_path)
                };
                expbuf.extend_from_slice(filename.as_bytes());
                expbuf.push(b' ');

                let mut buf = Vec::new();
                buf.extend_from_slice(prefix);
                buf.extend_from_slice(
                    format!(
                        "Revision {}  {}  {}\n",
                        meta.revision,
                        format_date(meta.date).trim_end(),
                        meta.author
                    )
                    .as_bytes(),
                );
                for logline in trim_trailing_newlines(meta.log).split(|&b| b == b'\n') {
                    if logline.is_empty() {
                        buf.extend_from_slice(rtrim(prefix));
                        buf.push(b'\n');
                    } else {
                        buf.extend_from_slice(prefix);
                        buf.extend_from_slice(ltrim(logline));
                        buf.push(b'\n');
                    }
                }
                let remainder = &line[close + 1..];
                if remainder.is_empty() {
                    buf.extend_from_slice(rtrim(prefix));
                } else {
                    buf.extend_from_slice(prefix);
                    buf.extend_from_slice(ltrim(remainder));
                }
                logbuf = Some(buf);
                // The rest of the original line has been consumed into the
                // log block; nothing remains to re-scan for more keywords.
                line0.extend_from_slice(prefix);
                if mode.contains(Mode::NAME) {
                    expbuf.push(b'$');
                }
                expbuf.truncate(MAX_KEYWORD_VALUE_LEN);
                line0.extend_from_slice(&expbuf);
                return (line0, logbuf);
            }
            if attr.contains(Attr::SOURCE) {
                expbuf.extend_from_slice(meta.rcs_path.as_bytes());
                expbuf.push(b' ');
            }
            if attr.intersects(Attr::NAME | Attr::LOCKER) {
                expbuf.push(b' ');
            }
        }

        if mode.contains(Mode::NAME) {
            expbuf.push(b'$');
        }
        expbuf.truncate(MAX_KEYWORD_VALUE_LEN);

        line0.extend_from_slice(prefix);
        line0.extend_from_slice(&expbuf);

        line = &line[close + 1..];
    }

    line0.extend_from_slice(line);
    (line0, logbuf)
}

fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn trim_trailing_newlines(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] == b'\n' || bytes[end - 1] == b'\r') {
        end -= 1;
    }
    &bytes[..end]
}

fn rtrim(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] as char).is_whitespace() {
        end -= 1;
    }
    &bytes[..end]
}

fn ltrim(bytes: &[u8]) -> &[u8] {
    let mut start = 0;
    while start < bytes.len() && (bytes[start] as char).is_whitespace() {
        start += 1;
    }
    &bytes[start..]
}

fn format_date(time: SystemTime) -> String {
    let secs = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let dt = Utc.timestamp(secs, 0);
    format!("{} ", dt.format("%Y/%m/%d %H:%M:%S"))
}

/// `$Mdocdate$`: BSD mdoc's `Month D, Year` date stamp, with the day
/// space-padded to two characters regardless of whether it's single-digit.
fn format_mdocdate(time: SystemTime) -> String {
    let secs = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let dt = Utc.timestamp(secs, 0);
    format!("{} {:2} {} ", dt.format("%B"), dt.day(), dt.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn meta<'a>(revision: &'a str, log: &'a [u8]) -> RevisionMeta<'a> {
        RevisionMeta {
            revision,
            date: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000),
            author: "jsmith",
            state: "Exp",
            log,
            rcs_path: "src/foo.c",
        }
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(mode_from_flags(None), Mode::DEFAULT);
        assert_eq!(mode_from_flags(Some(b"kv")), Mode::NAME | Mode::VAL);
        assert_eq!(mode_from_flags(Some(b"kvl")), Mode::KVL);
        assert_eq!(mode_from_flags(Some(b"o")), Mode::OLD);
        assert_eq!(mode_from_flags(Some(b"b")), Mode::NONE);
        assert!(mode_from_flags(Some(b"ob")).contains(Mode::ERR));
    }

    #[test]
    fn test_expand_id_keyword() {
        let keywords = Keywords::new();
        let content = b"hello\n$Id$\nworld";
        let out = expand(content, &keywords, Mode::DEFAULT, &meta("1.3", b"log message"));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("$Id: foo.c 1.3 "), "{}", text);
        assert!(text.contains("jsmith Exp $"), "{}", text);
    }

    #[test]
    fn test_expand_suppressed_for_b_mode() {
        let keywords = Keywords::new();
        let content = b"$Id$\n";
        let out = expand(content, &keywords, Mode::NONE, &meta("1.1", b"msg"));
        assert_eq!(out, content.to_vec());
    }

    #[test]
    fn test_add_id_alias() {
        let mut keywords = Keywords::new();
        keywords.add_id_alias("OpenBSD");
        let content = b"$OpenBSD$";
        let out = expand(content, &keywords, Mode::DEFAULT, &meta("1.1", b"msg"));
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("$OpenBSD: foo.c 1.1 "), "{}", text);
    }

    #[test]
    fn test_log_keyword_block() {
        let keywords = Keywords::new();
        let content = b"// $Log$\n";
        let out = expand(
            content,
            &keywords,
            Mode::DEFAULT,
            &meta("1.2", b"Fixed a bug.\n\nSee also issue 4."),
        );
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Revision 1.2"));
        assert!(text.contains("// Fixed a bug."));
        assert!(text.contains("//\n"));
        assert!(text.contains("// See also issue 4."));
    }

    #[test]
    fn test_value_capped_at_255_bytes() {
        let mut keywords = Keywords::new();
        keywords.add_id_alias("Huge");
        let long_log = vec![b'x'; 400];
        let content = b"$Huge$";
        let out = expand(content, &keywords, Mode::DEFAULT, &meta("1.1", &long_log));
        // The keyword attribute set for an Id-alias doesn't include Log, so
        // this mostly exercises that expansion doesn't panic on oversized
        // values; the cap is exercised more directly for RCSfile/Source
        // combinations in real CVS trees with long paths.
        assert!(!out.is_empty());
    }
}
