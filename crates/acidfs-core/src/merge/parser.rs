//! Parses `merge-tree`'s byte stream into [`Record`]s.
//!
//! The grammar (spec's own "reverse-engineered" description): a sequence of
//! records, each a header line (first byte alphabetic) followed by zero or
//! more tree lines, ending at the next header line or — for `changed in
//! both` — at a diff hunk (first byte `@`) that runs until the next header.
//! A record boundary can only be recognized by reading one line past its
//! end, hence the one-line lookahead buffer.

use acidfs_git::Oid;

use crate::error::CoreError;
use crate::merge::types::{Record, RecordKind, Side, TreeLine};

/// Splits a byte buffer into lines without copying, holding back one line
/// of lookahead so a record can detect its own end.
struct LineScanner<'a> {
    lines: std::vec::IntoIter<&'a [u8]>,
    lookahead: Option<&'a [u8]>,
}

impl<'a> LineScanner<'a> {
    fn new(data: &'a [u8]) -> Self {
        let lines: Vec<&[u8]> = data
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
            .collect();
        let mut lines = lines.into_iter();
        let lookahead = lines.next();
        Self { lines, lookahead }
    }

    fn peek(&self) -> Option<&'a [u8]> {
        self.lookahead
    }

    fn advance(&mut self) -> Option<&'a [u8]> {
        let current = self.lookahead.take();
        self.lookahead = self.lines.next();
        current
    }
}

fn is_header_line(line: &[u8]) -> bool {
    line.first().is_some_and(u8::is_ascii_alphabetic)
}

fn is_diff_hunk_line(line: &[u8]) -> bool {
    line.first() == Some(&b'@')
}

fn classify_header(line: &[u8]) -> Result<RecordKind, CoreError> {
    match String::from_utf8_lossy(line).trim() {
        "added in local" | "removed in local" | "removed in both" => Ok(RecordKind::Ignored),
        "added in remote" => Ok(RecordKind::AddedInRemote),
        "removed in remote" => Ok(RecordKind::RemovedInRemote),
        "changed in both" => Ok(RecordKind::ChangedInBoth),
        "added in both" => Ok(RecordKind::AddedInBoth),
        other => Err(CoreError::Conflict(format!(
            "unmergeable change: unrecognized merge-tree header `{other}`"
        ))),
    }
}

fn parse_tree_line(line: &[u8]) -> Result<TreeLine, CoreError> {
    let tab = line
        .iter()
        .position(|&b| b == b'\t')
        .ok_or_else(|| CoreError::Conflict("malformed merge-tree line: no path separator".to_owned()))?;
    let (meta, path) = (&line[..tab], &line[tab + 1..]);
    let meta = String::from_utf8_lossy(meta);
    let mut fields = meta.split_whitespace();
    let whose = fields
        .next()
        .ok_or_else(|| CoreError::Conflict("malformed merge-tree line: missing side".to_owned()))?;
    let mode = fields
        .next()
        .ok_or_else(|| CoreError::Conflict("malformed merge-tree line: missing mode".to_owned()))?;
    let oid = fields
        .next()
        .ok_or_else(|| CoreError::Conflict("malformed merge-tree line: missing oid".to_owned()))?;

    let whose = match whose {
        "base" => Side::Base,
        "our" => Side::Our,
        "their" => Side::Their,
        other => {
            return Err(CoreError::Conflict(format!("malformed merge-tree line: unknown side `{other}`")));
        }
    };
    if mode != "100644" {
        return Err(CoreError::Conflict(format!(
            "unsupported tree entry mode `{mode}` in merge record"
        )));
    }
    let oid: Oid = oid.parse().map_err(acidfs_git::StoreError::from)?;

    Ok(TreeLine {
        whose,
        oid,
        path: path.to_vec(),
    })
}

/// Parse the full `merge-tree` output into a sequence of [`Record`]s.
pub fn parse(data: &[u8]) -> Result<Vec<Record>, CoreError> {
    let mut scanner = LineScanner::new(data);
    let mut records = Vec::new();

    while let Some(header_line) = scanner.peek() {
        if !is_header_line(header_line) {
            return Err(CoreError::Conflict(format!(
                "expected a merge-tree header line, found: {:?}",
                String::from_utf8_lossy(header_line)
            )));
        }
        scanner.advance();
        let kind = classify_header(header_line)?;

        let mut lines = Vec::new();
        let mut diff = Vec::new();
        loop {
            match scanner.peek() {
                None => break,
                Some(line) if is_header_line(line) => break,
                Some(line) if is_diff_hunk_line(line) => {
                    loop {
                        match scanner.peek() {
                            Some(diff_line) if !is_header_line(diff_line) => {
                                diff.extend_from_slice(diff_line);
                                diff.push(b'\n');
                                scanner.advance();
                            }
                            _ => break,
                        }
                    }
                    break;
                }
                Some(line) => {
                    lines.push(parse_tree_line(line)?);
                    scanner.advance();
                }
            }
        }
        records.push(Record { kind, lines, diff });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> String {
        format!("{byte:02x}").repeat(20)
    }

    #[test]
    fn parses_added_in_remote() {
        let data = format!("added in remote\nthe 100644 {}\tfoo.txt\n", oid(0xaa));
        // "the" is intentionally wrong to sanity check our own fixture below;
        // replaced with "their" in the real assertion.
        let data = data.replace("the ", "their ");
        let records = parse(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, RecordKind::AddedInRemote);
        assert_eq!(records[0].lines.len(), 1);
        assert_eq!(records[0].lines[0].whose, Side::Their);
        assert_eq!(records[0].lines[0].path, b"foo.txt");
    }

    #[test]
    fn parses_removed_in_remote() {
        let o = oid(0xbb);
        let data = format!("removed in remote\nour 100644 {o}\tfoo.txt\nbase 100644 {o}\tfoo.txt\n");
        let records = parse(data.as_bytes()).unwrap();
        assert_eq!(records[0].kind, RecordKind::RemovedInRemote);
        assert_eq!(records[0].lines.len(), 2);
    }

    #[test]
    fn parses_changed_in_both_with_diff_hunk() {
        let o = oid(0xcc);
        let data = format!(
            "changed in both\nbase 100644 {o}\tfoo.txt\nour 100644 {o}\tfoo.txt\ntheir 100644 {o}\tfoo.txt\n@@ -1,1 +1,1 @@\n-old\n+new\n"
        );
        let records = parse(data.as_bytes()).unwrap();
        assert_eq!(records[0].kind, RecordKind::ChangedInBoth);
        assert_eq!(records[0].lines.len(), 3);
        assert!(records[0].diff.starts_with(b"@@"));
    }

    #[test]
    fn rejects_unknown_header() {
        let err = parse(b"frobnicated in remote\n").unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn rejects_unsupported_mode() {
        let o = oid(0xdd);
        let data = format!("added in remote\ntheir 120000 {o}\tlink\n");
        let err = parse(data.as_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn multiple_records_in_sequence() {
        let o = oid(0xee);
        let data = format!("added in remote\ntheir 100644 {o}\ta.txt\nremoved in remote\nour 100644 {o}\tb.txt\nbase 100644 {o}\tb.txt\n");
        let records = parse(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
    }
}
