//! Cross-reference table parser.
//!
//! Maps object numbers to their location: a byte offset for ordinary
//! objects, or an (object stream, index) pair for compressed ones.
//!
//! Reads classic `xref` tables and cross-reference streams (PDF 1.5+),
//! follows `/Prev` chains of incremental updates and the `/XRefStm` entry
//! of hybrid-reference files. Newer sections win over older ones.

use crate::error::{Error, Result};
use crate::lexer::{skip_ws, token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_at, parse_object};
use std::collections::{HashMap, HashSet};

/// Where to find one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free slot
    Free,
    /// Uncompressed object at a byte offset
    InUse {
        /// Byte offset of `N G obj`
        offset: usize,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing object stream
        stream_id: u32,
        /// Index within the object stream
        index: u32,
    },
}

/// Merged cross-reference information plus the newest trailer.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Option<Dictionary>,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry, replacing any existing one.
    pub fn add_entry(&mut self, id: u32, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// Look up an object's entry.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Object numbers of all in-use and compressed entries.
    pub fn live_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| !matches!(e, XRefEntry::Free))
            .map(|(id, _)| *id)
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = Some(trailer);
    }

    /// The trailer dictionary, if one was found.
    pub fn trailer(&self) -> Option<&Dictionary> {
        self.trailer.as_ref()
    }

    /// Fill in entries from an older section; existing entries are kept.
    pub fn merge_older(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = older.trailer;
        }
    }
}

/// Locate the offset after the last `startxref` keyword.
pub fn find_xref_offset(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let keyword = b"startxref";

    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    match token(&tail[pos + keyword.len()..]) {
        Ok((_, Token::Integer(n))) if n >= 0 && (n as usize) < data.len() => Ok(n as usize),
        _ => Err(Error::InvalidXref),
    }
}

/// Parse the cross-reference section at `offset` and every older section
/// reachable through `/Prev` and `/XRefStm`.
pub fn parse_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    parse_xref_chain(data, offset, &mut visited)
}

fn parse_xref_chain(data: &[u8], offset: usize, visited: &mut HashSet<usize>) -> Result<CrossRefTable> {
    if !visited.insert(offset) {
        log::warn!("Cycle in xref /Prev chain at offset {}", offset);
        return Ok(CrossRefTable::new());
    }

    let section = data.get(offset..).ok_or(Error::InvalidXref)?;
    let (section, _) = skip_ws(section).map_err(|_| Error::InvalidXref)?;

    let mut table = if section.starts_with(b"xref") {
        log::debug!("Classic xref table at offset {}", offset);
        parse_classic_table(data, offset)?
    } else {
        log::debug!("Trying xref stream at offset {}", offset);
        parse_xref_stream(data, offset)?
    };

    let trailer = table.trailer().cloned().unwrap_or_default();

    // Hybrid files: the stream holds the compressed entries the table omits
    if let Some(stm_offset) = trailer.get("XRefStm").and_then(|o| o.as_integer()) {
        match parse_xref_stream(data, stm_offset.max(0) as usize) {
            Ok(stm) => {
                let trailer = table.trailer.take();
                table.merge_older(stm);
                table.trailer = trailer;
            },
            Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
        }
    }

    if let Some(prev) = trailer.get("Prev").and_then(|o| o.as_integer()) {
        let older = parse_xref_chain(data, prev.max(0) as usize, visited)?;
        table.merge_older(older);
    }

    Ok(table)
}

fn next_integer(input: &[u8]) -> Option<(&[u8], i64)> {
    match token(input) {
        Ok((rest, Token::Integer(n))) => Some((rest, n)),
        _ => None,
    }
}

/// Parse `xref` subsections followed by `trailer << ... >>`.
fn parse_classic_table(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let (input, _) = skip_ws(&data[offset..]).map_err(|_| Error::InvalidXref)?;
    let mut input = input.strip_prefix(b"xref").ok_or(Error::InvalidXref)?;
    let mut table = CrossRefTable::new();

    loop {
        let (rest, _) = skip_ws(input).map_err(|_| Error::InvalidXref)?;
        if rest.starts_with(b"trailer") {
            input = &rest[b"trailer".len()..];
            break;
        }

        let (rest, start) = next_integer(rest).ok_or(Error::InvalidXref)?;
        let (rest, count) = next_integer(rest).ok_or(Error::InvalidXref)?;
        input = rest;

        for i in 0..count.max(0) {
            let (rest, entry_offset) = next_integer(input).ok_or(Error::InvalidXref)?;
            let (rest, generation) = next_integer(rest).ok_or(Error::InvalidXref)?;
            let (rest, _) = skip_ws(rest).map_err(|_| Error::InvalidXref)?;
            let kind = *rest.first().ok_or(Error::InvalidXref)?;
            input = &rest[1..];

            let id = u32::try_from(start + i).map_err(|_| Error::InvalidXref)?;
            let entry = match kind {
                b'n' => XRefEntry::InUse {
                    offset: entry_offset.max(0) as usize,
                    generation: generation.clamp(0, u16::MAX as i64) as u16,
                },
                b'f' => XRefEntry::Free,
                _ => return Err(Error::InvalidXref),
            };
            table.add_entry(id, entry);
        }
    }

    let (_, trailer) = parse_object(input).map_err(|_| Error::InvalidXref)?;
    match trailer {
        Object::Dictionary(dict) => table.set_trailer(dict),
        _ => return Err(Error::InvalidXref),
    }

    Ok(table)
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Parse a cross-reference stream object at `offset`.
fn parse_xref_stream(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let (_, stream) = parse_indirect_at(data, offset, &|_| None)?;
    if !stream.has_type("XRef") {
        return Err(Error::InvalidXref);
    }
    let dict = stream.as_dict().ok_or(Error::InvalidXref)?.clone();

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .map(|arr| arr.iter().filter_map(|o| o.as_integer()).map(|n| n.max(0) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 {
        return Err(Error::InvalidPdf("xref stream /W must have three entries".to_string()));
    }

    let size = dict.get("Size").and_then(|o| o.as_integer()).unwrap_or(0);
    let ranges: Vec<(i64, i64)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(arr) => arr
            .chunks(2)
            .filter_map(|pair| Some((pair.first()?.as_integer()?, pair.get(1)?.as_integer()?)))
            .collect(),
        None => vec![(0, size)],
    };

    let decoded = stream.decode_stream_data()?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::InvalidPdf("xref stream rows have zero width".to_string()));
    }

    let mut rows = decoded.chunks_exact(row_len);
    let mut table = CrossRefTable::new();

    for (start, count) in ranges {
        for i in 0..count.max(0) {
            let Some(row) = rows.next() else {
                log::warn!("xref stream at {} ends early", offset);
                break;
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // A zero-width type field means type 1
            let kind = if widths[0] == 0 { 1 } else { read_field(f1) };
            let (f2, f3) = (read_field(f2), read_field(f3));

            let id = u32::try_from(start + i).map_err(|_| Error::InvalidXref)?;
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InUse {
                    offset: f2 as usize,
                    generation: f3.min(u16::MAX as u64) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: f2 as u32,
                    index: f3 as u32,
                },
                other => {
                    log::debug!("Skipping xref entry of unknown type {}", other);
                    continue;
                },
            };
            table.add_entry(id, entry);
        }
    }

    table.set_trailer(dict);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::flate_encode;

    const CLASSIC: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
xref\n0 3\n0000000000 65535 f \n0000000009 00000 n \n0000000058 00000 n \n\
trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n110\n%%EOF\n";

    #[test]
    fn test_find_xref_offset() {
        assert_eq!(find_xref_offset(CLASSIC).unwrap(), 110);
        assert!(matches!(find_xref_offset(b"%PDF-1.4\nno xref"), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_parse_classic_table() {
        let table = parse_xref(CLASSIC, 110).unwrap();
        assert_eq!(table.get(0), Some(&XRefEntry::Free));
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::InUse {
                offset: 9,
                generation: 0
            })
        );
        assert_eq!(table.live_ids().count(), 2);
        let root = table.trailer().unwrap().get("Root").unwrap();
        assert_eq!(root.as_reference().unwrap().id, 1);
    }

    #[test]
    fn test_merge_older_keeps_newer_entries() {
        let mut newer = CrossRefTable::new();
        newer.add_entry(1, XRefEntry::InUse { offset: 500, generation: 0 });
        let mut older = CrossRefTable::new();
        older.add_entry(1, XRefEntry::InUse { offset: 9, generation: 0 });
        older.add_entry(2, XRefEntry::InUse { offset: 58, generation: 0 });
        older.set_trailer(HashMap::new());

        newer.merge_older(older);
        assert_eq!(newer.get(1), Some(&XRefEntry::InUse { offset: 500, generation: 0 }));
        assert_eq!(newer.len(), 2);
        assert!(newer.trailer().is_some());
    }

    #[test]
    fn test_prev_cycle_terminates() {
        // Point /Prev back at the same section
        let text = String::from_utf8(CLASSIC.to_vec()).unwrap();
        let data = text.replace("/Size 3 /Root 1 0 R", "/Size 3 /Prev 110 /Root 1 0 R");
        let table = parse_xref(data.as_bytes(), 110).unwrap();
        assert_eq!(table.live_ids().count(), 2);
    }

    fn xref_stream_file() -> (Vec<u8>, usize) {
        let mut out = b"%PDF-1.5\n".to_vec();
        let catalog_at = out.len();
        out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

        // Object 2 lives in object stream 3 at index 0
        let rows: Vec<[u8; 4]> = vec![
            [0, 0, 0, 0],
            [1, 0, catalog_at as u8, 0],
            [2, 0, 3, 0],
        ];
        let mut raw = Vec::new();
        for row in &rows {
            // PNG "None" row tag before every row
            raw.push(0);
            raw.extend_from_slice(row);
        }
        let body = flate_encode(&raw).unwrap();

        let xref_at = out.len();
        out.extend_from_slice(
            format!(
                "4 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Filter /FlateDecode \
                 /DecodeParms << /Predictor 12 /Columns 4 >> /Length {} >>\nstream\n",
                body.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&body);
        out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_at).as_bytes());
        (out, xref_at)
    }

    #[test]
    fn test_parse_xref_stream_with_predictor() {
        let (data, xref_at) = xref_stream_file();
        assert_eq!(find_xref_offset(&data).unwrap(), xref_at);

        let table = parse_xref(&data, xref_at).unwrap();
        assert_eq!(table.get(1), Some(&XRefEntry::InUse { offset: 9, generation: 0 }));
        assert_eq!(table.get(2), Some(&XRefEntry::Compressed { stream_id: 3, index: 0 }));
        assert!(table.trailer().unwrap().contains_key("Root"));
    }

    #[test]
    fn test_xref_stream_wrong_type_rejected() {
        let data = b"1 0 obj\n<< /Type /Catalog >>\nendobj\n";
        assert!(parse_xref(data, 0).is_err());
    }
}
