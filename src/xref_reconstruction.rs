//! Cross-reference reconstruction for damaged files.
//!
//! When `startxref` is missing or points at garbage, the whole file is
//! scanned for `N G obj` headers. Later headers for the same object number
//! replace earlier ones, matching how incremental updates append.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_at, parse_object};
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref RE_OBJ_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(\d+)\s+(\d+)\s+obj\b").expect("valid regex");
    static ref RE_TRAILER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"trailer\s*<<").expect("valid regex");
}

/// Bytes that may start an object body; anything else after `obj` is a
/// false positive (for example text inside a content stream).
fn starts_object(rest: &[u8]) -> bool {
    let first = rest.iter().copied().find(|c| !c.is_ascii_whitespace());
    matches!(
        first,
        Some(b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-' | b'+' | b'.' | b'0'..=b'9')
    )
}

/// Rebuild the cross-reference table and trailer by scanning `data`.
pub fn reconstruct_xref(data: &[u8]) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref by scanning {} bytes", data.len());

    let mut table = CrossRefTable::new();
    let mut found = 0usize;

    for caps in RE_OBJ_HEADER.captures_iter(data) {
        let (Some(whole), Some(id), Some(gen)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        // Reject matches that start in the middle of a number
        if whole.start() > 0 && data[whole.start() - 1].is_ascii_digit() {
            continue;
        }
        if !starts_object(&data[whole.end()..]) {
            continue;
        }

        let id = std::str::from_utf8(id.as_bytes()).ok().and_then(|s| s.parse::<u32>().ok());
        let generation = std::str::from_utf8(gen.as_bytes()).ok().and_then(|s| s.parse::<u16>().ok());
        let (Some(id), Some(generation)) = (id, generation) else {
            log::debug!("Unparseable object header at offset {}", whole.start());
            continue;
        };
        table.add_entry(
            id,
            XRefEntry::InUse {
                offset: whole.start(),
                generation,
            },
        );
        found += 1;
    }

    if found == 0 {
        return Err(Error::InvalidPdf("No objects found during xref reconstruction".to_string()));
    }
    log::info!("Reconstructed xref with {} object headers", found);

    let trailer = match find_trailer(data) {
        Some(trailer) => trailer,
        None => minimal_trailer(data, &table)?,
    };
    table.set_trailer(trailer);
    Ok(table)
}

/// The last `trailer << ... >>` that names a /Root.
fn find_trailer(data: &[u8]) -> Option<Dictionary> {
    RE_TRAILER
        .find_iter(data)
        .filter_map(|m| {
            let input = &data[m.start() + b"trailer".len()..];
            match parse_object(input) {
                Ok((_, Object::Dictionary(dict))) if dict.contains_key("Root") => Some(dict),
                _ => None,
            }
        })
        .last()
}

/// Build `<< /Root .. /Size .. /Info .. >>` from the catalog (and a
/// document information dictionary, if any) found among the objects.
fn minimal_trailer(data: &[u8], table: &CrossRefTable) -> Result<Dictionary> {
    let mut catalog = None;
    let mut info = None;
    let mut max_id = 0;

    let mut ids: Vec<u32> = table.live_ids().collect();
    ids.sort_unstable();

    for id in ids {
        max_id = max_id.max(id);
        let Some(&XRefEntry::InUse { offset, .. }) = table.get(id) else {
            continue;
        };
        let Ok((obj_ref, obj)) = parse_indirect_at(data, offset, &|_| None) else {
            continue;
        };
        if obj.has_type("Catalog") {
            catalog = Some(obj_ref);
        } else if is_info_dictionary(&obj) {
            info = Some(obj_ref);
        }
    }

    let catalog: ObjectRef =
        catalog.ok_or_else(|| Error::InvalidPdf("Could not find catalog in reconstructed xref".to_string()))?;
    log::info!("Using object {} as catalog", catalog);

    let mut trailer = HashMap::new();
    trailer.insert("Root".to_string(), Object::Reference(catalog));
    trailer.insert("Size".to_string(), Object::Integer(max_id as i64 + 1));
    if let Some(info) = info {
        trailer.insert("Info".to_string(), Object::Reference(info));
    }
    Ok(trailer)
}

fn is_info_dictionary(obj: &Object) -> bool {
    match obj {
        Object::Dictionary(d) => {
            !d.contains_key("Type")
                && ["Producer", "Creator", "Author", "Title", "CreationDate", "ModDate"]
                    .iter()
                    .any(|k| d.contains_key(*k))
        },
        _ => false,
    }
}
