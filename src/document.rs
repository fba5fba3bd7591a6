//! Read side of document I/O.
//!
//! [`PdfDocument`] holds a whole file in memory, locates every object
//! through the cross-reference data (rebuilding it by scanning when it is
//! broken) and exposes what signing and verification need: the page list
//! with inherited attributes and the document information dictionary.

use crate::error::{Error, Result};
use crate::object::{decode_text_string, Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{parse_indirect_at, parse_indirect_object};
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntry};
use crate::xref_reconstruction::reconstruct_xref;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Page attributes a page inherits from its ancestors in the page tree.
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Maximum depth of nested page tree nodes.
const MAX_TREE_DEPTH: u32 = 64;

/// Decoded document information dictionary, in key order.
pub type DocumentInfo = IndexMap<String, String>;

/// One leaf of the page tree.
#[derive(Debug, Clone)]
pub struct PageNode {
    /// Reference of the page object
    pub obj_ref: ObjectRef,
    /// Page dictionary with inherited attributes copied in
    pub dict: Dictionary,
}

/// Flattened page tree.
#[derive(Debug, Clone, Default)]
pub struct PageTree {
    /// Pages in document order
    pub pages: Vec<PageNode>,
    /// Intermediate `/Pages` nodes that were walked
    pub nodes: HashSet<ObjectRef>,
}

/// An opened PDF document.
///
/// ```no_run
/// use pdf_sealer::document::PdfDocument;
///
/// let mut doc = PdfDocument::open("contract.pdf")?;
/// println!("PDF {}.{}, {} pages", doc.version().0, doc.version().1, doc.page_count()?);
/// # Ok::<(), pdf_sealer::Error>(())
/// ```
pub struct PdfDocument {
    data: Vec<u8>,
    version: (u8, u8),
    xref: CrossRefTable,
    trailer: Dictionary,
    object_cache: HashMap<ObjectRef, Object>,
    objstm_cache: HashMap<u32, HashMap<u32, Object>>,
    resolving: HashSet<ObjectRef>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("size", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.object_cache.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Read and open the document at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::DocumentNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        log::debug!("Opened {} ({} bytes)", path.display(), data.len());
        Self::from_bytes(data)
    }

    /// Open a document held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;

        let xref = match Self::read_xref(&data) {
            Ok(xref) => xref,
            Err(e) => {
                log::warn!("Cross-reference data unusable ({}), reconstructing", e);
                reconstruct_xref(&data)?
            },
        };

        let trailer = xref.trailer().cloned().ok_or(Error::InvalidXref)?;
        if trailer.contains_key("Encrypt") {
            return Err(Error::Unsupported("encrypted documents".to_string()));
        }

        Ok(Self {
            data,
            version,
            xref,
            trailer,
            object_cache: HashMap::new(),
            objstm_cache: HashMap::new(),
            resolving: HashSet::new(),
        })
    }

    fn read_xref(data: &[u8]) -> Result<CrossRefTable> {
        let offset = find_xref_offset(data)?;
        let xref = parse_xref(data, offset)?;
        let has_root = xref
            .trailer()
            .and_then(|t| t.get("Root"))
            .and_then(|r| r.as_reference())
            .is_some();
        if xref.is_empty() || !has_root {
            return Err(Error::InvalidXref);
        }
        Ok(xref)
    }

    /// PDF version from the header as (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Raw file contents.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Load an indirect object. References to objects that do not exist
    /// resolve to null.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.object_cache.get(&obj_ref) {
            return Ok(cached.clone());
        }
        if self.resolving.len() as u32 >= crate::parser::MAX_NESTING {
            return Err(Error::RecursionLimitExceeded(crate::parser::MAX_NESTING));
        }
        if !self.resolving.insert(obj_ref) {
            return Err(Error::CircularReference(obj_ref));
        }

        let result = match self.xref.get(obj_ref.id).copied() {
            Some(XRefEntry::InUse { offset, .. }) => self.load_uncompressed(obj_ref, offset),
            Some(XRefEntry::Compressed { stream_id, .. }) => self.load_compressed(obj_ref, stream_id),
            Some(XRefEntry::Free) | None => {
                log::debug!("Object {} not in xref, scanning", obj_ref);
                match self.scan_for_object(obj_ref) {
                    Some(offset) => self.load_uncompressed(obj_ref, offset),
                    None => Ok(Object::Null),
                }
            },
        };
        self.resolving.remove(&obj_ref);

        let object = result?;
        self.object_cache.insert(obj_ref, object.clone());
        Ok(object)
    }

    fn load_uncompressed(&mut self, obj_ref: ObjectRef, offset: usize) -> Result<Object> {
        let parsed = {
            let data = &self.data;
            let xref = &self.xref;
            let resolve = |r: ObjectRef| direct_integer(data, xref, r);
            parse_indirect_at(data, offset, &resolve)
        };

        match parsed {
            Ok((found, object)) if found.id == obj_ref.id => Ok(object),
            other => {
                // Stale offset: look for the header anywhere in the file
                let scanned = self
                    .scan_for_object(obj_ref)
                    .filter(|&found| found != offset);
                match (scanned, other) {
                    (Some(found), _) => {
                        log::warn!("Object {} not at offset {}, found at {}", obj_ref, offset, found);
                        self.load_uncompressed(obj_ref, found)
                    },
                    (None, Err(e)) => Err(e),
                    (None, Ok((found, _))) => Err(Error::InvalidPdf(format!(
                        "expected object {} at offset {}, found {}",
                        obj_ref, offset, found
                    ))),
                }
            },
        }
    }

    fn load_compressed(&mut self, obj_ref: ObjectRef, stream_id: u32) -> Result<Object> {
        if !self.objstm_cache.contains_key(&stream_id) {
            let stream = self.load_object(ObjectRef::new(stream_id, 0))?;
            let objects = parse_object_stream(&stream)?;
            log::debug!("Object stream {} holds {} objects", stream_id, objects.len());
            self.objstm_cache.insert(stream_id, objects);
        }
        Ok(self
            .objstm_cache
            .get(&stream_id)
            .and_then(|objects| objects.get(&obj_ref.id))
            .cloned()
            .unwrap_or(Object::Null))
    }

    /// Offset of the last `id gen obj` header in the file.
    fn scan_for_object(&self, obj_ref: ObjectRef) -> Option<usize> {
        let pattern = format!(r"(?-u)(^|[^0-9]){}\s+{}\s+obj\b", obj_ref.id, obj_ref.gen);
        let re = regex::bytes::Regex::new(&pattern).ok()?;
        re.captures_iter(&self.data)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let prefix = caps.get(1).map_or(0, |m| m.len());
                Some(whole.start() + prefix)
            })
            .last()
    }

    /// Follow `obj` if it is a reference, otherwise return a copy.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.load_object(*r),
            other => Ok(other.clone()),
        }
    }

    /// The document catalog (`/Root`).
    pub fn catalog(&mut self) -> Result<Dictionary> {
        let root = self
            .trailer
            .get("Root")
            .and_then(|r| r.as_reference())
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root".to_string()))?;
        match self.load_object(root)? {
            Object::Dictionary(dict) => Ok(dict),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Walk the page tree and return every page in order.
    pub fn pages(&mut self) -> Result<PageTree> {
        let catalog = self.catalog()?;
        let root = catalog
            .get("Pages")
            .and_then(|p| p.as_reference())
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;

        let mut tree = PageTree::default();
        self.walk_pages(root, &Dictionary::new(), 0, &mut tree)?;
        log::debug!("Page tree: {} pages, {} nodes", tree.pages.len(), tree.nodes.len());
        Ok(tree)
    }

    fn walk_pages(&mut self, node_ref: ObjectRef, inherited: &Dictionary, depth: u32, tree: &mut PageTree) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::RecursionLimitExceeded(MAX_TREE_DEPTH));
        }
        if tree.nodes.contains(&node_ref) || tree.pages.iter().any(|p| p.obj_ref == node_ref) {
            log::warn!("Page tree revisits {}, skipping", node_ref);
            return Ok(());
        }

        let mut dict = match self.load_object(node_ref)? {
            Object::Dictionary(d) => d,
            other => {
                log::warn!("Page tree node {} is a {}, skipping", node_ref, other.type_name());
                return Ok(());
            },
        };

        let kids = match dict.get("Kids") {
            Some(kids) if !dict.get("Type").is_some_and(|t| t.as_name() == Some("Page")) => {
                Some(self.resolve(kids)?)
            },
            _ => None,
        };

        match kids {
            Some(Object::Array(kids)) => {
                tree.nodes.insert(node_ref);
                let mut passed_down = inherited.clone();
                for key in INHERITABLE {
                    if let Some(value) = dict.get(key) {
                        passed_down.insert(key.to_string(), value.clone());
                    }
                }
                for kid in kids {
                    match kid.as_reference() {
                        Some(kid_ref) => self.walk_pages(kid_ref, &passed_down, depth + 1, tree)?,
                        None => log::warn!("Ignoring direct object in /Kids of {}", node_ref),
                    }
                }
            },
            _ => {
                for key in INHERITABLE {
                    if !dict.contains_key(key) {
                        if let Some(value) = inherited.get(key) {
                            dict.insert(key.to_string(), value.clone());
                        }
                    }
                }
                tree.pages.push(PageNode { obj_ref: node_ref, dict });
            },
        }
        Ok(())
    }

    /// Number of pages.
    pub fn page_count(&mut self) -> Result<usize> {
        Ok(self.pages()?.pages.len())
    }

    /// The raw document information dictionary, if the trailer names one.
    pub fn info_dict(&mut self) -> Result<Option<Dictionary>> {
        let Some(info) = self.trailer.get("Info").cloned() else {
            return Ok(None);
        };
        match self.resolve(&info)? {
            Object::Dictionary(dict) => Ok(Some(dict)),
            _ => Ok(None),
        }
    }

    /// Document information decoded to text, keys sorted.
    ///
    /// Arrays, dictionaries and streams map to an empty string; null
    /// entries are left out. Returns `None` when the document has no
    /// information dictionary.
    pub fn metadata(&mut self) -> Result<Option<DocumentInfo>> {
        let Some(dict) = self.info_dict()? else {
            return Ok(None);
        };

        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();

        let mut info = DocumentInfo::new();
        for key in keys {
            let value = match self.resolve(&dict[key])? {
                Object::String(bytes) => decode_text_string(&bytes),
                Object::Name(name) => name,
                Object::Integer(i) => i.to_string(),
                Object::Real(r) => r.to_string(),
                Object::Boolean(b) => b.to_string(),
                Object::Null => continue,
                // Keep the key so its presence still counts
                _ => String::new(),
            };
            info.insert(key.clone(), value);
        }
        Ok(Some(info))
    }
}

/// Value of an uncompressed integer object, for indirect stream lengths.
fn direct_integer(data: &[u8], xref: &CrossRefTable, obj_ref: ObjectRef) -> Option<usize> {
    let Some(&XRefEntry::InUse { offset, .. }) = xref.get(obj_ref.id) else {
        return None;
    };
    // Integers cannot contain streams, so no resolver is needed here
    match parse_indirect_object(data.get(offset..)?, &|_| None) {
        Ok((_, (found, Object::Integer(n)))) if found.id == obj_ref.id => usize::try_from(n).ok(),
        _ => None,
    }
}

/// Find `%PDF-M.m` within the first kilobyte and return the version.
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let marker = b"%PDF-";
    let pos = window
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or_else(|| {
            Error::InvalidHeader(String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned())
        })?;

    let version = &data[pos + marker.len()..];
    match version {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => Ok((major - b'0', minor - b'0')),
        _ => Err(Error::InvalidHeader(
            String::from_utf8_lossy(&data[pos..data.len().min(pos + 8)]).into_owned(),
        )),
    }
}
