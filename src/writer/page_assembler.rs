//! Copy pages out of an existing document into a new file.
//!
//! Every object reachable from the copied pages is deep-copied and
//! renumbered. The source page tree is flattened into a single `/Pages`
//! node with inherited attributes already pushed down to the pages.

use super::canvas::OverlayPage;
use super::content_stream::ContentStreamBuilder;
use super::pdf_writer::{media_box, write_document};
use crate::decoders::flate_encode;
use crate::document::{DocumentInfo, PdfDocument};
use crate::error::{Error, Result};
use crate::object::{encode_text_string, Dictionary, Object, ObjectRef};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

/// Builds an output document from pages of one or more source documents.
#[derive(Debug)]
pub struct PageAssembler {
    version: (u8, u8),
    objects: BTreeMap<u32, Object>,
    next_id: u32,
    pages_root: u32,
    pages: Vec<u32>,
    info: Option<Dictionary>,
    compress: bool,
}

impl PageAssembler {
    /// Start an empty output document. Versions below 1.4 are raised to 1.4.
    pub fn new(version: (u8, u8)) -> Self {
        Self {
            version: version.max((1, 4)),
            objects: BTreeMap::new(),
            next_id: 2,
            pages_root: 1,
            pages: Vec::new(),
            info: None,
            compress: false,
        }
    }

    /// Flate-compress overlay streams added later.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Number of pages copied so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Append every page of `doc`, in order. Returns the number of pages added.
    pub fn import_pages(&mut self, doc: &mut PdfDocument) -> Result<usize> {
        let tree = doc.pages()?;

        // Page tree nodes collapse into our single root; pages keep their identity
        // so annotations and destinations pointing at them stay valid.
        let mut map: HashMap<ObjectRef, u32> = HashMap::new();
        for node in &tree.nodes {
            map.insert(*node, self.pages_root);
        }
        let mut page_ids = Vec::with_capacity(tree.pages.len());
        for page in &tree.pages {
            let id = self.alloc();
            map.insert(page.obj_ref, id);
            page_ids.push(id);
        }

        let mut queue = VecDeque::new();
        for (page, &id) in tree.pages.iter().zip(&page_ids) {
            let mut dict = page.dict.clone();
            dict.remove("Parent");
            let mut dict = self.remap_dict(dict, &mut map, &mut queue);
            dict.insert("Parent".to_string(), Object::reference(self.pages_root));
            self.objects.insert(id, Object::Dictionary(dict));
        }

        while let Some(old) = queue.pop_front() {
            let Some(&new_id) = map.get(&old) else {
                continue;
            };
            let obj = doc.load_object(old)?;
            let copied = self.remap(obj, &mut map, &mut queue);
            self.objects.insert(new_id, copied);
        }

        log::debug!(
            "Imported {} pages, {} objects in output so far",
            page_ids.len(),
            self.objects.len()
        );
        self.pages.extend(page_ids.iter().copied());
        Ok(page_ids.len())
    }

    fn remap(&mut self, obj: Object, map: &mut HashMap<ObjectRef, u32>, queue: &mut VecDeque<ObjectRef>) -> Object {
        match obj {
            Object::Reference(r) => {
                let id = match map.get(&r) {
                    Some(&id) => id,
                    None => {
                        let id = self.alloc();
                        map.insert(r, id);
                        queue.push_back(r);
                        id
                    },
                };
                Object::reference(id)
            },
            Object::Array(items) => Object::Array(items.into_iter().map(|o| self.remap(o, map, queue)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.remap_dict(dict, map, queue)),
            Object::Stream { mut dict, data } => {
                // Rewritten from the data on output
                dict.remove("Length");
                Object::Stream {
                    dict: self.remap_dict(dict, map, queue),
                    data,
                }
            },
            other => other,
        }
    }

    fn remap_dict(
        &mut self,
        dict: Dictionary,
        map: &mut HashMap<ObjectRef, u32>,
        queue: &mut VecDeque<ObjectRef>,
    ) -> Dictionary {
        dict.into_iter()
            .map(|(key, value)| (key, self.remap(value, map, queue)))
            .collect()
    }

    /// Dictionary stored under `obj` (directly or as a reference to a copied object).
    fn lookup_dict(&self, obj: Option<&Object>) -> Dictionary {
        match obj {
            Some(Object::Dictionary(dict)) => dict.clone(),
            Some(Object::Reference(r)) => self
                .objects
                .get(&r.id)
                .and_then(|o| o.as_dict())
                .cloned()
                .unwrap_or_default(),
            _ => Dictionary::new(),
        }
    }

    fn add_stream(&mut self, mut dict: Dictionary, data: Vec<u8>) -> Result<u32> {
        let data = if self.compress {
            dict.insert("Filter".to_string(), Object::name("FlateDecode"));
            flate_encode(&data)?
        } else {
            data
        };
        let id = self.alloc();
        self.objects.insert(id, Object::stream(dict, data));
        Ok(id)
    }

    /// Paint `overlay` on top of page `index` as a Form XObject.
    ///
    /// The page's own content is wrapped in `q`/`Q` so any graphics state
    /// it leaves behind does not leak into the overlay. Returns the
    /// resource name the overlay was registered under.
    pub fn overlay_page(&mut self, index: usize, overlay: &OverlayPage) -> Result<String> {
        let page_id = *self.pages.get(index).ok_or_else(|| {
            Error::InvalidInput(format!("page index {} out of range ({} pages)", index, self.pages.len()))
        })?;

        let mut form = HashMap::new();
        form.insert("Type".to_string(), Object::name("XObject"));
        form.insert("Subtype".to_string(), Object::name("Form"));
        form.insert("FormType".to_string(), Object::Integer(1));
        form.insert("BBox".to_string(), media_box(overlay.width(), overlay.height()));
        form.insert("Resources".to_string(), Object::Dictionary(overlay.font_resources()));
        let form_id = self.add_stream(form, overlay.content_bytes()?)?;

        let mut page = match self.objects.remove(&page_id) {
            Some(Object::Dictionary(dict)) => dict,
            other => {
                let found = other.as_ref().map_or("nothing", |o| o.type_name()).to_string();
                if let Some(obj) = other {
                    self.objects.insert(page_id, obj);
                }
                return Err(Error::InvalidObjectType {
                    expected: "Dictionary".to_string(),
                    found,
                });
            },
        };

        // Resources are made direct so other pages sharing them are untouched
        let mut resources = self.lookup_dict(page.get("Resources"));
        let mut xobjects = self.lookup_dict(resources.get("XObject"));
        let name = (1..)
            .map(|n| format!("SigOverlay{}", n))
            .find(|candidate| !xobjects.contains_key(candidate))
            .unwrap_or_else(|| "SigOverlay".to_string());
        xobjects.insert(name.clone(), Object::reference(form_id));
        resources.insert("XObject".to_string(), Object::Dictionary(xobjects));
        page.insert("Resources".to_string(), Object::Dictionary(resources));

        let existing = match page.get("Contents") {
            Some(Object::Array(items)) => items.clone(),
            Some(Object::Reference(r)) => match self.objects.get(&r.id) {
                Some(Object::Array(items)) => items.clone(),
                Some(Object::Stream { .. }) => vec![Object::Reference(*r)],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        let mut paint = ContentStreamBuilder::new();
        paint
            .restore_state()
            .save_state()
            .transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
            .paint_xobject(&name)
            .restore_state();
        // Separate from the last page stream, which may not end in whitespace
        let mut suffix = b"\n".to_vec();
        suffix.extend_from_slice(&paint.build()?);

        let prefix_id = self.add_stream(HashMap::new(), b"q\n".to_vec())?;
        let suffix_id = self.add_stream(HashMap::new(), suffix)?;

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::reference(prefix_id));
        contents.extend(existing);
        contents.push(Object::reference(suffix_id));
        page.insert("Contents".to_string(), Object::Array(contents));

        self.objects.insert(page_id, Object::Dictionary(page));
        log::debug!("Overlay {} painted on page {}", name, index + 1);
        Ok(name)
    }

    /// Paint `overlay` on the final page.
    pub fn overlay_last_page(&mut self, overlay: &OverlayPage) -> Result<String> {
        match self.pages.len() {
            0 => Err(Error::InvalidPdf("document has no pages".to_string())),
            n => self.overlay_page(n - 1, overlay),
        }
    }

    /// Set the document information dictionary of the output.
    pub fn set_info(&mut self, info: &DocumentInfo) {
        let dict = info
            .iter()
            .map(|(key, value)| (key.clone(), Object::String(encode_text_string(value))))
            .collect();
        self.info = Some(dict);
    }

    /// Serialize the assembled document.
    pub fn finish(mut self) -> Vec<u8> {
        let kids: Vec<Object> = self.pages.iter().map(|&id| Object::reference(id)).collect();
        let mut pages = HashMap::new();
        pages.insert("Type".to_string(), Object::name("Pages"));
        pages.insert("Count".to_string(), Object::Integer(kids.len() as i64));
        pages.insert("Kids".to_string(), Object::Array(kids));
        self.objects.insert(self.pages_root, Object::Dictionary(pages));

        let catalog_id = self.alloc();
        let mut catalog = HashMap::new();
        catalog.insert("Type".to_string(), Object::name("Catalog"));
        catalog.insert("Pages".to_string(), Object::reference(self.pages_root));
        self.objects.insert(catalog_id, Object::Dictionary(catalog));

        let info_id = match self.info.take() {
            Some(info) => {
                let id = self.alloc();
                self.objects.insert(id, Object::Dictionary(info));
                Some(id)
            },
            None => None,
        };

        let version = format!("{}.{}", self.version.0, self.version.1);
        write_document(&version, &self.objects, catalog_id, info_id)
    }

    /// Serialize and write to `path` through a temporary file.
    pub fn save(self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.finish();
        super::write_atomic(path.as_ref(), &bytes)
    }
}
