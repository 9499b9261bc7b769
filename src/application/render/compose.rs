//! Footer overlay merge: stamp the first page of a footer document under
//! the last page of a body document.
//!
//! The output keeps the body's pages and metadata; only the last page gains
//! the footer artwork. Footer resources are deep-copied into the body with
//! prefixed names so nothing collides, and the footer content stream runs
//! inside its own q/Q scope before the body content paints over it.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("footer document has no pages")]
    EmptyFooter,
    #[error("malformed pdf: {0}")]
    Malformed(String),
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
    #[error("pdf serialization failed: {0}")]
    Io(#[from] std::io::Error),
}

const RESOURCE_CATEGORIES: [&[u8]; 7] = [
    b"Font",
    b"XObject",
    b"ExtGState",
    b"Shading",
    b"ColorSpace",
    b"Pattern",
    b"Properties",
];

const RENAME_PREFIX: &[u8] = b"FT";

pub fn merge_with_footer(body: &[u8], footer: &[u8]) -> Result<Vec<u8>, ComposeError> {
    let mut body_doc = Document::load_mem(body)
        .map_err(|err| ComposeError::Malformed(format!("body: {err}")))?;
    let footer_doc = Document::load_mem(footer)
        .map_err(|err| ComposeError::Malformed(format!("footer: {err}")))?;

    let footer_pages = footer_doc.get_pages();
    let Some(&footer_first) = footer_pages.values().next() else {
        return Err(ComposeError::EmptyFooter);
    };

    let body_pages = body_doc.get_pages();
    let Some(&body_last) = body_pages.values().last() else {
        // Nothing to stamp; a zero-page body stays a zero-page document.
        return Ok(body.to_vec());
    };

    // Copy the footer page's resources across, renaming every entry.
    let footer_resources = page_resources(&footer_doc, footer_first);
    let mut rename_map: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
    let mut imported: Vec<(&[u8], Vec<u8>, Object)> = Vec::new();
    {
        let mut copier = DeepCopier::new(&footer_doc, &mut body_doc);
        for category in RESOURCE_CATEGORIES {
            let Some(dict) = footer_resources
                .as_ref()
                .and_then(|res| res.get(category).ok())
                .and_then(|obj| resolve_dict(&footer_doc, obj))
            else {
                continue;
            };
            for (name, value) in dict.iter() {
                let new_name = [RENAME_PREFIX, name.as_slice()].concat();
                rename_map.insert(name.clone(), new_name.clone());
                let copied = copier.import(value.clone())?;
                imported.push((category, new_name, copied));
            }
        }
    }

    // Rewrite the footer content stream against the renamed resources and
    // wrap it so its graphics state cannot leak into the body content.
    let footer_content = footer_doc.get_page_content(footer_first)?;
    let decoded = Content::decode(&footer_content)?;
    let mut operations = Vec::with_capacity(decoded.operations.len() + 2);
    operations.push(Operation::new("q", vec![]));
    for mut op in decoded.operations {
        for operand in &mut op.operands {
            if let Object::Name(name) = operand {
                if let Some(renamed) = rename_map.get(name.as_slice()) {
                    *name = renamed.clone();
                }
            }
        }
        operations.push(op);
    }
    operations.push(Operation::new("Q", vec![]));
    let encoded = Content { operations }.encode()?;
    let footer_content_id = body_doc.add_object(Stream::new(dictionary! {}, encoded));

    // Materialize the body page's resources (they may be shared or
    // inherited) and splice in the imported entries.
    let mut merged = page_resources(&body_doc, body_last).unwrap_or_else(Dictionary::new);
    for category in RESOURCE_CATEGORIES {
        let mut category_dict = merged
            .get(category)
            .ok()
            .and_then(|obj| resolve_dict(&body_doc, obj))
            .unwrap_or_else(Dictionary::new);
        let mut touched = false;
        for (cat, name, value) in &imported {
            if *cat == category {
                category_dict.set(name.clone(), value.clone());
                touched = true;
            }
        }
        if touched {
            merged.set(category, Object::Dictionary(category_dict));
        }
    }

    let page_dict = body_doc.get_object_mut(body_last)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(merged));

    // Prepend so the footer paints underneath the body content.
    let mut contents = match page_dict.get(b"Contents") {
        Ok(Object::Array(existing)) => existing.clone(),
        Ok(single) => vec![single.clone()],
        Err(_) => Vec::new(),
    };
    contents.insert(0, Object::Reference(footer_content_id));
    page_dict.set("Contents", Object::Array(contents));

    body_doc.compress();
    let mut bytes = Vec::new();
    body_doc.save_to(&mut std::io::Cursor::new(&mut bytes))?;
    Ok(bytes)
}

/// Walk up the page tree to find the effective /Resources dictionary.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut current = page_id;
    for _ in 0..8 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => doc
            .get_object(*id)
            .ok()
            .and_then(|resolved| resolved.as_dict().ok())
            .cloned(),
        _ => None,
    }
}

/// Copies objects between documents, following references and allocating
/// fresh ids in the target. A placeholder is registered before recursing so
/// cyclic structures (page → parent → kids) terminate.
struct DeepCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    mapped: HashMap<ObjectId, ObjectId>,
}

impl<'a> DeepCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            mapped: HashMap::new(),
        }
    }

    /// Rewrite `obj` so every reference points into the target document,
    /// copying referenced objects on first encounter.
    fn import(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.copy(id)?)),
            Object::Array(items) => Ok(Object::Array(
                items
                    .into_iter()
                    .map(|item| self.import(item))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Object::Dictionary(mut dict) => {
                for (_, value) in dict.iter_mut() {
                    *value = self.import(value.clone())?;
                }
                Ok(Object::Dictionary(dict))
            }
            Object::Stream(mut stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    *value = self.import(value.clone())?;
                }
                Ok(Object::Stream(stream))
            }
            other => Ok(other),
        }
    }

    fn copy(&mut self, source_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        if let Some(&target_id) = self.mapped.get(&source_id) {
            return Ok(target_id);
        }
        let target_id = self.target.add_object(Object::Null);
        self.mapped.insert(source_id, target_id);

        let copied = self.import(self.source.get_object(source_id)?.clone())?;
        match self.target.objects.get_mut(&target_id) {
            Some(slot) => *slot = copied,
            None => return Err(lopdf::Error::ObjectNotFound(target_id)),
        }
        Ok(target_id)
    }
}
