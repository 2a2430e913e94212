// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document merging with `lopdf`: concatenate chunk PDFs and interleave front
// and back sheets for duplex printing.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use sheetpress_core::error::{Result, SheetpressError};
use tracing::{debug, info, instrument, warn};

fn load(bytes: &[u8], what: &str) -> Result<Document> {
    Document::load_mem(bytes)
        .map_err(|err| SheetpressError::PdfError(format!("failed to load {what}: {err}")))
}

fn serialise(doc: &mut Document) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| SheetpressError::PdfError(format!("failed to serialise PDF: {err}")))?;
    Ok(output)
}

/// Number of pages in a serialised document.
pub fn page_count(bytes: &[u8]) -> Result<usize> {
    Ok(load(bytes, "document")?.get_pages().len())
}

/// Concatenate documents in order. A single document is returned unchanged.
#[instrument(skip_all, fields(documents = documents.len()))]
pub fn merge_documents(documents: &[Vec<u8>]) -> Result<Vec<u8>> {
    let (first, rest) = documents
        .split_first()
        .ok_or_else(|| SheetpressError::PdfError("nothing to merge".into()))?;
    if rest.is_empty() {
        return Ok(first.clone());
    }

    let mut merged = load(first, "chunk 1")?;
    for (i, bytes) in rest.iter().enumerate() {
        let other = load(bytes, &format!("chunk {}", i + 2))?;
        append_pages(&other, &mut merged)?;
    }
    let output = serialise(&mut merged)?;
    info!(
        pages = merged.get_pages().len(),
        bytes = output.len(),
        "chunks merged"
    );
    Ok(output)
}

/// Merge `front` and `back` so pages alternate front, back, front, back.
///
/// Surplus pages of the longer document follow at the end.
#[instrument(skip_all)]
pub fn interleave_documents(front: &[u8], back: &[u8]) -> Result<Vec<u8>> {
    let mut doc = load(front, "front document")?;
    let front_pages = doc.get_pages().len();
    let other = load(back, "back document")?;
    append_pages(&other, &mut doc)?;

    let pages_id = pages_root(&doc)?;
    let Ok(Object::Dictionary(pages_dict)) = doc.get_object_mut(pages_id) else {
        return Err(SheetpressError::PdfError("/Pages is not a dictionary".into()));
    };
    let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") else {
        return Err(SheetpressError::PdfError("/Pages has no /Kids".into()));
    };
    let split = front_pages.min(kids.len());
    let backs = kids.split_off(split);
    let fronts = std::mem::take(kids);
    *kids = alternate(fronts, backs);
    debug!(front_pages, total = kids.len(), "pages interleaved");

    serialise(&mut doc)
}

/// `[a0, b0, a1, b1, ...]` followed by whatever is left of the longer list.
fn alternate<T>(a: Vec<T>, b: Vec<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    loop {
        match (a.next(), b.next()) {
            (None, None) => break,
            (x, y) => out.extend(x.into_iter().chain(y)),
        }
    }
    out
}

fn pages_root(doc: &Document) -> Result<ObjectId> {
    let catalog = doc
        .catalog()
        .map_err(|err| SheetpressError::PdfError(format!("no catalog: {err}")))?;
    match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => Ok(*id),
        Ok(_) => Err(SheetpressError::PdfError("/Pages is not a reference".into())),
        Err(err) => Err(SheetpressError::PdfError(format!("no /Pages: {err}"))),
    }
}

/// Append every page of `source` to the end of `target`'s page tree.
fn append_pages(source: &Document, target: &mut Document) -> Result<()> {
    // `get_pages` is keyed by page number, so iteration is already in order.
    for page_id in source.get_pages().into_values() {
        clone_page_into(source, target, page_id)?;
    }
    Ok(())
}

fn clone_page_into(source: &Document, target: &mut Document, page_id: ObjectId) -> Result<()> {
    let page_object = source.get_object(page_id).map_err(|err| {
        SheetpressError::PdfError(format!("cannot read page object {page_id:?}: {err}"))
    })?;
    let cloned = deep_clone_object(source, target, page_object)?;
    let cloned_id = target.add_object(cloned);
    let pages_id = pages_root(target)?;

    if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        }
        if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
            *count += 1;
        }
    }
    if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
        page_dict.set("Parent", Object::Reference(pages_id));
    }
    Ok(())
}

fn clone_dictionary(source: &Document, target: &mut Document, dict: &Dictionary) -> Result<Dictionary> {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        // The page tree back-reference is re-pointed by the caller.
        if key == b"Parent" {
            continue;
        }
        let cloned = deep_clone_object(source, target, value)?;
        new_dict.set(key.clone(), cloned);
    }
    Ok(new_dict)
}

fn deep_clone_object(source: &Document, target: &mut Document, object: &Object) -> Result<Object> {
    match object {
        Object::Dictionary(dict) => Ok(Object::Dictionary(clone_dictionary(source, target, dict)?)),
        Object::Array(items) => {
            let mut cloned = Vec::with_capacity(items.len());
            for item in items {
                cloned.push(deep_clone_object(source, target, item)?);
            }
            Ok(Object::Array(cloned))
        }
        Object::Reference(id) => match source.get_object(*id) {
            Ok(referenced) => {
                let cloned = deep_clone_object(source, target, referenced)?;
                Ok(Object::Reference(target.add_object(cloned)))
            }
            Err(err) => {
                warn!(?id, %err, "dangling reference replaced with null");
                Ok(Object::Null)
            }
        },
        Object::Stream(stream) => {
            let dict = clone_dictionary(source, target, &stream.dict)?;
            Ok(Object::Stream(Stream::new(dict, stream.content.clone())))
        }
        other => Ok(other.clone()),
    }
}
