//! Shared key generation for storage backends.
//!
//! Primary payloads live under `media/{id}-{slug}.{ext}`, renditions under
//! `variants/{media_id}/{variant_id}.{format}`.

use std::fmt::Display;

/// Lowercases, keeps ASCII alphanumerics and collapses every other run into a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Splits `photo.final.PNG` into (`photo.final`, `Some("png")`).
///
/// A leading dot (`.env`) is part of the stem, not an extension.
pub fn split_file_name(file_name: &str) -> (&str, Option<String>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem, Some(ext.to_ascii_lowercase()))
        }
        _ => (file_name, None),
    }
}

/// Extension derived from a MIME subtype: `image/jpeg` -> `jpeg`, `video/x-msvideo` -> `msvideo`,
/// `image/svg+xml; charset=utf-8` -> `svg`.
pub fn extension_from_mime(mime_type: &str) -> Option<String> {
    let essence = mime_type.split(';').next()?.trim();
    let (_, subtype) = essence.split_once('/')?;
    let subtype = subtype.split('+').next()?.trim();
    let subtype = subtype.strip_prefix("x-").unwrap_or(subtype);
    let ext = slugify(subtype);
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Key for a primary payload.
pub fn media_key(id: impl Display, file_name: &str, mime_type: &str) -> String {
    let (stem, ext) = split_file_name(file_name);
    let ext = ext
        .map(|e| slugify(&e))
        .filter(|e| !e.is_empty())
        .or_else(|| extension_from_mime(mime_type))
        .unwrap_or_else(|| "bin".to_string());
    with_slug(id, stem, &ext)
}

/// Key for the canonical WebP written by streaming ingestion.
pub fn canonical_media_key(id: impl Display, file_name: &str) -> String {
    let (stem, _) = split_file_name(file_name);
    with_slug(id, stem, "webp")
}

fn with_slug(id: impl Display, stem: &str, ext: &str) -> String {
    let slug = slugify(stem);
    if slug.is_empty() {
        format!("media/{}.{}", id, ext)
    } else {
        format!("media/{}-{}.{}", id, slug, ext)
    }
}

/// Key for a rendition blob.
pub fn variant_key(media_id: impl Display, variant_id: impl Display, format: &str) -> String {
    format!("variants/{}/{}.{}", media_id, variant_id, format)
}
