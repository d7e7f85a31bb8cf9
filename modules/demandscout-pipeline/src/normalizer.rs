use demandscout_common::text;
use demandscout_common::types::{NormalizedItem, RawItem};

/// Canonicalize a raw item into comparable form. Returns `None` when the item
/// carries no usable text; dropped items never reach downstream stages.
pub fn normalize(raw: RawItem) -> Option<NormalizedItem> {
    if raw.source_id.is_empty() || raw.title.trim().is_empty() {
        return None;
    }

    let combined = format!("{} {}", raw.title, raw.body);
    let canonical_text = text::compact_text(&combined);
    let normalized_text = text::normalize_phrase(&canonical_text);
    if normalized_text.is_empty() {
        return None;
    }

    let keywords = text::tokenize(&canonical_text).into_iter().collect();
    Some(NormalizedItem {
        raw,
        canonical_text,
        normalized_text,
        keywords,
    })
}
