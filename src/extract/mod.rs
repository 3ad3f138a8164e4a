pub mod structured;
pub mod text;

use crate::types::{ExtractedAttributes, ListingDetail, ListingSummary};

/// Combines both extractors field by field.
///
/// Model: the structured "model" label, else the title.
/// Storage: structured capacity labels, then the description, then the title.
pub fn resolve(summary: &ListingSummary, detail: &ListingDetail) -> ExtractedAttributes {
    let (generation, tier) = match structured::extract_model(&detail.raw_parameters) {
        (Some(g), tier) => (Some(g), tier),
        (None, _) => text::extract_model(&summary.title),
    };

    let storage_gb = structured::extract_storage(&detail.raw_parameters)
        .or_else(|| text::extract_storage(&detail.description))
        .or_else(|| text::extract_storage(&summary.title));

    ExtractedAttributes { generation, tier, storage_gb }
}
