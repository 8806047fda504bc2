//! Label codec: GitHub labels are stored as a single comma separated string of names.

use crate::platform::types::Label;

/// Encode labels as `"name1,name2"`. Labels without a name leave an empty segment.
pub fn encode_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|label| label.name().map(str::trim).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(",")
}

/// Split a stored label string back into names. The empty string decodes to no labels.
pub fn decode_labels(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded.split(',').map(str::to_string).collect()
}
