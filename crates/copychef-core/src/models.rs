//! AI-model selection normalization.
//!
//! Historically one code path accepted a single model string and another a
//! list, which made manually triggered and scheduled runs disagree about the
//! model in use. The configuration type is now always a non-empty list (with
//! exactly one entry as the common case), normalized once at the boundary.

use serde::Deserialize;

use crate::CoreError;

/// A model field as it may arrive over the wire: either a bare string or a
/// list of strings. Deserialize-only; storage and internal APIs always use
/// the normalized `Vec<String>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModelSelection {
    One(String),
    Many(Vec<String>),
}

impl ModelSelection {
    /// Normalize to a non-empty, trimmed list of model identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyModelSelection`] if no non-blank model remains.
    pub fn normalize(self) -> Result<Vec<String>, CoreError> {
        let raw = match self {
            ModelSelection::One(m) => vec![m],
            ModelSelection::Many(ms) => ms,
        };
        normalize_model_selection(raw)
    }
}

/// Trim entries, drop blanks, and require at least one model.
///
/// # Errors
///
/// Returns [`CoreError::EmptyModelSelection`] if the result would be empty.
pub fn normalize_model_selection(models: Vec<String>) -> Result<Vec<String>, CoreError> {
    let cleaned: Vec<String> = models
        .into_iter()
        .map(|m| m.trim().to_owned())
        .filter(|m| !m.is_empty())
        .collect();

    if cleaned.is_empty() {
        return Err(CoreError::EmptyModelSelection);
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_and_single_element_list_normalize_identically() {
        let from_scalar: ModelSelection =
            serde_json::from_str("\"claude-sonnet-4\"").expect("scalar");
        let from_list: ModelSelection =
            serde_json::from_str("[\"claude-sonnet-4\"]").expect("list");
        assert_eq!(
            from_scalar.normalize().expect("scalar normalizes"),
            from_list.normalize().expect("list normalizes"),
        );
    }

    #[test]
    fn normalize_trims_and_drops_blanks() {
        let models = vec![" gpt-4o ".to_string(), String::new(), "  ".to_string()];
        assert_eq!(
            normalize_model_selection(models).expect("one model survives"),
            vec!["gpt-4o".to_string()]
        );
    }

    #[test]
    fn empty_selection_is_rejected() {
        assert!(matches!(
            normalize_model_selection(vec![]),
            Err(CoreError::EmptyModelSelection)
        ));
        assert!(matches!(
            normalize_model_selection(vec!["   ".to_string()]),
            Err(CoreError::EmptyModelSelection)
        ));
    }

    #[test]
    fn many_preserves_order() {
        let models = vec!["claude-sonnet-4".to_string(), "gpt-4o".to_string()];
        assert_eq!(
            normalize_model_selection(models.clone()).expect("normalizes"),
            models
        );
    }
}
