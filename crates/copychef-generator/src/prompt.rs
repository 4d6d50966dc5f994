//! Prompt templating and completion parsing.
//!
//! The provider is asked for a fixed three-section layout (`SCRIPT:` /
//! `CAPTION:` / `HASHTAGS:`). Parsing is forgiving: models that ignore the
//! layout still yield a usable item via fallbacks.

/// Everything that varies per niche x platform combination.
pub(crate) struct PromptInput<'a> {
    pub niche: &'a str,
    pub platform: &'a str,
    pub tone: &'a str,
    pub template: &'a str,
    pub use_existing_products: bool,
    pub use_smart_style: bool,
}

pub(crate) fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = format!(
        "You are a social media copywriter for a cooking and kitchen brand.\n\
         Write one piece of short-form content for the '{niche}' niche, \
         targeted at {platform}, using the '{template}' template, in a {tone} tone.\n",
        niche = input.niche,
        platform = input.platform,
        template = input.template,
        tone = input.tone,
    );

    if input.use_existing_products {
        prompt.push_str(
            "Feature a product already in the brand catalog rather than inventing a new one.\n",
        );
    }
    if input.use_smart_style {
        prompt.push_str(
            "Keep the script under 60 seconds of spoken audio, open with a hook in the \
             first sentence, and end with a call to action.\n",
        );
    }

    prompt.push_str(
        "\nRespond in exactly this layout:\n\
         SCRIPT:\n<voiceover script>\n\
         CAPTION:\n<post caption>\n\
         HASHTAGS: <space-separated hashtags>\n",
    );
    prompt
}

/// Parsed sections of a completion.
pub(crate) struct ParsedCompletion {
    pub script: String,
    pub caption: String,
    pub hashtags: Vec<String>,
}

/// Split a completion into script/caption/hashtags.
///
/// Fallbacks when the model ignores the layout: the whole text becomes the
/// script, the first non-empty line becomes the caption, and hashtags are
/// any `#`-prefixed tokens found anywhere in the text.
pub(crate) fn parse_completion(text: &str) -> ParsedCompletion {
    let script = section_after(text, "SCRIPT:", &["CAPTION:", "HASHTAGS:"]);
    let caption = section_after(text, "CAPTION:", &["HASHTAGS:", "SCRIPT:"]);

    let hashtags: Vec<String> = text
        .split_whitespace()
        .filter(|w| w.len() > 1 && w.starts_with('#'))
        .map(|w| w.trim_end_matches([',', '.', ';']).to_string())
        .collect();

    let script = script.unwrap_or_else(|| text.trim().to_string());
    let caption = caption.unwrap_or_else(|| {
        script
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .trim()
            .to_string()
    });

    ParsedCompletion {
        script,
        caption,
        hashtags,
    }
}

/// The text between `marker` and the nearest following terminator, trimmed.
fn section_after(text: &str, marker: &str, terminators: &[&str]) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = terminators
        .iter()
        .filter_map(|t| rest.find(t))
        .min()
        .unwrap_or(rest.len());
    let section = rest[..end].trim();
    (!section.is_empty()).then(|| section.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>() -> PromptInput<'a> {
        PromptInput {
            niche: "weeknight pasta",
            platform: "tiktok",
            tone: "playful",
            template: "recipe_teaser",
            use_existing_products: false,
            use_smart_style: false,
        }
    }

    #[test]
    fn prompt_mentions_every_dimension() {
        let prompt = build_prompt(&input());
        for needle in ["weeknight pasta", "tiktok", "playful", "recipe_teaser"] {
            assert!(prompt.contains(needle), "prompt missing '{needle}'");
        }
        assert!(!prompt.contains("brand catalog"));
    }

    #[test]
    fn prompt_flags_add_constraints() {
        let mut i = input();
        i.use_existing_products = true;
        i.use_smart_style = true;
        let prompt = build_prompt(&i);
        assert!(prompt.contains("brand catalog"));
        assert!(prompt.contains("under 60 seconds"));
    }

    #[test]
    fn parses_well_formed_completion() {
        let text = "SCRIPT:\nGrab a pan. Trust me.\n\nCAPTION:\nDinner in 15.\nHASHTAGS: #pasta #easyrecipes";
        let parsed = parse_completion(text);
        assert_eq!(parsed.script, "Grab a pan. Trust me.");
        assert_eq!(parsed.caption, "Dinner in 15.");
        assert_eq!(parsed.hashtags, vec!["#pasta", "#easyrecipes"]);
    }

    #[test]
    fn falls_back_when_layout_is_ignored() {
        let text = "Here is a fun video idea about garlic bread. #garlic";
        let parsed = parse_completion(text);
        assert_eq!(parsed.script, text);
        assert_eq!(
            parsed.caption,
            "Here is a fun video idea about garlic bread. #garlic"
        );
        assert_eq!(parsed.hashtags, vec!["#garlic"]);
    }

    #[test]
    fn strips_trailing_punctuation_from_hashtags() {
        let parsed = parse_completion("HASHTAGS: #pasta, #dinner.");
        assert_eq!(parsed.hashtags, vec!["#pasta", "#dinner"]);
    }

    #[test]
    fn bare_hash_is_not_a_hashtag() {
        let parsed = parse_completion("a # b #real");
        assert_eq!(parsed.hashtags, vec!["#real"]);
    }
}
