//! Allow-list rich-text sanitizer.
//!
//! Answers are sanitized before encryption on write and again after
//! decryption on read, so stored ciphertext always decrypts to renderable
//! markup even if the filter rules tighten later.
//!
//! The allow-list matches what the editor emits: headings, paragraphs,
//! spans, breaks, lists, inline emphasis/strike, and a `div` whose only
//! permitted class is the editor's code-block marker.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use ammonia::Builder;

/// The single class value allowed on `div` (editor code blocks)
const CODE_BLOCK_CLASS: &str = "ql-code-block";

/// Shared allow-list HTML filter
pub struct Sanitizer {
    builder: Builder<'static>,
}

impl Sanitizer {
    pub fn new() -> Self {
        let tags: HashSet<&str> = [
            "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "br", "ul", "ol", "li", "b", "i",
            "u", "strike", "em", "strong", "s", "div",
        ]
        .into_iter()
        .collect();

        let generic_attributes: HashSet<&str> = ["class"].into_iter().collect();

        let mut tag_attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
        tag_attributes.insert("li", ["data-list"].into_iter().collect());

        let mut builder = Builder::default();
        builder
            .tags(tags)
            .generic_attributes(generic_attributes)
            .tag_attributes(tag_attributes)
            .attribute_filter(|element, attribute, value| {
                // div may only carry the code-block class
                if element == "div" && attribute == "class" && value != CODE_BLOCK_CLASS {
                    return None;
                }
                Some(Cow::Borrowed(value))
            });

        Self { builder }
    }

    /// Filter markup down to the allow-list.
    pub fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_markup_is_fixed_point() {
        let sanitizer = Sanitizer::new();
        let input = "<h2>Titre</h2><p>Un <strong>texte</strong> avec <em>style</em></p>";
        let once = sanitizer.clean(input);
        assert_eq!(once, input);
        assert_eq!(sanitizer.clean(&once), once);
    }

    #[test]
    fn test_script_is_stripped() {
        let sanitizer = Sanitizer::new();
        let cleaned = sanitizer.clean("<p>ok</p><script>alert(1)</script>");
        assert!(!cleaned.contains("script"));
        assert!(cleaned.contains("<p>ok</p>"));
    }

    #[test]
    fn test_disallowed_attributes_are_stripped() {
        let sanitizer = Sanitizer::new();
        let cleaned = sanitizer.clean(r#"<p onclick="steal()" class="lead">hi</p>"#);
        assert!(!cleaned.contains("onclick"));
        assert!(cleaned.contains(r#"class="lead""#));
    }

    #[test]
    fn test_li_keeps_data_list() {
        let sanitizer = Sanitizer::new();
        let cleaned = sanitizer.clean(r#"<ol><li data-list="ordered">un</li></ol>"#);
        assert!(cleaned.contains(r#"data-list="ordered""#));
    }

    #[test]
    fn test_div_class_restricted_to_code_block() {
        let sanitizer = Sanitizer::new();

        let kept = sanitizer.clean(r#"<div class="ql-code-block">let x = 1;</div>"#);
        assert!(kept.contains(CODE_BLOCK_CLASS));

        let stripped = sanitizer.clean(r#"<div class="sneaky">content</div>"#);
        assert!(!stripped.contains("sneaky"));
        assert!(stripped.contains("content"));
    }

    #[test]
    fn test_links_and_images_removed() {
        let sanitizer = Sanitizer::new();
        let cleaned = sanitizer.clean(r#"<p><a href="https://x.test">lien</a><img src="x.png"></p>"#);
        assert!(!cleaned.contains("<a"));
        assert!(!cleaned.contains("<img"));
        assert!(cleaned.contains("lien"));
    }
}
