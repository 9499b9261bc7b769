//! HTML cleanup pass run before PDF layout.
//!
//! Markdown converters wrap loose list-item content in `<p>` elements, which
//! would otherwise add a paragraph gap after every bullet. Unwrapping them
//! keeps list spacing tight.

use lol_html::{RewriteStrSettings, element, rewrite_str};

use crate::application::render::RenderError;

pub fn tighten_lists(html: &str) -> Result<String, RenderError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("li > p", |el| {
                el.remove_and_keep_content();
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|err| RenderError::markup(format!("html cleanup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_paragraphs_inside_list_items() {
        let html = "<ul><li><p>one</p></li><li><p>two</p></li></ul>";
        let out = tighten_lists(html).unwrap();
        assert_eq!(out, "<ul><li>one</li><li>two</li></ul>");
    }

    #[test]
    fn leaves_top_level_paragraphs_alone() {
        let html = "<p>standalone</p><ul><li>plain</li></ul>";
        let out = tighten_lists(html).unwrap();
        assert_eq!(out, html);
    }

    #[test]
    fn tolerates_malformed_markup() {
        let html = "<ul><li><p>unclosed";
        assert!(tighten_lists(html).is_ok());
    }
}
