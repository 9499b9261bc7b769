//! Content transformer: source markup → semantic HTML.
//!
//! Markdown is parsed with comrak; math spans are intercepted during an AST
//! walk and replaced with rasterized `<img>` references so downstream PDF
//! layout never sees formula text. HTML input passes through unchanged.

use std::sync::Arc;

use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use comrak::{Arena, Options, format_html, parse_document};
use tracing::warn;

use crate::application::render::RenderError;
use crate::application::render::math::MathRasterizer;
use crate::domain::types::ContentFormat;

pub struct Transformer {
    math: Arc<dyn MathRasterizer>,
}

impl Transformer {
    pub fn new(math: Arc<dyn MathRasterizer>) -> Self {
        Self { math }
    }

    /// Convert `source` to HTML. Identity for HTML input, empty in → empty
    /// out, and deterministic for a fixed rasterizer.
    pub fn transform(
        &self,
        source: &str,
        format: ContentFormat,
    ) -> Result<String, RenderError> {
        match format {
            ContentFormat::Html => Ok(source.to_string()),
            ContentFormat::Markdown => {
                if source.is_empty() {
                    return Ok(String::new());
                }
                self.markdown_to_html(source)
            }
        }
    }

    fn markdown_to_html(&self, source: &str) -> Result<String, RenderError> {
        let options = default_options();
        let arena = Arena::new();
        let root = parse_document(&arena, source, &options);

        self.rewrite_math_nodes(root);

        let mut output = String::new();
        format_html(root, &options, &mut output)
            .map_err(|err| RenderError::markup(format!("html serialization failed: {err}")))?;
        Ok(output)
    }

    fn rewrite_math_nodes<'a>(&self, node: &'a AstNode<'a>) {
        self.handle_math_node(node);

        let mut child = node.first_child();
        while let Some(next) = child {
            self.rewrite_math_nodes(next);
            child = next.next_sibling();
        }
    }

    fn handle_math_node<'a>(&self, node: &'a AstNode<'a>) {
        let math = {
            let data = node.data.borrow();
            if let NodeValue::Math(math) = &data.value {
                Some((math.literal.clone(), math.display_math))
            } else {
                None
            }
        };
        let Some((literal, display)) = math else {
            return;
        };

        let replacement = match self.math.rasterize(&literal, display) {
            Ok(raster) => {
                let alt = escape_attribute(&literal);
                if display {
                    format!(
                        "<div class=\"math-block\" style=\"text-align: center; margin: 1em 0;\">\
                         <img src=\"{}\" alt=\"{alt}\" /></div>",
                        raster.data_uri
                    )
                } else {
                    format!(
                        "<img src=\"{}\" alt=\"{alt}\" \
                         style=\"vertical-align: -20%; height: 1.2em;\" class=\"math-inline\" />",
                        raster.data_uri
                    )
                }
            }
            Err(err) => {
                warn!(error = %err, "formula rasterization failed; emitting error marker");
                let escaped = escape_text(&literal);
                if display {
                    format!("<div class=\"math-error\">$${escaped}$$</div>")
                } else {
                    format!("<span class=\"math-error\">\\({escaped}\\)</span>")
                }
            }
        };

        let mut data = node.data.borrow_mut();
        if display {
            data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: replacement,
            });
        } else {
            data.value = NodeValue::HtmlInline(replacement);
        }
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.tasklist = true;
    options.extension.strikethrough = true;
    options.extension.footnotes = true;
    options.extension.autolink = true;
    options.extension.math_dollars = true;
    // Raw HTML passes through: the output feeds a private PDF renderer,
    // never a browser.
    options.render.r#unsafe = true;
    options
}

fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attribute(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::math::{MathError, RasterFormula};

    struct FixedRasterizer;

    impl MathRasterizer for FixedRasterizer {
        fn rasterize(&self, _: &str, _: bool) -> Result<RasterFormula, MathError> {
            Ok(RasterFormula {
                data_uri: "data:image/png;base64,AAAA".to_string(),
                width: 10,
                height: 10,
            })
        }
    }

    struct FailingRasterizer;

    impl MathRasterizer for FailingRasterizer {
        fn rasterize(&self, _: &str, _: bool) -> Result<RasterFormula, MathError> {
            Err(MathError::NoFont)
        }
    }

    fn transformer() -> Transformer {
        Transformer::new(std::sync::Arc::new(FixedRasterizer))
    }

    #[test]
    fn renders_basic_markdown() {
        let html = transformer()
            .transform("# Title\n\nSome *emphasis* here.", ContentFormat::Markdown)
            .unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>emphasis</em>"));
    }

    #[test]
    fn renders_gfm_extensions() {
        let source = "\
| a | b |\n|---|---|\n| 1 | 2 |\n\n- [x] done\n- [ ] todo\n\n~~gone~~ visit https://example.com\n";
        let html = transformer()
            .transform(source, ContentFormat::Markdown)
            .unwrap();
        assert!(html.contains("<table>"));
        assert!(html.contains("type=\"checkbox\""));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("<a href=\"https://example.com\">"));
    }

    #[test]
    fn raw_html_in_markdown_passes_through() {
        let html = transformer()
            .transform(
                "before\n\n<div class=\"keep\">inline block</div>\n",
                ContentFormat::Markdown,
            )
            .unwrap();
        assert!(html.contains("<div class=\"keep\">inline block</div>"));
    }

    #[test]
    fn inline_math_becomes_an_image_reference() {
        let html = transformer()
            .transform("Energy: $E = mc^2$ indeed.", ContentFormat::Markdown)
            .unwrap();
        assert!(html.contains("class=\"math-inline\""));
        assert!(html.contains("src=\"data:image/png;base64,AAAA\""));
        assert!(!html.contains("$E = mc^2$"));
    }

    #[test]
    fn block_math_becomes_a_centered_figure() {
        let html = transformer()
            .transform("$$\n\\int_0^1 x\\,dx\n$$", ContentFormat::Markdown)
            .unwrap();
        assert!(html.contains("class=\"math-block\""));
        assert!(html.contains("<img src=\"data:image/png;base64,AAAA\""));
    }

    #[test]
    fn failed_rasterization_degrades_to_error_marker() {
        let transformer = Transformer::new(std::sync::Arc::new(FailingRasterizer));
        let html = transformer
            .transform("see $a < b$ here", ContentFormat::Markdown)
            .unwrap();
        assert!(html.contains("class=\"math-error\""));
        // The original formula text survives, escaped.
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn html_input_is_identity() {
        let source = "<h1>Raw</h1><p>unchanged & untouched</p>";
        let html = transformer().transform(source, ContentFormat::Html).unwrap();
        assert_eq!(html, source);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let html = transformer().transform("", ContentFormat::Markdown).unwrap();
        assert!(html.is_empty());
    }

    #[test]
    fn transform_is_idempotent_across_calls() {
        let t = transformer();
        let source = "# Hi\n\n$x^2$ and a [link](https://example.com).";
        let first = t.transform(source, ContentFormat::Markdown).unwrap();
        let second = t.transform(source, ContentFormat::Markdown).unwrap();
        assert_eq!(first, second);
    }
}
