//! HTML → paginated PDF rendering.
//!
//! The stages are deliberately separate: a cleanup rewrite, a lenient DOM
//! parse into a block model, image resolution, line-breaking layout, and
//! lopdf assembly. A render failure is always an error; a failed image is
//! not, it degrades to alt text.

pub mod dom;
pub mod layout;
pub mod page;
pub mod style;

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, warn};

use super::RenderError;
use super::cleanup;
use super::fetch::RemoteFetcher;
use dom::{Block, Inline, ListItem};
use layout::ImageInfo;
use page::EncodedImage;

pub struct PdfRenderer {
    fetcher: RemoteFetcher,
}

impl PdfRenderer {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self {
            fetcher: RemoteFetcher::new(fetch_timeout),
        }
    }

    /// Render `html` into a complete PDF. Blocking: callers on an async
    /// runtime go through `spawn_blocking`. The output always has at least
    /// one page.
    pub fn render(&self, html: &str, page_numbers: bool) -> Result<Vec<u8>, RenderError> {
        let cleaned = cleanup::tighten_lists(html)?;
        let blocks = dom::parse(&cleaned);
        let (infos, encoded) = self.resolve_images(&blocks);
        let pages = layout::lay_out(&blocks, &infos, page_numbers);
        debug!(pages = pages.len(), images = encoded.len(), "assembling pdf");
        page::assemble(&pages, &encoded)
    }

    /// Decode every referenced image up front. A source that cannot be
    /// fetched or decoded is simply left out of the map.
    fn resolve_images(
        &self,
        blocks: &[Block],
    ) -> (HashMap<String, ImageInfo>, Vec<EncodedImage>) {
        let mut sources = Vec::new();
        collect_image_sources(blocks, &mut sources);
        sources.dedup();

        let mut infos = HashMap::new();
        let mut encoded = Vec::new();
        for src in sources {
            if infos.contains_key(&src) {
                continue;
            }
            let bytes = match self.load_image_bytes(&src) {
                Ok(bytes) => bytes,
                Err(reason) => {
                    warn!(src = truncate(&src), reason, "image skipped");
                    continue;
                }
            };
            let decoded = match image::load_from_memory(&bytes) {
                Ok(decoded) => decoded.to_rgba8(),
                Err(err) => {
                    warn!(src = truncate(&src), error = %err, "image skipped");
                    continue;
                }
            };

            let (width, height) = decoded.dimensions();
            let mut rgb = Vec::with_capacity((width * height * 3) as usize);
            let mut alpha = Vec::with_capacity((width * height) as usize);
            let mut translucent = false;
            for pixel in decoded.pixels() {
                rgb.extend_from_slice(&pixel.0[..3]);
                alpha.push(pixel.0[3]);
                if pixel.0[3] != u8::MAX {
                    translucent = true;
                }
            }

            let key = format!("Im{}", encoded.len() + 1);
            infos.insert(
                src,
                ImageInfo {
                    key: key.clone(),
                    width,
                    height,
                },
            );
            encoded.push(EncodedImage {
                key,
                width,
                height,
                rgb,
                alpha: translucent.then_some(alpha),
            });
        }
        (infos, encoded)
    }

    fn load_image_bytes(&self, src: &str) -> Result<Vec<u8>, String> {
        if let Some(rest) = src.strip_prefix("data:") {
            let payload = rest
                .split_once(";base64,")
                .map(|(_, data)| data)
                .ok_or_else(|| "unsupported data uri".to_string())?;
            return BASE64
                .decode(payload.trim())
                .map_err(|err| format!("base64: {err}"));
        }
        if src.starts_with("http://") || src.starts_with("https://") {
            return self
                .fetcher
                .fetch(src)
                .map(|bytes| bytes.to_vec())
                .map_err(|err| err.to_string());
        }
        Err("unsupported image source".to_string())
    }
}

fn collect_image_sources(blocks: &[Block], out: &mut Vec<String>) {
    for block in blocks {
        match block {
            Block::Heading { inlines, .. } | Block::Paragraph { inlines, .. } => {
                inline_sources(inlines, out)
            }
            Block::List { items, .. } => {
                for ListItem { blocks, .. } in items {
                    collect_image_sources(blocks, out);
                }
            }
            Block::Quote(inner) => collect_image_sources(inner, out),
            Block::Table { head, rows } => {
                for row in head.iter().chain(rows) {
                    for cell in row {
                        inline_sources(cell, out);
                    }
                }
            }
            Block::Code(_) | Block::Rule => {}
        }
    }
}

fn inline_sources(inlines: &[Inline], out: &mut Vec<String>) {
    for inline in inlines {
        if let Inline::Image { src, .. } = inline {
            if !src.is_empty() {
                out.push(src.clone());
            }
        }
    }
}

fn truncate(src: &str) -> &str {
    let end = src
        .char_indices()
        .nth(64)
        .map(|(idx, _)| idx)
        .unwrap_or(src.len());
    &src[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Document;

    fn renderer() -> PdfRenderer {
        PdfRenderer::new(Duration::from_secs(1))
    }

    fn tiny_png_data_uri() -> String {
        let mut png = Vec::new();
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 0, 255]));
        image::DynamicImage::ImageRgba8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut png),
                image::ImageFormat::Png,
            )
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(&png))
    }

    #[test]
    fn renders_a_loadable_single_page_pdf() {
        let bytes = renderer()
            .render("<h1>Title</h1><p>Body text.</p>", false)
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn empty_html_still_yields_one_page() {
        let bytes = renderer().render("", false).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn page_numbers_toggle_the_footer() {
        let with = renderer().render("<p>hello</p>", true).unwrap();
        let doc = Document::load_mem(&with).unwrap();
        let pages = doc.get_pages();
        let content = doc.get_page_content(pages[&1]).unwrap();
        assert!(String::from_utf8_lossy(&content).contains("1 / 1"));

        let without = renderer().render("<p>hello</p>", false).unwrap();
        let doc = Document::load_mem(&without).unwrap();
        let pages = doc.get_pages();
        let content = doc.get_page_content(pages[&1]).unwrap();
        assert!(!String::from_utf8_lossy(&content).contains("1 / 1"));
    }

    #[test]
    fn embeds_a_data_uri_image() {
        let html = format!("<p><img src=\"{}\" alt=\"dot\" /></p>", tiny_png_data_uri());
        let bytes = renderer().render(&html, false).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn unreachable_remote_image_does_not_fail_the_render() {
        let html = "<p><img src=\"http://127.0.0.1:9/gone.png\" alt=\"diagram\" /></p>";
        let bytes = renderer().render(html, false).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn malformed_markup_renders_without_panicking() {
        let html = "<h1>ok<table><tr><td>x</p></div><pre>raw";
        assert!(renderer().render(html, false).is_ok());
    }

    #[test]
    fn long_content_paginates() {
        let html = "<p>some body text that takes room on the page</p>".repeat(150);
        let bytes = renderer().render(&html, true).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }
}
