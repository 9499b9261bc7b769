//! Lenient HTML parsing into a flat block model.
//!
//! The renderer accepts whatever markup a user uploads, so the tokenizer
//! never fails: unknown tags are unwrapped, unclosed elements are closed
//! implicitly, and stray close tags are dropped. The output is the small
//! block/inline vocabulary the layout engine understands.

/// Inline text decorations accumulated while descending the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strike: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text { text: String, style: TextStyle },
    Image { src: String, alt: String, inline_math: bool },
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Justify,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub checkbox: Option<bool>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, inlines: Vec<Inline> },
    Paragraph { inlines: Vec<Inline>, align: Align },
    List { ordered: bool, items: Vec<ListItem> },
    Code(String),
    Quote(Vec<Block>),
    Table {
        head: Vec<Vec<Vec<Inline>>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    Rule,
}

pub fn parse(html: &str) -> Vec<Block> {
    let nodes = build_tree(tokenize(html));
    collect_blocks(&nodes)
}

// ---------------------------------------------------------------- tokenizer

#[derive(Debug)]
enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Close {
        name: String,
    },
    Text(String),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn tokenize(html: &str) -> Vec<Token> {
    let bytes = html.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }
        if pos > text_start {
            push_text(&mut tokens, &html[text_start..pos]);
        }

        if html[pos..].starts_with("<!--") {
            pos = match html[pos..].find("-->") {
                Some(end) => pos + end + 3,
                None => bytes.len(),
            };
        } else if html[pos..].starts_with("<!") || html[pos..].starts_with("<?") {
            pos = match html[pos..].find('>') {
                Some(end) => pos + end + 1,
                None => bytes.len(),
            };
        } else if html[pos..].starts_with("</") {
            let end = html[pos..].find('>').map_or(bytes.len(), |e| pos + e);
            let name = html[pos + 2..end].trim().to_ascii_lowercase();
            if !name.is_empty() {
                tokens.push(Token::Close { name });
            }
            pos = (end + 1).min(bytes.len());
        } else {
            let end = html[pos..].find('>').map_or(bytes.len(), |e| pos + e);
            let inner = html[pos + 1..end].trim_end_matches('/').trim();
            if let Some((name, attrs)) = parse_tag(inner) {
                let self_closing =
                    html[pos..end].ends_with('/') || VOID_ELEMENTS.contains(&name.as_str());
                // Raw-text elements swallow their content wholesale.
                if !self_closing && (name == "script" || name == "style") {
                    let close = format!("</{name}");
                    pos = match html[end..].to_ascii_lowercase().find(&close) {
                        Some(at) => {
                            let after = end + at;
                            html[after..].find('>').map_or(bytes.len(), |e| after + e + 1)
                        }
                        None => bytes.len(),
                    };
                    text_start = pos;
                    continue;
                }
                tokens.push(Token::Open { name: name.clone(), attrs });
                if self_closing {
                    tokens.push(Token::Close { name });
                }
            }
            pos = (end + 1).min(bytes.len());
        }
        text_start = pos;
    }
    if text_start < bytes.len() {
        push_text(&mut tokens, &html[text_start..]);
    }
    tokens
}

fn push_text(tokens: &mut Vec<Token>, raw: &str) {
    if !raw.is_empty() {
        tokens.push(Token::Text(decode_entities(raw)));
    }
}

fn parse_tag(inner: &str) -> Option<(String, Vec<(String, String)>)> {
    let mut chars = inner.char_indices().peekable();
    let mut name_end = inner.len();
    for (idx, ch) in chars.by_ref() {
        if ch.is_whitespace() {
            name_end = idx;
            break;
        }
    }
    let name = inner[..name_end].to_ascii_lowercase();
    if name.is_empty() || !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut attrs = Vec::new();
    let rest = &inner[name_end..];
    let mut cursor = 0;
    let bytes = rest.as_bytes();
    while cursor < bytes.len() {
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            break;
        }
        let key_start = cursor;
        while cursor < bytes.len()
            && !bytes[cursor].is_ascii_whitespace()
            && bytes[cursor] != b'='
        {
            cursor += 1;
        }
        let key = rest[key_start..cursor].to_ascii_lowercase();
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        let mut value = String::new();
        if cursor < bytes.len() && bytes[cursor] == b'=' {
            cursor += 1;
            while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            if cursor < bytes.len() && (bytes[cursor] == b'"' || bytes[cursor] == b'\'') {
                let quote = bytes[cursor];
                cursor += 1;
                let value_start = cursor;
                while cursor < bytes.len() && bytes[cursor] != quote {
                    cursor += 1;
                }
                value = decode_entities(&rest[value_start..cursor]);
                cursor = (cursor + 1).min(bytes.len());
            } else {
                let value_start = cursor;
                while cursor < bytes.len() && !bytes[cursor].is_ascii_whitespace() {
                    cursor += 1;
                }
                value = decode_entities(&rest[value_start..cursor]);
            }
        }
        if !key.is_empty() {
            attrs.push((key, value));
        }
    }
    Some((name, attrs))
}

fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = rest
            .char_indices()
            .take(12)
            .find(|&(_, ch)| ch == ';')
            .map(|(idx, _)| idx);
        let Some(semi) = semi else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// --------------------------------------------------------------- tree build

#[derive(Debug)]
struct ElementNode {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

#[derive(Debug)]
enum Node {
    Element(ElementNode),
    Text(String),
}

impl ElementNode {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }
}

fn build_tree(tokens: Vec<Token>) -> Vec<Node> {
    let mut stack: Vec<ElementNode> = vec![ElementNode {
        name: String::new(),
        attrs: Vec::new(),
        children: Vec::new(),
    }];

    for token in tokens {
        match token {
            Token::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.children.push(Node::Text(text));
                }
            }
            Token::Open { name, attrs } => {
                // HTML allows some close tags to be omitted; a sibling open
                // tag closes the previous one.
                let implied: &[&str] = match name.as_str() {
                    "li" => &["li"],
                    "p" => &["p"],
                    "tr" => &["tr", "td", "th"],
                    "td" | "th" => &["td", "th"],
                    "dt" | "dd" => &["dt", "dd"],
                    _ => &[],
                };
                while stack.len() > 1
                    && stack
                        .last()
                        .is_some_and(|el| implied.contains(&el.name.as_str()))
                {
                    if let Some(closed) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(Node::Element(closed));
                        }
                    }
                }
                stack.push(ElementNode {
                    name,
                    attrs,
                    children: Vec::new(),
                });
            }
            Token::Close { name } => {
                // Ignore strays; otherwise implicitly close everything
                // opened since the matching tag.
                if stack.iter().skip(1).any(|el| el.name == name) {
                    loop {
                        let done = stack
                            .last()
                            .is_some_and(|el| el.name == name);
                        let closed = match stack.pop() {
                            Some(el) => el,
                            None => break,
                        };
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(Node::Element(closed));
                        }
                        if done {
                            break;
                        }
                    }
                }
            }
        }
    }

    while stack.len() > 1 {
        let closed = match stack.pop() {
            Some(el) => el,
            None => break,
        };
        if let Some(parent) = stack.last_mut() {
            parent.children.push(Node::Element(closed));
        }
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

// ----------------------------------------------------------- block extract

fn collect_blocks(nodes: &[Node]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut pending: Vec<Inline> = Vec::new();

    for node in nodes {
        match node {
            Node::Text(text) => {
                append_text(&mut pending, text, TextStyle::default());
            }
            Node::Element(el) => match el.name.as_str() {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    flush_paragraph(&mut blocks, &mut pending, Align::Justify);
                    let level = el.name[1..].parse().unwrap_or(6);
                    let inlines = collect_inlines(&el.children, TextStyle::default());
                    if !inlines.is_empty() {
                        blocks.push(Block::Heading { level, inlines });
                    }
                }
                "p" => {
                    flush_paragraph(&mut blocks, &mut pending, Align::Justify);
                    let align = paragraph_align(el);
                    let inlines = collect_inlines(&el.children, TextStyle::default());
                    if !inlines.is_empty() {
                        blocks.push(Block::Paragraph { inlines, align });
                    }
                }
                "ul" | "ol" => {
                    flush_paragraph(&mut blocks, &mut pending, Align::Justify);
                    let items = collect_list_items(&el.children);
                    if !items.is_empty() {
                        blocks.push(Block::List {
                            ordered: el.name == "ol",
                            items,
                        });
                    }
                }
                "pre" => {
                    flush_paragraph(&mut blocks, &mut pending, Align::Justify);
                    let mut code = String::new();
                    raw_text(&el.children, &mut code);
                    blocks.push(Block::Code(
                        code.strip_suffix('\n').unwrap_or(&code).to_string(),
                    ));
                }
                "blockquote" => {
                    flush_paragraph(&mut blocks, &mut pending, Align::Justify);
                    let inner = collect_blocks(&el.children);
                    if !inner.is_empty() {
                        blocks.push(Block::Quote(inner));
                    }
                }
                "table" => {
                    flush_paragraph(&mut blocks, &mut pending, Align::Justify);
                    if let Some(table) = collect_table(el) {
                        blocks.push(table);
                    }
                }
                "hr" => {
                    flush_paragraph(&mut blocks, &mut pending, Align::Justify);
                    blocks.push(Block::Rule);
                }
                "div" | "section" | "article" | "main" | "body" | "html" | "figure"
                | "header" | "footer" => {
                    flush_paragraph(&mut blocks, &mut pending, Align::Justify);
                    if el.has_class("math-block") || el.has_class("math-error") {
                        let inlines = collect_inlines(&el.children, TextStyle::default());
                        if !inlines.is_empty() {
                            blocks.push(Block::Paragraph {
                                inlines,
                                align: paragraph_align(el),
                            });
                        }
                    } else {
                        blocks.extend(collect_blocks(&el.children));
                    }
                }
                "head" | "title" => {}
                _ => {
                    // Inline content at block level accumulates into an
                    // implicit paragraph.
                    pending.extend(collect_inlines(
                        std::slice::from_ref(node),
                        TextStyle::default(),
                    ));
                }
            },
        }
    }
    flush_paragraph(&mut blocks, &mut pending, Align::Justify);
    blocks
}

fn paragraph_align(el: &ElementNode) -> Align {
    let centered_class = el.has_class("math-block");
    let centered_style = el
        .attr("style")
        .is_some_and(|style| style.replace(' ', "").contains("text-align:center"));
    if centered_class || centered_style {
        Align::Center
    } else {
        Align::Justify
    }
}

fn flush_paragraph(blocks: &mut Vec<Block>, pending: &mut Vec<Inline>, align: Align) {
    trim_inlines(pending);
    if !pending.is_empty() {
        blocks.push(Block::Paragraph {
            inlines: std::mem::take(pending),
            align,
        });
    } else {
        pending.clear();
    }
}

fn collect_list_items(nodes: &[Node]) -> Vec<ListItem> {
    let mut items = Vec::new();
    for node in nodes {
        let Node::Element(el) = node else { continue };
        if el.name != "li" {
            continue;
        }
        let checkbox = find_checkbox(&el.children);
        let mut blocks = collect_blocks(&el.children);
        strip_leading_checkbox_artifacts(&mut blocks);
        items.push(ListItem { checkbox, blocks });
    }
    items
}

fn find_checkbox(nodes: &[Node]) -> Option<bool> {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.name == "input" && el.attr("type") == Some("checkbox") {
                return Some(el.attr("checked").is_some());
            }
            if let Some(found) = find_checkbox(&el.children) {
                return Some(found);
            }
        }
    }
    None
}

/// Drop the empty text run the checkbox `<input>` leaves behind at the head
/// of a task-list item.
fn strip_leading_checkbox_artifacts(blocks: &mut [Block]) {
    if let Some(Block::Paragraph { inlines, .. }) = blocks.first_mut() {
        if let Some(Inline::Text { text, .. }) = inlines.first_mut() {
            let trimmed = text.trim_start().to_string();
            *text = trimmed;
        }
        inlines.retain(|inline| !matches!(inline, Inline::Text { text, .. } if text.is_empty()));
    }
}

fn collect_table(el: &ElementNode) -> Option<Block> {
    let mut head = Vec::new();
    let mut rows = Vec::new();
    collect_table_rows(&el.children, &mut head, &mut rows, false);
    if head.is_empty() && rows.is_empty() {
        return None;
    }
    Some(Block::Table { head, rows })
}

fn collect_table_rows(
    nodes: &[Node],
    head: &mut Vec<Vec<Vec<Inline>>>,
    rows: &mut Vec<Vec<Vec<Inline>>>,
    in_head: bool,
) {
    for node in nodes {
        let Node::Element(el) = node else { continue };
        match el.name.as_str() {
            "thead" => collect_table_rows(&el.children, head, rows, true),
            "tbody" | "tfoot" => collect_table_rows(&el.children, head, rows, false),
            "tr" => {
                let mut cells = Vec::new();
                let mut all_header = true;
                for cell in &el.children {
                    let Node::Element(cell_el) = cell else { continue };
                    match cell_el.name.as_str() {
                        "th" => {
                            cells.push(collect_inlines(&cell_el.children, TextStyle::default()))
                        }
                        "td" => {
                            all_header = false;
                            cells.push(collect_inlines(&cell_el.children, TextStyle::default()))
                        }
                        _ => {}
                    }
                }
                if cells.is_empty() {
                    continue;
                }
                if in_head || (all_header && head.is_empty() && rows.is_empty()) {
                    head.push(cells);
                } else {
                    rows.push(cells);
                }
            }
            _ => collect_table_rows(&el.children, head, rows, in_head),
        }
    }
}

fn collect_inlines(nodes: &[Node], style: TextStyle) -> Vec<Inline> {
    let mut inlines = Vec::new();
    collect_inlines_into(nodes, style, &mut inlines);
    trim_inlines(&mut inlines);
    inlines
}

fn collect_inlines_into(nodes: &[Node], style: TextStyle, out: &mut Vec<Inline>) {
    for node in nodes {
        match node {
            Node::Text(text) => append_text(out, text, style),
            Node::Element(el) => {
                let mut inner = style;
                match el.name.as_str() {
                    "strong" | "b" => inner.bold = true,
                    "em" | "i" => inner.italic = true,
                    "code" | "kbd" | "samp" => inner.code = true,
                    "del" | "s" | "strike" => inner.strike = true,
                    "br" => {
                        out.push(Inline::Break);
                        continue;
                    }
                    "img" => {
                        out.push(Inline::Image {
                            src: el.attr("src").unwrap_or_default().to_string(),
                            alt: el.attr("alt").unwrap_or_default().to_string(),
                            inline_math: el.has_class("math-inline"),
                        });
                        continue;
                    }
                    "input" => continue,
                    _ => {}
                }
                collect_inlines_into(&el.children, inner, out);
            }
        }
    }
}

/// Append text with whitespace collapsed, merging into a preceding run of
/// the same style.
fn append_text(out: &mut Vec<Inline>, raw: &str, style: TextStyle) {
    let mut collapsed = String::with_capacity(raw.len());
    let mut last_space = match out.last() {
        Some(Inline::Text { text, .. }) => text.ends_with(' '),
        Some(Inline::Break) | None => true,
        _ => false,
    };
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !last_space {
                collapsed.push(' ');
                last_space = true;
            }
        } else {
            collapsed.push(ch);
            last_space = false;
        }
    }
    if collapsed.is_empty() {
        return;
    }
    if let Some(Inline::Text { text, style: prev }) = out.last_mut() {
        if *prev == style {
            text.push_str(&collapsed);
            return;
        }
    }
    out.push(Inline::Text {
        text: collapsed,
        style,
    });
}

fn trim_inlines(inlines: &mut Vec<Inline>) {
    if let Some(Inline::Text { text, .. }) = inlines.first_mut() {
        *text = text.trim_start().to_string();
    }
    if let Some(Inline::Text { text, .. }) = inlines.last_mut() {
        *text = text.trim_end().to_string();
    }
    inlines.retain(|inline| !matches!(inline, Inline::Text { text, .. } if text.is_empty()));
}

fn raw_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => raw_text(&el.children, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headings_and_paragraphs() {
        let blocks = parse("<h1>Title</h1><p>Hello <strong>world</strong>.</p>");
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], Block::Heading { level: 1, .. }));
        let Block::Paragraph { inlines, .. } = &blocks[1] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            inlines[1],
            Inline::Text {
                text: "world".to_string(),
                style: TextStyle {
                    bold: true,
                    ..TextStyle::default()
                }
            }
        );
    }

    #[test]
    fn survives_malformed_markup() {
        let blocks = parse("<p>open <em>nested<p>next</strong></p>");
        assert!(!blocks.is_empty());
    }

    #[test]
    fn unclosed_elements_are_closed_implicitly() {
        let blocks = parse("<ul><li>one<li>two");
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn task_list_checkboxes_are_detected() {
        let html = "<ul><li><input type=\"checkbox\" checked=\"\" disabled=\"\" /> done</li>\
                    <li><input type=\"checkbox\" disabled=\"\" /> todo</li></ul>";
        let Block::List { items, .. } = &parse(html)[0] else {
            panic!("expected list");
        };
        assert_eq!(items[0].checkbox, Some(true));
        assert_eq!(items[1].checkbox, Some(false));
    }

    #[test]
    fn pre_preserves_newlines_and_entities() {
        let blocks = parse("<pre><code>let x = 1;\nif x &lt; 2 {}\n</code></pre>");
        assert_eq!(
            blocks[0],
            Block::Code("let x = 1;\nif x < 2 {}".to_string())
        );
    }

    #[test]
    fn tables_split_head_and_body() {
        let html = "<table><thead><tr><th>a</th><th>b</th></tr></thead>\
                    <tbody><tr><td>1</td><td>2</td></tr></tbody></table>";
        let Block::Table { head, rows } = &parse(html)[0] else {
            panic!("expected table");
        };
        assert_eq!(head.len(), 1);
        assert_eq!(head[0].len(), 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn math_block_div_becomes_a_centered_paragraph() {
        let html = "<div class=\"math-block\" style=\"text-align: center; margin: 1em 0;\">\
                    <img src=\"data:image/png;base64,AA\" alt=\"x\" /></div>";
        let Block::Paragraph { inlines, align } = &parse(html)[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(*align, Align::Center);
        assert!(matches!(inlines[0], Inline::Image { .. }));
    }

    #[test]
    fn inline_math_image_is_flagged() {
        let html = "<p>energy <img src=\"data:x\" alt=\"E\" class=\"math-inline\" /> here</p>";
        let Block::Paragraph { inlines, .. } = &parse(html)[0] else {
            panic!("expected paragraph");
        };
        assert!(matches!(
            &inlines[1],
            Inline::Image {
                inline_math: true,
                ..
            }
        ));
    }

    #[test]
    fn script_and_style_content_is_dropped() {
        let blocks = parse("<style>p { color: red }</style><script>1 < 2</script><p>kept</p>");
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn entities_are_decoded() {
        let blocks = parse("<p>a &amp; b &#61; c &#x3C; d</p>");
        let Block::Paragraph { inlines, .. } = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            inlines[0],
            Inline::Text {
                text: "a & b = c < d".to_string(),
                style: TextStyle::default()
            }
        );
    }

    #[test]
    fn blockquotes_nest() {
        let blocks = parse("<blockquote><p>outer</p><blockquote><p>inner</p></blockquote></blockquote>");
        let Block::Quote(inner) = &blocks[0] else {
            panic!("expected quote");
        };
        assert_eq!(inner.len(), 2);
        assert!(matches!(inner[1], Block::Quote(_)));
    }
}
