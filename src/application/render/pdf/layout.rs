//! Greedy line-breaking layout: block model → positioned page elements.
//!
//! Coordinates here are top-down (y grows towards the page bottom, text y is
//! the baseline); the assembly stage flips into PDF space. Paragraphs break
//! across pages line by line, table rows and headings do not.

use std::collections::HashMap;

use super::dom::{Align, Block, Inline, ListItem, TextStyle};
use super::style::{
    BODY_SIZE, CODE_SIZE, CONTENT_WIDTH, Color, FOOTER_SIZE, Font, LINE_FACTOR, MARGIN_X,
    MARGIN_Y, PAGE_HEIGHT, PAGE_WIDTH, heading_style,
};

/// A decoded image the layouter can place, keyed into the assembly stage's
/// XObject table.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub key: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageElement {
    Text {
        x: f32,
        y: f32,
        font: Font,
        size: f32,
        text: String,
        color: Color,
    },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        fill: Option<Color>,
        stroke: Option<Color>,
    },
    Image {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        key: String,
    },
}

#[derive(Debug, Default)]
pub struct Page {
    pub elements: Vec<PageElement>,
}

const CONTENT_BOTTOM: f32 = PAGE_HEIGHT - MARGIN_Y;
const PARAGRAPH_GAP: f32 = 8.0;
const LIST_INDENT: f32 = 28.0;
const QUOTE_INDENT: f32 = 14.0;
const CODE_PAD: f32 = 6.0;
const CELL_PAD: f32 = 4.0;

pub fn lay_out(
    blocks: &[Block],
    images: &HashMap<String, ImageInfo>,
    page_numbers: bool,
) -> Vec<Page> {
    let mut layouter = Layouter::new(images);
    let region = Region {
        x: MARGIN_X,
        width: CONTENT_WIDTH,
    };
    layouter.blocks(blocks, region);

    let mut pages = layouter.pages;
    if pages.is_empty() {
        pages.push(Page::default());
    }
    if page_numbers {
        let total = pages.len();
        for (index, page) in pages.iter_mut().enumerate() {
            let text = format!("{} / {}", index + 1, total);
            let width = Font::Serif.text_width(&text, FOOTER_SIZE);
            page.elements.push(PageElement::Text {
                x: PAGE_WIDTH - MARGIN_X - width,
                y: PAGE_HEIGHT - MARGIN_Y + 22.0,
                font: Font::Serif,
                size: FOOTER_SIZE,
                text,
                color: Color::FOOTER_GRAY,
            });
        }
    }
    pages
}

#[derive(Debug, Clone, Copy)]
struct Region {
    x: f32,
    width: f32,
}

impl Region {
    fn indent(self, by: f32) -> Region {
        Region {
            x: self.x + by,
            width: (self.width - by).max(40.0),
        }
    }
}

struct Layouter<'a> {
    images: &'a HashMap<String, ImageInfo>,
    pages: Vec<Page>,
    y: f32,
}

impl<'a> Layouter<'a> {
    fn new(images: &'a HashMap<String, ImageInfo>) -> Self {
        Self {
            images,
            pages: Vec::new(),
            y: MARGIN_Y,
        }
    }

    fn page(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.pages.push(Page::default());
            self.y = MARGIN_Y;
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = MARGIN_Y;
    }

    /// Break to a new page when `height` no longer fits, unless the cursor
    /// already sits at the top (oversized content is drawn anyway).
    fn ensure_room(&mut self, height: f32) {
        if self.pages.is_empty() {
            self.new_page();
            return;
        }
        if self.y + height > CONTENT_BOTTOM && self.y > MARGIN_Y + 0.5 {
            self.new_page();
        }
    }

    fn blocks(&mut self, blocks: &[Block], region: Region) {
        for block in blocks {
            self.block(block, region);
        }
    }

    fn block(&mut self, block: &Block, region: Region) {
        match block {
            Block::Heading { level, inlines } => self.heading(*level, inlines, region),
            Block::Paragraph { inlines, align } => {
                self.paragraph(inlines, region, *align, BODY_SIZE);
                self.y += PARAGRAPH_GAP;
            }
            Block::List { ordered, items } => self.list(*ordered, items, region),
            Block::Code(code) => self.code(code, region),
            Block::Quote(inner) => self.quote(inner, region),
            Block::Table { head, rows } => self.table(head, rows, region),
            Block::Rule => self.rule(region),
        }
    }

    fn heading(&mut self, level: u8, inlines: &[Inline], region: Region) {
        let (size, centered, uppercase) = heading_style(level);
        let inlines: Vec<Inline> = if uppercase {
            inlines
                .iter()
                .map(|inline| match inline {
                    Inline::Text { text, style } => Inline::Text {
                        text: text.to_uppercase(),
                        style: *style,
                    },
                    other => other.clone(),
                })
                .collect()
        } else {
            inlines.to_vec()
        };

        self.y += 6.0;
        let lines = break_lines(&self.pieces(&inlines, region.width, size, true), region.width);
        // Keep the heading attached to at least one following body line.
        let heading_height: f32 = lines.iter().map(|line| line.height).sum();
        self.ensure_room(heading_height + BODY_SIZE * LINE_FACTOR);
        let align = if centered { Align::Center } else { Align::Justify };
        self.place_lines(&lines, region, align);
        self.y += PARAGRAPH_GAP;
    }

    fn paragraph(&mut self, inlines: &[Inline], region: Region, align: Align, size: f32) {
        let pieces = self.pieces(inlines, region.width, size, false);
        let lines = break_lines(&pieces, region.width);
        self.place_lines(&lines, region, align);
    }

    fn place_lines(&mut self, lines: &[Line], region: Region, align: Align) {
        for (index, line) in lines.iter().enumerate() {
            self.ensure_room(line.height);
            let baseline = self.y + line.ascent;
            let is_last = index + 1 == lines.len();
            let slack = (region.width - line.natural).max(0.0);

            let (mut x, gap_bonus) = match align {
                Align::Center => (region.x + slack / 2.0, 0.0),
                Align::Justify => {
                    let gaps = line
                        .pieces
                        .iter()
                        .skip(1)
                        .filter(|piece| piece.space_before > 0.0)
                        .count();
                    if is_last || gaps == 0 || slack > region.width * 0.5 {
                        (region.x, 0.0)
                    } else {
                        (region.x, slack / gaps as f32)
                    }
                }
            };

            let mut elements = Vec::new();
            for (piece_index, piece) in line.pieces.iter().enumerate() {
                if piece_index > 0 && piece.space_before > 0.0 {
                    x += piece.space_before + gap_bonus;
                }
                match &piece.kind {
                    PieceKind::Word {
                        text,
                        font,
                        size,
                        strike,
                    } => {
                        elements.push(PageElement::Text {
                            x,
                            y: baseline,
                            font: *font,
                            size: *size,
                            text: text.clone(),
                            color: Color::BLACK,
                        });
                        if *strike {
                            elements.push(PageElement::Rect {
                                x,
                                y: baseline - size * 0.28,
                                w: piece.width,
                                h: 0.7,
                                fill: Some(Color::BLACK),
                                stroke: None,
                            });
                        }
                    }
                    PieceKind::Image { key, w, h, drop } => {
                        elements.push(PageElement::Image {
                            x,
                            y: baseline - (h - drop),
                            w: *w,
                            h: *h,
                            key: key.clone(),
                        });
                    }
                }
                x += piece.width;
            }
            self.page().elements.extend(elements);
            self.y += line.height;
        }
    }

    fn list(&mut self, ordered: bool, items: &[ListItem], region: Region) {
        let inner = region.indent(LIST_INDENT);
        for (index, item) in items.iter().enumerate() {
            self.ensure_room(BODY_SIZE * LINE_FACTOR);
            let baseline = self.y + BODY_SIZE * 1.05;

            match item.checkbox {
                Some(checked) => {
                    let box_size = 8.5;
                    let box_y = baseline - box_size;
                    let box_x = region.x + LIST_INDENT - box_size - 7.0;
                    self.page().elements.push(PageElement::Rect {
                        x: box_x,
                        y: box_y,
                        w: box_size,
                        h: box_size,
                        fill: None,
                        stroke: Some(Color::BLACK),
                    });
                    if checked {
                        self.page().elements.push(PageElement::Text {
                            x: box_x + 1.3,
                            y: baseline - 1.2,
                            font: Font::SerifBold,
                            size: 8.0,
                            text: "X".to_string(),
                            color: Color::BLACK,
                        });
                    }
                }
                None => {
                    let marker = if ordered {
                        format!("{}.", index + 1)
                    } else {
                        "\u{2022}".to_string()
                    };
                    let width = Font::Serif.text_width(&marker, BODY_SIZE);
                    self.page().elements.push(PageElement::Text {
                        x: region.x + LIST_INDENT - width - 7.0,
                        y: baseline,
                        font: Font::Serif,
                        size: BODY_SIZE,
                        text: marker,
                        color: Color::BLACK,
                    });
                }
            }

            if item.blocks.is_empty() {
                self.y += BODY_SIZE * LINE_FACTOR;
            } else {
                for (block_index, block) in item.blocks.iter().enumerate() {
                    // The first paragraph shares the marker's line, so its
                    // trailing gap is tightened.
                    if block_index == 0 {
                        if let Block::Paragraph { inlines, align } = block {
                            self.paragraph(inlines, inner, *align, BODY_SIZE);
                            continue;
                        }
                    }
                    self.block(block, inner);
                }
            }
            self.y += 3.0;
        }
        self.y += PARAGRAPH_GAP - 3.0;
    }

    fn code(&mut self, code: &str, region: Region) {
        let line_height = CODE_SIZE * 1.3;
        let max_chars = ((region.width - 2.0 * CODE_PAD) / Font::Mono.advance('m', CODE_SIZE))
            .floor()
            .max(1.0) as usize;

        let mut lines: Vec<String> = Vec::new();
        for raw in code.split('\n') {
            if raw.is_empty() {
                lines.push(String::new());
                continue;
            }
            let mut rest: Vec<char> = raw.chars().collect();
            while !rest.is_empty() {
                let take = rest.len().min(max_chars);
                lines.push(rest[..take].iter().collect());
                rest.drain(..take);
            }
        }

        self.ensure_room(line_height * (lines.len().min(3) as f32) + 2.0 * CODE_PAD);

        let mut chunk_start_index = self.page().elements.len();
        let mut chunk_top = self.y;
        let mut chunk_page = self.pages.len() - 1;

        self.y += CODE_PAD;
        for line in &lines {
            if self.y + line_height > CONTENT_BOTTOM && self.y > MARGIN_Y + 0.5 {
                self.close_code_chunk(chunk_page, chunk_start_index, chunk_top, region);
                self.new_page();
                chunk_page = self.pages.len() - 1;
                chunk_start_index = 0;
                chunk_top = self.y;
                self.y += CODE_PAD;
            }
            if !line.is_empty() {
                let baseline = self.y + CODE_SIZE;
                self.page().elements.push(PageElement::Text {
                    x: region.x + CODE_PAD,
                    y: baseline,
                    font: Font::Mono,
                    size: CODE_SIZE,
                    text: line.clone(),
                    color: Color::BLACK,
                });
            }
            self.y += line_height;
        }
        self.y += CODE_PAD;
        self.close_code_chunk(chunk_page, chunk_start_index, chunk_top, region);
        self.y += PARAGRAPH_GAP;
    }

    fn close_code_chunk(&mut self, page: usize, insert_at: usize, top: f32, region: Region) {
        let bottom = self.y.min(CONTENT_BOTTOM);
        if bottom <= top {
            return;
        }
        if let Some(page) = self.pages.get_mut(page) {
            page.elements.insert(
                insert_at.min(page.elements.len()),
                PageElement::Rect {
                    x: region.x,
                    y: top,
                    w: region.width,
                    h: bottom - top,
                    fill: Some(Color::CODE_BACKGROUND),
                    stroke: None,
                },
            );
        }
    }

    fn quote(&mut self, blocks: &[Block], region: Region) {
        self.ensure_room(BODY_SIZE * LINE_FACTOR);
        let start_page = self.pages.len().saturating_sub(1);
        let start_y = self.y;

        self.blocks(blocks, region.indent(QUOTE_INDENT));

        let end_page = self.pages.len() - 1;
        let end_y = self.y;
        for page_index in start_page..=end_page {
            let top = if page_index == start_page {
                start_y
            } else {
                MARGIN_Y
            };
            let bottom = if page_index == end_page {
                end_y
            } else {
                CONTENT_BOTTOM
            };
            if bottom <= top {
                continue;
            }
            if let Some(page) = self.pages.get_mut(page_index) {
                page.elements.insert(
                    0,
                    PageElement::Rect {
                        x: region.x,
                        y: top,
                        w: 3.0,
                        h: bottom - top,
                        fill: Some(Color::QUOTE_BAR),
                        stroke: None,
                    },
                );
            }
        }
        self.y += PARAGRAPH_GAP;
    }

    fn table(&mut self, head: &[Vec<Vec<Inline>>], rows: &[Vec<Vec<Inline>>], region: Region) {
        let columns = head
            .iter()
            .map(Vec::len)
            .chain(rows.iter().map(Vec::len))
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return;
        }
        let col_width = region.width / columns as f32;
        let inner_width = col_width - 2.0 * CELL_PAD;

        for row in head {
            self.table_row(row, columns, col_width, inner_width, region, true);
        }
        for row in rows {
            self.table_row(row, columns, col_width, inner_width, region, false);
        }
        self.y += PARAGRAPH_GAP;
    }

    fn table_row(
        &mut self,
        cells: &[Vec<Inline>],
        columns: usize,
        col_width: f32,
        inner_width: f32,
        region: Region,
        header: bool,
    ) {
        let boxes: Vec<(Vec<Line>, f32)> = (0..columns)
            .map(|column| {
                let inlines = cells.get(column).map(Vec::as_slice).unwrap_or(&[]);
                let inlines: Vec<Inline> = if header {
                    inlines.iter().map(embolden).collect()
                } else {
                    inlines.to_vec()
                };
                let lines = break_lines(
                    &self.pieces(&inlines, inner_width, BODY_SIZE, false),
                    inner_width,
                );
                let height: f32 = lines.iter().map(|line| line.height).sum();
                (lines, height)
            })
            .collect();

        let row_height = boxes
            .iter()
            .map(|(_, height)| *height)
            .fold(0.0_f32, f32::max)
            + 2.0 * CELL_PAD;
        self.ensure_room(row_height);
        let top = self.y;

        for (column, (lines, _)) in boxes.iter().enumerate() {
            let cell_x = region.x + column as f32 * col_width;
            self.page().elements.push(PageElement::Rect {
                x: cell_x,
                y: top,
                w: col_width,
                h: row_height,
                fill: header.then_some(Color::TABLE_HEADER),
                stroke: Some(Color::RULE_GRAY),
            });

            let mut line_y = top + CELL_PAD;
            let mut elements = Vec::new();
            for line in lines {
                let baseline = line_y + line.ascent;
                let mut x = cell_x + CELL_PAD;
                for (piece_index, piece) in line.pieces.iter().enumerate() {
                    if piece_index > 0 && piece.space_before > 0.0 {
                        x += piece.space_before;
                    }
                    match &piece.kind {
                        PieceKind::Word {
                            text, font, size, ..
                        } => elements.push(PageElement::Text {
                            x,
                            y: baseline,
                            font: *font,
                            size: *size,
                            text: text.clone(),
                            color: Color::BLACK,
                        }),
                        PieceKind::Image { key, w, h, drop } => {
                            elements.push(PageElement::Image {
                                x,
                                y: baseline - (h - drop),
                                w: *w,
                                h: *h,
                                key: key.clone(),
                            })
                        }
                    }
                    x += piece.width;
                }
                line_y += line.height;
            }
            self.page().elements.extend(elements);
        }
        self.y = top + row_height;
    }

    fn rule(&mut self, region: Region) {
        self.ensure_room(14.0);
        self.y += 6.0;
        let y = self.y;
        self.page().elements.push(PageElement::Rect {
            x: region.x,
            y,
            w: region.width,
            h: 0.7,
            fill: Some(Color::RULE_GRAY),
            stroke: None,
        });
        self.y += 8.0;
    }

    /// Flatten inlines into measurable pieces. Missing images degrade to
    /// their alt text in italics.
    fn pieces(&self, inlines: &[Inline], width: f32, size: f32, bold_base: bool) -> Vec<Piece> {
        let mut pieces = Vec::new();
        let mut pending_space = false;

        for inline in inlines {
            match inline {
                Inline::Break => {
                    pieces.push(Piece {
                        kind: PieceKind::Word {
                            text: String::new(),
                            font: Font::Serif,
                            size,
                            strike: false,
                        },
                        width: 0.0,
                        space_before: 0.0,
                        hard_break: true,
                    });
                    pending_space = false;
                }
                Inline::Text { text, style } => {
                    let font = Font::select(style.bold || bold_base, style.italic, style.code);
                    let word_size = if style.code { size * 0.85 } else { size };
                    let mut first = true;
                    for token in text.split(' ') {
                        if !first {
                            pending_space = true;
                        }
                        first = false;
                        if token.is_empty() {
                            continue;
                        }
                        push_word(
                            &mut pieces,
                            token,
                            font,
                            word_size,
                            style.strike,
                            &mut pending_space,
                            width,
                        );
                    }
                }
                Inline::Image {
                    src,
                    alt,
                    inline_math,
                } => match self.images.get(src) {
                    Some(info) => {
                        let aspect = if info.height == 0 {
                            1.0
                        } else {
                            info.width as f32 / info.height as f32
                        };
                        let (mut w, mut h, drop) = if *inline_math {
                            let h = size * 1.2;
                            (h * aspect, h, size * 1.2 * 0.2)
                        } else {
                            // 96dpi pixels to points.
                            let w = info.width as f32 * 0.75;
                            (w, w / aspect.max(0.01), 0.0)
                        };
                        if w > width {
                            let scale = width / w;
                            w *= scale;
                            h *= scale;
                        }
                        let space = if std::mem::take(&mut pending_space) {
                            Font::Serif.advance(' ', size)
                        } else {
                            0.0
                        };
                        pieces.push(Piece {
                            kind: PieceKind::Image {
                                key: info.key.clone(),
                                w,
                                h,
                                drop,
                            },
                            width: w,
                            space_before: space,
                            hard_break: false,
                        });
                    }
                    None => {
                        let fallback = if alt.is_empty() { src } else { alt };
                        let mut first = true;
                        for token in fallback.split_whitespace() {
                            if !first {
                                pending_space = true;
                            }
                            first = false;
                            push_word(
                                &mut pieces,
                                token,
                                Font::SerifItalic,
                                size,
                                false,
                                &mut pending_space,
                                width,
                            );
                        }
                    }
                },
            }
        }
        pieces
    }
}

fn embolden(inline: &Inline) -> Inline {
    match inline {
        Inline::Text { text, style } => Inline::Text {
            text: text.clone(),
            style: TextStyle {
                bold: true,
                ..*style
            },
        },
        other => other.clone(),
    }
}

fn push_word(
    pieces: &mut Vec<Piece>,
    token: &str,
    font: Font,
    size: f32,
    strike: bool,
    pending_space: &mut bool,
    max_width: f32,
) {
    let space = if std::mem::take(pending_space) {
        font.advance(' ', size)
    } else {
        0.0
    };
    let width = font.text_width(token, size);

    if width <= max_width {
        pieces.push(Piece {
            kind: PieceKind::Word {
                text: token.to_string(),
                font,
                size,
                strike,
            },
            width,
            space_before: space,
            hard_break: false,
        });
        return;
    }

    // Hard-split a token wider than the whole line.
    let mut fragment = String::new();
    let mut fragment_width = 0.0;
    let mut first = true;
    for ch in token.chars() {
        let advance = font.advance(ch, size);
        if fragment_width + advance > max_width && !fragment.is_empty() {
            pieces.push(Piece {
                kind: PieceKind::Word {
                    text: std::mem::take(&mut fragment),
                    font,
                    size,
                    strike,
                },
                width: fragment_width,
                space_before: if first { space } else { 0.0 },
                hard_break: false,
            });
            first = false;
            fragment_width = 0.0;
        }
        fragment.push(ch);
        fragment_width += advance;
    }
    if !fragment.is_empty() {
        pieces.push(Piece {
            kind: PieceKind::Word {
                text: fragment,
                font,
                size,
                strike,
            },
            width: fragment_width,
            space_before: if first { space } else { 0.0 },
            hard_break: false,
        });
    }
}

#[derive(Debug, Clone)]
enum PieceKind {
    Word {
        text: String,
        font: Font,
        size: f32,
        strike: bool,
    },
    Image {
        key: String,
        w: f32,
        h: f32,
        drop: f32,
    },
}

#[derive(Debug, Clone)]
struct Piece {
    kind: PieceKind,
    width: f32,
    space_before: f32,
    hard_break: bool,
}

#[derive(Debug)]
struct Line {
    pieces: Vec<Piece>,
    natural: f32,
    height: f32,
    ascent: f32,
}

fn break_lines(pieces: &[Piece], width: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current: Vec<Piece> = Vec::new();
    let mut current_width = 0.0_f32;

    for piece in pieces {
        if piece.hard_break {
            lines.push(finish_line(std::mem::take(&mut current), current_width));
            current_width = 0.0;
            continue;
        }
        let space = if current.is_empty() {
            0.0
        } else {
            piece.space_before
        };
        if !current.is_empty() && current_width + space + piece.width > width {
            lines.push(finish_line(std::mem::take(&mut current), current_width));
            current_width = 0.0;
        }
        current_width += if current.is_empty() {
            piece.width
        } else {
            piece.space_before + piece.width
        };
        current.push(piece.clone());
    }
    if !current.is_empty() {
        lines.push(finish_line(current, current_width));
    }
    lines
}

fn finish_line(pieces: Vec<Piece>, natural: f32) -> Line {
    let mut ascent = 0.0_f32;
    let mut descent = 0.0_f32;
    for piece in &pieces {
        match &piece.kind {
            PieceKind::Word { size, .. } => {
                ascent = ascent.max(size * 1.05);
                descent = descent.max(size * (LINE_FACTOR - 1.05));
            }
            PieceKind::Image { h, drop, .. } => {
                ascent = ascent.max(h - drop + 2.0);
                descent = descent.max(drop + 2.0);
            }
        }
    }
    if pieces.is_empty() {
        ascent = BODY_SIZE * 1.05;
        descent = BODY_SIZE * (LINE_FACTOR - 1.05);
    }
    Line {
        pieces,
        natural,
        height: ascent + descent,
        ascent,
    }
}
