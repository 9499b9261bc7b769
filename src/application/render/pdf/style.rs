//! Page geometry, type scale and the width model for the Base-14 faces.

/// A4 in PostScript points.
pub const PAGE_WIDTH: f32 = 595.276;
pub const PAGE_HEIGHT: f32 = 841.89;

/// 2.5cm left/right, 2cm top/bottom.
pub const MARGIN_X: f32 = 70.866;
pub const MARGIN_Y: f32 = 56.693;

pub const BODY_SIZE: f32 = 13.0;
pub const CODE_SIZE: f32 = 11.0;
pub const FOOTER_SIZE: f32 = 10.0;
pub const LINE_FACTOR: f32 = 1.4;

pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN_X;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const FOOTER_GRAY: Color = Color {
        r: 0.45,
        g: 0.45,
        b: 0.45,
    };
    pub const CODE_BACKGROUND: Color = Color {
        r: 0.95,
        g: 0.95,
        b: 0.95,
    };
    pub const TABLE_HEADER: Color = Color {
        r: 0.92,
        g: 0.92,
        b: 0.92,
    };
    pub const RULE_GRAY: Color = Color {
        r: 0.7,
        g: 0.7,
        b: 0.7,
    };
    pub const QUOTE_BAR: Color = Color {
        r: 0.8,
        g: 0.8,
        b: 0.8,
    };
}

/// The five Base-14 faces the renderer emits. No font embedding: every PDF
/// viewer ships these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Serif,
    SerifBold,
    SerifItalic,
    SerifBoldItalic,
    Mono,
}

impl Font {
    pub const ALL: [Font; 5] = [
        Font::Serif,
        Font::SerifBold,
        Font::SerifItalic,
        Font::SerifBoldItalic,
        Font::Mono,
    ];

    pub fn resource_name(self) -> &'static str {
        match self {
            Font::Serif => "F1",
            Font::SerifBold => "F2",
            Font::SerifItalic => "F3",
            Font::SerifBoldItalic => "F4",
            Font::Mono => "F5",
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            Font::Serif => "Times-Roman",
            Font::SerifBold => "Times-Bold",
            Font::SerifItalic => "Times-Italic",
            Font::SerifBoldItalic => "Times-BoldItalic",
            Font::Mono => "Courier",
        }
    }

    pub fn select(bold: bool, italic: bool, code: bool) -> Font {
        if code {
            Font::Mono
        } else {
            match (bold, italic) {
                (true, true) => Font::SerifBoldItalic,
                (true, false) => Font::SerifBold,
                (false, true) => Font::SerifItalic,
                (false, false) => Font::Serif,
            }
        }
    }

    /// Advance width of `ch` at `size` points. Courier is exact (600/1000);
    /// the Times faces use a char-class approximation close enough for line
    /// breaking and justification.
    pub fn advance(self, ch: char, size: f32) -> f32 {
        if self == Font::Mono {
            return size * 0.6;
        }
        let units = match ch {
            ' ' => 250.0,
            'i' | 'j' | 'l' | '.' | ',' | ';' | ':' | '\'' | '|' | '!' => 278.0,
            't' | 'f' | 'r' | '(' | ')' | '[' | ']' | '/' | '\\' => 333.0,
            'm' => 778.0,
            'w' => 722.0,
            'M' => 889.0,
            'W' => 944.0,
            'I' => 333.0,
            'J' => 389.0,
            c if c.is_ascii_uppercase() => 680.0,
            c if c.is_ascii_digit() => 500.0,
            '-' | '"' => 333.0,
            '—' | '…' => 1000.0,
            '–' => 500.0,
            _ => 480.0,
        };
        let bold_factor = match self {
            Font::SerifBold | Font::SerifBoldItalic => 1.05,
            _ => 1.0,
        };
        units / 1000.0 * size * bold_factor
    }

    pub fn text_width(self, text: &str, size: f32) -> f32 {
        text.chars().map(|ch| self.advance(ch, size)).sum()
    }
}

/// Heading scale: size, whether it is centered, and whether the text is
/// upper-cased. Levels past 4 reuse the level-4 treatment.
pub fn heading_style(level: u8) -> (f32, bool, bool) {
    match level {
        1 => (24.0, true, true),
        2 => (16.0, false, false),
        3 => (14.0, false, false),
        _ => (13.0, false, false),
    }
}
