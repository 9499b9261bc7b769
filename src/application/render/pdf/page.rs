//! PDF assembly with lopdf: positioned elements → document bytes.
//!
//! Text uses the Base-14 faces with WinAnsiEncoding, so strings are
//! re-encoded from UTF-8 to CP1252 with `?` for anything outside it.
//! Images become DeviceRGB XObjects, with an SMask when alpha is present.

use std::io::Cursor;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat, dictionary};

use super::layout::{Page, PageElement};
use super::style::{Color, Font, PAGE_HEIGHT, PAGE_WIDTH};
use crate::application::render::RenderError;

/// A decoded raster ready to embed, split into color and alpha planes.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

pub fn assemble(pages: &[Page], images: &[EncodedImage]) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font_dict = Dictionary::new();
    for font in Font::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        font_dict.set(font.resource_name(), Object::Reference(font_id));
    }

    let mut xobject_dict = Dictionary::new();
    for image in images {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };
        if let Some(alpha) = &image.alpha {
            let smask_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha.clone(),
            ));
            dict.set("SMask", Object::Reference(smask_id));
        }
        let image_id = doc.add_object(Stream::new(dict, image.rgb.clone()));
        xobject_dict.set(image.key.as_str(), Object::Reference(image_id));
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => font_dict,
        "XObject" => xobject_dict,
    });

    let mut kids = Vec::new();
    for page in pages {
        let content = page_content(page);
        let encoded = content.encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => Object::Reference(resources_id),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut Cursor::new(&mut bytes))?;
    Ok(bytes)
}

fn page_content(page: &Page) -> Content {
    let mut ops = Vec::new();
    for element in &page.elements {
        match element {
            PageElement::Text {
                x,
                y,
                font,
                size,
                text,
                color,
            } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new(
                    "Tf",
                    vec![
                        Object::Name(font.resource_name().into()),
                        Object::Real(*size),
                    ],
                ));
                ops.push(rg(*color));
                ops.push(Operation::new(
                    "Td",
                    vec![Object::Real(*x), Object::Real(PAGE_HEIGHT - *y)],
                ));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(winansi(text), StringFormat::Literal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            PageElement::Rect {
                x,
                y,
                w,
                h,
                fill,
                stroke,
            } => {
                ops.push(Operation::new("q", vec![]));
                if let Some(color) = fill {
                    ops.push(rg(*color));
                }
                if let Some(color) = stroke {
                    ops.push(Operation::new(
                        "RG",
                        vec![
                            Object::Real(color.r),
                            Object::Real(color.g),
                            Object::Real(color.b),
                        ],
                    ));
                    ops.push(Operation::new("w", vec![Object::Real(0.7)]));
                }
                ops.push(Operation::new(
                    "re",
                    vec![
                        Object::Real(*x),
                        Object::Real(PAGE_HEIGHT - *y - *h),
                        Object::Real(*w),
                        Object::Real(*h),
                    ],
                ));
                let paint = match (fill.is_some(), stroke.is_some()) {
                    (true, true) => "B",
                    (true, false) => "f",
                    (false, true) => "S",
                    (false, false) => "n",
                };
                ops.push(Operation::new(paint, vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            PageElement::Image { x, y, w, h, key } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        Object::Real(*w),
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(*h),
                        Object::Real(*x),
                        Object::Real(PAGE_HEIGHT - *y - *h),
                    ],
                ));
                ops.push(Operation::new("Do", vec![Object::Name(key.bytes().collect())]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
    Content { operations: ops }
}

fn rg(color: Color) -> Operation {
    Operation::new(
        "rg",
        vec![
            Object::Real(color.r),
            Object::Real(color.g),
            Object::Real(color.b),
        ],
    )
}

/// UTF-8 → WinAnsi (CP1252). Characters outside the code page become `?`.
pub fn winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{20}'..='\u{7e}' => ch as u8,
            '\u{a0}'..='\u{ff}' => ch as u8,
            '\u{20ac}' => 0x80,
            '\u{201a}' => 0x82,
            '\u{192}' => 0x83,
            '\u{201e}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{2c6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{160}' => 0x8a,
            '\u{2039}' => 0x8b,
            '\u{152}' => 0x8c,
            '\u{17d}' => 0x8e,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2dc}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{161}' => 0x9a,
            '\u{203a}' => 0x9b,
            '\u{153}' => 0x9c,
            '\u{17e}' => 0x9e,
            '\u{178}' => 0x9f,
            _ => b'?',
        })
        .collect()
}
