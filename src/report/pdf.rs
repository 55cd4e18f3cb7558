//! PDF encoding for a laid-out report
//!
//! Layout works in millimetres from the top-left corner; PDF user space is
//! points from the bottom-left. Everything is converted here and nowhere else.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::layout::{Element, Page, Report, PAGE_HEIGHT_MM, PAGE_WIDTH_MM, REPORT_TITLE};
use super::ReportError;

const POINTS_PER_MM: f32 = 72.0 / 25.4;

/// jsPDF-compatible default stroke width (0.2 mm)
const RULE_WIDTH_MM: f32 = 0.2;

const REGULAR_FONT: &str = "F1";
const BOLD_FONT: &str = "F2";

fn pt(mm: f32) -> f32 {
    mm * POINTS_PER_MM
}

/// Convert a top-origin y in millimetres to a bottom-origin y in points
fn flip_y(mm: f32) -> f32 {
    pt(PAGE_HEIGHT_MM - mm)
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn gray_level(gray: u8) -> Object {
    real(f32::from(gray) / 255.0)
}

/// Standard Type1 fonts only cover WinAnsi; anything outside Latin-1 is
/// replaced rather than dropped so line lengths stay recognisable. C1
/// controls are replaced too, since WinAnsi draws punctuation at 0x80-0x9F.
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x80..=0x9F => b'?',
            code if code < 256 => code as u8,
            _ => b'?',
        })
        .collect()
}

fn image_name(index: usize) -> String {
    format!("Im{}", index)
}

fn page_operations(page: &Page) -> Vec<Operation> {
    let mut ops = Vec::new();

    for element in &page.elements {
        match element {
            Element::Text {
                x,
                y,
                size,
                bold,
                gray,
                text,
                ..
            } => {
                let font = if *bold { BOLD_FONT } else { REGULAR_FONT };
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![font.into(), real(*size)]));
                ops.push(Operation::new("g", vec![gray_level(*gray)]));
                ops.push(Operation::new("Td", vec![real(pt(*x)), real(flip_y(*y))]));
                ops.push(Operation::new("Tj", vec![Object::string_literal(encode_text(text))]));
                ops.push(Operation::new("ET", vec![]));
            }
            Element::Image {
                x,
                y,
                width,
                height,
                image,
            } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        real(pt(*width)),
                        real(0.0),
                        real(0.0),
                        real(pt(*height)),
                        real(pt(*x)),
                        real(flip_y(*y + *height)),
                    ],
                ));
                ops.push(Operation::new("Do", vec![image_name(*image).as_str().into()]));
                ops.push(Operation::new("Q", vec![]));
            }
            Element::Rule { x1, x2, y, gray } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new("G", vec![gray_level(*gray)]));
                ops.push(Operation::new("w", vec![real(pt(RULE_WIDTH_MM))]));
                ops.push(Operation::new("m", vec![real(pt(*x1)), real(flip_y(*y))]));
                ops.push(Operation::new("l", vec![real(pt(*x2)), real(flip_y(*y))]));
                ops.push(Operation::new("S", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }

    ops
}

/// Encode a report as a standalone PDF
pub fn render(report: &Report) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut xobjects = Dictionary::new();
    for (index, image) in report.images().iter().enumerate() {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            image.jpeg.clone(),
        );
        let image_id = doc.add_object(stream);
        xobjects.set(image_name(index), image_id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR_FONT => regular_id,
            BOLD_FONT => bold_id,
        },
        "XObject" => xobjects,
    });

    let media_box = vec![
        Object::Integer(0),
        Object::Integer(0),
        real(pt(PAGE_WIDTH_MM)),
        real(pt(PAGE_HEIGHT_MM)),
    ];

    let mut kids: Vec<Object> = Vec::with_capacity(report.page_count());
    for page in report.pages() {
        let content = Content {
            operations: page_operations(page),
        };
        let encoded = content
            .encode()
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => media_box.clone(),
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(REPORT_TITLE),
        "Producer" => Object::string_literal("docmanage-client"),
        "CreationDate" => Object::string_literal(
            report.generated_at.format("D:%Y%m%d%H%M%SZ").to_string(),
        ),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    Ok(bytes)
}
