//! Report layout
//!
//! Pure accumulator for the export: a cursor over A4 pages in millimetres
//! (origin top-left, y grows downward) plus the elements placed so far and
//! the table of embedded images. No I/O happens here, so the page-break rules
//! are a function of the input order alone.

use chrono::{DateTime, Local, NaiveDate, Utc};

use super::images::EmbeddedImage;
use crate::documents::DocumentFilters;
use crate::models::DocumentRecord;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

pub const TOP_MARGIN: f32 = 20.0;
pub const LEFT_MARGIN: f32 = 14.0;
/// A document header starting below this starts a new page
pub const DOCUMENT_BREAK_Y: f32 = 270.0;
/// An image starting below this starts a new page
pub const IMAGE_BREAK_Y: f32 = 200.0;

pub const IMAGE_X: f32 = 15.0;
pub const IMAGE_WIDTH: f32 = 180.0;
pub const IMAGE_HEIGHT: f32 = 120.0;
pub const IMAGE_GAP: f32 = 10.0;

pub const FALLBACK_ADVANCE: f32 = 6.0;
pub const SEPARATOR_END_X: f32 = 196.0;

pub const REPORT_TITLE: &str = "DocManage - Document Report";

const DATE_FORMAT: &str = "%d/%m/%Y";

/// What a text line is for. Lets callers inspect a report without parsing
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Title,
    GeneratedOn,
    Filter,
    DocumentHeader,
    DocumentMeta,
    ImageFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        /// 0 is black, 255 white
        gray: u8,
        role: TextRole,
        text: String,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        /// Index into the report's image table
        image: usize,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
        gray: u8,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub elements: Vec<Element>,
}

/// Cursor state for one export run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutState {
    pub cursor_y: f32,
    pub page_index: usize,
}

impl Default for LayoutState {
    fn default() -> Self {
        Self {
            cursor_y: TOP_MARGIN,
            page_index: 0,
        }
    }
}

#[derive(Debug)]
pub struct ReportLayout {
    state: LayoutState,
    pages: Vec<Page>,
    images: Vec<EmbeddedImage>,
}

impl ReportLayout {
    pub fn new() -> Self {
        Self {
            state: LayoutState::default(),
            pages: vec![Page::default()],
            images: Vec::new(),
        }
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.state = LayoutState {
            cursor_y: TOP_MARGIN,
            page_index: self.pages.len() - 1,
        };
    }

    fn place(&mut self, element: Element) {
        // pages is never empty: new() seeds the first page
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn text(&mut self, role: TextRole, size: f32, bold: bool, gray: u8, text: String, advance: f32) {
        let y = self.state.cursor_y;
        self.place(Element::Text {
            x: LEFT_MARGIN,
            y,
            size,
            bold,
            gray,
            role,
            text,
        });
        self.state.cursor_y += advance;
    }

    /// Title, generation date and one line per active filter
    pub fn write_preamble(&mut self, filters: &DocumentFilters, generated_on: NaiveDate) {
        self.text(TextRole::Title, 18.0, false, 0, REPORT_TITLE.to_string(), 10.0);
        self.text(
            TextRole::GeneratedOn,
            11.0,
            false,
            0,
            format!("Generated on: {}", generated_on.format(DATE_FORMAT)),
            8.0,
        );

        if let Some(truck) = &filters.truck_number {
            self.text(TextRole::Filter, 11.0, false, 0, format!("Truck Number: {}", truck), 6.0);
        }
        if filters.has_date_range() {
            let from = filters
                .date_from
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "Start".to_string());
            let to = filters
                .date_to
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "End".to_string());
            self.text(TextRole::Filter, 11.0, false, 0, format!("Date Range: {} to {}", from, to), 6.0);
        }

        self.state.cursor_y += 10.0;
    }

    /// Header block for one document, breaking the page first if needed
    pub fn begin_document(&mut self, document: &DocumentRecord) {
        if self.state.cursor_y > DOCUMENT_BREAK_Y {
            self.new_page();
        }

        self.text(
            TextRole::DocumentHeader,
            14.0,
            true,
            0,
            format!("Truck: {}", document.truck_number),
            7.0,
        );
        self.text(
            TextRole::DocumentMeta,
            10.0,
            false,
            0,
            format!("Date: {}", document.date.format(DATE_FORMAT)),
            5.0,
        );
        self.text(
            TextRole::DocumentMeta,
            10.0,
            false,
            0,
            format!("Uploaded: {}", local_date(document.created_at).format(DATE_FORMAT)),
            8.0,
        );
    }

    /// Embed an image at the fixed size, breaking the page first if needed
    pub fn push_image(&mut self, image: EmbeddedImage) {
        if self.state.cursor_y > IMAGE_BREAK_Y {
            self.new_page();
        }

        let index = self.images.len();
        self.images.push(image);
        let y = self.state.cursor_y;
        self.place(Element::Image {
            x: IMAGE_X,
            y,
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
            image: index,
        });
        self.state.cursor_y += IMAGE_HEIGHT + IMAGE_GAP;
    }

    /// Muted line naming an image that could not be embedded
    pub fn push_fallback(&mut self, image_url: &str) {
        self.text(
            TextRole::ImageFallback,
            9.0,
            false,
            100,
            format!("Image: {}", image_url),
            FALLBACK_ADVANCE,
        );
    }

    /// Separator and trailing space after a document
    pub fn end_document(&mut self) {
        self.state.cursor_y += 5.0;
        let y = self.state.cursor_y;
        self.place(Element::Rule {
            x1: LEFT_MARGIN,
            x2: SEPARATOR_END_X,
            y,
            gray: 200,
        });
        self.state.cursor_y += 10.0;
    }

    pub fn finish(self, generated_at: DateTime<Utc>) -> Report {
        Report {
            file_name: report_file_name(generated_at),
            generated_at,
            pages: self.pages,
            images: self.images,
        }
    }
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self::new()
    }
}

fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

/// `documents-<unix millis>.pdf`
pub fn report_file_name(generated_at: DateTime<Utc>) -> String {
    format!("documents-{}.pdf", generated_at.timestamp_millis())
}

/// A laid-out report, ready to be encoded
#[derive(Debug)]
pub struct Report {
    pub file_name: String,
    pub generated_at: DateTime<Utc>,
    pages: Vec<Page>,
    images: Vec<EmbeddedImage>,
}

impl Report {
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn images(&self) -> &[EmbeddedImage] {
        &self.images
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn texts_with_role(&self, wanted: TextRole) -> Vec<&str> {
        self.pages
            .iter()
            .flat_map(|page| page.elements.iter())
            .filter_map(|element| match element {
                Element::Text { role, text, .. } if *role == wanted => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Document header lines in output order
    pub fn document_headers(&self) -> Vec<&str> {
        self.texts_with_role(TextRole::DocumentHeader)
    }

    /// URL fallback lines in output order
    pub fn fallback_lines(&self) -> Vec<&str> {
        self.texts_with_role(TextRole::ImageFallback)
    }

    pub fn embedded_image_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|page| page.elements.iter())
            .filter(|element| matches!(element, Element::Image { .. }))
            .count()
    }

    pub fn separator_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|page| page.elements.iter())
            .filter(|element| matches!(element, Element::Rule { .. }))
            .count()
    }
}
