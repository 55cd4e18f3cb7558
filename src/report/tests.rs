//! Export tests
//!
//! Ordering, fallback substitution, page breaks and the encoded PDF itself.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use tempfile::tempdir;

    use crate::documents::DocumentFilters;
    use crate::models::{DocumentRecord, ImageRef};
    use crate::report::{
        render_pdf, Element, ImageError, ImageFetcher, ReportArtifact, ReportAssembler,
    };

    /// Serves canned bytes per URL; unknown URLs fail like a 403 from storage
    #[derive(Default)]
    struct FakeFetcher {
        responses: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
            self.responses.insert(url.to_string(), bytes);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or(ImageError::Status(403))
        }
    }

    fn png() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 12, image::Rgb([10, 120, 200])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn document(id: i64, truck: &str, urls: &[&str]) -> DocumentRecord {
        DocumentRecord {
            id,
            truck_number: truck.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
            images: urls.iter().map(|u| ImageRef::new(*u)).collect(),
            company_name: Some("Acme".to_string()),
            uploaded_by_name: None,
        }
    }

    #[tokio::test]
    async fn test_headers_follow_document_order() {
        let assembler = ReportAssembler::new(Arc::new(FakeFetcher::default()));
        let documents = vec![
            document(3, "MH12AB1234", &[]),
            document(1, "KA01XY9999", &[]),
            document(2, "DL8CAF0001", &[]),
        ];

        let report = assembler.assemble(&documents, &DocumentFilters::new()).await;
        assert_eq!(
            report.document_headers(),
            vec!["Truck: MH12AB1234", "Truck: KA01XY9999", "Truck: DL8CAF0001"]
        );
        assert_eq!(report.separator_count(), 3);
    }

    #[tokio::test]
    async fn test_document_without_images_fetches_nothing() {
        let fetcher = Arc::new(FakeFetcher::default());
        let assembler = ReportAssembler::new(fetcher.clone());

        let report = assembler
            .assemble(&[document(1, "MH12", &[])], &DocumentFilters::new())
            .await;

        assert!(fetcher.calls().is_empty());
        assert_eq!(report.embedded_image_count(), 0);
        assert!(report.fallback_lines().is_empty());
    }

    #[tokio::test]
    async fn test_failed_image_becomes_url_line_in_place() {
        let fetcher = Arc::new(FakeFetcher::default().with("https://b.s3/ok.png", png()));
        let assembler = ReportAssembler::new(fetcher.clone());
        let documents = vec![
            document(1, "MH12", &["https://b.s3/ok.png"]),
            document(2, "KA01", &["https://b.s3/denied.jpg"]),
        ];

        let report = assembler.assemble(&documents, &DocumentFilters::new()).await;

        assert_eq!(report.embedded_image_count(), 1);
        assert_eq!(report.fallback_lines(), vec!["Image: https://b.s3/denied.jpg"]);
        assert_eq!(fetcher.calls(), vec!["https://b.s3/ok.png", "https://b.s3/denied.jpg"]);

        // The fallback line sits after the second header, not the first
        let elements = &report.pages()[0].elements;
        let second_header = elements
            .iter()
            .position(|e| matches!(e, Element::Text { text, .. } if text == "Truck: KA01"))
            .unwrap();
        let fallback = elements
            .iter()
            .position(|e| matches!(e, Element::Text { text, .. } if text.starts_with("Image: ")))
            .unwrap();
        let image = elements
            .iter()
            .position(|e| matches!(e, Element::Image { .. }))
            .unwrap();
        assert!(image < second_header);
        assert!(second_header < fallback);
    }

    #[tokio::test]
    async fn test_leading_failed_image_keeps_later_image() {
        let fetcher = Arc::new(FakeFetcher::default().with("https://b.s3/ok.png", png()));
        let assembler = ReportAssembler::new(fetcher);
        let documents = vec![
            document(1, "MH12", &["https://b.s3/denied.jpg"]),
            document(2, "KA01", &["https://b.s3/ok.png"]),
        ];

        let report = assembler.assemble(&documents, &DocumentFilters::new()).await;

        assert_eq!(report.document_headers(), vec!["Truck: MH12", "Truck: KA01"]);
        assert_eq!(report.embedded_image_count(), 1);
        assert_eq!(report.fallback_lines(), vec!["Image: https://b.s3/denied.jpg"]);
        assert_eq!(report.images().len(), 1);

        let elements = &report.pages()[0].elements;
        let fallback = elements
            .iter()
            .position(|e| matches!(e, Element::Text { text, .. } if text.starts_with("Image: ")))
            .unwrap();
        let second_header = elements
            .iter()
            .position(|e| matches!(e, Element::Text { text, .. } if text == "Truck: KA01"))
            .unwrap();
        let image = elements
            .iter()
            .position(|e| matches!(e, Element::Image { .. }))
            .unwrap();
        assert!(fallback < second_header);
        assert!(second_header < image);

        let bytes = render_pdf(&report).unwrap();
        assert!(lopdf::Document::load_mem(&bytes).is_ok());
    }

    #[tokio::test]
    async fn test_undecodable_image_falls_back() {
        let fetcher = Arc::new(
            FakeFetcher::default().with("https://b.s3/page.html", b"<html></html>".to_vec()),
        );
        let assembler = ReportAssembler::new(fetcher);

        let report = assembler
            .assemble(
                &[document(1, "MH12", &["https://b.s3/page.html"])],
                &DocumentFilters::new(),
            )
            .await;
        assert_eq!(report.embedded_image_count(), 0);
        assert_eq!(report.fallback_lines().len(), 1);
    }

    #[tokio::test]
    async fn test_many_images_spill_onto_new_pages() {
        let urls = ["https://b.s3/1.png", "https://b.s3/2.png", "https://b.s3/3.png"];
        let fetcher = urls
            .iter()
            .fold(FakeFetcher::default(), |f, url| f.with(url, png()));
        let assembler = ReportAssembler::new(Arc::new(fetcher));

        let report = assembler
            .assemble(&[document(1, "MH12", &urls)], &DocumentFilters::new())
            .await;

        assert_eq!(report.embedded_image_count(), 3);
        assert_eq!(report.page_count(), 2);
    }

    #[tokio::test]
    async fn test_pdf_reparses_with_expected_pages() {
        let fetcher = Arc::new(FakeFetcher::default().with("https://b.s3/1.png", png()));
        let assembler = ReportAssembler::new(fetcher);
        let documents: Vec<DocumentRecord> = (0..10)
            .map(|i| {
                let urls: &[&str] = if i == 0 { &["https://b.s3/1.png"] } else { &[] };
                document(i, &format!("TRUCK{}", i), urls)
            })
            .collect();
        let filters = DocumentFilters::new().with_truck_number("TRUCK");
        let generated_at = Utc.timestamp_millis_opt(1_760_000_000_000).unwrap();

        let report = assembler.assemble_at(&documents, &filters, generated_at).await;
        assert_eq!(report.file_name, "documents-1760000000000.pdf");
        assert!(report.page_count() >= 2);

        let bytes = render_pdf(&report).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), report.page_count());
    }

    #[tokio::test]
    async fn test_export_and_save() {
        let assembler = ReportAssembler::new(Arc::new(FakeFetcher::default()));
        let artifact: ReportArtifact = assembler
            .export(&[document(1, "MH12", &[])], &DocumentFilters::new())
            .await
            .unwrap();
        assert!(artifact.file_name.starts_with("documents-"));
        assert!(artifact.file_name.ends_with(".pdf"));

        let dir = tempdir().unwrap();
        let target = dir.path().join("exports");
        let path = artifact.save_to(&target).await.unwrap();
        assert_eq!(path, target.join(&artifact.file_name));
        assert_eq!(std::fs::read(&path).unwrap(), artifact.bytes);
    }
}
