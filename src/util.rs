//! Small shared helpers

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Human-readable byte count; `None` means no limit
pub fn format_file_size(size: Option<u64>) -> String {
    let Some(bytes) = size else {
        return "unlimited".to_string();
    };

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

/// True if the file name has a `.pdf` extension (any case)
pub fn has_pdf_extension(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(None), "unlimited");
        assert_eq!(format_file_size(Some(0)), "0 B");
        assert_eq!(format_file_size(Some(1023)), "1023 B");
        assert_eq!(format_file_size(Some(1536)), "1.5 KB");
        assert_eq!(format_file_size(Some(500 * MB)), "500.0 MB");
        assert_eq!(format_file_size(Some(2 * GB)), "2.0 GB");
    }

    #[test]
    fn test_has_pdf_extension() {
        assert!(has_pdf_extension("book.pdf"));
        assert!(has_pdf_extension("SCAN.PDF"));
        assert!(!has_pdf_extension("book.pdf.exe"));
        assert!(!has_pdf_extension("pdf"));
        assert!(!has_pdf_extension("notes.txt"));
    }
}
