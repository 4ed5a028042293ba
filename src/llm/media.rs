pub const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

/// MIME type to declare for inline image data. Unknown or non-image bytes
/// are still forwarded, labelled as JPEG.
pub fn image_mime_for_bytes(data: &[u8]) -> String {
    detect_mime_type(data)
        .filter(|mime| is_image_mime(mime))
        .map(|mime| normalize_image_mime_type(&mime))
        .unwrap_or_else(|| FALLBACK_IMAGE_MIME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R',
    ];

    #[test]
    fn sniffs_png_magic() {
        assert_eq!(detect_mime_type(PNG_HEADER).as_deref(), Some("image/png"));
        assert_eq!(image_mime_for_bytes(PNG_HEADER), "image/png");
    }

    #[test]
    fn arbitrary_bytes_fall_back_to_jpeg() {
        assert_eq!(image_mime_for_bytes(&[1, 2, 3]), FALLBACK_IMAGE_MIME);
    }

    #[test]
    fn image_mime_check_is_case_insensitive() {
        assert!(is_image_mime("Image/PNG"));
        assert!(!is_image_mime("application/pdf"));
    }
}
