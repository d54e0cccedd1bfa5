/// Fallback content type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A downloaded user file, ready to be attached to a multipart submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

fn content_types() -> &'static [(&'static str, &'static str)] {
    &[
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("png", "image/png"),
        ("gif", "image/gif"),
        ("webp", "image/webp"),
        ("bmp", "image/bmp"),
        ("heic", "image/heic"),
        ("mp4", "video/mp4"),
        ("mov", "video/quicktime"),
        ("webm", "video/webm"),
        ("mp3", "audio/mpeg"),
        ("ogg", "audio/ogg"),
        ("oga", "audio/ogg"),
        ("m4a", "audio/mp4"),
        ("wav", "audio/x-wav"),
        ("pdf", "application/pdf"),
        ("doc", "application/msword"),
        (
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        ("xls", "application/vnd.ms-excel"),
        (
            "xlsx",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        ("ppt", "application/vnd.ms-powerpoint"),
        (
            "pptx",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ),
        ("zip", "application/zip"),
        ("rar", "application/vnd.rar"),
        ("txt", "text/plain"),
        ("csv", "text/csv"),
        ("json", "application/json"),
    ]
}

/// Best-guess content type from the file name's extension.
pub fn guess_content_type(file_name: &str) -> &'static str {
    let Some((stem, ext)) = file_name.rsplit_once('.') else {
        return OCTET_STREAM;
    };
    if stem.is_empty() {
        return OCTET_STREAM;
    }
    let ext = ext.to_ascii_lowercase();
    content_types()
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
        .unwrap_or(OCTET_STREAM)
}

/// Last segment of a platform file path (`photos/file_12.jpg` -> `file_12.jpg`).
pub fn file_name_from_path(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_common_types() {
        assert_eq!(guess_content_type("file_12.jpg"), "image/jpeg");
        assert_eq!(guess_content_type("REPORT.PDF"), "application/pdf");
        assert_eq!(
            guess_content_type("a.b.xlsx"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
    }

    #[test]
    fn unknown_or_missing_extension_falls_back() {
        assert_eq!(guess_content_type("file_12"), OCTET_STREAM);
        assert_eq!(guess_content_type("data.xyz"), OCTET_STREAM);
        assert_eq!(guess_content_type(".bashrc"), OCTET_STREAM);
    }

    #[test]
    fn file_name_is_last_path_segment() {
        assert_eq!(file_name_from_path("photos/file_12.jpg"), Some("file_12.jpg"));
        assert_eq!(file_name_from_path("file_3.pdf"), Some("file_3.pdf"));
        assert_eq!(file_name_from_path("documents/"), None);
        assert_eq!(file_name_from_path(""), None);
    }
}
