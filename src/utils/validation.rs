/// Image extensions accepted for every upload category
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// Strips any client-supplied directory components, accepting both separators.
pub fn base_filename(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim()
}

/// Returns the text after the last `.` of the base filename, case preserved.
/// `None` when there is no dot or nothing follows it.
pub fn extension_of(filename: &str) -> Option<&str> {
    base_filename(filename)
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

pub fn is_allowed_extension(ext: &str) -> bool {
    ALLOWED_IMAGE_EXTENSIONS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

/// Lowercases and drops parameters: `Image/JPEG; q=1` -> `image/jpeg`
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Declared media type must be `image/<subtype>` with the subtype drawn from
/// the same allow-set as the extension.
pub fn is_allowed_image_mime(content_type: &str) -> bool {
    let Ok(parsed) = normalize_mime(content_type).parse::<mime::Mime>() else {
        return false;
    };

    parsed.type_() == mime::IMAGE && is_allowed_extension(parsed.subtype().as_str())
}

/// Display-safe copy of a client filename for logs and responses.
/// Never used to build a storage path.
pub fn sanitize_filename(filename: &str) -> String {
    let name = base_filename(filename);

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    }
}
