/// Picks the content type to store an evidence object with.
///
/// A non-empty declared type wins; otherwise the type is guessed from the
/// file name extension, defaulting to `application/octet-stream`.
pub fn resolve_mime_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(str::trim) {
        Some(declared) if !declared.is_empty() => declared.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}
