//! Lightweight field extraction for ISAPI XML documents.
//!
//! The ISAPI responses we consume are flat, well-formed documents with a
//! handful of known tags. Scanning for tags directly keeps the adapter free
//! of a full XML parser and shrugs off vendor namespace prefixes.

/// Extract the text content of the first `<tag>...</tag>` occurrence.
///
/// Tolerates a namespace prefix on the tag (`<hik:capacity>`), attributes on
/// the opening tag, and returns `None` for absent or empty tags.
pub fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let patterns = [format!("<{tag}>"), format!("<{tag} "), format!(":{tag}>")];

    for pattern in &patterns {
        if let Some(start) = xml.find(pattern.as_str()) {
            let after_open = &xml[start..];
            let content_start = after_open.find('>')? + 1;
            let content = &after_open[content_start..];
            let end = content.find("</")?;
            let value = content[..end].trim();
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
    }

    None
}

/// Extract every `<tag>...</tag>` block, inner content included.
///
/// Used for repeated elements like `<Disk>` and `<Channel>` lists.
pub fn extract_blocks(xml: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut blocks = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find(open.as_str()) {
        // Reject partial matches like <DiskList> for tag "Disk".
        let after = &rest[start + open.len()..];
        if !after.starts_with('>') && !after.starts_with(' ') && !after.starts_with('/') {
            rest = &rest[start + open.len()..];
            continue;
        }

        let Some(end) = rest[start..].find(close.as_str()) else {
            break;
        };
        let block = &rest[start..start + end + close.len()];
        blocks.push(block.to_string());
        rest = &rest[start + end + close.len()..];
    }

    blocks
}

/// Parse a numeric tag, defaulting to 0 when absent or malformed.
pub fn extract_number(xml: &str, tag: &str) -> f64 {
    extract_tag(xml, tag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}
