//! Credential Body Parser (component A, §4.1).
//!
//! Deliberately a lenient substring scanner, not a real XML parser or form
//! decoder: it must accept the same malformed-but-delimiter-bearing input
//! the canonical AnyConnect client sometimes sends.

use crate::error::BodyParseError;

/// Which wire shape a body uses, per §4.1 step 1: presence of `<?xml`
/// anywhere in the body routes to XML, its absence to form decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    Xml,
    Form,
}

pub fn detect_shape(body: &str) -> BodyShape {
    if body.contains("<?xml") {
        BodyShape::Xml
    } else {
        BodyShape::Form
    }
}

/// Locate `field`'s value in `body` and return an unescaped, owned copy.
///
/// `xml_field` overrides the tag name used in XML mode, for fields whose
/// XML and form names differ (e.g. `group-select` vs `group_list`).
pub fn parse_reply(
    body: &str,
    field: &str,
    xml_field: Option<&str>,
) -> Result<String, BodyParseError> {
    let raw = match detect_shape(body) {
        BodyShape::Xml => parse_xml_field(body, xml_field.unwrap_or(field))?,
        BodyShape::Form => parse_form_field(body, field)?,
    };

    if raw.is_empty() {
        return Err(BodyParseError::FieldEmpty(field.to_string()));
    }

    Ok(raw)
}

/// Find `<tag>...</tag>` anywhere in `body` by literal substring search
/// and HTML-unescape the content between the delimiters.
fn parse_xml_field(body: &str, tag: &str) -> Result<String, BodyParseError> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let start = body
        .find(&open)
        .map(|i| i + open.len())
        .ok_or_else(|| BodyParseError::FieldMissing(tag.to_string()))?;

    let end = body[start..]
        .find(&close)
        .map(|i| start + i)
        .ok_or_else(|| BodyParseError::FieldMissing(tag.to_string()))?;

    let raw = &body[start..end];
    Ok(html_unescape(raw))
}

/// Find `field=...` anywhere in `body`, reading until the next `&` or the
/// end of the body, and percent-decode the value.
fn parse_form_field(body: &str, field: &str) -> Result<String, BodyParseError> {
    let prefix = format!("{field}=");

    let start = find_form_key(body, &prefix)
        .ok_or_else(|| BodyParseError::FieldMissing(field.to_string()))?
        + prefix.len();

    let end = body[start..]
        .find('&')
        .map(|i| start + i)
        .unwrap_or(body.len());

    let raw = &body[start..end];
    Ok(url_unescape(raw))
}

/// A bare `body.find(prefix)` would also match `othername=` as a suffix of
/// `name=`. Require the match to start at the body start or right after a
/// `&`, matching the original's field-by-field scan.
fn find_form_key(body: &str, prefix: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(rel) = body[search_from..].find(prefix) {
        let idx = search_from + rel;
        if idx == 0 || body.as_bytes()[idx - 1] == b'&' {
            return Some(idx);
        }
        search_from = idx + 1;
    }
    None
}

fn html_unescape(s: &str) -> String {
    quick_xml::escape::unescape(s)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

fn url_unescape(s: &str) -> String {
    // Form bodies use `+` for space, which `percent_decode_str` does not
    // handle (that is an `application/x-www-form-urlencoded` convention,
    // not generic percent-decoding).
    let plus_decoded = s.replace('+', " ");
    percent_encoding::percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}
