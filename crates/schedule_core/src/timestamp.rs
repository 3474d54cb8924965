/// Width of the `YYYYMMDDHHMMSS` stamps used for every document timestamp.
pub const STAMP_LEN: usize = 14;

const PDF_DATE_MARKER: &str = "D:";

/// True for exactly fourteen ASCII digits.
pub fn is_valid_stamp(value: &str) -> bool {
    value.len() == STAMP_LEN && value.bytes().all(|b| b.is_ascii_digit())
}

/// Convert a PDF date (`D:YYYYMMDDHHmmSS` plus optional zone) to a stamp.
///
/// Returns an empty string for anything else: a missing marker, fewer than
/// fourteen digits, or a fifteenth digit.
pub fn stamp_from_pdf_date(raw: &str) -> String {
    let Some(rest) = raw.strip_prefix(PDF_DATE_MARKER) else {
        return String::new();
    };
    let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits != STAMP_LEN {
        return String::new();
    }
    rest[..STAMP_LEN].to_string()
}
