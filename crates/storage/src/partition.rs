//! Hive-style partition directories (`year=2018/month=11/`).

/// Directory value standing in for a null (or empty) partition value.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

fn needs_escape(c: char) -> bool {
    matches!(
        c,
        '\u{01}'..='\u{1F}'
            | '"'
            | '#'
            | '%'
            | '\''
            | '*'
            | '/'
            | ':'
            | '='
            | '?'
            | '\\'
            | '\u{7F}'
            | '{'
            | '['
            | ']'
            | '^'
    )
}

/// Percent-escape characters that are unsafe inside a path segment.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverse of [`escape_value`]. Malformed escapes are kept verbatim.
pub fn unescape_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Directory for one combination of partition values, e.g.
/// `year=2018/artist_id=AR1`.
pub fn partition_dir(columns: &[&str], values: &[Option<String>]) -> String {
    columns
        .iter()
        .zip(values)
        .map(|(col, value)| {
            let encoded = match value.as_deref() {
                None | Some("") => DEFAULT_PARTITION.to_string(),
                Some(v) => escape_value(v),
            };
            format!("{}={}", escape_value(col), encoded)
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Read the value of partition `column` from a key such as
/// `songs_table/year=2000/artist_id=A1/part-0.parquet`.
///
/// Returns `None` if the key has no segment for the column, `Some(None)` for
/// the default (null) partition.
pub fn extract_value(key: &str, column: &str) -> Option<Option<String>> {
    let wanted = escape_value(column);
    key.split('/').find_map(|segment| {
        let (name, value) = segment.split_once('=')?;
        if name != wanted {
            return None;
        }
        Some(if value == DEFAULT_PARTITION {
            None
        } else {
            Some(unescape_value(value))
        })
    })
}
