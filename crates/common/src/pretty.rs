use tabled::{Table, builder::Builder, settings};

/// Predefined output styles that map to `tabled` styles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TableStyleKind {
    #[default]
    Modern,
    Ascii,
    Plain,
}

impl TableStyleKind {
    fn apply(self, table: &mut Table) {
        match self {
            Self::Modern => table.with(settings::Style::modern()),
            Self::Ascii => table.with(settings::Style::ascii()),
            Self::Plain => table.with(settings::Style::empty()),
        };
    }
}

/// Render arbitrary string rows with the provided style.
pub fn render_string_table(
    headers: &[&str],
    rows: Vec<Vec<String>>,
    style: TableStyleKind,
) -> String {
    if headers.is_empty() && rows.is_empty() {
        return "<empty>".into();
    }

    let mut builder = Builder::default();

    if !headers.is_empty() {
        builder.push_record(headers.iter().copied());
    }

    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    style.apply(&mut table);
    table.to_string()
}

/// Format raw bytes as lowercase hex, eliding the middle of long runs.
pub fn format_bytes(bytes: &[u8], max: usize) -> String {
    let hex = |b: &[u8]| b.iter().map(|x| format!("{x:02x}")).collect::<String>();
    if bytes.len() <= max {
        return hex(bytes);
    }
    let half = max / 2;
    format!(
        "{}..{} ({} bytes)",
        hex(&bytes[..half]),
        hex(&bytes[bytes.len() - half..]),
        bytes.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_table_renders_headers() {
        let rendered = render_string_table(
            &["slot", "owner"],
            vec![vec!["0".into(), "99".into()]],
            TableStyleKind::Modern,
        );
        assert!(rendered.contains("slot"));
        assert!(rendered.contains("99"));
    }

    #[test]
    fn empty_tables_render_placeholder() {
        assert_eq!(
            render_string_table(&[], vec![], TableStyleKind::Plain),
            "<empty>"
        );
    }

    #[test]
    fn long_byte_runs_are_elided() {
        assert_eq!(format_bytes(&[0xab, 0x01], 8), "ab01");
        let long = vec![0u8; 40];
        assert!(format_bytes(&long, 8).ends_with("(40 bytes)"));
    }
}
