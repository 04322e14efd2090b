/// Cells joined with commas as-is.
pub fn plain(headers: &[&str], rows: &[Vec<String>]) -> String {
    render(headers, rows, |cell| cell.to_string())
}

/// Every cell wrapped in double quotes, embedded quotes doubled.
pub fn quoted(headers: &[&str], rows: &[Vec<String>]) -> String {
    render(headers, rows, |cell| format!("\"{}\"", cell.replace('"', "\"\"")))
}

fn render(headers: &[&str], rows: &[Vec<String>], encode: impl Fn(&str) -> String) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        lines.push(row.iter().map(|c| encode(c)).collect::<Vec<_>>().join(","));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_even_without_rows() {
        assert_eq!(plain(&["a", "b"], &[]), "a,b");
    }

    #[test]
    fn quoting() {
        let rows = vec![vec!["Say \"hi\"".to_string(), "x, y".to_string()]];
        assert_eq!(quoted(&["t", "v"], &rows), "t,v\n\"Say \"\"hi\"\"\",\"x, y\"");
        assert_eq!(plain(&["t", "v"], &rows), "t,v\nSay \"hi\",x, y");
    }
}
