use chrono::Datelike;
use serde_json::Value;

use crate::services::dates::value_datetime;
use crate::services::documents::{get_path, text_at};

pub fn entry_type(publication_type: &str) -> &'static str {
    match publication_type {
        "journal_article" => "article",
        "conference_paper" => "inproceedings",
        "book_chapter" => "inbook",
        "book" => "book",
        "thesis" => "phdthesis",
        "report" => "techreport",
        _ => "misc",
    }
}

fn published_year(publication: &Value) -> Option<i32> {
    value_datetime(get_path(publication, "dates.published")).map(|d| d.year())
}

fn sorted_authors(publication: &Value) -> Vec<&Value> {
    let mut authors: Vec<&Value> = get_path(publication, "authors")
        .and_then(Value::as_array)
        .map(|a| a.iter().collect())
        .unwrap_or_default();
    authors.sort_by_key(|a| a.get("order").and_then(Value::as_i64).unwrap_or(i64::MAX));
    authors
}

/// First author, year and the first two title words, alphanumerics only.
/// `fallback_year` is used when the publication has no published date.
pub fn key(publication: &Value, fallback_year: i32) -> String {
    let first = get_path(publication, "authors")
        .and_then(Value::as_array)
        .and_then(|a| a.iter().find(|author| author.get("order").and_then(Value::as_i64) == Some(1)))
        .map(|author| text_at(author, "name"))
        .filter(|name| !name.is_empty())
        .unwrap_or("Unknown");
    let year = published_year(publication).unwrap_or(fallback_year);
    let words: String = text_at(publication, "title").split(' ').take(2).collect();
    format!("{}{}{}", first, year, words)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

pub fn entry(publication: &Value, fallback_year: i32) -> String {
    let publication_type = text_at(publication, "publicationType");
    let mut fields = vec![format!("  title = {{{}}}", text_at(publication, "title"))];

    let authors: Vec<&str> = sorted_authors(publication).into_iter().map(|a| text_at(a, "name")).collect();
    if !authors.is_empty() {
        fields.push(format!("  author = {{{}}}", authors.join(" and ")));
    }

    let venue = text_at(publication, "venue.name");
    if !venue.is_empty() {
        match publication_type {
            "journal_article" => fields.push(format!("  journal = {{{}}}", venue)),
            "conference_paper" => fields.push(format!("  booktitle = {{{}}}", venue)),
            _ => {}
        }
    }
    if let Some(year) = published_year(publication) {
        fields.push(format!("  year = {{{}}}", year));
    }
    let doi = text_at(publication, "identifiers.doi");
    if !doi.is_empty() {
        fields.push(format!("  doi = {{{}}}", doi));
    }

    format!(
        "@{}{{{},\n{}\n}}",
        entry_type(publication_type),
        key(publication, fallback_year),
        fields.join(",\n")
    )
}

/// Entries separated by a blank line.
pub fn document(publications: &[Value], fallback_year: i32) -> String {
    publications
        .iter()
        .map(|p| entry(p, fallback_year))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paper() -> Value {
        json!({
            "title": "Deep Learning for Proteins",
            "publicationType": "journal_article",
            "authors": [
                {"name": "Grace Hopper", "order": 2},
                {"name": "Ada Lovelace", "order": 1}
            ],
            "venue": {"name": "Nature"},
            "dates": {"published": "2023-05-01"},
            "identifiers": {"doi": "10.1000/xyz"}
        })
    }

    #[test]
    fn types_map_to_bibtex() {
        assert_eq!(entry_type("conference_paper"), "inproceedings");
        assert_eq!(entry_type("patent"), "misc");
        assert_eq!(entry_type("poster"), "misc");
    }

    #[test]
    fn key_from_author_year_and_title() {
        assert_eq!(key(&paper(), 2030), "AdaLovelace2023DeepLearning");
        assert_eq!(key(&json!({"title": "On it"}), 2030), "Unknown2030Onit");
    }

    #[test]
    fn entry_lists_authors_in_order() {
        let text = entry(&paper(), 2030);
        assert_eq!(
            text,
            "@article{AdaLovelace2023DeepLearning,\n  title = {Deep Learning for Proteins},\n  author = {Ada Lovelace and Grace Hopper},\n  journal = {Nature},\n  year = {2023},\n  doi = {10.1000/xyz}\n}"
        );
    }
}
