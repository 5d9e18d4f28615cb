// =============================================================================
// Constituent Table Scraper
// =============================================================================
//
// Every `<table>` in the page is inspected. A table contributes rows only if
// its header row has both a code column and a name column; all other tables
// (navigation, footnotes, sector summaries) are ignored. Codes are normalised
// to `{zero-padded code}{market suffix}`, e.g. `7203.T`.
// =============================================================================

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::directory::InstrumentDirectory;
use crate::error::{Result, SpreadError};
use crate::types::Instrument;

const CODE_HEADERS: &[&str] = &["コード", "code"];
const NAME_HEADERS: &[&str] = &["銘柄名", "name"];

/// Fixed-width code format with a market suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFormat {
    pub width: usize,
    pub suffix: String,
}

impl Default for CodeFormat {
    fn default() -> Self {
        Self {
            width: 4,
            suffix: ".T".to_string(),
        }
    }
}

impl CodeFormat {
    /// Normalise a raw code cell. Returns `None` for empty or non-alphanumeric
    /// codes.
    ///
    /// `"7203"` → `"7203.T"`, `"72"` → `"0072.T"`, `"285a"` → `"285A.T"`,
    /// `"7203.T"` → `"7203.T"`.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let mut code = raw.trim().to_ascii_uppercase();
        let suffix = self.suffix.to_ascii_uppercase();
        if !suffix.is_empty() && code.ends_with(&suffix) {
            code.truncate(code.len() - suffix.len());
        }
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(format!("{:0>width$}{}", code, self.suffix, width = self.width))
    }
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static CSS selector is valid")
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn header_matches(text: &str, candidates: &[&str]) -> bool {
    let lowered = text.trim().to_lowercase();
    candidates.iter().any(|c| lowered == *c)
}

/// Extract every (code, name) row from the constituent tables in `html`.
pub fn parse_directory(html: &str, format: &CodeFormat) -> Result<InstrumentDirectory> {
    let document = Html::parse_document(html);
    let table_sel = selector("table");
    let row_sel = selector("tr");
    let cell_sel = selector("th, td");
    let th_sel = selector("th");

    let mut instruments = Vec::new();
    let mut tables_used = 0usize;

    for table in document.select(&table_sel) {
        let rows: Vec<ElementRef<'_>> = table.select(&row_sel).collect();
        let Some(header_pos) = rows
            .iter()
            .position(|r| r.select(&th_sel).next().is_some())
            .or((!rows.is_empty()).then_some(0))
        else {
            continue;
        };

        let headers: Vec<String> = rows[header_pos].select(&cell_sel).map(cell_text).collect();
        let code_idx = headers.iter().position(|h| header_matches(h, CODE_HEADERS));
        let name_idx = headers.iter().position(|h| header_matches(h, NAME_HEADERS));
        let (Some(code_idx), Some(name_idx)) = (code_idx, name_idx) else {
            continue;
        };
        tables_used += 1;

        for row in &rows[header_pos + 1..] {
            let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
            let (Some(raw_code), Some(name)) = (cells.get(code_idx), cells.get(name_idx)) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            if let Some(code) = format.normalize(raw_code) {
                instruments.push(Instrument::new(code, name.clone()));
            }
        }
    }

    debug!(tables_used, rows = instruments.len(), "constituent tables parsed");

    if instruments.is_empty() {
        return Err(SpreadError::DirectoryUnavailable(
            "no table with code and name columns found".into(),
        ));
    }
    Ok(InstrumentDirectory::from_instruments(instruments))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <table><tr><td>menu</td><td>links</td></tr></table>
          <h3>水産</h3>
          <table>
            <thead><tr><th>コード</th><th>銘柄名</th><th>社名</th></tr></thead>
            <tbody>
              <tr><td>1332</td><td>ニッスイ</td><td>(株)ニッスイ</td></tr>
              <tr><td> 72 </td><td>  テスト
                 銘柄 </td><td>x</td></tr>
              <tr><td></td><td>空コード</td><td>x</td></tr>
              <tr><td>9999</td><td></td><td>x</td></tr>
            </tbody>
          </table>
          <h3>自動車</h3>
          <table>
            <tr><th>コード</th><th>銘柄名</th></tr>
            <tr><td>7203</td><td>トヨタ自動車</td></tr>
            <tr><td>1332</td><td>重複</td></tr>
            <tr><td>285a</td><td>キオクシア</td></tr>
          </table>
        </body></html>
    "#;

    #[test]
    fn normalize_pads_and_suffixes() {
        let f = CodeFormat::default();
        assert_eq!(f.normalize("7203").as_deref(), Some("7203.T"));
        assert_eq!(f.normalize(" 72 ").as_deref(), Some("0072.T"));
        assert_eq!(f.normalize("285a").as_deref(), Some("285A.T"));
        assert_eq!(f.normalize("7203.t").as_deref(), Some("7203.T"));
        assert_eq!(f.normalize(""), None);
        assert_eq!(f.normalize("72-03"), None);
    }

    #[test]
    fn parses_tables_with_code_and_name_columns() {
        let dir = parse_directory(PAGE, &CodeFormat::default()).unwrap();
        let codes: Vec<&str> = dir.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["1332.T", "0072.T", "7203.T", "285A.T"]);
        // First occurrence wins on duplicate codes; whitespace is collapsed.
        assert_eq!(dir.get("1332.T").unwrap().name, "ニッスイ");
        assert_eq!(dir.get("0072.T").unwrap().name, "テスト 銘柄");
        assert!(dir.get("9999.T").is_none());
    }

    #[test]
    fn english_headers_are_accepted() {
        let html = "<table><tr><th>Code</th><th>Name</th></tr>\
            <tr><td>6758</td><td>Sony</td></tr></table>";
        let dir = parse_directory(html, &CodeFormat::default()).unwrap();
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get("6758.T").unwrap().name, "Sony");
    }

    #[test]
    fn page_without_constituent_table_is_unavailable() {
        let html = "<html><body><p>maintenance</p><table><tr><td>a</td></tr></table></body></html>";
        assert!(matches!(
            parse_directory(html, &CodeFormat::default()),
            Err(SpreadError::DirectoryUnavailable(_))
        ));
    }

    #[test]
    fn custom_format() {
        let f = CodeFormat {
            width: 5,
            suffix: ".HK".into(),
        };
        assert_eq!(f.normalize("700").as_deref(), Some("00700.HK"));
    }
}
