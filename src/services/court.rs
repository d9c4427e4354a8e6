// src/services/court.rs

//! Court portal client.
//!
//! Every court serves the same listing pages under its own subdomain. A
//! listing is an HTML table whose cells are read by position according to a
//! declarative column schema.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CaseType, Config, MonitoredSubject, RulingKind, ScrapedHearing, ScrapedRuling};
use crate::utils::dates::to_iso_date;
use crate::utils::http::{create_async_client, fetch_text};
use crate::utils::{normalize_whitespace, resolve_url};

/// Source of scraped rows for one (subject, court) pair.
///
/// The orchestrator only talks to this trait, so tests can script portal
/// responses.
#[async_trait]
pub trait CourtSource: Send + Sync {
    async fn fetch_hearings(
        &self,
        subject: &MonitoredSubject,
        court_code: &str,
    ) -> Result<Vec<ScrapedHearing>>;

    async fn fetch_rulings(
        &self,
        subject: &MonitoredSubject,
        court_code: &str,
        kind: RulingKind,
    ) -> Result<Vec<ScrapedRuling>>;
}

/// Logical column of a listing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    CaseNumber,
    Judge,
    Date,
    Time,
    Room,
    Title,
    SubjectMatter,
    CaseType,
    HearingType,
    Outcome,
    Disposition,
    Document,
}

/// How a cell's value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    /// Whitespace-normalized text content
    Text,
    /// `href` of the first anchor, resolved against the court base URL
    Href,
}

/// Ordered cell layout of a listing table.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub columns: &'static [(Column, Cell)],
    /// Column read as a link from the row's last cell
    pub trailing_link: Option<Column>,
}

impl TableSchema {
    /// Rows with fewer cells are skipped.
    pub fn min_cells(&self) -> usize {
        self.columns.len()
    }
}

pub const HEARING_SCHEMA: TableSchema = TableSchema {
    columns: &[
        (Column::CaseNumber, Cell::Text),
        (Column::Judge, Cell::Text),
        (Column::Date, Cell::Text),
        (Column::Time, Cell::Text),
        (Column::Room, Cell::Text),
        (Column::Title, Cell::Text),
        (Column::SubjectMatter, Cell::Text),
        (Column::CaseType, Cell::Text),
        (Column::HearingType, Cell::Text),
        (Column::Outcome, Cell::Text),
        (Column::Document, Cell::Href),
    ],
    trailing_link: None,
};

pub const RULING_SCHEMA: TableSchema = TableSchema {
    columns: &[
        (Column::CaseNumber, Cell::Text),
        (Column::Date, Cell::Text),
        (Column::Judge, Cell::Text),
        (Column::Disposition, Cell::Text),
    ],
    trailing_link: Some(Column::Document),
};

/// One table row keyed by logical column.
#[derive(Debug, Default)]
pub struct ParsedRow {
    values: HashMap<Column, String>,
}

impl ParsedRow {
    pub fn get(&self, column: Column) -> &str {
        self.values.get(&column).map(String::as_str).unwrap_or("")
    }

    fn take(&mut self, column: Column) -> String {
        self.values.remove(&column).unwrap_or_default()
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    normalize_whitespace(&cell.text().collect::<String>())
}

fn first_href(cell: ElementRef<'_>, anchor: &Selector, base: &Url) -> String {
    cell.select(anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| resolve_url(base, href))
        .unwrap_or_default()
}

/// Read `table tbody tr` rows positionally according to `schema`.
///
/// Missing or malformed tables yield no rows.
pub fn extract_rows(html: &str, schema: &TableSchema, base: &Url) -> Result<Vec<ParsedRow>> {
    let document = Html::parse_document(html);
    let row_sel = parse_selector("table tbody tr")?;
    let cell_sel = parse_selector("td")?;
    let anchor_sel = parse_selector("a")?;

    let mut rows = Vec::new();
    for tr in document.select(&row_sel) {
        let cells: Vec<ElementRef<'_>> = tr.select(&cell_sel).collect();
        if cells.len() < schema.min_cells() {
            continue;
        }

        let mut row = ParsedRow::default();
        for (&(column, kind), cell) in schema.columns.iter().zip(&cells) {
            let value = match kind {
                Cell::Text => cell_text(*cell),
                Cell::Href => first_href(*cell, &anchor_sel, base),
            };
            row.values.insert(column, value);
        }
        if let (Some(column), Some(last)) = (schema.trailing_link, cells.last()) {
            row.values
                .insert(column, first_href(*last, &anchor_sel, base));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Parse an agenda page into hearings for one court.
pub fn parse_hearings(
    html: &str,
    court_code: &str,
    court_name: &str,
    base: &Url,
) -> Result<Vec<ScrapedHearing>> {
    let rows = extract_rows(html, &HEARING_SCHEMA, base)?;
    Ok(rows
        .into_iter()
        .map(|mut row| {
            let date = row.take(Column::Date);
            ScrapedHearing {
                court_code: court_code.to_string(),
                court_name: court_name.to_string(),
                case_number: row.take(Column::CaseNumber),
                judge: row.take(Column::Judge),
                date_iso: to_iso_date(&date),
                date,
                time: row.take(Column::Time),
                room: row.take(Column::Room),
                title: row.take(Column::Title),
                subject_matter: row.take(Column::SubjectMatter),
                case_type: row.take(Column::CaseType),
                hearing_type: row.take(Column::HearingType),
                outcome: row.take(Column::Outcome),
                document_url: row.take(Column::Document),
            }
        })
        .collect())
}

/// Parse a decisions or sentences page into rulings for one court.
pub fn parse_rulings(
    html: &str,
    court_code: &str,
    court_name: &str,
    kind: RulingKind,
    base: &Url,
) -> Result<Vec<ScrapedRuling>> {
    let rows = extract_rows(html, &RULING_SCHEMA, base)?;
    Ok(rows
        .into_iter()
        .map(|mut row| {
            let pronounced_on = row.take(Column::Date);
            ScrapedRuling {
                court_code: court_code.to_string(),
                court_name: court_name.to_string(),
                kind,
                case_number: row.take(Column::CaseNumber),
                pronounced_on_iso: to_iso_date(&pronounced_on),
                pronounced_on,
                judge: row.take(Column::Judge),
                disposition: row.take(Column::Disposition),
                document_url: row.take(Column::Document),
            }
        })
        .collect())
}

/// HTTP client for the court portals.
pub struct CourtClient {
    config: Arc<Config>,
    client: Client,
}

impl CourtClient {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = create_async_client(&config.crawler)?;
        Ok(Self { config, client })
    }

    /// `https://{code}.{portal_domain}`
    pub fn base_url(&self, court_code: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "https://{}.{}",
            court_code, self.config.crawler.portal_domain
        ))?)
    }

    pub fn hearings_url(&self, court_code: &str, name: &str, case_type: CaseType) -> Result<Url> {
        let mut url = self.base_url(court_code)?.join("/ro/agenda-of-meetings")?;
        url.query_pairs_mut()
            .append_pair("dossier_part", name)
            .append_pair("type", case_type.as_str())
            .append_pair("apply_filter", "1");
        Ok(url)
    }

    pub fn rulings_url(&self, court_code: &str, name: &str, kind: RulingKind) -> Result<Url> {
        let mut url = self
            .base_url(court_code)?
            .join(&format!("/ro/{}", kind.path()))?;
        url.query_pairs_mut()
            .append_pair("dossier_part", name)
            .append_pair("apply_filter", "1");
        Ok(url)
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        log::debug!("GET {}", url);
        fetch_text(&self.client, url.as_str(), self.config.crawler.timeout_secs).await
    }
}

#[async_trait]
impl CourtSource for CourtClient {
    async fn fetch_hearings(
        &self,
        subject: &MonitoredSubject,
        court_code: &str,
    ) -> Result<Vec<ScrapedHearing>> {
        let url = self.hearings_url(court_code, &subject.name, subject.case_type)?;
        let html = self.fetch(&url).await?;
        let court_name = self.config.court_name(court_code);
        parse_hearings(&html, court_code, &court_name, &self.base_url(court_code)?)
    }

    async fn fetch_rulings(
        &self,
        subject: &MonitoredSubject,
        court_code: &str,
        kind: RulingKind,
    ) -> Result<Vec<ScrapedRuling>> {
        let url = self.rulings_url(court_code, &subject.name, kind)?;
        let html = self.fetch(&url).await?;
        let court_name = self.config.court_name(court_code);
        parse_rulings(&html, court_code, &court_name, kind, &self.base_url(court_code)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://jc.instante.justice.md").unwrap()
    }

    const AGENDA: &str = r#"
        <html><body>
        <table>
          <thead><tr><th>Nr.</th></tr></thead>
          <tbody>
            <tr>
              <td>2-1234/2025</td><td> Rusu   Ana </td><td>15.03.2025</td><td>10:00</td>
              <td>12</td><td>Popescu Ion vs SRL Alfa</td><td>încasarea datoriei</td>
              <td>Civil</td><td>Publică</td><td></td>
              <td><a href="/files/agenda/1.pdf">PDF</a></td>
            </tr>
            <tr><td>too</td><td>short</td></tr>
            <tr>
              <td>1-77/2025</td><td>Ciobanu Vlad</td><td>n/a</td><td>14:30</td>
              <td>3</td><td>Stat vs Popescu Ion</td><td>furt</td>
              <td>Penal</td><td>Închisă</td><td>Amânat</td><td></td>
            </tr>
          </tbody>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_hearings_reads_columns_by_position() {
        let rows = parse_hearings(AGENDA, "jc", "Judecătoria Chișinău", &base()).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.case_number, "2-1234/2025");
        assert_eq!(first.judge, "Rusu Ana");
        assert_eq!(first.date, "15.03.2025");
        assert_eq!(first.date_iso, "2025-03-15");
        assert_eq!(first.room, "12");
        assert_eq!(first.subject_matter, "încasarea datoriei");
        assert_eq!(first.outcome, "");
        assert_eq!(
            first.document_url,
            "https://jc.instante.justice.md/files/agenda/1.pdf"
        );
        assert_eq!(first.court_name, "Judecătoria Chișinău");

        let second = &rows[1];
        assert_eq!(second.date_iso, "");
        assert_eq!(second.outcome, "Amânat");
        assert_eq!(second.document_url, "");
    }

    #[test]
    fn test_missing_table_yields_no_rows() {
        assert!(parse_hearings("<p>Nu există date</p>", "jc", "jc", &base())
            .unwrap()
            .is_empty());
        assert!(parse_hearings("<table><tr><td>", "jc", "jc", &base())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_rulings_takes_link_from_last_cell() {
        let html = r#"
            <table><tbody>
              <tr>
                <td>2-1234/2025</td><td>01.02.2025</td><td>Rusu Ana</td><td>Admisă</td>
                <td>extra</td><td><a href="docs/h.pdf">Descarcă</a></td>
              </tr>
              <tr><td>a</td><td>b</td><td>c</td></tr>
            </tbody></table>
        "#;
        let rows = parse_rulings(html, "jc", "JC", RulingKind::Decision, &base()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pronounced_on_iso, "2025-02-01");
        assert_eq!(rows[0].disposition, "Admisă");
        assert_eq!(rows[0].kind, RulingKind::Decision);
        assert_eq!(
            rows[0].document_url,
            "https://jc.instante.justice.md/docs/h.pdf"
        );
    }

    #[test]
    fn test_urls_encode_subject_name() {
        let client = CourtClient::new(Arc::new(Config::default())).unwrap();
        let url = client
            .hearings_url("jc", "Popescu Ion", CaseType::Any)
            .unwrap();
        assert_eq!(url.host_str(), Some("jc.instante.justice.md"));
        assert_eq!(url.path(), "/ro/agenda-of-meetings");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("dossier_part".to_string(), "Popescu Ion".to_string()),
                ("type".to_string(), "Any".to_string()),
                ("apply_filter".to_string(), "1".to_string()),
            ]
        );

        let rulings = client
            .rulings_url("cac", "Popescu Ion", RulingKind::Interlocutory)
            .unwrap();
        assert_eq!(rulings.path(), "/ro/court-sentences");
        assert!(rulings.as_str().starts_with("https://cac.instante.justice.md/"));
    }
}
