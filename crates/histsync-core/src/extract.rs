//! Markup extraction for exchange pages.
//!
//! Pure functions from page text to string cells. Nothing here touches the
//! network or interprets cell values beyond trimming them.

use scraper::{ElementRef, Html, Selector};

use crate::domain::{CompanyProfile, IssuerCode, RawRow};
use crate::source::SourceError;

/// Rows of the data tables on schedule and history pages.
pub const TABLE_ROWS: &str = "tbody tr";
const TABLE_CELL: &str = "td";
const PROFILE_PANEL: &str = "div.panel.panel-default";
const PROFILE_TITLE: &str = "div.title";
const PROFILE_FALLBACK_TITLE: &str = "div#titleKonf2011";
const PROFILE_DETAIL_ROWS: &str = "div#izdavach .row";
const PROFILE_DETAIL_CELL: &str = "div";

/// Detail rows before this index are headings, at or after the end are unrelated.
const DETAIL_ROW_RANGE: std::ops::Range<usize> = 2..13;

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css)
        .map_err(|error| SourceError::internal(format!("invalid selector '{css}': {error:?}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Cells of every row matching `row_selector`, in document order.
pub fn table_rows(html: &str, row_selector: &str) -> Result<Vec<RawRow>, SourceError> {
    let rows = selector(row_selector)?;
    let cells = selector(TABLE_CELL)?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&rows)
        .map(|row| row.select(&cells).map(element_text).collect())
        .collect())
}

/// First cell of every table-body row that has one.
pub fn first_column(html: &str) -> Result<Vec<String>, SourceError> {
    Ok(table_rows(html, TABLE_ROWS)?
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .collect())
}

/// Company profile from an issuer page, or `None` when the page has no title.
///
/// Only the profile panels are inspected. A page that only carries the
/// conference-style title yields a name without details.
pub fn company_profile(html: &str, code: &IssuerCode) -> Result<Option<CompanyProfile>, SourceError> {
    let panel = selector(PROFILE_PANEL)?;
    let title = selector(PROFILE_TITLE)?;
    let fallback_title = selector(PROFILE_FALLBACK_TITLE)?;
    let detail_rows = selector(PROFILE_DETAIL_ROWS)?;
    let detail_cell = selector(PROFILE_DETAIL_CELL)?;

    let document = Html::parse_document(html);
    let panels: Vec<ElementRef<'_>> = document.select(&panel).collect();

    let primary_title = panels
        .iter()
        .find_map(|panel| panel.select(&title).next())
        .map(element_text);

    let Some(name) = primary_title else {
        let fallback = panels
            .iter()
            .find_map(|panel| panel.select(&fallback_title).next())
            .map(element_text)
            .and_then(|text| text.split(" - ").nth(2).map(|part| part.trim().to_string()));

        return Ok(fallback.map(|name| CompanyProfile {
            name,
            ..CompanyProfile::code_only(code.clone())
        }));
    };

    let mut profile = CompanyProfile {
        name,
        ..CompanyProfile::code_only(code.clone())
    };

    let rows: Vec<ElementRef<'_>> = panels
        .iter()
        .flat_map(|panel| panel.select(&detail_rows))
        .collect();
    for row in rows.into_iter().skip(DETAIL_ROW_RANGE.start).take(DETAIL_ROW_RANGE.len()) {
        let cells: Vec<String> = row.select(&detail_cell).map(element_text).collect();
        let (Some(key), Some(value)) = (cells.first(), cells.get(1)) else {
            continue;
        };

        let value = value.clone();
        match key.as_str() {
            "Name" => profile.name = value,
            "Address" => profile.address = Some(value),
            "City" => profile.city = Some(value),
            "State" => profile.state = Some(value),
            "Mail" => profile.email = Some(value),
            "Phone" => profile.phones.extend(
                value
                    .split("; ")
                    .map(str::trim)
                    .filter(|phone| !phone.is_empty())
                    .map(str::to_string),
            ),
            _ => {}
        }
    }

    Ok(Some(profile))
}
