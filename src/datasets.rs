//! Bulk creation of datasets from spreadsheet rows.
//!
//! Datasets are first created from a static template (so they get the
//! installation's default license), then their citation fields are replaced
//! with values from the spreadsheet.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use tracing::info;

use crate::client::Dataverse;
use crate::text::clean;

const SHEET_INDEX: usize = 1;
const CONTACT_NAME: &str = "Harvard Dataverse Support";
const CONTACT_EMAIL: &str = "support@dataverse.harvard.edu";

#[derive(Debug, PartialEq, Eq)]
pub struct SheetRow {
    pub title: String,
    pub description: String,
    pub agency: String,
    pub access_link_name: String,
    pub access_link_url: Option<String>,
}

impl SheetRow {
    /// Builds a row from the raw text of columns A..D and the hyperlink of column D.
    pub fn from_cells(cells: [Option<&str>; 4], link: Option<&str>) -> Self {
        let [title, description, agency, link_name] = cells.map(clean);
        Self {
            title,
            description,
            agency,
            access_link_name: link_name,
            access_link_url: link.filter(|l| !l.is_empty()).map(str::to_string),
        }
    }

    pub fn origin_of_sources(&self) -> Option<String> {
        self.access_link_url
            .as_ref()
            .map(|url| format!(r#"<a href="{url}">{}</a>"#, self.access_link_name))
    }

    /// Citation fields for `editMetadata?replace=true`.
    pub fn metadata_fields(&self) -> Value {
        let mut fields = vec![
            primitive("title", json!(self.title)),
            primitive("subject", json!(["Other"])),
            compound("dsDescription", &[("dsDescriptionValue", self.description.as_str())]),
            // Replacing the author drops the template's affiliation.
            compound("author", &[("authorName", self.agency.as_str())]),
            compound(
                "datasetContact",
                &[
                    ("datasetContactName", CONTACT_NAME),
                    ("datasetContactEmail", CONTACT_EMAIL),
                ],
            ),
        ];
        if let Some(origin) = self.origin_of_sources() {
            fields.push(primitive("originOfSources", json!(origin)));
        }
        json!({ "fields": fields })
    }

    fn summary(&self) -> String {
        format!(
            "Title: {}\nDescription: {}\nAgency Responsible: {}\nAccess Link Name: {}\nAccess Link URL: {}",
            self.title,
            self.description,
            self.agency,
            self.access_link_name,
            self.access_link_url.as_deref().unwrap_or("None"),
        )
    }
}

fn primitive(type_name: &str, value: Value) -> Value {
    json!({ "typeName": type_name, "value": value })
}

fn compound(type_name: &str, children: &[(&str, &str)]) -> Value {
    let entry: serde_json::Map<String, Value> = children
        .iter()
        .map(|(name, value)| (name.to_string(), primitive(name, json!(value))))
        .collect();
    primitive(type_name, json!([entry]))
}

/// Reads the data rows (header skipped) of the workbook's second sheet.
pub fn read_rows(path: &Path) -> Result<Vec<SheetRow>> {
    let book = umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|e| anyhow!("Could not read workbook {}: {e:?}", path.display()))?;
    let sheet = book
        .get_sheet_collection()
        .get(SHEET_INDEX)
        .with_context(|| format!("{} has no sheet at index {SHEET_INDEX}", path.display()))?;

    let rows = (2..=sheet.get_highest_row())
        .map(|row| {
            let text = |col: &str| {
                sheet
                    .get_cell(format!("{col}{row}").as_str())
                    .map(|c| c.get_value().to_string())
            };
            let (a, b, c, d) = (text("A"), text("B"), text("C"), text("D"));
            let link = sheet
                .get_cell(format!("D{row}").as_str())
                .and_then(|c| c.get_hyperlink())
                .map(|h| h.get_url().to_string());
            SheetRow::from_cells(
                [a.as_deref(), b.as_deref(), c.as_deref(), d.as_deref()],
                link.as_deref(),
            )
        })
        .collect();
    Ok(rows)
}

pub fn load_template(path: &Path) -> Result<Value> {
    let file = File::open(path)
        .with_context(|| format!("Could not open dataset template {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid dataset template {}", path.display()))
}

pub struct CreateOptions<'a> {
    pub collection: &'a str,
    pub pace: Duration,
    pub limit: Option<usize>,
}

/// The first `limit` rows, or all of them.
pub fn limited<T>(rows: &[T], limit: Option<usize>) -> &[T] {
    &rows[..limit.map_or(rows.len(), |l| l.min(rows.len()))]
}

/// Creates one dataset per row, stopping at the first failure.
pub fn create_all(
    dataverse: &Dataverse,
    template: &Value,
    rows: &[SheetRow],
    opts: &CreateOptions,
) -> Result<Vec<String>> {
    create_with(
        rows,
        opts,
        |row| create_one(dataverse, template, opts.collection, row),
        sleep,
    )
}

fn create_one(
    dataverse: &Dataverse,
    template: &Value,
    collection: &str,
    row: &SheetRow,
) -> Result<String> {
    let pid = dataverse
        .create_dataset(collection, template)
        .context("Could not create dataset")?;
    info!("created {pid}");
    println!("{}", row.summary());
    dataverse
        .edit_metadata(&pid, &row.metadata_fields())
        .with_context(|| format!("Could not update metadata of {pid}"))?;
    Ok(pid)
}

/// Runs `create` over the limited rows, pausing between rows but not after the last.
fn create_with(
    rows: &[SheetRow],
    opts: &CreateOptions,
    mut create: impl FnMut(&SheetRow) -> Result<String>,
    mut pause: impl FnMut(Duration),
) -> Result<Vec<String>> {
    let rows = limited(rows, opts.limit);
    let bar = ProgressBar::new(rows.len() as u64).with_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} datasets")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let mut pids = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let pid = bar
            .suspend(|| create(row))
            .with_context(|| format!("Failed at spreadsheet row {}", i + 2))?;
        pids.push(pid);
        bar.inc(1);

        if i + 1 < rows.len() {
            pause(opts.pace);
        }
    }
    bar.finish_and_clear();
    Ok(pids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(link: Option<&str>) -> SheetRow {
        SheetRow::from_cells(
            [
                Some("Crime \u{2013} 2023"),
                Some("Agency\u{2019}s yearly report"),
                Some("Department of Justice"),
                Some("Portal"),
            ],
            link,
        )
    }

    #[test]
    fn test_from_cells_cleans_text() {
        let r = row(Some("https://example.gov/data"));
        assert_eq!(r.title, "Crime - 2023");
        assert_eq!(r.description, "Agency's yearly report");
        assert_eq!(r.access_link_url.as_deref(), Some("https://example.gov/data"));
    }

    #[test]
    fn test_missing_cells_are_empty() {
        let r = SheetRow::from_cells([Some("Only title"), None, None, None], None);
        assert_eq!(r.description, "");
        assert_eq!(r.access_link_name, "");
        assert!(r.access_link_url.is_none());
        assert!(r.origin_of_sources().is_none());
    }

    #[test]
    fn test_metadata_fields() {
        let fields = row(Some("https://example.gov/data")).metadata_fields();
        let fields = fields["fields"].as_array().unwrap();
        let names: Vec<&str> = fields
            .iter()
            .map(|f| f["typeName"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            ["title", "subject", "dsDescription", "author", "datasetContact", "originOfSources"]
        );
        assert_eq!(fields[1]["value"], json!(["Other"]));
        assert_eq!(
            fields[2]["value"][0]["dsDescriptionValue"]["value"],
            "Agency's yearly report"
        );
        assert_eq!(fields[3]["value"][0]["authorName"]["value"], "Department of Justice");
        assert!(fields[3]["value"][0].get("authorAffiliation").is_none());
        assert_eq!(
            fields[4]["value"][0]["datasetContactEmail"]["value"],
            CONTACT_EMAIL
        );
        assert_eq!(
            fields[5]["value"],
            r#"<a href="https://example.gov/data">Portal</a>"#
        );
    }

    #[test]
    fn test_no_origin_without_link() {
        let fields = row(None).metadata_fields();
        assert_eq!(fields["fields"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_summary() {
        assert!(row(None).summary().ends_with("Access Link URL: None"));
    }

    #[test]
    fn test_read_rows_uses_second_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xlsx");
        let mut book = umya_spreadsheet::new_file();
        book.get_sheet_mut(&0)
            .unwrap()
            .get_cell_mut("A2")
            .set_value("Not this sheet");
        let sheet = book.new_sheet("Datasets").unwrap();
        for (cell, value) in [
            ("A1", "Title"),
            ("B1", "Description"),
            ("C1", "Agency"),
            ("D1", "Access"),
            ("A2", "Crime \u{2013} 2023"),
            ("B2", "Yearly counts"),
            ("C2", "Department of Justice"),
            ("D2", "Portal"),
            ("A3", "Arrests"),
        ] {
            sheet.get_cell_mut(cell).set_value(value);
        }
        sheet
            .get_cell_mut("D2")
            .get_hyperlink_mut()
            .set_url("https://example.gov/data");
        umya_spreadsheet::writer::xlsx::write(&book, &path).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            SheetRow {
                title: "Crime - 2023".into(),
                description: "Yearly counts".into(),
                agency: "Department of Justice".into(),
                access_link_name: "Portal".into(),
                access_link_url: Some("https://example.gov/data".into()),
            }
        );
        assert_eq!(rows[1].title, "Arrests");
        assert_eq!(rows[1].access_link_name, "");
        assert!(rows[1].access_link_url.is_none());
    }

    #[test]
    fn test_read_rows_without_second_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xlsx");
        umya_spreadsheet::writer::xlsx::write(&umya_spreadsheet::new_file(), &path).unwrap();
        assert!(read_rows(&path).is_err());
    }

    #[test]
    fn test_limited() {
        let rows = [1, 2, 3];
        assert_eq!(limited(&rows, None), [1, 2, 3]);
        assert_eq!(limited(&rows, Some(2)), [1, 2]);
        assert_eq!(limited(&rows, Some(10)), [1, 2, 3]);
        assert!(limited(&rows, Some(0)).is_empty());
    }

    #[test]
    fn test_create_pauses_between_rows_only() {
        let rows = [row(None), row(None), row(None)];
        let opts = CreateOptions {
            collection: "collection1",
            pace: Duration::from_secs(2),
            limit: Some(2),
        };
        let mut pauses = Vec::new();
        let mut n = 0;
        let pids = create_with(
            &rows,
            &opts,
            |_| {
                n += 1;
                Ok(format!("doi:10.5072/FK2/{n}"))
            },
            |d| pauses.push(d),
        )
        .unwrap();
        assert_eq!(pids, ["doi:10.5072/FK2/1", "doi:10.5072/FK2/2"]);
        assert_eq!(pauses, [Duration::from_secs(2)]);
    }

    #[test]
    fn test_create_stops_at_first_failure() {
        let rows = [row(None), row(None)];
        let opts = CreateOptions {
            collection: "collection1",
            pace: Duration::ZERO,
            limit: None,
        };
        let mut calls = 0;
        let err = create_with(
            &rows,
            &opts,
            |_| {
                calls += 1;
                Err(anyhow!("HTTP 403"))
            },
            |_| {},
        )
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_load_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("initial-dataset.json");
        std::fs::write(&path, r#"{"datasetVersion": {"license": {"name": "CC0 1.0"}}}"#).unwrap();
        let template = load_template(&path).unwrap();
        assert_eq!(template["datasetVersion"]["license"]["name"], "CC0 1.0");
        assert!(load_template(&dir.path().join("missing.json")).is_err());
    }
}
