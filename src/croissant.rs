use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde_json::Value;

use crate::client::Dataverse;

/// `croissant_{pid}_{YYYYmmdd_HHMMSS}.json`, with path-hostile characters in the PID replaced.
pub fn file_name(pid: &str, at: NaiveDateTime) -> String {
    format!(
        "croissant_{}_{}.json",
        pid.replace([':', '/'], "_"),
        at.format("%Y%m%d_%H%M%S")
    )
}

pub fn write(path: &Path, croissant: &Value, ugly: bool) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    if ugly {
        serde_json::to_writer(&mut writer, croissant)?;
    } else {
        serde_json::to_writer_pretty(&mut writer, croissant)?;
    }
    writer.flush()?;
    Ok(())
}

/// Downloads the draft Croissant export of `pid` into `output_dir`.
pub fn download(
    dataverse: &Dataverse,
    pid: &str,
    output_dir: &Path,
    ugly: bool,
    at: NaiveDateTime,
) -> Result<PathBuf> {
    let croissant = dataverse
        .draft_croissant(pid)
        .with_context(|| format!("Error fetching Croissant for {pid}"))?;
    let path = output_dir.join(file_name(pid, at));
    write(&path, &croissant, ugly)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 31)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap()
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("doi:10.5072/FK2/ABCDEF", at()),
            "croissant_doi_10.5072_FK2_ABCDEF_20250131_090507.json"
        );
    }

    #[test]
    fn test_write_pretty_and_ugly() {
        let dir = tempfile::tempdir().unwrap();
        let doc = json!({"@type": "sc:Dataset", "name": "Ocean Temperatures"});

        let pretty = dir.path().join("pretty.json");
        write(&pretty, &doc, false).unwrap();
        let text = std::fs::read_to_string(&pretty).unwrap();
        assert!(text.contains("\n  \"@type\": \"sc:Dataset\""));

        let ugly = dir.path().join("ugly.json");
        write(&ugly, &doc, true).unwrap();
        assert_eq!(
            std::fs::read_to_string(&ugly).unwrap(),
            r#"{"@type":"sc:Dataset","name":"Ocean Temperatures"}"#
        );
    }
}
