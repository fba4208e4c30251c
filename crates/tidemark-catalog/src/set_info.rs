//! Chart set metadata
//!
//! A set directory describes itself either through a legacy
//! `Chartinfo.txt` (colon separated key/value lines) or through
//! `ChartList.XML` / keylist XML files from the chart shop. Both carry
//! the edition, expiry and the EULA / chart-info display modes; keylists
//! additionally map chart file names to their install keys.

use crate::error::{CatalogError, CatalogResult};
use chrono::{TimeZone, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// When to present the EULA or chart info to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowMode {
    /// Never show
    #[default]
    Never,
    /// Show once
    Once,
    /// Show once per session
    Session,
}

impl ShowMode {
    fn parse(v: &str) -> ShowMode {
        match v.trim().to_ascii_lowercase().as_str() {
            "once" => ShowMode::Once,
            "session" => ShowMode::Session,
            _ => ShowMode::Never,
        }
    }
}

/// Parsed metadata of one chart set directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartSetInfo {
    /// Set key (derived from the directory)
    pub name: String,
    /// The set directory
    pub directory: PathBuf,
    /// Human readable title
    pub title: String,
    /// Edition, e.g. `2022/10-25`
    pub edition: String,
    /// Expiry as a display string
    pub valid_to: String,
    /// EULA display mode
    pub eula_mode: ShowMode,
    /// Chart info display mode
    pub chart_info_mode: ShowMode,
    /// Shop id of the set
    pub chart_set_id: String,
    /// System user key, when delivered
    pub user_key: String,
    /// Install keys by chart file name
    pub chart_keys: HashMap<String, String>,
    /// EULA html files found in the directory
    pub eula_files: Vec<String>,
    /// Newest mtime of the metadata files (unix seconds)
    pub mtime: i64,
}

impl ChartSetInfo {
    /// Parse the metadata of a set directory.
    ///
    /// Missing metadata is not an error: charts can render without it,
    /// the set just stays untitled.
    pub fn parse(directory: &Path, key: &str) -> CatalogResult<ChartSetInfo> {
        if !directory.is_dir() {
            return Err(CatalogError::DirectoryMissing(
                directory.display().to_string(),
            ));
        }
        info!(directory = %directory.display(), "parse chart set info");
        let mut parsed = ChartSetInfo {
            name: key.to_string(),
            directory: directory.to_path_buf(),
            ..ChartSetInfo::default()
        };
        // the shop id is the middle part of dotted directory names
        if let Some(dir_name) = directory.file_name().and_then(|n| n.to_str()) {
            let parts: Vec<&str> = dir_name.split('.').collect();
            if parts.len() >= 2 {
                parsed.chart_set_id = parts[1].to_string();
            }
        }
        let mut found_any = false;
        for entry in std::fs::read_dir(directory)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let lower = name.to_ascii_lowercase();
            if lower.contains("eula") && lower.ends_with(".html") {
                parsed.eula_files.push(name.clone());
            }
            let mtime = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            if lower == "chartinfo.txt" {
                parsed.parse_legacy(&entry.path())?;
                parsed.mtime = parsed.mtime.max(mtime);
                found_any = true;
            } else if lower.ends_with(".xml") {
                if let Err(e) = parsed.parse_xml(&entry.path()) {
                    warn!(file = %entry.path().display(), error = %e, "unable to parse xml file");
                } else {
                    parsed.mtime = parsed.mtime.max(mtime);
                    found_any = true;
                }
            }
        }
        if !found_any {
            debug!(directory = %directory.display(), "no set metadata found");
        }
        Ok(parsed)
    }

    /// Legacy `Chartinfo.txt`: colon separated key/value lines
    fn parse_legacy(&mut self, path: &Path) -> CatalogResult<()> {
        let content = std::fs::read_to_string(path)?;
        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "ChartInfo" => {
                    // title;edition;validTo
                    let parts: Vec<&str> = value.split(';').collect();
                    if let Some(title) = parts.first() {
                        if self.title.is_empty() {
                            self.title = title.trim().to_string();
                        }
                    }
                    if let Some(edition) = parts.get(1) {
                        if self.edition.is_empty() {
                            // yyyy-mm becomes the shop style yyyy/01-mm
                            let ed: Vec<&str> = edition.trim().split('-').collect();
                            if ed.len() == 2 {
                                self.edition = format!("{}/01-{}", ed[0], ed[1]);
                            } else {
                                self.edition = edition.trim().to_string();
                            }
                        }
                    }
                    if let Some(valid_to) = parts.get(2) {
                        if self.valid_to.is_empty() {
                            self.valid_to = valid_to.trim().to_string();
                        }
                    }
                }
                "ChartInfoShow" => self.chart_info_mode = ShowMode::parse(value),
                "EULAShow" => self.eula_mode = ShowMode::parse(value),
                "UserKey" => self.user_key = value.to_string(),
                k if k.ends_with("EULAFile") => {
                    self.eula_files.push(value.to_string());
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// ChartList / keylist XML files from the shop
    fn parse_xml(&mut self, path: &Path) -> CatalogResult<()> {
        let content = std::fs::read_to_string(path)?;
        let mut reader = Reader::from_str(&content);
        reader.config_mut().trim_text(true);
        let mut stack: Vec<String> = Vec::new();
        let mut chart_file: Option<String> = None;
        let mut chart_key: Option<String> = None;
        let old_keys = self.chart_keys.len();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if tag == "Chart" {
                        chart_file = None;
                        chart_key = None;
                    }
                    stack.push(tag);
                }
                Ok(Event::End(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if tag == "Chart" {
                        if let (Some(f), Some(k)) = (chart_file.take(), chart_key.take()) {
                            self.chart_keys.insert(f, k);
                        }
                    }
                    stack.pop();
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().unwrap_or_default().to_string();
                    let Some(tag) = stack.last() else { continue };
                    let in_chart = stack.iter().any(|s| s == "Chart");
                    match tag.as_str() {
                        "FileName" | "ID" if in_chart => {
                            // keylists use FileName, older lists only ID
                            if tag == "FileName" || chart_file.is_none() {
                                chart_file = Some(text);
                            }
                        }
                        "RInstallKey" if in_chart => chart_key = Some(text),
                        "ChartInfo" if !in_chart => {
                            if self.title.is_empty() {
                                self.title = text;
                            }
                        }
                        "Edition" if !in_chart => {
                            if self.edition.is_empty() {
                                self.edition = text;
                            }
                        }
                        "ChartInfoShow" => self.chart_info_mode = ShowMode::parse(&text),
                        "EULAShow" => self.eula_mode = ShowMode::parse(&text),
                        "ExpirationDate" => {
                            if let Ok(secs) = text.trim().parse::<i64>() {
                                if let Some(dt) = Utc.timestamp_opt(secs, 0).single() {
                                    self.valid_to = dt.format("%Y-%m-%d").to_string();
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(CatalogError::InvalidSetInfo {
                        path: path.display().to_string(),
                        detail: e.to_string(),
                    })
                }
                _ => {}
            }
        }
        debug!(
            file = %path.display(),
            keys = self.chart_keys.len() - old_keys,
            "parsed chart keys"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_legacy_chartinfo() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Chartinfo.txt"),
            "ChartInfo:North Sea;2022-10;2023-06-30\nEULAShow:once\nChartInfoShow:Session\nUserKey:abcd\noesencEULAFile:EN_eula.html\n",
        )
        .unwrap();
        let info = ChartSetInfo::parse(dir.path(), "set1").unwrap();
        assert_eq!(info.title, "North Sea");
        assert_eq!(info.edition, "2022/01-10");
        assert_eq!(info.valid_to, "2023-06-30");
        assert_eq!(info.eula_mode, ShowMode::Once);
        assert_eq!(info.chart_info_mode, ShowMode::Session);
        assert_eq!(info.user_key, "abcd");
        assert!(info.eula_files.contains(&"EN_eula.html".to_string()));
    }

    #[test]
    fn test_parse_keylist_xml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("keys.XML"),
            r#"<keyList>
  <Chart>
    <Name></Name>
    <FileName>OC-358-LM1JE4</FileName>
    <ID>FI4EJ1ML</ID>
    <RInstallKey>VerySecretKey</RInstallKey>
  </Chart>
  <ChartInfo>Finnland 2022</ChartInfo>
  <Edition>2022/10-25</Edition>
  <ExpirationDate>1693649994</ExpirationDate>
  <ChartInfoShow>session</ChartInfoShow>
  <EULAShow>once</EULAShow>
</keyList>"#,
        )
        .unwrap();
        let info = ChartSetInfo::parse(dir.path(), "set1").unwrap();
        assert_eq!(info.title, "Finnland 2022");
        assert_eq!(info.edition, "2022/10-25");
        assert_eq!(
            info.chart_keys.get("OC-358-LM1JE4").map(|s| s.as_str()),
            Some("VerySecretKey")
        );
        assert_eq!(info.eula_mode, ShowMode::Once);
        assert_eq!(info.valid_to, "2023-09-02");
    }

    #[test]
    fn test_missing_directory() {
        let err = ChartSetInfo::parse(Path::new("/nonexistent-dir"), "x").unwrap_err();
        assert!(matches!(err, CatalogError::DirectoryMissing(_)));
    }
}
