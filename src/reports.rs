//! Spreadsheet report export.

use chrono::Local;
use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, XlsxError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::store::models::Equipment;
use crate::store::InventoryStore;
use crate::utils::format_timestamp;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("no data for report {0}")]
    NoData(&'static str),
    #[error("building report {report}: {source}")]
    Workbook {
        report: &'static str,
        #[source]
        source: XlsxError,
    },
    #[error("writing report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

const EQUIPMENT_HEADERS: &[&str] = &[
    "Tag",
    "Type",
    "Brand",
    "Model",
    "Serial",
    "Status",
    "Assignee",
    "Assignee email",
    "Registered",
    "Loan return date",
    "Vendor return date",
    "Return reason",
    "Notes",
];

const MOVEMENT_HEADERS: &[&str] = &["Date", "Tag", "Action", "Details", "User"];

/// Attempts at finding a free file name before giving up.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// One report: what it is called, its sheet title and its rows.
struct Sheet<'a> {
    report: &'static str,
    title: &'a str,
    headers: &'a [&'a str],
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn active_inventory(&self, store: &InventoryStore) -> Result<PathBuf, ReportError> {
        let rows = store.active_equipment().iter().map(equipment_row).collect();
        self.export(
            "active_inventory",
            Sheet {
                report: "active_inventory",
                title: "Active inventory",
                headers: EQUIPMENT_HEADERS,
                rows,
            },
        )
    }

    pub fn returned_to_vendor(&self, store: &InventoryStore) -> Result<PathBuf, ReportError> {
        let rows = store.returned_equipment().iter().map(equipment_row).collect();
        self.export(
            "returned_to_vendor",
            Sheet {
                report: "returned_to_vendor",
                title: "Returned to vendor",
                headers: EQUIPMENT_HEADERS,
                rows,
            },
        )
    }

    pub fn full_history(&self, store: &InventoryStore) -> Result<PathBuf, ReportError> {
        let rows = store
            .movements()
            .into_iter()
            .map(|m| {
                vec![
                    format_timestamp(&m.timestamp),
                    m.tag,
                    m.action,
                    m.details,
                    m.user,
                ]
            })
            .collect();
        self.export(
            "full_history",
            Sheet {
                report: "full_history",
                title: "Movement history",
                headers: MOVEMENT_HEADERS,
                rows,
            },
        )
    }

    pub fn equipment_history(
        &self,
        store: &InventoryStore,
        tag: &str,
    ) -> Result<PathBuf, ReportError> {
        let rows = store
            .movements_for_tag(tag)
            .into_iter()
            .map(|m| {
                vec![
                    format_timestamp(&m.timestamp),
                    m.tag,
                    m.action,
                    m.details,
                    m.user,
                ]
            })
            .collect();
        self.export(
            &format!("history_{}", sanitize(tag)),
            Sheet {
                report: "equipment_history",
                title: "Equipment history",
                headers: MOVEMENT_HEADERS,
                rows,
            },
        )
    }

    pub fn system_log(&self, store: &InventoryStore) -> Result<PathBuf, ReportError> {
        let rows = store
            .system_log()
            .into_iter()
            .map(|e| vec![format_timestamp(&e.timestamp), e.action, e.details, e.user])
            .collect();
        self.export(
            "system_log",
            Sheet {
                report: "system_log",
                title: "System log",
                headers: &["Date", "Action", "Details", "User"],
                rows,
            },
        )
    }

    fn export(&self, file_stem: &str, sheet: Sheet<'_>) -> Result<PathBuf, ReportError> {
        if sheet.rows.is_empty() {
            return Err(ReportError::NoData(sheet.report));
        }
        let body = build_workbook(&sheet).map_err(|source| ReportError::Workbook {
            report: sheet.report,
            source,
        })?;

        std::fs::create_dir_all(&self.output_dir).map_err(|source| ReportError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let path = write_new_file(&self.output_dir, &format!("{}_{}", file_stem, stamp), &body)?;

        info!(
            report = sheet.report,
            rows = sheet.rows.len(),
            path = %path.display(),
            "Report exported"
        );
        Ok(path)
    }
}

/// Header row in bold, frozen above the data, then one row per record.
fn build_workbook(sheet: &Sheet<'_>) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet.title)?;

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as ColNum, *header, &bold)?;
    }
    for (i, row) in sheet.rows.iter().enumerate() {
        let r = (i + 1) as RowNum;
        for (col, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(r, col as ColNum, value.as_str())?;
            }
        }
    }
    worksheet.set_freeze_panes(1, 0)?;
    workbook.save_to_buffer()
}

/// Write `body` to `<dir>/<stem>.xlsx`, or `<stem>-2.xlsx`, `<stem>-3.xlsx`
/// and so on when the name is taken. An existing report is never replaced.
fn write_new_file(dir: &Path, stem: &str, body: &[u8]) -> Result<PathBuf, ReportError> {
    let mut last_err = None;
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let name = match attempt {
            1 => format!("{}.xlsx", stem),
            n => format!("{}-{}.xlsx", stem, n),
        };
        let path = dir.join(name);
        let opened = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path);
        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                last_err = Some((path, e));
                continue;
            }
            Err(source) => return Err(ReportError::Io { path, source }),
        };
        return match file.write_all(body).and_then(|()| file.sync_all()) {
            Ok(()) => Ok(path),
            Err(source) => {
                let _ = std::fs::remove_file(&path);
                Err(ReportError::Io { path, source })
            }
        };
    }
    let (path, source) = last_err.unwrap_or_else(|| {
        (
            dir.join(stem),
            io::Error::new(io::ErrorKind::AlreadyExists, "no free report name"),
        )
    });
    Err(ReportError::Io { path, source })
}

fn equipment_row(e: &Equipment) -> Vec<String> {
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.format("%d/%m/%Y").to_string());
    vec![
        e.tag.clone(),
        e.kind.clone(),
        e.brand.clone(),
        e.model.clone(),
        e.serial.clone(),
        e.status.label().to_string(),
        e.assignee.clone().unwrap_or_default(),
        e.assignee_email.clone().unwrap_or_default(),
        format_timestamp(&e.registered_at),
        date(e.loan_return_date).unwrap_or_default(),
        date(e.vendor_return_date).unwrap_or_default(),
        e.return_reason.clone().unwrap_or_default(),
        e.notes.clone().unwrap_or_default(),
    ]
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
