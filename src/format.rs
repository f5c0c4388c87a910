//! Document formats, format pairs, and the per-route extension allow-lists.
//!
//! The engine is addressed by plain extension strings (`"xlsx"`, `"pdf"`).
//! [`DocumentFormat`] keeps that vocabulary closed so a typo cannot reach the
//! engine, and [`ConversionRoute`] captures which inputs a given UI entry
//! point accepts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A document format the engine can read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    // Spreadsheets
    Xlsx,
    Xls,
    Ods,
    Csv,
    // Word processing
    Docx,
    Doc,
    Odt,
    Rtf,
    Txt,
    // Presentations
    Pptx,
    Ppt,
    Odp,
    // Output
    Pdf,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 13] = [
        DocumentFormat::Xlsx,
        DocumentFormat::Xls,
        DocumentFormat::Ods,
        DocumentFormat::Csv,
        DocumentFormat::Docx,
        DocumentFormat::Doc,
        DocumentFormat::Odt,
        DocumentFormat::Rtf,
        DocumentFormat::Txt,
        DocumentFormat::Pptx,
        DocumentFormat::Ppt,
        DocumentFormat::Odp,
        DocumentFormat::Pdf,
    ];

    /// Lowercase extension without the dot; also the engine's format token.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Xls => "xls",
            DocumentFormat::Ods => "ods",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Odt => "odt",
            DocumentFormat::Rtf => "rtf",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Ppt => "ppt",
            DocumentFormat::Odp => "odp",
            DocumentFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            DocumentFormat::Xls => "application/vnd.ms-excel",
            DocumentFormat::Ods => "application/vnd.oasis.opendocument.spreadsheet",
            DocumentFormat::Csv => "text/csv",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Doc => "application/msword",
            DocumentFormat::Odt => "application/vnd.oasis.opendocument.text",
            DocumentFormat::Rtf => "application/rtf",
            DocumentFormat::Txt => "text/plain",
            DocumentFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            DocumentFormat::Ppt => "application/vnd.ms-powerpoint",
            DocumentFormat::Odp => "application/vnd.oasis.opendocument.presentation",
            DocumentFormat::Pdf => "application/pdf",
        }
    }

    /// Case-insensitive lookup; a leading dot is tolerated.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    /// Derive the format from a file name's last extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        extension_of(name).and_then(Self::from_extension)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The `{input, output}` pair passed to the engine's convert capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatPair {
    pub input: DocumentFormat,
    pub output: DocumentFormat,
}

/// Last extension of `name`, without the dot. Hidden files (`.env`) and
/// trailing dots have none.
pub fn extension_of(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(0) | None => None,
        Some(i) if i + 1 == base.len() => None,
        Some(i) => Some(&base[i + 1..]),
    }
}

/// Replace the last extension of `name` with `output`'s extension, or append
/// it when there is none.
pub fn output_file_name(name: &str, output: DocumentFormat) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match extension_of(base) {
        Some(ext) => &base[..base.len() - ext.len() - 1],
        None => base.trim_end_matches('.'),
    };
    format!("{stem}.{}", output.extension())
}

/// One UI entry point's accepted inputs and its target format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRoute {
    pub name: String,
    pub accepted: Vec<DocumentFormat>,
    pub output: DocumentFormat,
}

impl ConversionRoute {
    /// xlsx / xls / ods / csv → pdf
    pub fn spreadsheet() -> Self {
        Self::custom(
            "spreadsheet-to-pdf",
            vec![
                DocumentFormat::Xlsx,
                DocumentFormat::Xls,
                DocumentFormat::Ods,
                DocumentFormat::Csv,
            ],
        )
    }

    /// docx / doc / odt / rtf / txt → pdf
    pub fn document() -> Self {
        Self::custom(
            "document-to-pdf",
            vec![
                DocumentFormat::Docx,
                DocumentFormat::Doc,
                DocumentFormat::Odt,
                DocumentFormat::Rtf,
                DocumentFormat::Txt,
            ],
        )
    }

    /// pptx / ppt / odp → pdf
    pub fn presentation() -> Self {
        Self::custom(
            "presentation-to-pdf",
            vec![
                DocumentFormat::Pptx,
                DocumentFormat::Ppt,
                DocumentFormat::Odp,
            ],
        )
    }

    pub fn custom(name: impl Into<String>, accepted: Vec<DocumentFormat>) -> Self {
        Self {
            name: name.into(),
            accepted,
            output: DocumentFormat::Pdf,
        }
    }

    pub fn accepts(&self, format: DocumentFormat) -> bool {
        self.accepted.contains(&format)
    }

    /// Resolve a file name against this route's allow-list.
    pub fn match_file(&self, name: &str) -> Option<DocumentFormat> {
        DocumentFormat::from_file_name(name).filter(|f| self.accepts(*f))
    }

    /// Comma-separated extension list for error messages.
    pub fn accepted_list(&self) -> String {
        self.accepted
            .iter()
            .map(|f| f.extension())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ConversionRoute {
    fn default() -> Self {
        Self::spreadsheet()
    }
}
