//! Executes a [`WorkbookPlan`] by writing a fresh `.xlsx` file.
//!
//! The plan is first applied to an in-memory model, then the model is
//! rendered and written to a temporary file that replaces the destination,
//! so a failure never leaves a half-written workbook behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Url, Workbook, XlsxError};
use tasksheet_core::{
    CellStyle, CellValue, Error, LinkTarget, Materializer, Result, SheetOp, WorkbookPlan,
};

/// Longest sheet name Excel accepts, in characters.
const MAX_SHEET_NAME_CHARS: usize = 31;

/// Writes plans to a workbook file.
#[derive(Debug, Clone)]
pub struct XlsxMaterializer {
    path: PathBuf,
}

impl XlsxMaterializer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Materializer for XlsxMaterializer {
    fn materialize(&mut self, plan: &WorkbookPlan) -> Result<()> {
        let model = WorkbookModel::from_plan(plan);
        let mut workbook = model.render().map_err(xlsx_error)?;

        let tmp_path = self.path.with_extension("xlsx.tmp");
        workbook.save(&tmp_path).map_err(xlsx_error)?;
        std::fs::rename(&tmp_path, &self.path)?;

        log::info!("Wrote {} sheets to {}", model.sheets.len(), self.path.display());
        Ok(())
    }
}

fn xlsx_error(e: XlsxError) -> Error {
    Error::Materialize(e.to_string())
}

#[derive(Debug, Clone, PartialEq)]
struct Cell {
    value: CellValue,
    style: CellStyle,
}

#[derive(Debug, Clone, Default)]
struct SheetModel {
    name: String,
    cells: Vec<(u32, u16, Cell)>,
    widths: Vec<(u16, u16)>,
    tab_color: Option<u32>,
}

impl SheetModel {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Sheets in workbook order, after applying every op.
#[derive(Debug, Default)]
struct WorkbookModel {
    sheets: Vec<SheetModel>,
}

impl WorkbookModel {
    fn from_plan(plan: &WorkbookPlan) -> Self {
        let mut model = Self::default();
        for op in &plan.ops {
            model.apply(op);
        }
        model
    }

    fn sheet_mut(&mut self, name: &str) -> &mut SheetModel {
        let pos = match self.sheets.iter().position(|s| s.name == name) {
            Some(pos) => pos,
            None => {
                self.sheets.push(SheetModel::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[pos]
    }

    fn apply(&mut self, op: &SheetOp) {
        match op {
            SheetOp::DeleteSheetsExcept { keep } => {
                self.sheets.retain(|s| &s.name == keep);
                self.sheet_mut(keep);
            }
            SheetOp::ClearSheet { sheet } => {
                let sheet = self.sheet_mut(sheet);
                sheet.cells.clear();
                sheet.widths.clear();
                sheet.tab_color = None;
            }
            SheetOp::CreateSheet { sheet } => {
                self.sheet_mut(sheet);
            }
            SheetOp::WriteCell {
                sheet,
                row,
                col,
                value,
                style,
            } => {
                let cell = Cell {
                    value: value.clone(),
                    style: *style,
                };
                self.sheet_mut(sheet).cells.push((*row, *col, cell));
            }
            SheetOp::SetColumnWidth { sheet, col, pixels } => {
                self.sheet_mut(sheet).widths.push((*col, *pixels));
            }
            SheetOp::SetTabColor { sheet, rgb } => {
                self.sheet_mut(sheet).tab_color = Some(*rgb);
            }
        }
    }

    fn render(&self) -> std::result::Result<Workbook, XlsxError> {
        let names = excel_sheet_names(self.sheets.iter().map(|s| s.name.as_str()));
        let formats = Formats::new();
        let mut workbook = Workbook::new();

        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&names[&sheet.name])?;

            for (col, pixels) in &sheet.widths {
                worksheet.set_column_width_pixels(*col, (*pixels).into())?;
            }
            if let Some(rgb) = sheet.tab_color {
                worksheet.set_tab_color(Color::RGB(rgb));
            }

            for (row, col, cell) in &sheet.cells {
                let format = formats.get(cell.style);
                match &cell.value {
                    CellValue::Text(text) => {
                        worksheet.write_string_with_format(*row, *col, text, format)?;
                    }
                    CellValue::Link {
                        target: LinkTarget::Url(url),
                        text,
                    } if !has_link_scheme(url) => {
                        log::warn!("'{}' is not a linkable URL, writing plain text", url);
                        worksheet.write_string_with_format(*row, *col, text, format)?;
                    }
                    CellValue::Link { target, text } => {
                        let url = match target {
                            LinkTarget::Url(url) => url.clone(),
                            LinkTarget::Sheet(name) => {
                                let resolved = names.get(name).map(String::as_str).unwrap_or(name);
                                internal_link(resolved)
                            }
                        };
                        let link = Url::new(url).set_text(text);
                        worksheet.write_url_with_format(*row, *col, link, format)?;
                    }
                }
            }
        }

        Ok(workbook)
    }
}

/// Cell formats per semantic style.
struct Formats {
    header: Format,
    back_link: Format,
    body: Format,
    index_header: Format,
    index_entry: Format,
}

impl Formats {
    fn new() -> Self {
        let bordered = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::VerticalCenter);

        Self {
            header: bordered
                .clone()
                .set_bold()
                .set_background_color(Color::RGB(0xCCCCCC))
                .set_align(FormatAlign::Center),
            back_link: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(0xFFC0CB))
                .set_align(FormatAlign::Center),
            body: bordered.clone().set_text_wrap(),
            index_header: bordered
                .clone()
                .set_bold()
                .set_font_size(16)
                .set_background_color(Color::RGB(0xD3D3D3))
                .set_align(FormatAlign::Center)
                .set_text_wrap(),
            index_entry: bordered.set_align(FormatAlign::Center).set_text_wrap(),
        }
    }

    fn get(&self, style: CellStyle) -> &Format {
        match style {
            CellStyle::Header => &self.header,
            CellStyle::BackLink => &self.back_link,
            CellStyle::Body => &self.body,
            CellStyle::IndexHeader => &self.index_header,
            CellStyle::IndexEntry => &self.index_entry,
        }
    }
}

/// Whether Excel can store `url` as a hyperlink.
fn has_link_scheme(url: &str) -> bool {
    const SCHEMES: &[&str] = &["http://", "https://", "ftp://", "ftps://", "mailto:", "file://"];
    SCHEMES.iter().any(|scheme| url.starts_with(scheme))
}

/// `internal:'Sheet'!A1`, quoting apostrophes in the name.
fn internal_link(sheet: &str) -> String {
    format!("internal:'{}'!A1", sheet.replace('\'', "''"))
}

/// Map plan sheet names to names Excel accepts, keeping them distinct.
///
/// Excel compares sheet names case-insensitively.
fn excel_sheet_names<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    let mut mapped = HashMap::new();
    let mut taken: Vec<String> = Vec::new();

    for name in names {
        let base = sanitize_sheet_name(name);
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate.to_lowercase()) {
            let suffix = format!("~{}", n);
            let keep = MAX_SHEET_NAME_CHARS - suffix.chars().count();
            candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
            n += 1;
        }
        taken.push(candidate.to_lowercase());
        mapped.insert(name.to_string(), candidate);
    }

    mapped
}

/// Replace characters Excel forbids with their full-width forms and truncate.
fn sanitize_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '[' => '［',
            ']' => '］',
            ':' => '：',
            '*' => '＊',
            '?' => '？',
            '/' => '／',
            '\\' => '＼',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_matches('\'');
    let truncated: String = trimmed.chars().take(MAX_SHEET_NAME_CHARS).collect();
    if truncated.trim().is_empty() {
        "Sheet".to_string()
    } else {
        truncated
    }
}
