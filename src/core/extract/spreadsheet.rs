//! Spreadsheet (.xlsx / .xls) extraction
//!
//! The native strategy reads the OOXML parts directly and yields every sheet
//! as a rectangular grid anchored at A1 that extends to the last used row and
//! column. The generic strategy goes through calamine, which also understands
//! legacy `.xls` files, and re-anchors its ranges at A1. A workbook whose
//! grids would exceed `MAX_GRID_CELLS` yields the sentinel.

use calamine::{open_workbook_auto_from_rs, Data, Reader as _};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use super::ooxml::{attr_value, core_properties, xml_err, OoxmlPackage};
use super::{ContentExtractor, DocumentMetadata, ExtractionStrategy};
use crate::core::addressing::CellRef;
use crate::core::{CellValue, ExtractedContent, Row, Workbook};
use crate::error::{DocdiffError, Result};

pub const SPREADSHEET_SENTINEL_SHEET: &str = "Error";
pub const SPREADSHEET_SENTINEL: &str = "Could not extract Excel content";

/// Grid slots a single workbook may expand to, counting empty cells
const MAX_GRID_CELLS: u64 = 4_000_000;

pub struct SpreadsheetExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl SpreadsheetExtractor {
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(NativeOoxml), Box::new(GenericLoader)],
        }
    }
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor for SpreadsheetExtractor {
    fn format_name(&self) -> &str {
        "spreadsheet"
    }

    fn strategies(&self) -> &[Box<dyn ExtractionStrategy>] {
        &self.strategies
    }

    fn sentinel(&self) -> ExtractedContent {
        let mut workbook = Workbook::new();
        workbook.push_sheet(
            SPREADSHEET_SENTINEL_SHEET,
            vec![vec![Some(CellValue::Text(SPREADSHEET_SENTINEL.to_string()))]],
        );
        ExtractedContent::Workbook(workbook)
    }

    fn metadata(&self, bytes: &[u8]) -> Result<DocumentMetadata> {
        let mut metadata = match OoxmlPackage::open(bytes) {
            Ok(mut package) => core_properties(&mut package)?,
            Err(_) => DocumentMetadata::new(),
        };

        let names = match NativeOoxml::sheet_names(bytes) {
            Ok(names) => names,
            Err(_) => open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
                .map_err(|e| DocdiffError::Extraction(e.to_string()))?
                .sheet_names(),
        };

        metadata.insert("sheet_count".to_string(), names.len().to_string());
        metadata.insert("sheet_names".to_string(), names.join(", "));
        Ok(metadata)
    }
}

struct NativeOoxml;

impl NativeOoxml {
    fn sheet_names(bytes: &[u8]) -> Result<Vec<String>> {
        let mut package = OoxmlPackage::open(bytes)?;
        let info = parse_workbook_xml(&package.read_part("xl/workbook.xml")?)?;
        Ok(info.sheets.into_iter().map(|s| s.name).collect())
    }
}

impl ExtractionStrategy for NativeOoxml {
    fn name(&self) -> &'static str {
        "ooxml-grid"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedContent> {
        let mut package = OoxmlPackage::open(bytes)?;

        let info = parse_workbook_xml(&package.read_part("xl/workbook.xml")?)?;
        let relationships = match package.read_optional_part("xl/_rels/workbook.xml.rels")? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        let shared_strings = match package.read_optional_part("xl/sharedStrings.xml")? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };
        let date_styles = match package.read_optional_part("xl/styles.xml")? {
            Some(xml) => parse_date_styles(&xml)?,
            None => HashSet::new(),
        };

        let context = CellContext {
            shared_strings: &shared_strings,
            date_styles: &date_styles,
            epoch: if info.date1904 { Epoch::Mac1904 } else { Epoch::Windows1900 },
        };

        let mut budget = GridBudget::new();
        let mut workbook = Workbook::new();
        for (index, sheet) in info.sheets.iter().enumerate() {
            let target = resolve_sheet_target(sheet, &relationships, index);
            let cells = parse_sheet_xml(&package.read_part(&target)?, &context)?;
            workbook.push_sheet(sheet.name.clone(), build_grid(&sheet.name, cells, &mut budget)?);
        }

        Ok(ExtractedContent::Workbook(workbook))
    }
}

struct SheetDescriptor {
    name: String,
    rel_id: Option<String>,
    sheet_id: Option<u32>,
}

struct WorkbookInfo {
    sheets: Vec<SheetDescriptor>,
    date1904: bool,
}

fn parse_workbook_xml(xml: &[u8]) -> Result<WorkbookInfo> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut info = WorkbookInfo {
        sheets: Vec::new(),
        date1904: false,
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                if let Some(name) = attr_value(&e, b"name")? {
                    info.sheets.push(SheetDescriptor {
                        name,
                        rel_id: attr_value(&e, b"r:id")?,
                        sheet_id: attr_value(&e, b"sheetId")?.and_then(|id| id.parse().ok()),
                    });
                }
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"workbookPr" => {
                info.date1904 = matches!(
                    attr_value(&e, b"date1904")?.as_deref(),
                    Some("1") | Some("true")
                );
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(info)
}

/// Relationship id -> target, worksheet relationships only
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut map = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"Relationship" => {
                let id = attr_value(&e, b"Id")?;
                let target = attr_value(&e, b"Target")?;
                let rel_type = attr_value(&e, b"Type")?;
                if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                    if rel_type.contains("worksheet") {
                        map.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(map)
}

fn resolve_sheet_target(
    sheet: &SheetDescriptor,
    relationships: &HashMap<String, String>,
    index: usize,
) -> String {
    if let Some(target) = sheet.rel_id.as_ref().and_then(|id| relationships.get(id)) {
        return normalize_target(target);
    }

    let guessed = sheet
        .sheet_id
        .map(|id| format!("worksheets/sheet{}.xml", id))
        .unwrap_or_else(|| format!("worksheets/sheet{}.xml", index + 1));
    normalize_target(&guessed)
}

fn normalize_target(target: &str) -> String {
    let trimmed = target.trim_start_matches('/');
    if trimmed.starts_with("xl/") {
        trimmed.to_string()
    } else {
        format!("xl/{}", trimmed)
    }
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs (<rPh>) repeat the text and are not part of the value
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" if !in_phonetic => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(t)) if in_text => current.push_str(&t.unescape().map_err(xml_err)?),
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Indexes into `cellXfs` whose number format displays a date or time
fn parse_date_styles(xml: &[u8]) -> Result<HashSet<u32>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut custom_formats: HashMap<u32, String> = HashMap::new();
    let mut xf_formats: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"numFmt" => {
                let id = attr_value(&e, b"numFmtId")?.and_then(|id| id.parse().ok());
                if let (Some(id), Some(code)) = (id, attr_value(&e, b"formatCode")?) {
                    custom_formats.insert(id, code);
                }
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if in_cell_xfs && e.local_name().as_ref() == b"xf" =>
            {
                let id = attr_value(&e, b"numFmtId")?
                    .and_then(|id| id.parse().ok())
                    .unwrap_or(0);
                xf_formats.push(id);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(xf_formats
        .iter()
        .enumerate()
        .filter(|&(_, id)| match custom_formats.get(id) {
            Some(code) => is_date_format_code(code),
            None => is_builtin_date_format(*id),
        })
        .map(|(index, _)| index as u32)
        .collect())
}

fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// A format code is a date format if, outside quoted literals, escapes and
/// bracketed sections, it uses a date or time token.
fn is_date_format_code(code: &str) -> bool {
    // Only the positive-number section decides
    let section = code.split(';').next().unwrap_or_default();
    let mut chars = section.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                for q in chars.by_ref() {
                    if q == ']' {
                        break;
                    }
                }
            }
            'd' | 'D' | 'm' | 'M' | 'y' | 'Y' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

#[derive(Debug, Clone, Copy)]
enum Epoch {
    Windows1900,
    Mac1904,
}

/// Convert a serial date number to a timestamp, rounded to the millisecond
fn serial_to_datetime(serial: f64, epoch: Epoch) -> Option<NaiveDateTime> {
    let (base, serial) = match epoch {
        Epoch::Windows1900 => {
            // Serials below 60 predate the phantom 1900-02-29
            let adjusted = if serial > 0.0 && serial < 60.0 { serial + 1.0 } else { serial };
            (NaiveDate::from_ymd_opt(1899, 12, 30)?, adjusted)
        }
        Epoch::Mac1904 => (NaiveDate::from_ymd_opt(1904, 1, 1)?, serial),
    };
    let millis = (serial * 86_400_000.0).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return None;
    }
    base.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::milliseconds(millis as i64))
}

struct CellContext<'a> {
    shared_strings: &'a [String],
    date_styles: &'a HashSet<u32>,
    epoch: Epoch,
}

struct ParsedCell {
    row: u32,
    col: u32,
    value: Option<CellValue>,
}

fn parse_sheet_xml(xml: &[u8], context: &CellContext<'_>) -> Result<Vec<ParsedCell>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut cells = Vec::new();
    // Cells without an `r` attribute follow the previous one
    let mut next_row: u32 = 0;
    let mut next_col: u32 = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"row" => {
                if let Some(r) = row_number(&e)? {
                    next_row = r.saturating_sub(1);
                }
                next_col = 0;
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"row" => {
                if let Some(r) = row_number(&e)? {
                    next_row = r.saturating_sub(1);
                }
                next_row = next_row.saturating_add(1);
                next_col = 0;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"row" => next_row = next_row.saturating_add(1),
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"c" => {
                let (row, col) = cell_position(&e, next_row, next_col)?;
                let cell_type = attr_value(&e, b"t")?;
                let style = attr_value(&e, b"s")?.and_then(|s| s.parse::<u32>().ok());
                let raw = read_cell_body(&mut reader)?;
                let value = convert_value(raw, cell_type.as_deref(), style, context)?;
                cells.push(ParsedCell { row, col, value });
                next_col = col + 1;
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                let (_, col) = cell_position(&e, next_row, next_col)?;
                next_col = col + 1;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(cells)
}

fn row_number(element: &quick_xml::events::BytesStart<'_>) -> Result<Option<u32>> {
    Ok(attr_value(element, b"r")?.and_then(|r| r.parse::<u32>().ok()))
}

fn cell_position(
    element: &quick_xml::events::BytesStart<'_>,
    default_row: u32,
    default_col: u32,
) -> Result<(u32, u32)> {
    match attr_value(element, b"r")? {
        Some(address) => CellRef::parse(&address)
            .map(|cell| (cell.row, cell.col))
            .ok_or_else(|| DocdiffError::Extraction(format!("invalid cell address: {}", address))),
        None => Ok((default_row, default_col)),
    }
}

enum RawCell {
    Empty,
    Value(String),
    Inline(String),
}

/// Read until the closing `</c>`, collecting the `<v>` or inline string text
fn read_cell_body(reader: &mut Reader<&[u8]>) -> Result<RawCell> {
    let mut buf = Vec::new();
    let mut raw = RawCell::Empty;
    let mut inline = String::new();
    let mut saw_inline = false;
    let mut capture: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"v" => {
                    capture = Some("v");
                    raw = RawCell::Value(String::new());
                }
                b"is" => saw_inline = true,
                b"t" if saw_inline => capture = Some("t"),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(xml_err)?;
                match (capture, &mut raw) {
                    (Some("v"), RawCell::Value(value)) => value.push_str(&text),
                    (Some("t"), _) => inline.push_str(&text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = None,
                b"c" => break,
                _ => {}
            },
            Ok(Event::Eof) => {
                return Err(DocdiffError::Extraction("unexpected EOF inside cell".to_string()));
            }
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(if saw_inline { RawCell::Inline(inline) } else { raw })
}

fn convert_value(
    raw: RawCell,
    cell_type: Option<&str>,
    style: Option<u32>,
    context: &CellContext<'_>,
) -> Result<Option<CellValue>> {
    let raw = match raw {
        RawCell::Empty => return Ok(None),
        RawCell::Inline(text) => return Ok(Some(CellValue::Text(text))),
        RawCell::Value(text) => text,
    };

    let trimmed = raw.trim();
    Ok(match cell_type {
        Some("s") => {
            let index: usize = trimmed
                .parse()
                .map_err(|_| DocdiffError::Extraction(format!("bad shared string index: {}", trimmed)))?;
            let text = context.shared_strings.get(index).ok_or_else(|| {
                DocdiffError::Extraction(format!("shared string index {} out of bounds", index))
            })?;
            Some(CellValue::Text(text.clone()))
        }
        Some("b") => match trimmed {
            "1" | "true" => Some(CellValue::Bool(true)),
            "0" | "false" => Some(CellValue::Bool(false)),
            _ => None,
        },
        Some("e") => Some(CellValue::Error(trimmed.to_string())),
        Some("str") | Some("inlineStr") => Some(CellValue::Text(raw)),
        Some("d") => Some(
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .map(CellValue::DateTime)
                .unwrap_or_else(|_| CellValue::Text(trimmed.to_string())),
        ),
        _ if trimmed.is_empty() => None,
        _ => {
            let is_date = style.is_some_and(|s| context.date_styles.contains(&s));
            if let Ok(n) = trimmed.parse::<i64>() {
                if is_date {
                    serial_to_datetime(n as f64, context.epoch).map(CellValue::DateTime)
                } else {
                    Some(CellValue::Int(n))
                }
            } else if let Ok(n) = trimmed.parse::<f64>() {
                if is_date {
                    serial_to_datetime(n, context.epoch).map(CellValue::DateTime)
                } else {
                    Some(CellValue::Float(n))
                }
            } else {
                Some(CellValue::Text(trimmed.to_string()))
            }
        }
    })
}

/// Remaining grid slots for the workbook being extracted
struct GridBudget {
    remaining: u64,
}

impl GridBudget {
    fn new() -> Self {
        Self { remaining: MAX_GRID_CELLS }
    }

    /// Reserve a `rows` x `columns` grid for `sheet` before allocating it
    fn reserve(&mut self, sheet: &str, rows: u64, columns: u64) -> Result<()> {
        let cells = rows.saturating_mul(columns);
        if cells > self.remaining {
            return Err(DocdiffError::LimitExceeded(format!(
                "sheet '{}' spans {} rows x {} columns, over the {} cell limit",
                sheet, rows, columns, MAX_GRID_CELLS
            )));
        }
        self.remaining -= cells;
        Ok(())
    }
}

/// Lay cells out on a grid from A1 to the furthest used cell
fn build_grid(sheet: &str, cells: Vec<ParsedCell>, budget: &mut GridBudget) -> Result<Vec<Row>> {
    let Some(max_row) = cells.iter().map(|c| c.row).max() else {
        return Ok(Vec::new());
    };
    let max_col = cells.iter().map(|c| c.col).max().unwrap_or(0);
    budget.reserve(sheet, max_row as u64 + 1, max_col as u64 + 1)?;

    let mut rows: Vec<Row> = vec![vec![None; max_col as usize + 1]; max_row as usize + 1];
    for cell in cells {
        rows[cell.row as usize][cell.col as usize] = cell.value;
    }
    Ok(rows)
}

/// calamine-backed loader; handles both OOXML and legacy BIFF workbooks
struct GenericLoader;

impl ExtractionStrategy for GenericLoader {
    fn name(&self) -> &'static str {
        "calamine"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedContent> {
        let mut sheets = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| DocdiffError::Extraction(e.to_string()))?;

        let mut budget = GridBudget::new();
        let mut workbook = Workbook::new();
        for name in sheets.sheet_names() {
            let range = sheets
                .worksheet_range(&name)
                .map_err(|e| DocdiffError::Extraction(format!("sheet '{}': {}", name, e)))?;

            let mut rows: Vec<Row> = Vec::new();
            if let Some((start_row, start_col)) = range.start() {
                budget.reserve(
                    &name,
                    start_row as u64 + range.height() as u64,
                    start_col as u64 + range.width() as u64,
                )?;
                let width = start_col as usize + range.width();
                rows.extend((0..start_row).map(|_| vec![None; width]));
                for source in range.rows() {
                    let mut row: Row = vec![None; start_col as usize];
                    row.extend(source.iter().map(convert_data));
                    rows.push(row);
                }
            }
            workbook.push_sheet(name, rows);
        }

        Ok(ExtractedContent::Workbook(workbook))
    }
}

fn convert_data(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::Int(n) => Some(CellValue::Int(*n)),
        Data::Float(n) => Some(CellValue::Float(*n)),
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(
            dt.as_datetime()
                .map(CellValue::DateTime)
                .unwrap_or_else(|| CellValue::Float(dt.as_f64())),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Error(e.to_string())),
    }
}
