use crate::export::xml::{escape, is_xml_char};
use crate::export::SerializationError;
use chrono::NaiveDate;
use std::io::{Cursor, Write};

/// Excel's serial day zero (accounts for the 1900 leap-year quirk for dates from 1900-03-01).
pub(crate) fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

fn min_excel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 3, 1).unwrap_or(NaiveDate::MIN)
}

fn max_excel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

pub const MAX_ROWS: usize = 1_048_576;
pub const MAX_CELL_CHARS: usize = 32_767;

/// Index into `cellXfs` in `styles.xml` carrying the date number format.
const DATE_STYLE: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

pub fn date_to_serial(date: NaiveDate) -> i64 {
    (date - excel_epoch()).num_days()
}

pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 61.0 {
        return None;
    }
    excel_epoch().checked_add_signed(chrono::Duration::days(serial.floor() as i64))
}

/// 0 -> "A", 25 -> "Z", 26 -> "AA".
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

pub fn column_index(name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for b in name.bytes() {
        if !b.is_ascii_uppercase() {
            return None;
        }
        n = n.checked_mul(26)?.checked_add((b - b'A') as usize + 1)?;
    }
    Some(n - 1)
}

/// Writes a single-sheet workbook. The first row is written as-is, so callers
/// pass their header as row zero.
pub fn write_workbook(
    sheet_name: &str,
    rows: &[Vec<CellValue>],
) -> Result<Vec<u8>, SerializationError> {
    if rows.len() > MAX_ROWS {
        return Err(SerializationError::TooManyRows {
            rows: rows.len(),
            max: MAX_ROWS,
        });
    }

    let sheet_xml = sheet_xml(rows)?;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    // Fixed timestamp keeps the output byte-for-byte reproducible.
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml(sheet_name)),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml),
    ];

    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn sheet_xml(rows: &[Vec<CellValue>]) -> Result<String, SerializationError> {
    let mut out = String::from(XML_DECL);
    out.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#);

    for (r, row) in rows.iter().enumerate() {
        let row_num = r + 1;
        out.push_str(&format!(r#"<row r="{row_num}">"#));
        for (c, cell) in row.iter().enumerate() {
            let cell_ref = format!("{}{row_num}", column_name(c));
            write_cell(&mut out, &cell_ref, cell)?;
        }
        out.push_str("</row>");
    }

    out.push_str("</sheetData></worksheet>");
    Ok(out)
}

fn write_cell(out: &mut String, cell_ref: &str, cell: &CellValue) -> Result<(), SerializationError> {
    match cell {
        CellValue::Empty => {}
        CellValue::Text(s) => {
            check_text(cell_ref, s)?;
            out.push_str(&format!(
                r#"<c r="{cell_ref}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                escape(s)
            ));
        }
        CellValue::Number(n) => {
            if !n.is_finite() {
                return Err(SerializationError::NonFiniteNumber {
                    cell: cell_ref.to_string(),
                });
            }
            out.push_str(&format!(r#"<c r="{cell_ref}"><v>{n}</v></c>"#));
        }
        CellValue::Date(d) => {
            if *d < min_excel_date() || *d > max_excel_date() {
                // No serial exists for these; ISO text keeps the value intact.
                out.push_str(&format!(
                    r#"<c r="{cell_ref}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    d.format("%Y-%m-%d")
                ));
            } else {
                out.push_str(&format!(
                    r#"<c r="{cell_ref}" s="{DATE_STYLE}"><v>{}</v></c>"#,
                    date_to_serial(*d)
                ));
            }
        }
        CellValue::Bool(b) => {
            out.push_str(&format!(
                r#"<c r="{cell_ref}" t="b"><v>{}</v></c>"#,
                u8::from(*b)
            ));
        }
    }
    Ok(())
}

fn check_text(cell_ref: &str, s: &str) -> Result<(), SerializationError> {
    if let Some(c) = s.chars().find(|c| !is_xml_char(*c)) {
        return Err(SerializationError::InvalidText {
            cell: cell_ref.to_string(),
            codepoint: c as u32,
        });
    }
    let len = s.chars().count();
    if len > MAX_CELL_CHARS {
        return Err(SerializationError::CellTooLong {
            cell: cell_ref.to_string(),
            len,
            max: MAX_CELL_CHARS,
        });
    }
    Ok(())
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"{XML_DECL}<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape(sheet_name)
    )
}

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

const CONTENT_TYPES: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    "</Types>"
);

const ROOT_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    "</Relationships>"
);

const WORKBOOK_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    "</Relationships>"
);

const STYLES: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
    r#"<xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>"#,
    "</styleSheet>"
);
