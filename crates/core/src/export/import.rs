use crate::domain::contract::{RawPredictionRecord, DATE_FORMAT};
use crate::export::xlsx::{column_index, serial_to_date, CellValue, MAX_ROWS};
use crate::export::xml::{attr, tokenize, unescape, XmlEvent};
use crate::export::COLUMNS;
use anyhow::{bail, ensure, Context, Result};
use std::collections::HashSet;
use std::io::{Cursor, Read};

const SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

/// Sheet limits: columns A..=XFD, rows 1..=1_048_576.
const MAX_COLUMNS: usize = 16_384;

/// Reads the first worksheet of an `.xlsx` buffer into rows of cells. Gaps
/// between referenced cells are filled with `CellValue::Empty`.
pub fn read_sheet_rows(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).context("open xlsx archive failed")?;

    let sheet_path = resolve_first_sheet(&mut zip)?;

    let sheet = read_entry(&mut zip, &sheet_path)?
        .with_context(|| format!("worksheet {sheet_path} missing from archive"))?;
    let shared = match read_entry(&mut zip, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let date_styles = match read_entry(&mut zip, "xl/styles.xml")? {
        Some(xml) => parse_date_styles(&xml)?,
        None => HashSet::new(),
    };

    parse_sheet(&sheet, &shared, &date_styles)
}

/// Maps the exported sheet back to raw input rows. The header must begin with
/// `Date, League, Outcome`; the derived `Correct` column is ignored.
pub fn import_from_spreadsheet(bytes: &[u8]) -> Result<Vec<RawPredictionRecord>> {
    let rows = read_sheet_rows(bytes)?;
    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    for (i, expected) in COLUMNS[..3].iter().enumerate() {
        let got = match header.get(i) {
            Some(CellValue::Text(s)) => s.trim(),
            _ => "",
        };
        ensure!(
            got.eq_ignore_ascii_case(expected),
            "unexpected header in column {}: expected {expected:?}, got {got:?}",
            i + 1
        );
    }

    let mut out = Vec::with_capacity(body.len());
    for (i, row) in body.iter().enumerate() {
        if row.iter().all(|c| matches!(c, CellValue::Empty)) {
            continue;
        }
        let cell = |idx: usize| row.get(idx).unwrap_or(&CellValue::Empty);
        out.push(RawPredictionRecord {
            date: cell_as_date_text(cell(0))
                .with_context(|| format!("row {}: unreadable date cell", i + 2))?,
            league: cell_as_text(cell(1)),
            outcome: cell_as_text(cell(2)),
        });
    }
    Ok(out)
}

fn cell_as_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        CellValue::Bool(b) => b.to_string(),
    }
}

fn cell_as_date_text(cell: &CellValue) -> Result<String> {
    match cell {
        CellValue::Date(d) => Ok(d.format(DATE_FORMAT).to_string()),
        // Unstyled serials still count as dates.
        CellValue::Number(n) => serial_to_date(*n)
            .map(|d| d.format(DATE_FORMAT).to_string())
            .with_context(|| format!("serial {n} is not a date")),
        CellValue::Text(s) => Ok(s.clone()),
        CellValue::Empty => Ok(String::new()),
        CellValue::Bool(_) => bail!("boolean in date column"),
    }
}

/// Follows the first `<sheet>` in `xl/workbook.xml` through its relationship
/// target. Bare archives without a workbook part fall back to the worksheet
/// file names.
fn resolve_first_sheet(zip: &mut zip::ZipArchive<Cursor<&[u8]>>) -> Result<String> {
    if let Some(workbook) = read_entry(zip, "xl/workbook.xml")? {
        let rel_id = first_sheet_rel_id(&workbook)?;
        let rels = read_entry(zip, "xl/_rels/workbook.xml.rels")?;
        if let (Some(rel_id), Some(rels)) = (rel_id, rels) {
            let target = relationship_target(&rels, &rel_id)?
                .with_context(|| format!("workbook relationship {rel_id:?} not found"))?;
            return Ok(resolve_part_path("xl/", &target));
        }
    }

    let mut sheets: Vec<String> = zip
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    sheets.sort();
    if sheets.iter().any(|n| n == SHEET_PATH) {
        return Ok(SHEET_PATH.to_string());
    }
    sheets.into_iter().next().context("xlsx has no worksheets")
}

fn first_sheet_rel_id(workbook_xml: &str) -> Result<Option<String>> {
    for ev in tokenize(workbook_xml)? {
        if let XmlEvent::Start { name: "sheet", attrs, .. } = ev {
            return attr(attrs, "id").map(unescape).transpose();
        }
    }
    Ok(None)
}

fn relationship_target(rels_xml: &str, rel_id: &str) -> Result<Option<String>> {
    for ev in tokenize(rels_xml)? {
        if let XmlEvent::Start { name: "Relationship", attrs, .. } = ev {
            if attr(attrs, "Id").map(unescape).transpose()?.as_deref() == Some(rel_id) {
                return attr(attrs, "Target").map(unescape).transpose();
            }
        }
    }
    Ok(None)
}

/// Relationship targets are relative to the source part's folder unless absolute.
fn resolve_part_path(base_dir: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(seg),
        }
    }
    parts.join("/")
}

fn read_entry(
    zip: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>> {
    let mut file = match zip.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("open {name} failed")),
    };
    let mut buf = String::new();
    file.read_to_string(&mut buf)
        .with_context(|| format!("read {name} failed"))?;
    Ok(Some(buf))
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    // Phonetic runs (<rPh>) carry furigana, not cell text.
    let mut in_phonetic = false;

    for ev in tokenize(xml)? {
        match ev {
            XmlEvent::Start { name: "si", empty, .. } => {
                if empty {
                    out.push(String::new());
                } else {
                    current = Some(String::new());
                }
            }
            XmlEvent::End { name: "si" } => {
                out.push(current.take().unwrap_or_default());
            }
            XmlEvent::Start { name: "rPh", empty: false, .. } => in_phonetic = true,
            XmlEvent::End { name: "rPh" } => in_phonetic = false,
            XmlEvent::Start { name: "t", empty: false, .. } => in_text = true,
            XmlEvent::End { name: "t" } => in_text = false,
            ev @ (XmlEvent::Text(_) | XmlEvent::CData(_)) if in_text && !in_phonetic => {
                if let (Some(s), Some(text)) = (current.as_mut(), ev.character_data()?) {
                    s.push_str(&text);
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Indices into `cellXfs` whose number format renders a date.
fn parse_date_styles(xml: &str) -> Result<HashSet<usize>> {
    let mut custom_date_fmts = HashSet::new();
    let mut out = HashSet::new();
    let mut in_cell_xfs = false;
    let mut xf_index = 0usize;

    for ev in tokenize(xml)? {
        match ev {
            XmlEvent::Start { name: "numFmt", attrs, .. } => {
                let id = attr(attrs, "numFmtId").and_then(|s| s.parse::<u32>().ok());
                let code = attr(attrs, "formatCode").map(unescape).transpose()?;
                if let (Some(id), Some(code)) = (id, code) {
                    if is_date_format_code(&code) {
                        custom_date_fmts.insert(id);
                    }
                }
            }
            XmlEvent::Start { name: "cellXfs", empty: false, .. } => in_cell_xfs = true,
            XmlEvent::End { name: "cellXfs" } => in_cell_xfs = false,
            XmlEvent::Start { name: "xf", attrs, .. } if in_cell_xfs => {
                let fmt = attr(attrs, "numFmtId")
                    .and_then(|s| s.parse::<u32>().ok())
                    .unwrap_or(0);
                if is_builtin_date_format(fmt) || custom_date_fmts.contains(&fmt) {
                    out.insert(xf_index);
                }
                xf_index += 1;
            }
            _ => {}
        }
    }
    Ok(out)
}

fn is_builtin_date_format(id: u32) -> bool {
    (14..=22).contains(&id) || (27..=36).contains(&id) || (45..=47).contains(&id) || (50..=58).contains(&id)
}

fn is_date_format_code(code: &str) -> bool {
    // Ignore quoted literals and bracketed colors/locales before looking for date tokens.
    let mut plain = String::new();
    let mut in_quote = false;
    let mut in_bracket = false;
    for c in code.chars() {
        match c {
            '"' => in_quote = !in_quote,
            '[' if !in_quote => in_bracket = true,
            ']' if !in_quote => in_bracket = false,
            _ if !in_quote && !in_bracket => plain.push(c.to_ascii_lowercase()),
            _ => {}
        }
    }
    plain.contains('y') || plain.contains('d')
}

#[derive(Default)]
struct PendingCell {
    column: usize,
    kind: String,
    style: Option<usize>,
    value: String,
    inline: String,
}

fn parse_sheet(
    xml: &str,
    shared: &[String],
    date_styles: &HashSet<usize>,
) -> Result<Vec<Vec<CellValue>>> {
    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    let mut row: Option<Vec<CellValue>> = None;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut in_phonetic = false;

    for ev in tokenize(xml)? {
        match ev {
            XmlEvent::Start { name: "row", attrs, empty } => {
                // Honour explicit row numbers so blank rows keep their position.
                if let Some(r) = attr(attrs, "r").and_then(|s| s.parse::<usize>().ok()) {
                    ensure!(
                        (1..=MAX_ROWS).contains(&r),
                        "row number {r} outside 1..={MAX_ROWS}"
                    );
                    while rows.len() + 1 < r {
                        rows.push(Vec::new());
                    }
                }
                if empty {
                    rows.push(Vec::new());
                } else {
                    row = Some(Vec::new());
                }
            }
            XmlEvent::End { name: "row" } => {
                rows.push(row.take().unwrap_or_default());
            }
            XmlEvent::Start { name: "c", attrs, empty } => {
                let current_len = row.as_ref().map(Vec::len).unwrap_or(0);
                let column = match attr(attrs, "r") {
                    Some(r) => {
                        let letters: String =
                            r.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
                        column_index(&letters)
                            .with_context(|| format!("bad cell reference {r:?}"))?
                    }
                    None => current_len,
                };
                ensure!(
                    column < MAX_COLUMNS,
                    "cell column {} beyond the sheet limit of {MAX_COLUMNS}",
                    column + 1
                );
                let pending = PendingCell {
                    column,
                    kind: attr(attrs, "t").unwrap_or("n").to_string(),
                    style: attr(attrs, "s").and_then(|s| s.parse().ok()),
                    ..Default::default()
                };
                if empty {
                    place_cell(row.as_mut(), pending.column, CellValue::Empty);
                } else {
                    cell = Some(pending);
                }
            }
            XmlEvent::End { name: "c" } => {
                if let Some(pending) = cell.take() {
                    let column = pending.column;
                    let value = finish_cell(pending, shared, date_styles)?;
                    place_cell(row.as_mut(), column, value);
                }
            }
            XmlEvent::Start { name: "v", empty: false, .. } => in_value = true,
            XmlEvent::End { name: "v" } => in_value = false,
            XmlEvent::Start { name: "t", empty: false, .. } => in_inline_text = true,
            XmlEvent::End { name: "t" } => in_inline_text = false,
            XmlEvent::Start { name: "rPh", empty: false, .. } => in_phonetic = true,
            XmlEvent::End { name: "rPh" } => in_phonetic = false,
            ev @ (XmlEvent::Text(_) | XmlEvent::CData(_)) => {
                let Some(pending) = cell.as_mut() else {
                    continue;
                };
                if in_value {
                    if let Some(text) = ev.character_data()? {
                        pending.value.push_str(&text);
                    }
                } else if in_inline_text && !in_phonetic {
                    if let Some(text) = ev.character_data()? {
                        pending.inline.push_str(&text);
                    }
                }
            }
            _ => {}
        }
    }

    // Trailing empty rows are noise.
    while rows.last().is_some_and(|r| r.iter().all(|c| matches!(c, CellValue::Empty))) {
        rows.pop();
    }
    Ok(rows)
}

fn place_cell(row: Option<&mut Vec<CellValue>>, column: usize, value: CellValue) {
    let Some(row) = row else {
        return;
    };
    if row.len() <= column {
        row.resize(column + 1, CellValue::Empty);
    }
    row[column] = value;
}

fn finish_cell(
    pending: PendingCell,
    shared: &[String],
    date_styles: &HashSet<usize>,
) -> Result<CellValue> {
    let raw = pending.value.trim();
    let value = match pending.kind.as_str() {
        "inlineStr" => CellValue::Text(pending.inline),
        "s" => {
            let idx: usize = raw
                .parse()
                .with_context(|| format!("bad shared string index {raw:?}"))?;
            let s = shared
                .get(idx)
                .with_context(|| format!("shared string {idx} out of range"))?;
            CellValue::Text(s.clone())
        }
        "str" => CellValue::Text(pending.value.clone()),
        "b" => CellValue::Bool(raw == "1" || raw.eq_ignore_ascii_case("true")),
        "e" => bail!("cell contains an error value {raw:?}"),
        _ => {
            if raw.is_empty() {
                return Ok(CellValue::Empty);
            }
            let n: f64 = raw
                .parse()
                .with_context(|| format!("bad numeric cell {raw:?}"))?;
            match pending.style {
                Some(s) if date_styles.contains(&s) => match serial_to_date(n) {
                    Some(d) => CellValue::Date(d),
                    None => CellValue::Number(n),
                },
                _ => CellValue::Number(n),
            }
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::xlsx::write_workbook;
    use chrono::NaiveDate;
    use std::io::Write;

    fn workbook_with_parts(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in parts {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn reads_shared_strings_and_custom_date_styles() {
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row>
            <row r="2"><c r="A2" s="1"><v>45871</v></c><c r="B2" t="s"><v>3</v></c><c r="C2" t="s"><v>4</v></c></row>
        </sheetData></worksheet>"#;
        let shared = r#"<sst><si><t>Date</t></si><si><t>League</t></si><si><t>Outcome</t></si>
            <si><r><t>Premier </t></r><r><t>League</t></r></si><si><t>✅ Correct</t></si></sst>"#;
        let styles = r#"<styleSheet><numFmts count="1"><numFmt numFmtId="165" formatCode="dd/mm/yyyy"/></numFmts>
            <cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="165"/></cellXfs></styleSheet>"#;
        let bytes = workbook_with_parts(&[
            ("xl/worksheets/sheet1.xml", sheet),
            ("xl/sharedStrings.xml", shared),
            ("xl/styles.xml", styles),
        ]);

        let raw = import_from_spreadsheet(&bytes).unwrap();
        assert_eq!(
            raw,
            vec![RawPredictionRecord::new("2025-08-02", "Premier League", "✅ Correct")]
        );
    }

    #[test]
    fn fills_gaps_from_cell_references() {
        let sheet = r#"<worksheet><sheetData><row r="2"><c r="C2"><v>7</v></c></row></sheetData></worksheet>"#;
        let bytes = workbook_with_parts(&[("xl/worksheets/sheet1.xml", sheet)]);
        let rows = read_sheet_rows(&bytes).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_empty());
        assert_eq!(
            rows[1],
            vec![CellValue::Empty, CellValue::Empty, CellValue::Number(7.0)]
        );
    }

    #[test]
    fn rejects_unexpected_header() {
        let rows = vec![vec![
            CellValue::Text("When".to_string()),
            CellValue::Text("League".to_string()),
            CellValue::Text("Outcome".to_string()),
        ]];
        let bytes = write_workbook("Sheet", &rows).unwrap();
        assert!(import_from_spreadsheet(&bytes).is_err());
    }

    #[test]
    fn text_dates_pass_through_for_validation() {
        let rows = vec![
            vec![
                CellValue::Text("Date".to_string()),
                CellValue::Text("League".to_string()),
                CellValue::Text("Outcome".to_string()),
            ],
            vec![
                CellValue::Text("not a date".to_string()),
                CellValue::Text("Serie A".to_string()),
                CellValue::Text("Wrong".to_string()),
            ],
            vec![
                CellValue::Date(NaiveDate::from_ymd_opt(2025, 8, 3).unwrap()),
                CellValue::Text("Serie A".to_string()),
                CellValue::Empty,
            ],
        ];
        let bytes = write_workbook("Sheet", &rows).unwrap();
        let raw = import_from_spreadsheet(&bytes).unwrap();
        assert_eq!(raw[0].date, "not a date");
        assert_eq!(raw[1].date, "2025-08-03");
        assert_eq!(raw[1].outcome, "");
    }

    #[test]
    fn detects_date_format_codes() {
        assert!(is_date_format_code("yyyy-mm-dd"));
        assert!(is_date_format_code("[$-409]d-mmm-yy;@"));
        assert!(!is_date_format_code("0.00"));
        assert!(!is_date_format_code("\"day\" 0"));
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        assert!(read_sheet_rows(b"not a zip").is_err());
    }

    fn single_sheet(sheet: &str) -> Vec<u8> {
        workbook_with_parts(&[("xl/worksheets/sheet1.xml", sheet)])
    }

    #[test]
    fn rejects_columns_beyond_xfd() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="ZZZZZZZZZZZZZ1"><v>1</v></c></row></sheetData></worksheet>"#;
        assert!(read_sheet_rows(&single_sheet(sheet)).is_err());

        let sheet = r#"<worksheet><sheetData><row r="1"><c r="XFE1"><v>1</v></c></row></sheetData></worksheet>"#;
        assert!(read_sheet_rows(&single_sheet(sheet)).is_err());

        let sheet = r#"<worksheet><sheetData><row r="1"><c r="XFD1"><v>1</v></c></row></sheetData></worksheet>"#;
        let rows = read_sheet_rows(&single_sheet(sheet)).unwrap();
        assert_eq!(rows[0].len(), 16_384);
    }

    #[test]
    fn rejects_row_numbers_beyond_sheet_limit() {
        let sheet = r#"<worksheet><sheetData><row r="4000000000"><c><v>1</v></c></row></sheetData></worksheet>"#;
        assert!(read_sheet_rows(&single_sheet(sheet)).is_err());

        let sheet = r#"<worksheet><sheetData><row r="0"/></sheetData></worksheet>"#;
        assert!(read_sheet_rows(&single_sheet(sheet)).is_err());
    }

    #[test]
    fn cdata_text_is_read_literally() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t><![CDATA[a>b & c]]></t></is></c></row></sheetData></worksheet>"#;
        let rows = read_sheet_rows(&single_sheet(sheet)).unwrap();
        assert_eq!(rows, vec![vec![CellValue::Text("a>b & c".to_string())]]);

        let shared = r#"<sst><si><t><![CDATA[<La Liga>]]></t></si></sst>"#;
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row></sheetData></worksheet>"#;
        let bytes = workbook_with_parts(&[
            ("xl/worksheets/sheet1.xml", sheet),
            ("xl/sharedStrings.xml", shared),
        ]);
        let rows = read_sheet_rows(&bytes).unwrap();
        assert_eq!(rows, vec![vec![CellValue::Text("<La Liga>".to_string())]]);
    }

    #[test]
    fn inline_strings_skip_phonetic_runs() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><r><t>J1</t></r><rPh sb="0" eb="2"><t>jei</t></rPh></is></c></row></sheetData></worksheet>"#;
        let rows = read_sheet_rows(&single_sheet(sheet)).unwrap();
        assert_eq!(rows, vec![vec![CellValue::Text("J1".to_string())]]);
    }

    #[test]
    fn follows_workbook_relationships_to_first_sheet() {
        let workbook = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>
            <sheet name="Predictions" sheetId="2" r:id="rId7"/>
            <sheet name="Other" sheetId="1" r:id="rId1"/>
        </sheets></workbook>"#;
        let rels = r#"<Relationships>
            <Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId7" Target="/xl/worksheets/data.xml"/>
        </Relationships>"#;
        let other = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData></worksheet>"#;
        let wanted = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>2</v></c></row></sheetData></worksheet>"#;
        let bytes = workbook_with_parts(&[
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", rels),
            ("xl/worksheets/sheet1.xml", other),
            ("xl/worksheets/data.xml", wanted),
        ]);
        let rows = read_sheet_rows(&bytes).unwrap();
        assert_eq!(rows, vec![vec![CellValue::Number(2.0)]]);
    }

    #[test]
    fn resolves_relative_part_paths() {
        assert_eq!(resolve_part_path("xl/", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_part_path("xl/", "/xl/worksheets/a.xml"), "xl/worksheets/a.xml");
        assert_eq!(resolve_part_path("xl/", "../other/b.xml"), "other/b.xml");
    }
}
