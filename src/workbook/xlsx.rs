// src/workbook/xlsx.rs
//! Minimal Office Open XML reader: just enough of an `.xlsx` package to pull
//! every worksheet out as a grid of strings.

use anyhow::{anyhow, Context, Result};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};
use tracing::{debug, trace};
use zip::{result::ZipError, ZipArchive};

use super::RawTable;
use crate::error::PipelineError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Sheet bounds of the format (`XFD1048576`).
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;
/// Upper bound on the buffer reserved from a part's declared size.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Open `path` and read every worksheet into a [`RawTable`].
pub fn load_xlsx<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, RawTable>> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open workbook: {:?}", path.as_ref()))?;
    load_xlsx_from_reader(BufReader::new(file))
}

/// Same as [`load_xlsx`], for an already opened archive stream.
pub fn load_xlsx_from_reader<R: Read + Seek>(reader: R) -> Result<BTreeMap<String, RawTable>> {
    let mut archive = ZipArchive::new(reader).context("Failed to read workbook archive")?;

    // 1) sheet name → relationship id → part path
    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?
        .ok_or_else(|| PipelineError::InvalidWorkbook(format!("missing {}", WORKBOOK_PART)))?;
    let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?.ok_or_else(|| {
        PipelineError::InvalidWorkbook(format!("missing {}", WORKBOOK_RELS_PART))
    })?;
    let sheets = parse_workbook_sheets(&workbook_xml)?;
    let targets = parse_relationships(&rels_xml)?;

    // 2) shared strings are optional: a workbook of numbers has none
    let shared = match read_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    debug!(
        sheets = sheets.len(),
        shared_strings = shared.len(),
        "workbook index read"
    );

    // 3) each worksheet, in workbook order
    let mut tables = BTreeMap::new();
    for (name, rel_id) in sheets {
        let target = targets.get(&rel_id).ok_or_else(|| {
            PipelineError::InvalidWorkbook(format!(
                "sheet `{}` points at unknown relationship `{}`",
                name, rel_id
            ))
        })?;
        let part = resolve_target(target);
        let xml = read_part(&mut archive, &part)?.ok_or_else(|| {
            PipelineError::InvalidWorkbook(format!("sheet `{}` part {} is missing", name, part))
        })?;
        let grid = parse_worksheet(&xml, &shared)
            .with_context(|| format!("parsing worksheet `{}` ({})", name, part))?;
        trace!(sheet = %name, rows = grid.len(), "worksheet parsed");
        tables.insert(name, RawTable::from_grid(grid));
    }

    Ok(tables)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to access {} in workbook", name)),
    };
    let declared = usize::try_from(entry.size()).unwrap_or(usize::MAX);
    let mut text = String::with_capacity(declared.min(MAX_PREALLOC));
    entry
        .read_to_string(&mut text)
        .with_context(|| format!("Failed to read {} into memory", name))?;
    Ok(Some(text))
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn attr_value(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Append character data from a text-ish event to `out`.
fn push_text(out: &mut String, event: &Event<'_>) -> Result<()> {
    match event {
        Event::Text(t) => out.push_str(&t.decode()?),
        Event::CData(c) => out.push_str(&c.decode()?),
        Event::GeneralRef(r) => {
            if let Some(ch) = r.resolve_char_ref()? {
                out.push(ch);
            } else {
                let name = r.decode()?;
                match resolve_predefined_entity(&name) {
                    Some(resolved) => out.push_str(resolved),
                    None => {
                        out.push('&');
                        out.push_str(&name);
                        out.push(';');
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// `<sheet name=".." r:id=".."/>` entries of `xl/workbook.xml`, in order.
fn parse_workbook_sheets(xml: &str) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(&e, b"name")?
                    .ok_or_else(|| anyhow!("workbook sheet entry without a name"))?;
                let id = attr_value(&e, b"id")?
                    .ok_or_else(|| anyhow!("workbook sheet `{}` without a relationship id", name))?;
                sheets.push((name, id));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

/// Relationship id → target of `xl/_rels/workbook.xml.rels`.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) =
                    (attr_value(&e, b"Id")?, attr_value(&e, b"Target")?)
                {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

/// The shared string table. Rich-text runs are concatenated; phonetic hints
/// (`<rPh>`) are not part of the value.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();

    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf)?;
        match &event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_item && !in_phonetic => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_item = false;
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(_) | Event::CData(_) | Event::GeneralRef(_) if in_text => {
                push_text(&mut current, &event)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Zero-based column of an `A1`-style reference (`"AB12"` → 27). `None` past
/// the last column of a sheet.
fn column_from_ref(cell_ref: &str) -> Option<usize> {
    let mut col = 0usize;
    for b in cell_ref.bytes().take_while(u8::is_ascii_alphabetic) {
        let digit = (b.to_ascii_uppercase() - b'A' + 1) as usize;
        col = col.checked_mul(26)?.checked_add(digit)?;
        if col > MAX_COLUMNS {
            return None;
        }
    }
    col.checked_sub(1)
}

/// Zero-based index of a `<row r="..">`, when present and within sheet bounds.
fn row_index(e: &BytesStart<'_>) -> Result<Option<usize>> {
    Ok(attr_value(e, b"r")?
        .and_then(|r| r.trim().parse::<usize>().ok())
        .filter(|r| (1..=MAX_ROWS).contains(r))
        .map(|r| r - 1))
}

/// Rows a worksheet leaves out are blank; fill them so later rows keep their
/// position.
fn pad_rows(grid: &mut Vec<Vec<String>>, index: Option<usize>) {
    if let Some(index) = index {
        if grid.len() < index {
            grid.resize(index, Vec::new());
        }
    }
}

#[derive(Default)]
struct CellState {
    column: usize,
    kind: Option<String>,
    value: String,
}

/// Decode a finished `<c>` into the string the rest of the pipeline sees.
fn resolve_cell(cell: CellState, shared: &[String]) -> Result<String> {
    let raw = cell.value;
    let value = match cell.kind.as_deref() {
        Some("s") => {
            let idx: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("bad shared string index {:?}", raw))?;
            shared
                .get(idx)
                .cloned()
                .ok_or_else(|| anyhow!("shared string index {} out of range", idx))?
        }
        Some("b") => match raw.trim() {
            "1" => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        },
        // numbers, formula strings, inline strings and error codes stay as written
        _ => raw,
    };
    Ok(value)
}

/// All `<row>`s of a worksheet as a dense grid.
fn parse_worksheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut grid: Vec<Vec<String>> = Vec::new();

    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<CellState> = None;
    let mut in_value = false;

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf)?;
        match &event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    pad_rows(&mut grid, row_index(e)?);
                    row = Some(Vec::new());
                }
                b"c" => {
                    let next = row.as_ref().map_or(0, Vec::len);
                    let column = attr_value(e, b"r")?
                        .and_then(|r| column_from_ref(&r))
                        .unwrap_or(next);
                    cell = Some(CellState {
                        column,
                        kind: attr_value(e, b"t")?,
                        value: String::new(),
                    });
                }
                b"v" | b"t" if cell.is_some() => in_value = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    pad_rows(&mut grid, row_index(e)?);
                    grid.push(Vec::new());
                }
                // a valueless <c/> only carries styling
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let (Some(done), Some(cells)) = (cell.take(), row.as_mut()) {
                        let column = done.column;
                        let value = resolve_cell(done, shared)?;
                        if cells.len() <= column {
                            cells.resize(column + 1, String::new());
                        }
                        cells[column] = value;
                    }
                }
                b"row" => {
                    if let Some(done) = row.take() {
                        grid.push(done);
                    }
                }
                _ => {}
            },
            Event::Text(_) | Event::CData(_) | Event::GeneralRef(_) if in_value => {
                if let Some(c) = cell.as_mut() {
                    push_text(&mut c.value, &event)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(grid)
}


#[cfg(test)]
mod tests {
    use super::fixture::{build_xlsx, Cell};
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    #[test]
    fn test_column_from_ref() {
        assert_eq!(column_from_ref("A1"), Some(0));
        assert_eq!(column_from_ref("C7"), Some(2));
        assert_eq!(column_from_ref("Z3"), Some(25));
        assert_eq!(column_from_ref("AA10"), Some(26));
        assert_eq!(column_from_ref("AB12"), Some(27));
        assert_eq!(column_from_ref("XFD1"), Some(16_383));
        assert_eq!(column_from_ref("12"), None);
        assert_eq!(column_from_ref("XFE1"), None);
        assert_eq!(column_from_ref(&"Z".repeat(64)), None);
    }

    #[test]
    fn test_bogus_cell_ref_falls_back_to_position() -> Result<()> {
        let xml = format!(
            r#"<worksheet><sheetData><row r="1"><c r="{}1"><v>7</v></c><c r="B1"><v>8</v></c></row></sheetData></worksheet>"#,
            "Z".repeat(64)
        );
        let grid = parse_worksheet(&xml, &[])?;
        assert_eq!(grid, vec![vec!["7".to_string(), "8".to_string()]]);
        Ok(())
    }

    #[test]
    fn test_omitted_rows_keep_sheet_position() -> Result<()> {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1"><v>1</v></c></row>
            <row r="4"><c r="A4"><v>4</v></c></row>
            <row r="9999999"><c r="A5"><v>5</v></c></row>
            </sheetData></worksheet>"#;
        let grid = parse_worksheet(xml, &[])?;
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[0], vec!["1"]);
        assert!(grid[1].is_empty() && grid[2].is_empty());
        assert_eq!(grid[3], vec!["4"]);
        assert_eq!(grid[4], vec!["5"]);
        Ok(())
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn test_shared_strings_rich_text_and_entities() -> Result<()> {
        let xml = r#"<sst><si><t>Porto Velho (RO)</t></si><si><r><t>São </t></r><r><t>Paulo</t></r><rPh><t>x</t></rPh></si><si/><si><t>A &amp; B</t></si></sst>"#;
        let strings = parse_shared_strings(xml)?;
        assert_eq!(
            strings,
            vec!["Porto Velho (RO)", "São Paulo", "", "A & B"]
        );
        Ok(())
    }

    #[test]
    fn test_worksheet_sparse_cells_and_types() -> Result<()> {
        let shared = vec!["Estado".to_string(), "Acre".to_string()];
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="inlineStr"><is><t>Flag</t></is></c></row>
            <row r="2"/>
            <row r="3"><c r="A3" t="s"><v>1</v></c><c r="B3"><v>1.5E3</v></c><c r="C3" t="b"><v>1</v></c><c r="D3" s="2"/></row>
            </sheetData></worksheet>"#;
        let grid = parse_worksheet(xml, &shared)?;
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0], vec!["Estado", "", "Flag"]);
        assert!(grid[1].is_empty());
        assert_eq!(grid[2], vec!["Acre", "1.5E3", "TRUE"]);
        Ok(())
    }

    #[test]
    fn test_load_xlsx_roundtrip_from_file() -> Result<()> {
        let bytes = build_xlsx(&[
            (
                "UF_Regiao",
                vec![
                    vec![Cell::Text("Estado"), Cell::Text("Regiao")],
                    vec![Cell::Text("Acre"), Cell::Text("N")],
                    vec![Cell::Text("Bahia"), Cell::Text("NE")],
                ],
            ),
            (
                "PIB_municipio",
                vec![
                    vec![Cell::Text("Municipio"), Cell::Text("Cod_Identificacao"), Cell::Text("PIB")],
                    vec![Cell::Text("Rio Branco (AC)"), Cell::Number(1200401.0), Cell::Number(8.5)],
                ],
            ),
        ])?;
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(&bytes)?;

        let tables = load_xlsx(tmp.path())?;
        assert_eq!(tables.len(), 2);

        let regions = &tables["UF_Regiao"];
        assert_eq!(regions.headers, vec!["Estado", "Regiao"]);
        assert_eq!(regions.rows.len(), 2);
        assert_eq!(regions.rows[1], vec!["Bahia", "NE"]);

        let gdp = &tables["PIB_municipio"];
        assert_eq!(gdp.rows[0], vec!["Rio Branco (AC)", "1200401", "8.5"]);
        Ok(())
    }

    #[test]
    fn test_missing_workbook_part_is_invalid() -> Result<()> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file("readme.txt", options)?;
            zip.write_all(b"not a workbook")?;
            zip.finish()?;
        }

        let err = load_xlsx_from_reader(Cursor::new(buf)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidWorkbook(_))
        ));
        Ok(())
    }
}
