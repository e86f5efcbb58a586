use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{row, Cell, COLUMNS, SHEET_NAME};
use crate::record::ProductRecord;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape(SHEET_NAME)
    )
}

/// `A`, `B`, ... `Z`, `AA`, ...
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn write_cell(xml: &mut String, reference: &str, cell: &Cell) -> std::fmt::Result {
    match cell {
        Cell::Empty => Ok(()),
        Cell::Number(n) => write!(xml, r#"<c r="{reference}"><v>{n}</v></c>"#),
        Cell::Text(s) => write!(
            xml,
            r#"<c r="{reference}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            escape(s.as_str())
        ),
    }
}

fn sheet_xml(records: &[ProductRecord]) -> anyhow::Result<String> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    let header: Vec<Cell> = COLUMNS.iter().map(|c| Cell::Text(c.to_string())).collect();
    let mut rows = vec![header];
    for record in records {
        rows.push(row(record)?);
    }

    for (r, cells) in rows.iter().enumerate() {
        let number = r + 1;
        write!(xml, r#"<row r="{number}">"#)?;
        for (c, cell) in cells.iter().enumerate() {
            write_cell(&mut xml, &format!("{}{}", column_name(c), number), cell)?;
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    Ok(xml)
}

/// Writes a one-sheet workbook: a header row, then one row per record.
pub fn write_workbook(path: &Path, records: &[ProductRecord]) -> anyhow::Result<()> {
    let sheet = sheet_xml(records)?;
    let workbook = workbook_xml();
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(File::create(path)?);
    let parts: [(&str, &str); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", &workbook),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", &sheet),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

/// Writes `<dir>/<name>.xlsx`, replacing any earlier file.
pub fn save_record(dir: &Path, name: &str, record: &ProductRecord) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{name}.xlsx"));
    write_workbook(&path, std::slice::from_ref(record))?;
    info!("Saved record to {}", path.display());
    Ok(path)
}
