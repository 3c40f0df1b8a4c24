//! Minimal xlsx writer: one sheet of records and one line chart.
//!
//! The package parts are written straight into the zip archive as XML text.

use super::{Record, CHART_TITLE, HEADER_DATETIME, HEADER_TEMPERATURE};
use crate::error::ConvertError;
use chrono::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::PathBuf;
use tracing::{debug, warn};
use zip::result::{ZipError, ZipResult};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_DRAWING: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_CHART: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Number format of the Date/Time column and of the chart category axis.
pub const XLSX_DT_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
/// Day number of 1899-12-30 counted from 0001-01-01 as day 1.
const EXCEL_EPOCH_DAYS_FROM_CE: i32 = 693_594;
const SECONDS_PER_DAY: f64 = 86_400.;

// cellXfs indices in styles.xml
const STYLE_DATETIME: u32 = 1;
const STYLE_HEADER: u32 = 2;

/// Anything that can persist the parsed records.
pub trait RecordSink {
    fn emit(&self, records: &[Record]) -> Result<(), ConvertError>;
}

/// Chart placement and labels.
#[derive(Debug, Clone)]
struct ChartSpec {
    title: String,
    x_title: String,
    y_title: String,
    /// 0-based (column, row) of the top-left cell, D5 by default
    anchor: (u32, u32),
    /// size in (columns, rows)
    span: (u32, u32),
    style: u8,
}

impl Default for ChartSpec {
    fn default() -> Self {
        ChartSpec {
            title: CHART_TITLE.to_string(),
            x_title: HEADER_DATETIME.to_string(),
            y_title: HEADER_TEMPERATURE.to_string(),
            anchor: (3, 4),
            span: (9, 15),
            style: 13,
        }
    }
}

/// Writes the records as an xlsx workbook at `path`, overwriting it.
#[derive(Debug, Clone)]
pub struct XlsxEmitter {
    path: PathBuf,
    sheet_name: String,
    chart: ChartSpec,
}

impl XlsxEmitter {
    pub fn new<P: Into<PathBuf>>(path: P) -> XlsxEmitter {
        XlsxEmitter {
            path: path.into(),
            sheet_name: String::from("Sheet1"),
            chart: ChartSpec::default(),
        }
    }

    /// Writes the whole package into `writer` and hands it back.
    /// With no records the chart is left out, an empty range cannot back a series.
    pub fn write_workbook<W: Write + Seek>(&self, writer: W, records: &[Record]) -> ZipResult<W> {
        let with_chart = !records.is_empty();
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        write_content_types(&mut zip, with_chart)?;
        zip.start_file("_rels/.rels", options)?;
        write_relationships(
            &mut zip,
            &[("officeDocument", "xl/workbook.xml")],
        )?;
        zip.start_file("xl/workbook.xml", options)?;
        write_workbook_xml(&mut zip, &self.sheet_name)?;
        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        write_relationships(
            &mut zip,
            &[("worksheet", "worksheets/sheet1.xml"), ("styles", "styles.xml")],
        )?;
        zip.start_file("xl/styles.xml", options)?;
        write_styles(&mut zip)?;
        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        write_sheet(&mut zip, records, with_chart)?;

        if with_chart {
            zip.start_file("xl/worksheets/_rels/sheet1.xml.rels", options)?;
            write_relationships(&mut zip, &[("drawing", "../drawings/drawing1.xml")])?;
            zip.start_file("xl/drawings/drawing1.xml", options)?;
            write_drawing(&mut zip, &self.chart)?;
            zip.start_file("xl/drawings/_rels/drawing1.xml.rels", options)?;
            write_relationships(&mut zip, &[("chart", "../charts/chart1.xml")])?;
            zip.start_file("xl/charts/chart1.xml", options)?;
            write_chart(&mut zip, &self.chart, &self.sheet_name, records.len())?;
        } else {
            warn!("no records, writing the header row without a chart");
        }
        zip.finish()
    }
}

impl RecordSink for XlsxEmitter {
    fn emit(&self, records: &[Record]) -> Result<(), ConvertError> {
        let unwritable = |source| ConvertError::OutputUnwritable {
            path: self.path.clone(),
            source,
        };
        let file = File::create(&self.path).map_err(unwritable)?;
        let mut buf = self
            .write_workbook(BufWriter::new(file), records)
            .map_err(|e| match e {
                ZipError::Io(source) => unwritable(source),
                source => ConvertError::Packaging {
                    path: self.path.clone(),
                    source,
                },
            })?;
        buf.flush().map_err(unwritable)?;
        debug!("wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// Spreadsheet serial date: days since 1899-12-30, time as the fraction.
pub fn excel_serial(t: NaiveDateTime) -> f64 {
    let days = t.date().num_days_from_ce() - EXCEL_EPOCH_DAYS_FROM_CE;
    days as f64 + t.time().num_seconds_from_midnight() as f64 / SECONDS_PER_DAY
}

/// 0-based column index to letters: 0 -> A, 25 -> Z, 26 -> AA
pub fn column_letters(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// `'Sheet1'!$B$2:$B$11`
fn absolute_range(sheet: &str, col: u32, first_row: usize, last_row: usize) -> String {
    let letters = column_letters(col);
    let sheet = sheet.replace('\'', "''");
    if first_row == last_row {
        format!("'{}'!${}${}", sheet, letters, first_row)
    } else {
        format!(
            "'{}'!${}${}:${}${}",
            sheet, letters, first_row, letters, last_row
        )
    }
}

fn write_content_types<W: Write>(w: &mut W, with_chart: bool) -> std::io::Result<()> {
    write!(w, "{}", XML_DECL)?;
    write!(
        w,
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#
    )?;
    write!(
        w,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#
    )?;
    write!(w, r#"<Default Extension="xml" ContentType="application/xml"/>"#)?;
    let mut overrides = vec![
        (
            "/xl/workbook.xml",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
        ),
        (
            "/xl/worksheets/sheet1.xml",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
        ),
        (
            "/xl/styles.xml",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
        ),
    ];
    if with_chart {
        overrides.push((
            "/xl/drawings/drawing1.xml",
            "application/vnd.openxmlformats-officedocument.drawing+xml",
        ));
        overrides.push((
            "/xl/charts/chart1.xml",
            "application/vnd.openxmlformats-officedocument.drawingml.chart+xml",
        ));
    }
    for (part, content_type) in overrides.iter() {
        write!(
            w,
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            part, content_type
        )?;
    }
    write!(w, "</Types>")
}

/// Relationship ids are assigned in order: rId1, rId2, ...
fn write_relationships<W: Write>(w: &mut W, rels: &[(&str, &str)]) -> std::io::Result<()> {
    write!(w, "{}", XML_DECL)?;
    write!(w, r#"<Relationships xmlns="{}">"#, NS_PKG_REL)?;
    for (i, (kind, target)) in rels.iter().enumerate() {
        write!(
            w,
            r#"<Relationship Id="rId{}" Type="{}/{}" Target="{}"/>"#,
            i + 1,
            NS_REL,
            kind,
            target
        )?;
    }
    write!(w, "</Relationships>")
}

fn write_workbook_xml<W: Write>(w: &mut W, sheet_name: &str) -> std::io::Result<()> {
    write!(w, "{}", XML_DECL)?;
    write!(w, r#"<workbook xmlns="{}" xmlns:r="{}">"#, NS_MAIN, NS_REL)?;
    write!(
        w,
        r#"<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets>"#,
        escape_xml(sheet_name)
    )?;
    write!(w, "</workbook>")
}

fn write_styles<W: Write>(w: &mut W) -> std::io::Result<()> {
    write!(w, "{}", XML_DECL)?;
    write!(w, r#"<styleSheet xmlns="{}">"#, NS_MAIN)?;
    write!(
        w,
        r#"<numFmts count="1"><numFmt numFmtId="164" formatCode="{}"/></numFmts>"#,
        XLSX_DT_FORMAT
    )?;
    write!(
        w,
        r#"<fonts count="2"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font><font><b/><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>"#
    )?;
    write!(
        w,
        r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#
    )?;
    write!(
        w,
        r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#
    )?;
    write!(
        w,
        r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#
    )?;
    write!(w, r#"<cellXfs count="3">"#)?;
    write!(w, r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#)?;
    write!(
        w,
        r#"<xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#
    )?;
    write!(
        w,
        r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/>"#
    )?;
    write!(w, "</cellXfs>")?;
    write!(
        w,
        r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#
    )?;
    write!(w, "</styleSheet>")
}

fn write_inline_str<W: Write>(w: &mut W, cell: &str, style: u32, text: &str) -> std::io::Result<()> {
    write!(
        w,
        r#"<c r="{}" s="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
        cell,
        style,
        escape_xml(text)
    )
}

/// Header in row 1, one row per record from row 2, in the order given.
fn write_sheet<W: Write>(w: &mut W, records: &[Record], with_drawing: bool) -> std::io::Result<()> {
    write!(w, "{}", XML_DECL)?;
    write!(w, r#"<worksheet xmlns="{}" xmlns:r="{}">"#, NS_MAIN, NS_REL)?;
    write!(w, r#"<dimension ref="A1:B{}"/>"#, records.len() + 1)?;
    write!(
        w,
        r#"<cols><col min="1" max="1" width="20.7109375" customWidth="1"/><col min="2" max="2" width="18.7109375" customWidth="1"/></cols>"#
    )?;
    write!(w, "<sheetData>")?;
    write!(w, r#"<row r="1">"#)?;
    write_inline_str(w, "A1", STYLE_HEADER, HEADER_DATETIME)?;
    write_inline_str(w, "B1", STYLE_HEADER, HEADER_TEMPERATURE)?;
    write!(w, "</row>")?;
    for (i, record) in records.iter().enumerate() {
        let r = i + 2;
        write!(
            w,
            r#"<row r="{r}"><c r="A{r}" s="{s}"><v>{t}</v></c><c r="B{r}"><v>{c}</v></c></row>"#,
            r = r,
            s = STYLE_DATETIME,
            t = excel_serial(record.time()),
            c = record.celsius()
        )?;
    }
    write!(w, "</sheetData>")?;
    if with_drawing {
        write!(w, r#"<drawing r:id="rId1"/>"#)?;
    }
    write!(w, "</worksheet>")
}

fn write_drawing<W: Write>(w: &mut W, spec: &ChartSpec) -> std::io::Result<()> {
    let (col, row) = spec.anchor;
    let (cols, rows) = spec.span;
    write!(w, "{}", XML_DECL)?;
    write!(w, r#"<xdr:wsDr xmlns:xdr="{}" xmlns:a="{}">"#, NS_DRAWING, NS_A)?;
    write!(w, "<xdr:twoCellAnchor>")?;
    write!(
        w,
        "<xdr:from><xdr:col>{}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>",
        col, row
    )?;
    write!(
        w,
        "<xdr:to><xdr:col>{}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>",
        col + cols,
        row + rows
    )?;
    write!(
        w,
        r#"<xdr:graphicFrame macro=""><xdr:nvGraphicFramePr><xdr:cNvPr id="2" name="Chart 1"/><xdr:cNvGraphicFramePr/></xdr:nvGraphicFramePr>"#
    )?;
    write!(
        w,
        r#"<xdr:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/></xdr:xfrm>"#
    )?;
    write!(
        w,
        r#"<a:graphic><a:graphicData uri="{c}"><c:chart xmlns:c="{c}" xmlns:r="{r}" r:id="rId1"/></a:graphicData></a:graphic>"#,
        c = NS_CHART,
        r = NS_REL
    )?;
    write!(w, "</xdr:graphicFrame><xdr:clientData/></xdr:twoCellAnchor>")?;
    write!(w, "</xdr:wsDr>")
}

fn write_title<W: Write>(w: &mut W, text: &str) -> std::io::Result<()> {
    write!(
        w,
        r#"<c:title><c:tx><c:rich><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></c:rich></c:tx><c:overlay val="0"/></c:title>"#,
        escape_xml(text)
    )
}

/// Line chart over `rows` data rows. The series name points at the header
/// cell B1 and the values start at row 2, so the header is never plotted.
fn write_chart<W: Write>(
    w: &mut W,
    spec: &ChartSpec,
    sheet: &str,
    rows: usize,
) -> std::io::Result<()> {
    let last_row = rows + 1;
    write!(w, "{}", XML_DECL)?;
    write!(
        w,
        r#"<c:chartSpace xmlns:c="{}" xmlns:a="{}" xmlns:r="{}">"#,
        NS_CHART, NS_A, NS_REL
    )?;
    write!(w, r#"<c:roundedCorners val="0"/>"#)?;
    write!(w, r#"<c:style val="{}"/>"#, spec.style)?;
    write!(w, "<c:chart>")?;
    write_title(w, &spec.title)?;
    write!(w, r#"<c:autoTitleDeleted val="0"/>"#)?;
    write!(w, "<c:plotArea><c:layout/>")?;

    write!(
        w,
        r#"<c:lineChart><c:grouping val="standard"/><c:varyColors val="0"/>"#
    )?;
    write!(w, r#"<c:ser><c:idx val="0"/><c:order val="0"/>"#)?;
    write!(
        w,
        "<c:tx><c:strRef><c:f>{}</c:f></c:strRef></c:tx>",
        escape_xml(&absolute_range(sheet, 1, 1, 1))
    )?;
    write!(w, r#"<c:marker><c:symbol val="none"/></c:marker>"#)?;
    write!(
        w,
        "<c:cat><c:numRef><c:f>{}</c:f></c:numRef></c:cat>",
        escape_xml(&absolute_range(sheet, 0, 2, last_row))
    )?;
    write!(
        w,
        "<c:val><c:numRef><c:f>{}</c:f></c:numRef></c:val>",
        escape_xml(&absolute_range(sheet, 1, 2, last_row))
    )?;
    write!(w, r#"<c:smooth val="0"/></c:ser>"#)?;
    write!(
        w,
        r#"<c:marker val="1"/><c:axId val="10"/><c:axId val="100"/></c:lineChart>"#
    )?;

    write!(
        w,
        r#"<c:catAx><c:axId val="10"/><c:scaling><c:orientation val="minMax"/></c:scaling><c:delete val="0"/><c:axPos val="b"/>"#
    )?;
    write_title(w, &spec.x_title)?;
    write!(
        w,
        r#"<c:numFmt formatCode="{}" sourceLinked="1"/><c:majorTickMark val="out"/><c:minorTickMark val="none"/><c:tickLblPos val="nextTo"/>"#,
        XLSX_DT_FORMAT
    )?;
    write!(
        w,
        r#"<c:crossAx val="100"/><c:crosses val="autoZero"/><c:auto val="1"/><c:lblAlgn val="ctr"/><c:lblOffset val="100"/><c:noMultiLvlLbl val="0"/></c:catAx>"#
    )?;

    write!(
        w,
        r#"<c:valAx><c:axId val="100"/><c:scaling><c:orientation val="minMax"/></c:scaling><c:delete val="0"/><c:axPos val="l"/><c:majorGridlines/>"#
    )?;
    write_title(w, &spec.y_title)?;
    write!(
        w,
        r#"<c:numFmt formatCode="General" sourceLinked="1"/><c:majorTickMark val="out"/><c:minorTickMark val="none"/><c:tickLblPos val="nextTo"/>"#
    )?;
    write!(
        w,
        r#"<c:crossAx val="10"/><c:crosses val="autoZero"/><c:crossBetween val="between"/></c:valAx>"#
    )?;

    write!(w, "</c:plotArea>")?;
    write!(
        w,
        r#"<c:legend><c:legendPos val="r"/><c:overlay val="0"/></c:legend><c:plotVisOnly val="1"/>"#
    )?;
    write!(w, "</c:chart></c:chartSpace>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn dt(d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn read_part(bytes: &[u8], name: &str) -> Option<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).ok()?;
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        Some(s)
    }

    fn package(records: &[Record]) -> Vec<u8> {
        XlsxEmitter::new("unused.xlsx")
            .write_workbook(Cursor::new(Vec::new()), records)
            .unwrap()
            .into_inner()
    }

    #[test]
    fn serial_dates() {
        assert_eq!(excel_serial(dt(9, 0, 0, 0)), 45605.);
        assert_eq!(excel_serial(dt(9, 12, 0, 0)), 45605.5);
        assert_eq!(excel_serial(dt(10, 6, 0, 0)), 45606.25);
    }

    #[test]
    fn letters_for_columns() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(3), "D");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn ranges_are_absolute_and_quoted() {
        assert_eq!(absolute_range("Sheet1", 1, 1, 1), "'Sheet1'!$B$1");
        assert_eq!(absolute_range("Sheet1", 0, 2, 11), "'Sheet1'!$A$2:$A$11");
        assert_eq!(absolute_range("Bob's", 1, 2, 3), "'Bob''s'!$B$2:$B$3");
    }

    #[test]
    fn rows_follow_record_order() {
        let records = [
            Record::new(dt(9, 12, 0, 0), 41.5),
            Record::new(dt(9, 0, 0, 0), -2.25),
        ];
        let sheet = read_part(&package(&records), "xl/worksheets/sheet1.xml").unwrap();
        assert!(sheet.contains(r#"<dimension ref="A1:B3"/>"#));
        assert!(sheet.contains("<t>Date/Time</t>"));
        assert!(sheet.contains("<t>Temperature (°C)</t>"));
        let first = sheet.find("<v>45605.5</v>").unwrap();
        let second = sheet.find("<v>45605</v>").unwrap();
        assert!(first < second);
        assert!(sheet.contains(r#"<c r="B3"><v>-2.25</v></c>"#));
        assert!(sheet.contains(r#"<drawing r:id="rId1"/>"#));
    }

    #[test]
    fn chart_series_starts_below_header() {
        let records: Vec<Record> = (0..10)
            .map(|m| Record::new(dt(9, 10, m, 0), 40. + m as f64))
            .collect();
        let chart = read_part(&package(&records), "xl/charts/chart1.xml").unwrap();
        assert!(chart.contains("<c:tx><c:strRef><c:f>&apos;Sheet1&apos;!$B$1</c:f>"));
        assert!(chart.contains("<c:cat><c:numRef><c:f>&apos;Sheet1&apos;!$A$2:$A$11</c:f>"));
        assert!(chart.contains("<c:val><c:numRef><c:f>&apos;Sheet1&apos;!$B$2:$B$11</c:f>"));
        assert!(chart.contains("<a:t>Temperature Over Time</a:t>"));
        assert!(chart.contains("<a:t>Date/Time</a:t>"));
        assert!(chart.contains("<a:t>Temperature (°C)</a:t>"));
        assert!(chart.contains(r#"<c:style val="13"/>"#));
    }

    #[test]
    fn chart_anchored_at_d5() {
        let records = [Record::new(dt(9, 0, 0, 0), 1.)];
        let drawing = read_part(&package(&records), "xl/drawings/drawing1.xml").unwrap();
        assert!(drawing.contains(
            "<xdr:from><xdr:col>3</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>4</xdr:row>"
        ));
    }

    #[test]
    fn no_records_no_chart() {
        let bytes = package(&[]);
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml").unwrap();
        assert!(sheet.contains(r#"<dimension ref="A1:B1"/>"#));
        assert!(!sheet.contains("<drawing"));
        assert!(read_part(&bytes, "xl/charts/chart1.xml").is_none());
        let types = read_part(&bytes, "[Content_Types].xml").unwrap();
        assert!(!types.contains("chart"));
    }
}
