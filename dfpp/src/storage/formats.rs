//! File formats understood by the dataset store. Reading is dispatched on the file extension,
//! writing always produces zstd-compressed parquet.

use std::ffi::OsStr;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use enum_dispatch::enum_dispatch;
use log::debug;
use polars::prelude::*;
use strum_macros::EnumString;

use crate::error::{DfppError, DfppResult};

/// Options applied when reading a dataset. Column selection and the row limit apply to every
/// format, the remaining options only to the format they name.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    pub columns: Option<Vec<String>>,
    pub n_rows: Option<usize>,
    /// CSV field separator.
    pub separator: u8,
    /// Whether the first CSV or spreadsheet row holds the column names.
    pub has_header: bool,
    /// Spreadsheet to read, the first one in the workbook if not given.
    pub sheet_name: Option<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            columns: None,
            n_rows: None,
            separator: b',',
            has_header: true,
            sheet_name: None,
        }
    }
}

impl ReadOptions {
    fn apply(&self, df: DataFrame) -> DfppResult<DataFrame> {
        let df = match &self.columns {
            Some(columns) => df.select(columns.iter().map(String::as_str))?,
            None => df,
        };
        Ok(match self.n_rows {
            Some(n_rows) => df.head(Some(n_rows)),
            None => df,
        })
    }
}

#[enum_dispatch]
pub trait DatasetReader {
    fn decode(&self, bytes: Vec<u8>, options: &ReadOptions) -> DfppResult<DataFrame>;

    fn read(&self, bytes: Vec<u8>, options: &ReadOptions) -> DfppResult<DataFrame> {
        options.apply(self.decode(bytes, options)?)
    }
}

#[enum_dispatch(DatasetReader)]
#[derive(Debug, Clone, Copy, PartialEq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DatasetFormat {
    Parquet(ParquetFormat),
    Csv(CsvFormat),
    Xlsx(XlsxFormat),
}

impl DatasetFormat {
    /// Selects the format from the extension of `path`.
    pub fn from_path(path: &str) -> DfppResult<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or_default();
        extension.parse().map_err(|_| {
            DfppError::UnsupportedFormat(if extension.is_empty() {
                String::new()
            } else {
                format!(".{extension}")
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParquetFormat;

impl DatasetReader for ParquetFormat {
    fn decode(&self, bytes: Vec<u8>, _options: &ReadOptions) -> DfppResult<DataFrame> {
        Ok(ParquetReader::new(Cursor::new(bytes)).finish()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CsvFormat;

impl DatasetReader for CsvFormat {
    fn decode(&self, bytes: Vec<u8>, options: &ReadOptions) -> DfppResult<DataFrame> {
        Ok(CsvReadOptions::default()
            .with_has_header(options.has_header)
            .with_parse_options(CsvParseOptions::default().with_separator(options.separator))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XlsxFormat;

impl DatasetReader for XlsxFormat {
    fn decode(&self, bytes: Vec<u8>, options: &ReadOptions) -> DfppResult<DataFrame> {
        let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))?;
        let sheet = match &options.sheet_name {
            Some(sheet) => sheet.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or(DfppError::EmptyWorkbook)?,
        };
        debug!("Reading sheet '{sheet}'");
        let range = workbook.worksheet_range(&sheet)?;

        let mut rows = range.rows();
        let header: Vec<String> = if options.has_header {
            rows.next()
                .map(|row| row.iter().map(header_name).collect())
                .unwrap_or_default()
        } else {
            vec![]
        };
        let rows: Vec<&[Data]> = rows.collect();
        let columns = (0..range.width())
            .map(|idx| {
                let name = header
                    .get(idx)
                    .filter(|name| !name.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", idx + 1));
                let cells: Vec<&Data> = rows.iter().map(|row| &row[idx]).collect();
                cells_to_series(&name, &cells)
            })
            .collect::<Vec<_>>();
        Ok(DataFrame::new(columns)?)
    }
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Types a spreadsheet column: integers, then floats, then booleans, falling back to strings.
fn cells_to_series(name: &str, cells: &[&Data]) -> Series {
    let filled = || cells.iter().filter(|cell| !matches!(cell, Data::Empty));
    let numeric = |cell: &Data| match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        _ => None,
    };

    if filled().next().is_none() {
        return Series::full_null(name, cells.len(), &DataType::String);
    }
    if filled().all(|cell| numeric(cell).is_some_and(|n| n.fract() == 0.0)) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|cell| numeric(cell).map(|n| n as i64))
            .collect();
        return Series::new(name, values);
    }
    if filled().all(|cell| numeric(cell).is_some()) {
        let values: Vec<Option<f64>> = cells.iter().map(|cell| numeric(cell)).collect();
        return Series::new(name, values);
    }
    if filled().all(|cell| matches!(cell, Data::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Series::new(name, values);
    }
    let values: Vec<Option<String>> = cells
        .iter()
        .map(|cell| match cell {
            Data::Empty => None,
            other => Some(other.to_string()),
        })
        .collect();
    Series::new(name, values)
}

/// Serialises a data frame to zstd-compressed parquet.
pub fn encode_parquet(df: &DataFrame) -> DfppResult<Vec<u8>> {
    let mut buffer: Vec<u8> = vec![];
    ParquetWriter::new(&mut buffer)
        .with_compression(ParquetCompression::Zstd(None))
        .finish(&mut df.clone())?;
    Ok(buffer)
}
