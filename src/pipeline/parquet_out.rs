use parquet::basic::{Compression, LogicalType, Repetition, Type as PhysicalType};
use parquet::data_type::{ByteArray, ByteArrayType, DataType, DoubleType, Int32Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::{SerializedFileWriter, SerializedRowGroupWriter};
use parquet::schema::types::{Type, TypePtr};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::model::{EnrichedFact, EnrichedTable};

/// Rows per row group; bounds writer memory on large periods.
const ROW_GROUP_ROWS: usize = 250_000;

fn primitive(name: &str, physical: PhysicalType, repetition: Repetition, logical: Option<LogicalType>) -> Result<TypePtr> {
    let field = Type::primitive_type_builder(name, physical)
        .with_repetition(repetition)
        .with_logical_type(logical)
        .build()?;
    Ok(Arc::new(field))
}

fn string(name: &str, repetition: Repetition) -> Result<TypePtr> {
    primitive(name, PhysicalType::BYTE_ARRAY, repetition, Some(LogicalType::String))
}

// adsh, tag, ddate, qtrs, value, cik, name, form, filed, tlabel, doc
fn build_schema() -> Result<TypePtr> {
    let fields = vec![
        string("adsh", Repetition::REQUIRED)?,
        string("tag", Repetition::REQUIRED)?,
        primitive("ddate", PhysicalType::INT32, Repetition::REQUIRED, None)?,
        primitive("qtrs", PhysicalType::INT32, Repetition::REQUIRED, None)?,
        primitive("value", PhysicalType::DOUBLE, Repetition::OPTIONAL, None)?,
        string("cik", Repetition::REQUIRED)?,
        string("name", Repetition::REQUIRED)?,
        string("form", Repetition::REQUIRED)?,
        string("filed", Repetition::REQUIRED)?,
        string("tlabel", Repetition::REQUIRED)?,
        string("doc", Repetition::OPTIONAL)?,
    ];
    let schema = Type::group_type_builder("schema").with_fields(fields).build()?;
    Ok(Arc::new(schema))
}

fn write_required<T: DataType, W: Write + Send>(
    rg: &mut SerializedRowGroupWriter<'_, W>,
    values: &[T::T],
) -> Result<()> {
    let mut col = rg
        .next_column()?
        .ok_or_else(|| PipelineError::storage("parquet schema has fewer columns than rows carry"))?;
    col.typed::<T>().write_batch(values, None, None)?;
    col.close()?;
    Ok(())
}

fn write_optional<T: DataType, W: Write + Send>(
    rg: &mut SerializedRowGroupWriter<'_, W>,
    values: Vec<Option<T::T>>,
) -> Result<()> {
    let def_levels: Vec<i16> = values.iter().map(|v| i16::from(v.is_some())).collect();
    let present: Vec<T::T> = values.into_iter().flatten().collect();
    let mut col = rg
        .next_column()?
        .ok_or_else(|| PipelineError::storage("parquet schema has fewer columns than rows carry"))?;
    col.typed::<T>().write_batch(&present, Some(&def_levels), None)?;
    col.close()?;
    Ok(())
}

fn strings<'a>(rows: &'a [EnrichedFact], f: impl Fn(&'a EnrichedFact) -> &'a str) -> Vec<ByteArray> {
    rows.iter().map(|r| ByteArray::from(f(r))).collect()
}

fn write_row_group<W: Write + Send>(writer: &mut SerializedFileWriter<W>, rows: &[EnrichedFact]) -> Result<()> {
    let mut rg = writer.next_row_group()?;
    write_required::<ByteArrayType, _>(&mut rg, &strings(rows, |r| r.adsh.as_str()))?;
    write_required::<ByteArrayType, _>(&mut rg, &strings(rows, |r| r.tag.as_str()))?;
    write_required::<Int32Type, _>(&mut rg, &rows.iter().map(|r| r.ddate).collect::<Vec<_>>())?;
    write_required::<Int32Type, _>(&mut rg, &rows.iter().map(|r| r.qtrs).collect::<Vec<_>>())?;
    write_optional::<DoubleType, _>(&mut rg, rows.iter().map(|r| r.value).collect())?;
    write_required::<ByteArrayType, _>(&mut rg, &strings(rows, |r| r.cik.as_str()))?;
    write_required::<ByteArrayType, _>(&mut rg, &strings(rows, |r| r.name.as_str()))?;
    write_required::<ByteArrayType, _>(&mut rg, &strings(rows, |r| r.form.as_str()))?;
    write_required::<ByteArrayType, _>(&mut rg, &strings(rows, |r| r.filed.as_str()))?;
    write_required::<ByteArrayType, _>(&mut rg, &strings(rows, |r| r.tlabel.as_str()))?;
    write_optional::<ByteArrayType, _>(
        &mut rg,
        rows.iter().map(|r| r.doc.as_deref().map(ByteArray::from)).collect(),
    )?;
    rg.close()?;
    Ok(())
}

/// Writes `table` to `path`. The file is staged beside the target and
/// renamed into place only after the footer is written, so `path` either
/// does not exist or holds a complete artifact.
pub fn write_parquet(table: &EnrichedTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut staging = path.as_os_str().to_os_string();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
    let result = (|| -> Result<()> {
        let file = File::create(&staging)?;
        let mut writer = SerializedFileWriter::new(file, build_schema()?, Arc::new(props))?;
        for rows in table.rows.chunks(ROW_GROUP_ROWS) {
            write_row_group(&mut writer, rows)?;
        }
        writer.close()?;
        Ok(())
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    fs::rename(&staging, path)?;
    Ok(())
}

/// Row count from the footer of a written artifact.
pub fn artifact_row_count(path: &Path) -> Result<i64> {
    let reader = SerializedFileReader::new(File::open(path)?)?;
    Ok(reader.metadata().file_metadata().num_rows())
}
