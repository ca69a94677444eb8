use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::admin::{AdminError, Result};
use crate::index::{partition_round_robin, MemoryPartition, MemoryPropertyStore, PartitionSet};
use crate::types::{EntityId, PropId, PropValue};

/// Property store and partitioned index rebuilt from a CSV snapshot.
pub struct IndexSnapshot {
    /// Authoritative values, keyed by entity and the snapshot's property.
    pub store: MemoryPropertyStore,
    /// Index partitions holding one document per row.
    pub partitions: PartitionSet<MemoryPartition>,
    /// Property key the values were stored under.
    pub prop: PropId,
    /// Rows read from the snapshot.
    pub rows: usize,
}

/// Loads `entity,value[,type]` rows from a CSV file with a header line.
///
/// `type` is one of `str`, `int`, `float`, or `bool` and defaults to `str`. Rows
/// are spread round robin over `partitions` partitions.
pub fn load_csv(
    path: impl AsRef<Path>,
    prop: PropId,
    partitions: usize,
    leaf_size: usize,
) -> Result<IndexSnapshot> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AdminError::missing_snapshot(path));
    }
    let reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    read_snapshot(reader, prop, partitions, leaf_size)
}

/// Like [`load_csv`], reading from any byte source.
pub fn load_csv_reader<R: Read>(
    source: R,
    prop: PropId,
    partitions: usize,
    leaf_size: usize,
) -> Result<IndexSnapshot> {
    let reader = ReaderBuilder::new().flexible(true).from_reader(source);
    read_snapshot(reader, prop, partitions, leaf_size)
}

fn read_snapshot<R: Read>(
    mut reader: csv::Reader<R>,
    prop: PropId,
    partitions: usize,
    leaf_size: usize,
) -> Result<IndexSnapshot> {
    let mut rows: Vec<(EntityId, PropValue)> = Vec::new();
    let mut entities = FxHashSet::default();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let row = parse_row(&record).map_err(|msg| {
            AdminError::Message(format!("row {}: {msg}", line + 1))
        })?;
        if !entities.insert(row.0) {
            return Err(AdminError::Message(format!(
                "row {}: entity {} appears more than once",
                line + 1,
                row.0
            )));
        }
        rows.push(row);
    }

    let store = MemoryPropertyStore::new();
    for (entity, value) in &rows {
        store.set(*entity, prop, value.clone());
    }
    let parts = partition_round_robin(
        rows.iter().map(|(entity, value)| (*entity, value)),
        partitions,
        leaf_size,
    )?;
    debug!(rows = rows.len(), partitions, "admin.load.completed");
    Ok(IndexSnapshot {
        store,
        partitions: PartitionSet::new(parts),
        prop,
        rows: rows.len(),
    })
}

fn parse_row(record: &StringRecord) -> std::result::Result<(EntityId, PropValue), String> {
    let entity = record
        .get(0)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("missing entity")?;
    let entity: u64 = entity
        .parse()
        .map_err(|_| format!("entity '{entity}' is not an unsigned integer"))?;
    let raw = record.get(1).ok_or("missing value")?;
    let kind = record.get(2).map(str::trim).filter(|s| !s.is_empty());
    Ok((EntityId(entity), parse_value(raw, kind.unwrap_or("str"))?))
}

/// Parses a CSV cell as a property value of type `kind`.
pub fn parse_value(raw: &str, kind: &str) -> std::result::Result<PropValue, String> {
    let value = match kind {
        "str" => PropValue::Str(raw.to_string()),
        "int" => PropValue::Int(
            raw.trim()
                .parse()
                .map_err(|_| format!("'{raw}' is not an integer"))?,
        ),
        "float" => PropValue::Float(
            raw.trim()
                .parse()
                .map_err(|_| format!("'{raw}' is not a float"))?,
        ),
        "bool" => PropValue::Bool(
            raw.trim()
                .parse()
                .map_err(|_| format!("'{raw}' is not a boolean"))?,
        ),
        other => return Err(format!("unknown value type '{other}'")),
    };
    Ok(value)
}
