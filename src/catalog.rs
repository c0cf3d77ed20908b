use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::sync::{Arc, RwLock};

use log::info;

use crate::error::{DbError, DbResult};
use crate::heap_file::HeapFile;
use crate::tuple::TupleDesc;
use crate::types::Type;

/// Name/id lookup for heap files backing each table. Deliberately thin: the
/// catalog only maps identities, it does not own schema validation or
/// storage format decisions (those belong to `HeapFile`/`HeapPage`).
pub struct Catalog {
    tables: RwLock<HashMap<String, Arc<HeapFile>>>,
    table_ids: RwLock<HashMap<usize, Arc<HeapFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            tables: RwLock::new(HashMap::new()),
            table_ids: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_table(&self, file: HeapFile, name: String) {
        let mut tables = self.tables.write().unwrap();
        let file_id = file.get_id();
        tables.insert(name.clone(), Arc::new(file));
        let mut table_ids = self.table_ids.write().unwrap();
        table_ids.insert(file_id, Arc::clone(tables.get(&name).unwrap()));
    }

    pub fn get_table_from_name(&self, name: &str) -> Option<Arc<HeapFile>> {
        let tables = self.tables.read().unwrap();
        tables.get(name).map(Arc::clone)
    }

    pub fn get_table_from_id(&self, id: usize) -> Option<Arc<HeapFile>> {
        let table_ids = self.table_ids.read().unwrap();
        table_ids.get(&id).map(Arc::clone)
    }

    pub fn get_tuple_desc(&self, table_id: usize) -> Option<TupleDesc> {
        self.get_table_from_id(table_id)
            .map(|t| t.get_tuple_desc().clone())
    }

    /// Loads one table per line of a schema file in the form
    /// `name (field: Type, field: Type, ...)`, creating (or reopening) its
    /// backing file under `data_dir`.
    pub fn load_schema(&self, schema_file_path: &str, data_dir: &str) -> DbResult<()> {
        let schema_file = File::open(schema_file_path)?;
        let reader = BufReader::new(schema_file);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let split_parens: Vec<&str> = line.splitn(2, '(').collect();
            let table_name = split_parens[0].trim().to_string();
            let fields_str = split_parens
                .get(1)
                .ok_or(DbError::SchemaMismatch)?
                .trim_end_matches(')');

            let mut field_types = vec![];
            let mut field_names = vec![];
            for field in fields_str.split(',') {
                let parts: Vec<&str> = field.split(':').collect();
                if parts.len() != 2 {
                    return Err(DbError::SchemaMismatch);
                }
                let field_name = parts[0].trim().to_string();
                let field_type = match parts[1].trim() {
                    "Int" => Type::Int,
                    "String" => Type::string(),
                    _ => return Err(DbError::SchemaMismatch),
                };
                field_names.push(field_name);
                field_types.push(field_type);
            }

            let path = format!("{}/{}.dat", data_dir, table_name);
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .open(&path)?;
            info!("loaded table {} from {}", table_name, path);
            let heap_file = HeapFile::new(file, TupleDesc::new(field_types, field_names));
            self.add_table(heap_file, table_name);
        }
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
