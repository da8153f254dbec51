use crate::infrastructure::error::InfraError;
use crate::infrastructure::record_gateway::{
    DeleteResponse, FetchQuery, MutationResponse, MutationResult, Record, RecordGateway, SortType,
    WhereOperator,
};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

const ID_FIELD: &str = "Id";

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<String, Table>,
    fail_next: Option<String>,
    reject_next_mutation: Option<String>,
    reject_next_delete: bool,
    failing_tables: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct InMemoryRecordGateway {
    state: Mutex<StoreState>,
    calls: AtomicUsize,
}

impl InMemoryRecordGateway {
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    pub fn fail_next(&self, message: impl Into<String>) -> Result<(), InfraError> {
        self.lock()?.fail_next = Some(message.into());
        Ok(())
    }

    pub fn reject_next_mutation(&self, message: impl Into<String>) -> Result<(), InfraError> {
        self.lock()?.reject_next_mutation = Some(message.into());
        Ok(())
    }

    pub fn reject_next_delete(&self) -> Result<(), InfraError> {
        self.lock()?.reject_next_delete = true;
        Ok(())
    }

    pub fn fail_table(&self, table: &str, message: impl Into<String>) -> Result<(), InfraError> {
        self.lock()?
            .failing_tables
            .insert(table.to_string(), message.into());
        Ok(())
    }

    pub fn heal_table(&self, table: &str) -> Result<(), InfraError> {
        self.lock()?.failing_tables.remove(table);
        Ok(())
    }

    pub fn insert_raw(&self, table: &str, mut record: Record) -> Result<i64, InfraError> {
        let mut state = self.lock()?;
        let table = state.tables.entry(table.to_string()).or_default();
        table.next_id += 1;
        let id = table.next_id;
        record.insert(ID_FIELD.to_string(), Value::from(id));
        table.rows.insert(id, record);
        Ok(id)
    }

    pub fn row_count(&self, table: &str) -> Result<usize, InfraError> {
        let state = self.lock()?;
        Ok(state.tables.get(table).map_or(0, |table| table.rows.len()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::Remote(format!("in-memory store lock poisoned: {error}")))
    }

    fn begin_call(&self, table: &str) -> Result<MutexGuard<'_, StoreState>, InfraError> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut state = self.lock()?;
        if let Some(message) = state.fail_next.take() {
            return Err(InfraError::Remote(message));
        }
        if let Some(message) = state.failing_tables.get(table) {
            return Err(InfraError::Remote(message.clone()));
        }
        Ok(state)
    }
}

fn matches_query(record: &Record, query: &FetchQuery) -> bool {
    query.where_clauses.iter().all(|clause| match clause.operator {
        WhereOperator::ExactMatch => {
            let value = record.get(&clause.field_name).unwrap_or(&Value::Null);
            clause.values.iter().any(|candidate| candidate == value)
        }
    })
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(left)), Some(Value::Number(right))) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(left)), Some(Value::String(right))) => left.cmp(right),
        (Some(Value::Bool(left)), Some(Value::Bool(right))) => left.cmp(right),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(left), Some(right)) => left.to_string().cmp(&right.to_string()),
    }
}

fn project(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    record
        .iter()
        .filter(|(key, _)| fields.iter().any(|field| field == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn record_id(record: &Record) -> Option<i64> {
    match record.get(ID_FIELD)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn rejected(message: String) -> MutationResponse {
    MutationResponse {
        success: true,
        message: None,
        results: vec![MutationResult {
            success: false,
            message: Some(message),
            data: None,
        }],
    }
}

#[async_trait]
impl RecordGateway for InMemoryRecordGateway {
    async fn fetch_records(&self, table: &str, query: &FetchQuery) -> Result<Vec<Record>, InfraError> {
        let state = self.begin_call(table)?;
        let Some(table) = state.tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut rows = table
            .rows
            .values()
            .filter(|record| matches_query(record, query))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| {
            query
                .order_by
                .iter()
                .map(|order| {
                    let ordering =
                        compare_values(left.get(&order.field_name), right.get(&order.field_name));
                    match order.sort_type {
                        SortType::Asc => ordering,
                        SortType::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        Ok(rows
            .iter()
            .map(|record| project(record, &query.fields))
            .collect())
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        record_id: i64,
        fields: &[String],
    ) -> Result<Option<Record>, InfraError> {
        let state = self.begin_call(table)?;
        Ok(state
            .tables
            .get(table)
            .and_then(|table| table.rows.get(&record_id))
            .map(|record| project(record, fields)))
    }

    async fn create_records(&self, table: &str, records: Vec<Record>) -> Result<MutationResponse, InfraError> {
        let mut state = self.begin_call(table)?;
        if let Some(message) = state.reject_next_mutation.take() {
            return Ok(rejected(message));
        }

        let table = state.tables.entry(table.to_string()).or_default();
        let mut results = Vec::with_capacity(records.len());
        for mut record in records {
            table.next_id += 1;
            let id = table.next_id;
            record.insert(ID_FIELD.to_string(), Value::from(id));
            table.rows.insert(id, record.clone());
            results.push(MutationResult {
                success: true,
                message: None,
                data: Some(record),
            });
        }

        Ok(MutationResponse {
            success: true,
            message: None,
            results,
        })
    }

    async fn update_records(&self, table: &str, records: Vec<Record>) -> Result<MutationResponse, InfraError> {
        let mut state = self.begin_call(table)?;
        if let Some(message) = state.reject_next_mutation.take() {
            return Ok(rejected(message));
        }

        let table = state.tables.entry(table.to_string()).or_default();
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let existing = record_id(&record).and_then(|id| table.rows.get_mut(&id));
            let Some(existing) = existing else {
                results.push(MutationResult {
                    success: false,
                    message: Some("record not found".to_string()),
                    data: None,
                });
                continue;
            };
            for (key, value) in record {
                if key != ID_FIELD {
                    existing.insert(key, value);
                }
            }
            results.push(MutationResult {
                success: true,
                message: None,
                data: Some(existing.clone()),
            });
        }

        Ok(MutationResponse {
            success: true,
            message: None,
            results,
        })
    }

    async fn delete_records(&self, table: &str, record_ids: &[i64]) -> Result<DeleteResponse, InfraError> {
        let mut state = self.begin_call(table)?;
        if std::mem::take(&mut state.reject_next_delete) {
            return Ok(DeleteResponse {
                success: false,
                message: None,
            });
        }
        if let Some(table) = state.tables.get_mut(table) {
            for id in record_ids {
                table.rows.remove(id);
            }
        }
        Ok(DeleteResponse {
            success: true,
            message: None,
        })
    }
}
