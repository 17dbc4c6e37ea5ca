use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use formstitch_core::{
    field_value::FieldValue,
    form::{FieldDefinition, Form},
    ids::*,
    submission::{IpAddress, NewSubmission, Page, Submission},
    timestamp::{format_timestamp, parse_timestamp},
};

use crate::error::StorageError;
use crate::query::{Expr, QueryBuilder};
use crate::schema::TableNames;
use crate::traits::{RawRow, RawStore, StructuredStore, SubmissionCriteria};

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(n) => Value::Integer(*n),
        FieldValue::Float(f) => Value::Real(*f),
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Bytes(b) => Value::Blob(b.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(n) => FieldValue::Integer(n),
        ValueRef::Real(f) => FieldValue::Float(f),
        ValueRef::Text(t) => FieldValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => FieldValue::Bytes(b.to_vec()),
    }
}

fn bind_all(params: &[FieldValue]) -> impl rusqlite::Params + '_ {
    rusqlite::params_from_iter(params.iter().map(to_sql_value))
}

pub struct SqliteStorage {
    conn: Connection,
    tables: TableNames,
}

impl SqliteStorage {
    pub fn open(path: &str, table_prefix: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        debug!(path, table_prefix, "opened sqlite storage");
        Self::init_with_connection(conn, table_prefix)
    }

    pub fn open_in_memory(table_prefix: &str) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init_with_connection(conn, table_prefix)
    }

    fn init_with_connection(conn: Connection, table_prefix: &str) -> Result<Self, StorageError> {
        let tables = TableNames::new(table_prefix);
        crate::schema::init_schema(&conn, &tables)?;
        Ok(Self { conn, tables })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    // ========================================================================
    // Metadata writes. Form and field editing lives outside the engine; these
    // exist so callers and fixtures can seed the fixed tables.
    // ========================================================================

    pub fn insert_form(
        &self,
        name: &str,
        alias: &str,
        description: Option<&str>,
    ) -> Result<Form, StorageError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO \"{}\" (name, alias, description) VALUES (?1, ?2, ?3)",
                    self.tables.forms
                ),
                rusqlite::params![name, alias, description],
            )
            .map_err(StorageError::classify)?;
        Ok(Form {
            id: FormId::new(self.conn.last_insert_rowid()),
            name: name.to_string(),
            alias: alias.to_string(),
            description: description.map(str::to_string),
        })
    }

    pub fn insert_field(
        &self,
        form_id: FormId,
        label: &str,
        alias: &str,
        field_type: &str,
        order: i64,
    ) -> Result<FieldDefinition, StorageError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO \"{}\" (form_id, label, alias, type, field_order) VALUES (?1, ?2, ?3, ?4, ?5)",
                    self.tables.form_fields
                ),
                rusqlite::params![form_id.get(), label, alias, field_type, order],
            )
            .map_err(StorageError::classify)?;
        Ok(FieldDefinition {
            id: FieldId::new(self.conn.last_insert_rowid()),
            label: label.to_string(),
            alias: alias.to_string(),
            field_type: field_type.to_string(),
        })
    }

    pub fn insert_page(&self, title: &str, alias: &str) -> Result<Page, StorageError> {
        self.conn.execute(
            &format!("INSERT INTO \"{}\" (title, alias) VALUES (?1, ?2)", self.tables.pages),
            rusqlite::params![title, alias],
        )?;
        Ok(Page {
            id: PageId::new(self.conn.last_insert_rowid()),
            title: title.to_string(),
            alias: alias.to_string(),
        })
    }

    pub fn insert_ip_address(&self, ip: &str) -> Result<IpAddress, StorageError> {
        self.conn
            .execute(
                &format!("INSERT INTO \"{}\" (ip_address) VALUES (?1)", self.tables.ip_addresses),
                rusqlite::params![ip],
            )
            .map_err(StorageError::classify)?;
        Ok(IpAddress {
            id: IpAddressId::new(self.conn.last_insert_rowid()),
            ip_address: ip.to_string(),
        })
    }

    fn submission_query(&self, criteria: &SubmissionCriteria) -> QueryBuilder {
        let mut q = QueryBuilder::new();
        q.select(["s.id", "s.form_id", "s.date_submitted", "s.referer"])
            .from(&self.tables.form_submissions, "s");
        if criteria.fetch_ip_address {
            q.add_select("i.id").add_select("i.ip_address");
            q.left_join(&self.tables.ip_addresses, "i", "s.ip_id = i.id");
        } else {
            q.add_select("NULL").add_select("NULL");
        }
        if criteria.fetch_page {
            q.add_select("p.id").add_select("p.title").add_select("p.alias");
            q.left_join(&self.tables.pages, "p", "s.page_id = p.id");
        } else {
            q.add_select("NULL").add_select("NULL").add_select("NULL");
        }
        if let Some(ids) = &criteria.ids {
            let raw: Vec<i64> = ids.iter().map(SubmissionId::get).collect();
            q.and_where(Expr::in_ids("s.id", &raw));
        }
        if let Some(form_id) = criteria.form_id {
            let placeholder = q.bind(form_id.get());
            q.and_where(Expr::raw(format!("s.form_id = {placeholder}")));
        }
        for (column, direction) in &criteria.order {
            q.order_by(column.as_sql(), *direction);
        }
        q.set_max_results(criteria.limit).set_first_result(criteria.offset);
        q
    }
}

struct SubmissionRow {
    id: i64,
    form_id: i64,
    date_submitted: String,
    referer: Option<String>,
    ip_id: Option<i64>,
    ip_address: Option<String>,
    page_id: Option<i64>,
    page_title: Option<String>,
    page_alias: Option<String>,
}

fn read_submission_row(row: &rusqlite::Row) -> rusqlite::Result<SubmissionRow> {
    Ok(SubmissionRow {
        id: row.get(0)?,
        form_id: row.get(1)?,
        date_submitted: row.get(2)?,
        referer: row.get(3)?,
        ip_id: row.get(4)?,
        ip_address: row.get(5)?,
        page_id: row.get(6)?,
        page_title: row.get(7)?,
        page_alias: row.get(8)?,
    })
}

impl SubmissionRow {
    fn into_submission(self) -> Result<Submission, StorageError> {
        let ip_address = match (self.ip_id, self.ip_address) {
            (Some(id), Some(ip_address)) => Some(IpAddress {
                id: IpAddressId::new(id),
                ip_address,
            }),
            _ => None,
        };
        let page = match (self.page_id, self.page_title, self.page_alias) {
            (Some(id), Some(title), Some(alias)) => Some(Page {
                id: PageId::new(id),
                title,
                alias,
            }),
            _ => None,
        };
        Ok(Submission {
            id: SubmissionId::new(self.id),
            form_id: FormId::new(self.form_id),
            date_submitted: parse_timestamp(&self.date_submitted)?,
            referer: self.referer,
            ip_address,
            page,
        })
    }
}

impl RawStore for SqliteStorage {
    fn query(&self, sql: &str, params: &[FieldValue]) -> Result<Vec<RawRow>, StorageError> {
        let mut stmt = self.conn.prepare(sql).map_err(StorageError::classify)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(bind_all(params)).map_err(StorageError::classify)?;

        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut columns = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                columns.push((name.clone(), from_value_ref(row.get_ref(i)?)));
            }
            result.push(RawRow::new(columns));
        }
        Ok(result)
    }

    fn execute(&self, sql: &str, params: &[FieldValue]) -> Result<usize, StorageError> {
        self.conn
            .execute(sql, bind_all(params))
            .map_err(StorageError::classify)
    }

    fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(rusqlite::params![table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            Ok(None)
        } else {
            Ok(Some(columns))
        }
    }
}

impl StructuredStore for SqliteStorage {
    fn find_form(&self, form_id: FormId) -> Result<Option<Form>, StorageError> {
        let form = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, name, alias, description FROM \"{}\" WHERE id = ?1",
                    self.tables.forms
                ),
                rusqlite::params![form_id.get()],
                |row| {
                    Ok(Form {
                        id: FormId::new(row.get(0)?),
                        name: row.get(1)?,
                        alias: row.get(2)?,
                        description: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(form)
    }

    fn save_submission(&mut self, submission: &NewSubmission) -> Result<Submission, StorageError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO \"{}\" (form_id, page_id, ip_id, referer, date_submitted) VALUES (?1, ?2, ?3, ?4, ?5)",
                    self.tables.form_submissions
                ),
                rusqlite::params![
                    submission.form_id.get(),
                    submission.page_id.map(|p| p.get()),
                    submission.ip_address_id.map(|i| i.get()),
                    submission.referer,
                    format_timestamp(&submission.date_submitted),
                ],
            )
            .map_err(StorageError::classify)?;
        let id = SubmissionId::new(self.conn.last_insert_rowid());
        self.find_submission(id)?
            .ok_or_else(|| StorageError::NotFound(format!("submission {id} after insert")))
    }

    fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StorageError> {
        let criteria = SubmissionCriteria::by_ids(vec![id]).with_relations();
        Ok(self.query_submissions(&criteria)?.into_iter().next())
    }

    fn query_submissions(
        &self,
        criteria: &SubmissionCriteria,
    ) -> Result<Vec<Submission>, StorageError> {
        let q = self.submission_query(criteria);
        debug!(sql = %q.to_sql(), params = q.params().len(), "header query");
        let mut stmt = self.conn.prepare(&q.to_sql()).map_err(StorageError::classify)?;
        let rows = stmt
            .query_map(bind_all(q.params()), read_submission_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            result.push(row.into_submission()?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use formstitch_core::request::Direction;

    use crate::traits::HeaderColumn;

    fn ts(d: u32, h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn save_and_find_submission_with_relations() {
        let mut store = SqliteStorage::open_in_memory("").unwrap();
        let form = store.insert_form("Contact", "contact", None).unwrap();
        let page = store.insert_page("Landing", "landing").unwrap();
        let ip = store.insert_ip_address("10.0.0.1").unwrap();

        let mut new = NewSubmission::new(form.id, ts(1, 9));
        new.page_id = Some(page.id);
        new.ip_address_id = Some(ip.id);
        new.referer = Some("https://example.com".into());
        let saved = store.save_submission(&new).unwrap();

        assert_eq!(saved.form_id, form.id);
        assert_eq!(saved.page, Some(page));
        assert_eq!(saved.ip_address, Some(ip));
        assert_eq!(saved.date_submitted, ts(1, 9));
        assert!(store.find_submission(SubmissionId::new(999)).unwrap().is_none());
    }

    #[test]
    fn query_submissions_filters_orders_and_pages() {
        let mut store = SqliteStorage::open_in_memory("").unwrap();
        let a = store.insert_form("A", "a", None).unwrap();
        let b = store.insert_form("B", "b", None).unwrap();
        for d in [3, 1, 2] {
            store.save_submission(&NewSubmission::new(a.id, ts(d, 0))).unwrap();
        }
        store.save_submission(&NewSubmission::new(b.id, ts(4, 0))).unwrap();

        let criteria = SubmissionCriteria::for_form(a.id)
            .order_by(HeaderColumn::DateSubmitted, Direction::Desc)
            .paginate(Some(2), 0);
        let rows = store.query_submissions(&criteria).unwrap();
        let days: Vec<_> = rows.iter().map(|s| s.date_submitted).collect();
        assert_eq!(days, vec![ts(3, 0), ts(2, 0)]);
        assert!(rows.iter().all(|s| s.page.is_none() && s.ip_address.is_none()));

        let none = store
            .query_submissions(&SubmissionCriteria::by_ids(vec![]))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn raw_query_returns_named_columns_in_select_order() {
        let store = SqliteStorage::open_in_memory("").unwrap();
        store
            .execute("CREATE TABLE t (id INTEGER, name TEXT, score REAL, raw BLOB)", &[])
            .unwrap();
        store
            .execute(
                "INSERT INTO t VALUES (?1, ?2, ?3, ?4)",
                &[1i64.into(), "x".into(), 2.5.into(), FieldValue::Bytes(vec![1, 2])],
            )
            .unwrap();
        let rows = store.query("SELECT name, id, score, raw FROM t", &[]).unwrap();
        let cols = rows[0].clone().into_columns();
        assert_eq!(
            cols,
            vec![
                ("name".to_string(), FieldValue::from("x")),
                ("id".to_string(), FieldValue::Integer(1)),
                ("score".to_string(), FieldValue::Float(2.5)),
                ("raw".to_string(), FieldValue::Bytes(vec![1, 2])),
            ]
        );
    }

    #[test]
    fn missing_table_is_schema_mismatch() {
        let store = SqliteStorage::open_in_memory("").unwrap();
        let err = store.query("SELECT * FROM nope", &[]).unwrap_err();
        assert!(err.is_schema_mismatch(), "{err}");
        let err = store
            .execute("INSERT INTO nope (a) VALUES (?1)", &[1i64.into()])
            .unwrap_err();
        assert!(err.is_schema_mismatch(), "{err}");
        assert_eq!(store.table_columns("nope").unwrap(), None);
    }

    #[test]
    fn table_columns_introspects() {
        let store = SqliteStorage::open_in_memory("mt_").unwrap();
        let cols = store.table_columns("mt_ip_addresses").unwrap().unwrap();
        assert_eq!(cols, vec!["id".to_string(), "ip_address".to_string()]);
    }

    #[test]
    fn file_backed_storage_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forms.db");
        let path = path.to_str().unwrap();
        {
            let store = SqliteStorage::open(path, "").unwrap();
            store.insert_form("Contact", "contact", Some("desc")).unwrap();
        }
        let store = SqliteStorage::open(path, "").unwrap();
        let form = store.find_form(FormId::new(1)).unwrap().unwrap();
        assert_eq!(form.alias, "contact");
        assert_eq!(form.description.as_deref(), Some("desc"));
    }
}
