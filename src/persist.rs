// used for persistence
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{check_name, LookupError, Result};
use crate::store::{check_text, Key, LookupStore, VocabularyEntry};

// The statements are kept as text and prepared through the connection's statement
// cache, since the connection is shared between stores behind a mutex.
#[derive(Debug)]
struct Statements {
    all_entries: String,
    get_by_key: String,
    get_by_text: String,
    add_entry: String,
    delete_all: String,
    count: String,
}
impl Statements {
    fn new(table: &str) -> Self {
        Self {
            all_entries: format!(
                "
                select {table}_Key, {table}_Text
                    from {table}
                    order by {table}_Key
            "
            ),
            get_by_key: format!(
                "
                select {table}_Key, {table}_Text
                    from {table}
                    where {table}_Key = ?
            "
            ),
            get_by_text: format!(
                "
                select {table}_Key, {table}_Text
                    from {table}
                    where {table}_Text = ?
            "
            ),
            add_entry: format!(
                "
                insert into {table} (
                    {table}_Text
                ) values (?)
            "
            ),
            delete_all: format!("delete from {table}"),
            count: format!("select count(*) from {table}"),
        }
    }
}

// ------------- Persistence -------------
/// A vocabulary table in SQLite. Several stores may share one connection; each
/// owns exactly one table named after its vocabulary.
#[derive(Debug)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
    vocabulary: String,
    statements: Statements,
}
impl SqliteStore {
    /// Creates the vocabulary table unless it already exists and returns a store
    /// over it. Rows already present are left untouched.
    pub fn provision(db: Arc<Mutex<Connection>>, vocabulary: &str) -> Result<Self> {
        check_name(vocabulary)?;
        // AUTOINCREMENT keeps keys from being reused after rows are deleted, and
        // the check keeps every real key clear of UNMATCHED_KEY.
        db.lock()?.execute_batch(&format!(
            "
            create table if not exists {vocabulary} (
                {vocabulary}_Key integer not null
                    constraint referenceable_{vocabulary}_Key primary key autoincrement,
                {vocabulary}_Text text not null,
                constraint positive_{vocabulary}_Key check (
                    {vocabulary}_Key > 0
                ),
                constraint unique_{vocabulary}_Text unique (
                    {vocabulary}_Text
                )
            );
            "
        ))?;
        debug!(vocabulary, "provisioned vocabulary table");
        Ok(Self {
            db,
            vocabulary: vocabulary.to_string(),
            statements: Statements::new(vocabulary),
        })
    }
    fn entry(row: &rusqlite::Row) -> rusqlite::Result<VocabularyEntry> {
        Ok(VocabularyEntry::new(row.get(0)?, row.get(1)?))
    }
    fn select_by_text(&self, db: &Connection, text: &str) -> Result<Option<VocabularyEntry>> {
        let entry = db
            .prepare_cached(&self.statements.get_by_text)?
            .query_row(params![text], Self::entry)
            .optional()?;
        Ok(entry)
    }
}
impl LookupStore for SqliteStore {
    fn vocabulary(&self) -> &str {
        &self.vocabulary
    }
    fn all_entries(&self) -> Result<Vec<VocabularyEntry>> {
        let db = self.db.lock()?;
        let mut statement = db.prepare_cached(&self.statements.all_entries)?;
        let entries = statement
            .query_map([], Self::entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
    fn find_by_key(&self, key: Key) -> Result<Option<VocabularyEntry>> {
        let db = self.db.lock()?;
        let entry = db
            .prepare_cached(&self.statements.get_by_key)?
            .query_row(params![key], Self::entry)
            .optional()?;
        Ok(entry)
    }
    fn find_by_text(&self, text: &str) -> Result<Option<VocabularyEntry>> {
        let db = self.db.lock()?;
        self.select_by_text(&db, text)
    }
    fn find_or_create_by_text(&self, text: &str) -> Result<VocabularyEntry> {
        check_text(&self.vocabulary, text)?;
        let db = self.db.lock()?;
        if let Some(existing) = self.select_by_text(&db, text)? {
            return Ok(existing);
        }
        match db
            .prepare_cached(&self.statements.add_entry)?
            .execute(params![text])
        {
            Ok(_) => Ok(VocabularyEntry::new(db.last_insert_rowid(), text.to_string())),
            // another connection inserted the same text in between
            Err(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Err(LookupError::DuplicateText {
                    vocabulary: self.vocabulary.clone(),
                    text: text.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
    fn delete_all(&self) -> Result<()> {
        let db = self.db.lock()?;
        db.prepare_cached(&self.statements.delete_all)?.execute([])?;
        Ok(())
    }
    fn count(&self) -> Result<usize> {
        let db = self.db.lock()?;
        let count: i64 = db
            .prepare_cached(&self.statements.count)?
            .query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }
}
