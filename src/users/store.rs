//! User Storage
//! Mission: Read user accounts out of SQLite for the auth pipeline and the users API

use crate::users::models::{NewUser, User, UserFilter};
use bcrypt::DEFAULT_COST;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{
    params, params_from_iter,
    types::{Type, Value},
    Connection, OptionalExtension, Row,
};
use thiserror::Error;
use tracing::{debug, info};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    roles TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
"#;

const USER_COLUMNS: &str =
    "id, name, email, password, roles, created_at, updated_at, deleted_at";

/// Persistence failures surfaced to callers
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Narrow read-only view of user persistence used by the request pipeline.
///
/// Soft-deleted users are invisible through every method.
pub trait UserRepository: Send + Sync {
    fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    fn find_many(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError>;
}

/// User storage with SQLite backend
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
    hash_cost: u32,
}

impl SqliteUserStore {
    /// Open (or create) the database file and initialize the schema
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        debug!("User database opened at: {}", db_path);
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            hash_cost: DEFAULT_COST,
        })
    }

    /// Override the bcrypt cost used for new accounts
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Insert a new account, hashing its password
    pub fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let password_hash = bcrypt::hash(&new_user.password, self.hash_cost)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO users (name, email, password, roles, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    new_user.name,
                    new_user.email,
                    password_hash,
                    new_user.roles.join(","),
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };

        info!("✅ Created user: {} ({})", new_user.email, id);

        self.find_by_id(id)?
            .ok_or(StoreError::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Seed a superadmin when the table is still empty.
    ///
    /// Returns true if an account was created.
    pub fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<bool, StoreError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

        if count > 0 {
            return Ok(false);
        }

        self.create_user(&NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            roles: vec![crate::users::models::DEFAULT_ROLE.to_string()],
        })?;
        info!("🔐 Bootstrap admin user created ({})", email);
        Ok(true)
    }

    fn find_one(&self, clause: &str, value: Value) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL AND {clause}"
        );
        let conn = self.conn.lock();
        let user = conn.query_row(&sql, params![value], map_row).optional()?;
        Ok(user)
    }
}

impl UserRepository for SqliteUserStore {
    fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.find_one("id = ?1", Value::Integer(id))
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email = ?1", Value::Text(email.to_string()))
    }

    fn find_many(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        debug!(filter = %filter, "Listing users");

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if filter.id != 0 {
            values.push(Value::Integer(filter.id));
            clauses.push(format!("id = ?{}", values.len()));
        }
        if !filter.name.is_empty() {
            values.push(Value::Text(format!("%{}%", filter.name)));
            clauses.push(format!("name LIKE ?{}", values.len()));
        }
        if !filter.email.is_empty() {
            values.push(Value::Text(format!("%{}%", filter.email)));
            clauses.push(format!("email LIKE ?{}", values.len()));
        }
        clauses.push("deleted_at IS NULL".to_string());

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {} ORDER BY id ASC {}",
            clauses.join(" AND "),
            limit_offset_clause(filter.limit, filter.offset)
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map(params_from_iter(values), map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }
}

/// SQL pagination suffix; clauses only appear for values greater than zero.
fn limit_offset_clause(limit: i64, offset: i64) -> String {
    match (limit > 0, offset > 0) {
        (true, true) => format!("LIMIT {limit} OFFSET {offset}"),
        (true, false) => format!("LIMIT {limit}"),
        // SQLite needs a LIMIT before OFFSET; -1 means unbounded
        (false, true) => format!("LIMIT -1 OFFSET {offset}"),
        (false, false) => String::new(),
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let roles: String = row.get(4)?;
    let deleted_at: Option<String> = row.get(7)?;

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        roles: roles
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect(),
        created_at: parse_timestamp(5, &row.get::<_, String>(5)?)?,
        updated_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
        deleted_at: deleted_at
            .map(|raw| parse_timestamp(7, &raw))
            .transpose()?,
    })
}

fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            roles: vec![],
        }
    }

    fn create_test_store() -> SqliteUserStore {
        let store = SqliteUserStore::open_in_memory().unwrap().with_hash_cost(4);
        store.create_user(&new_user("Alice Admin", "alice@example.com")).unwrap();
        store.create_user(&new_user("Bob Builder", "bob@example.com")).unwrap();
        store.create_user(&new_user("Carol Jones", "carol@corp.io")).unwrap();
        store
    }

    #[test]
    fn test_create_and_find_user() {
        let store = create_test_store();

        let alice = store.find_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(alice.id, 1);
        assert_eq!(alice.name, "Alice Admin");
        assert!(bcrypt::verify("password123", &alice.password).unwrap());

        let by_id = store.find_by_id(alice.id).unwrap().unwrap();
        assert_eq!(by_id, alice);

        assert!(store.find_by_id(999).unwrap().is_none());
        assert!(store.find_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let store = create_test_store();
        let result = store.create_user(&new_user("Alice Again", "alice@example.com"));
        assert!(matches!(result, Err(StoreError::Database(_))));
    }

    #[test]
    fn test_find_many_filters_and_orders() {
        let store = create_test_store();

        let all = store.find_many(&UserFilter::default()).unwrap();
        let ids: Vec<i64> = all.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let by_email = store
            .find_many(&UserFilter {
                email: "example.com".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_email.len(), 2);

        let by_name = store
            .find_many(&UserFilter {
                name: "Jones".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].email, "carol@corp.io");

        let by_id = store
            .find_many(&UserFilter {
                id: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].name, "Bob Builder");
    }

    #[test]
    fn test_find_many_pagination() {
        let store = create_test_store();

        let page = store
            .find_many(&UserFilter {
                limit: 1,
                offset: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, 2);

        let tail = store
            .find_many(&UserFilter {
                offset: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].id, 3);
    }

    #[test]
    fn test_filter_values_are_not_interpolated() {
        let store = create_test_store();
        let result = store
            .find_many(&UserFilter {
                name: "' OR 1=1 --".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_soft_deleted_users_are_invisible() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = SqliteUserStore::open(db_path).unwrap().with_hash_cost(4);
        let bob = store.create_user(&new_user("Bob", "bob@example.com")).unwrap();

        let other = Connection::open(db_path).unwrap();
        other
            .execute(
                "UPDATE users SET deleted_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), bob.id],
            )
            .unwrap();

        assert!(store.find_by_id(bob.id).unwrap().is_none());
        assert!(store.find_by_email("bob@example.com").unwrap().is_none());
        assert!(store.find_many(&UserFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_admin_only_seeds_empty_table() {
        let store = SqliteUserStore::open_in_memory().unwrap().with_hash_cost(4);

        assert!(store.ensure_admin("Admin", "admin@example.com", "admin123").unwrap());
        assert!(!store.ensure_admin("Other", "other@example.com", "admin123").unwrap());

        let admin = store.find_by_email("admin@example.com").unwrap().unwrap();
        assert_eq!(admin.roles, vec!["superadmin".to_string()]);
        assert!(store.find_by_email("other@example.com").unwrap().is_none());
    }

    #[test]
    fn test_limit_offset_clause() {
        assert_eq!(limit_offset_clause(20, 40), "LIMIT 20 OFFSET 40");
        assert_eq!(limit_offset_clause(20, 0), "LIMIT 20");
        assert_eq!(limit_offset_clause(0, 5), "LIMIT -1 OFFSET 5");
        assert_eq!(limit_offset_clause(0, 0), "");
    }
}
