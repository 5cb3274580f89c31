//! `DuckDB` connection pool management.
//!
//! A single database instance is opened per file; every pooled connection is a
//! clone of its root connection, so several pools can share one database file
//! inside the same process without fighting over the file lock.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

struct DatabaseHandle {
    path: PathBuf,
    root: Mutex<Connection>,
}

impl DatabaseHandle {
    fn connect(&self) -> Result<Connection, ::duckdb::Error> {
        let root = self
            .root
            .lock()
            .expect("duckdb root connection mutex poisoned");
        let connection = root.try_clone()?;
        drop(root);

        configure_connection(&connection)?;
        Ok(connection)
    }
}

struct PoolInner {
    database: Arc<DatabaseHandle>,
    max_pool_size: usize,
    idle: Mutex<Vec<Connection>>,
}

/// A connection pool manager for `DuckDB` connections.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Open the database file and create a pool over it.
    ///
    /// # Arguments
    /// * `path` - Path to the `DuckDB` database file
    /// * `max_pool_size` - Maximum number of idle connections kept in the pool
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, max_pool_size: usize) -> Result<Self, ::duckdb::Error> {
        let path = path.into();
        let root = Connection::open(path.as_path())?;
        configure_connection(&root)?;

        let database = Arc::new(DatabaseHandle {
            path,
            root: Mutex::new(root),
        });
        Ok(Self::with_database(database, max_pool_size))
    }

    fn with_database(database: Arc<DatabaseHandle>, max_pool_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                database,
                max_pool_size: max_pool_size.max(1),
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a new, empty pool over the same database.
    ///
    /// Connections are never handed between the two pools.
    #[must_use]
    pub fn isolated(&self) -> Self {
        Self::with_database(Arc::clone(&self.inner.database), self.inner.max_pool_size)
    }

    /// Acquire a connection from the pool, opening a new one when none is idle.
    ///
    /// # Errors
    /// Returns an error if a new connection cannot be created or configured.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned (indicating a previous panic
    /// while holding the lock).
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let connection = self
            .inner
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned")
            .pop();

        let connection = match connection {
            Some(connection) => connection,
            None => self.inner.database.connect()?,
        };

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Number of idle connections currently held by this pool.
    #[must_use]
    pub fn idle_len(&self) -> usize {
        self.inner
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned")
            .len()
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.database.path.as_path()
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .pool
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        if idle.len() < self.pool.max_pool_size {
            idle.push(connection);
        }
    }
}

/// Configure a database connection with appropriate settings.
///
/// # Errors
/// Returns an error if configuration SQL fails to execute.
fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}
