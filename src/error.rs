use thiserror::Error;

// Wrapped errors are rendered inline and never exposed through `source()`.

/// Failures raised by a [`Store`](crate::store::Store) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid username or password")]
    AccessDenied,

    #[error("Database {0} does not exist")]
    UnknownDatabase(String),

    #[error("MySQL error: {0}")]
    MySql(mysql_async::Error),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Runtime error: {0}")]
    Runtime(std::io::Error),

    #[error("Connection already closed")]
    Closed,
}

impl StoreError {
    /// True when the connection can no longer carry statements.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            StoreError::Closed => true,
            StoreError::MySql(mysql_async::Error::Io(_))
            | StoreError::MySql(mysql_async::Error::Driver(
                mysql_async::DriverError::ConnectionClosed,
            )) => true,
            _ => false,
        }
    }
}

impl From<mysql_async::Error> for StoreError {
    fn from(err: mysql_async::Error) -> Self {
        StoreError::MySql(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Runtime(err)
    }
}

/// Fatal errors of the schema service and the sync engine.
///
/// Per-row failures during a sync never surface here; they are counted in
/// the [`SyncResult`](crate::sync::SyncResult) instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Connection error: {0}")]
    Connectivity(StoreError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Error creating table: {0}")]
    CreateTable(StoreError),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Error during synchronization: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err)
    }
}
