//! Session management for relorm.
//!
//! A Session pairs a connection with the dialect its statements are written
//! for. It hands out [`BaseModel`] facades, pool or transaction executors and
//! schema tooling that all agree on that dialect.
//!
//! # Example
//!
//! ```rust,ignore
//! use relorm::prelude::*;
//!
//! let session = Session::builder()
//!     .config(&EngineConfig::from_env()?)
//!     .build_with(connection)?;
//!
//! let users = session.model::<User>();
//! let adults = users
//!     .find_many(&cx, session.pool(), Params::new().filter(gte("age", 18)))
//!     .await;
//! ```

use asupersync::{Cx, Outcome};
use relorm_core::{
    Connection, Dialect, DialectKind, EngineConfig, Error, Executor, Model, Table, dialect_for,
};
use relorm_query::BaseModel;
use relorm_schema::{MigrationWriter, SchemaPusher};

/// A connection bound to one SQL dialect.
///
/// The connection is shared by every statement issued through the session;
/// callers needing a consistent snapshot open a transaction with
/// [`Session::begin`] and pass `Executor::Transaction(&tx)` explicitly.
#[derive(Debug)]
pub struct Session<C: Connection> {
    /// The underlying connection
    connection: C,
    dialect: Box<dyn Dialect>,
}

impl<C: Connection> Session<C> {
    /// Create a new session for `kind`.
    pub fn new(connection: C, kind: DialectKind) -> Self {
        Self {
            connection,
            dialect: dialect_for(kind),
        }
    }

    /// Create a session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Consume the session and return the underlying connection.
    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Executor that runs each statement directly on the connection.
    pub fn pool(&self) -> Executor<'_, '_, C> {
        Executor::Pool(&self.connection)
    }

    /// Open a transaction on the session's connection.
    pub async fn begin(&self, cx: &Cx) -> Outcome<C::Tx<'_>, Error> {
        self.connection.begin(cx).await
    }

    /// Record facade for `M`, with `M`'s declared relations registered.
    pub fn model<M: Model>(&self) -> BaseModel<M> {
        BaseModel::new(self.dialect.kind())
    }

    /// Schema pusher for this session's dialect.
    pub fn schema(&self) -> SchemaPusher<'_> {
        SchemaPusher::new(self.dialect.as_ref())
    }

    /// Push `tables` on the pool executor, in one transaction.
    pub async fn push(&self, cx: &Cx, tables: &[Table]) -> Outcome<Vec<String>, Error> {
        self.schema().push(cx, self.pool(), tables).await
    }

    /// Migration file writer for this session's dialect.
    pub fn migrations(&self) -> MigrationWriter<'_> {
        MigrationWriter::new(self.dialect.as_ref())
    }
}

/// Builder for creating configured sessions.
#[derive(Debug, Default)]
pub struct SessionBuilder {
    kind: Option<DialectKind>,
}

impl SessionBuilder {
    /// Create a new session builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the dialect directly.
    #[must_use]
    pub fn dialect(mut self, kind: DialectKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Select the dialect from an engine configuration.
    #[must_use]
    pub fn config(self, config: &EngineConfig) -> Self {
        self.dialect(config.driver)
    }

    /// Build the session around `connection`.
    ///
    /// Without an explicit dialect the session fails with a configuration
    /// error rather than guessing.
    #[allow(clippy::result_large_err)]
    pub fn build_with<C: Connection>(self, connection: C) -> relorm_core::Result<Session<C>> {
        match self.kind {
            Some(kind) => Ok(Session::new(connection, kind)),
            None => Err(Error::config("no dialect selected for session")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relorm_core::testing::MockConnection;

    #[test]
    fn builder_requires_a_dialect() {
        let err = Session::<MockConnection>::builder()
            .build_with(MockConnection::new())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builder_takes_dialect_from_config() {
        let config = EngineConfig::new(DialectKind::Mysql, "mysql://localhost/app");
        let session = Session::<MockConnection>::builder()
            .config(&config)
            .build_with(MockConnection::new())
            .unwrap();
        assert_eq!(session.dialect().kind(), DialectKind::Mysql);
        assert!(!session.pool().in_transaction());
    }
}
