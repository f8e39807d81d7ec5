//! # tagorm: tag-driven ORM for MySQL and PostgreSQL
//!
//! Models describe their fields once through [`Model::describe`], with
//! comma-separated annotations such as `"pk,auto"` or `"column:email,unique"`.
//! The [`MetadataManager`] turns that description into cached table metadata,
//! the [`QueryBuilder`] compiles fluent chains into vendor SQL with bound
//! arguments, and the [`Repository`] maps rows back into models.
//!
//! ```rust,ignore
//! let orm = Orm::connect_url("postgres://app@localhost/shop").await?;
//! orm.register_model::<User>()?;
//! orm.create_table::<User>().await?;
//!
//! let mut user = User { name: "Ada".into(), ..Default::default() };
//! orm.repository::<User>().save(&mut user).await?;
//!
//! let adults = orm.query::<User>().where_gte("age", 18).order_by_asc("name").find().await?;
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod model;
pub mod orm;
pub mod query;
pub mod repository;
pub mod transaction;
pub mod value;



// Re-export core traits and types
pub use backends::{
    Dialect, DialectKind, ExecResult, MockDialect, MySqlDialect, PostgresDialect, RecordedStatement,
    Transaction,
};
pub use config::{ConnectionConfig, PoolSettings};
pub use error::*;
pub use executor::Executor;
pub use metadata::{
    Column, ForeignKey, Index, MetadataManager, ModelMetadata, ReferentialAction, Relation,
    RelationKind,
};
pub use model::*;
pub use orm::{Orm, Scope};
pub use query::*;
pub use repository::{Criteria, Repository};
pub use transaction::*;
pub use value::{FromValue, Row, Value};
