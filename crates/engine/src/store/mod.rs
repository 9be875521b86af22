//! Entity Store: the device-resident, identity-partitioned replica.
//!
//! All four collections of every identity live in one SQLite database, each
//! row keyed by `(namespace, id)`. [`LocalStore`] owns the connection and the
//! per-namespace lifecycle (`initialize`, `clear`); [`Replica`] is the view of
//! one namespace and carries the entity operations.

use std::path::{Path, PathBuf};

use chrono::Utc;
use chrono_tz::Tz;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveValue, ConnectionTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, TransactionTrait, prelude::*,
};

use crate::{
    Identity, ResultEngine, balance_corrections, budgets, categories, defaults, namespaces,
    transactions, wallets,
};

mod budgets_ops;
mod categories_ops;
mod snapshot;
mod summary;
mod transactions_ops;
mod wallets_ops;

pub use summary::{CategoryTotal, Summary};

const MEMORY_URL: &str = "sqlite::memory:";

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($db:expr, |$tx:ident| $body:expr) => {{
        let $tx = $db.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Handle on the local database holding every namespace.
#[derive(Clone, Debug)]
pub struct LocalStore {
    database: DatabaseConnection,
    timezone: Tz,
    durable: bool,
}

impl LocalStore {
    /// Return a builder for `LocalStore`. Help to build the struct.
    pub fn builder() -> LocalStoreBuilder {
        LocalStoreBuilder::default()
    }

    /// View of the namespace owned by `identity`.
    pub fn replica(&self, identity: &Identity) -> Replica {
        Replica {
            database: self.database.clone(),
            namespace: identity.namespace(),
            timezone: self.timezone,
        }
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// `false` when the store fell back to in-memory storage.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub async fn is_initialized(&self, identity: &Identity) -> ResultEngine<bool> {
        let marker = namespaces::Entity::find_by_id(identity.namespace())
            .one(&self.database)
            .await?;
        Ok(marker.is_some())
    }

    /// Prepares the namespace of `identity` on first use.
    ///
    /// A guest namespace with no prior data is seeded with the default wallet
    /// and category taxonomy. Authenticated namespaces are only marked: their
    /// defaults come from the remote, so locally minted ids never compete
    /// with the remote ones. Returns `false` when the namespace was already
    /// initialized.
    pub async fn initialize(&self, identity: &Identity) -> ResultEngine<bool> {
        let namespace = identity.namespace();
        with_tx!(self.database, |db_tx| {
            if namespaces::Entity::find_by_id(namespace.clone())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Ok(false);
            }

            let has_data = wallets::Entity::find()
                .filter(wallets::Column::Namespace.eq(namespace.as_str()))
                .count(&db_tx)
                .await?
                > 0
                || categories::Entity::find()
                    .filter(categories::Column::Namespace.eq(namespace.as_str()))
                    .count(&db_tx)
                    .await?
                    > 0;

            if !identity.is_authenticated() && !has_data {
                let wallet = defaults::default_wallet();
                wallets::Entity::insert(wallets::ActiveModel::from((&wallet, namespace.as_str())))
                    .exec_without_returning(&db_tx)
                    .await?;
                for category in defaults::default_categories() {
                    categories::Entity::insert(categories::ActiveModel::from((
                        &category,
                        namespace.as_str(),
                    )))
                    .exec_without_returning(&db_tx)
                    .await?;
                }
                tracing::info!("seeded default wallet and categories for {namespace}");
            }

            namespaces::Entity::insert(namespaces::ActiveModel {
                namespace: ActiveValue::Set(namespace.clone()),
                initialized_at: ActiveValue::Set(Utc::now()),
            })
            .exec_without_returning(&db_tx)
            .await?;
            Ok(true)
        })
    }

    /// Deletes every collection and the initialization marker of `identity`.
    pub async fn clear(&self, identity: &Identity) -> ResultEngine<()> {
        let namespace = identity.namespace();
        with_tx!(self.database, |db_tx| {
            delete_namespace_collections(&db_tx, &namespace).await?;
            balance_corrections::Entity::delete_many()
                .filter(balance_corrections::Column::Namespace.eq(namespace.as_str()))
                .exec(&db_tx)
                .await?;
            namespaces::Entity::delete_by_id(namespace.clone())
                .exec(&db_tx)
                .await?;
            tracing::info!("cleared local data for {namespace}");
            Ok(())
        })
    }
}

/// Removes the four replicated collections of a namespace.
pub(crate) async fn delete_namespace_collections<C: ConnectionTrait>(
    db: &C,
    namespace: &str,
) -> ResultEngine<()> {
    transactions::Entity::delete_many()
        .filter(transactions::Column::Namespace.eq(namespace))
        .exec(db)
        .await?;
    wallets::Entity::delete_many()
        .filter(wallets::Column::Namespace.eq(namespace))
        .exec(db)
        .await?;
    categories::Entity::delete_many()
        .filter(categories::Column::Namespace.eq(namespace))
        .exec(db)
        .await?;
    budgets::Entity::delete_many()
        .filter(budgets::Column::Namespace.eq(namespace))
        .exec(db)
        .await?;
    Ok(())
}

/// The builder for `LocalStore`
#[derive(Default)]
pub struct LocalStoreBuilder {
    database: Option<DatabaseConnection>,
    path: Option<PathBuf>,
    timezone: Option<Tz>,
}

impl LocalStoreBuilder {
    /// Use an already connected database.
    pub fn database(mut self, db: DatabaseConnection) -> LocalStoreBuilder {
        self.database = Some(db);
        self
    }

    /// SQLite file to open (created when missing).
    pub fn path(mut self, path: impl AsRef<Path>) -> LocalStoreBuilder {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Time zone used for calendar month windows. Defaults to UTC.
    pub fn timezone(mut self, timezone: Tz) -> LocalStoreBuilder {
        self.timezone = Some(timezone);
        self
    }

    /// Construct `LocalStore`, applying pending migrations.
    ///
    /// When the SQLite file cannot be opened the store degrades to an
    /// in-memory database: every operation keeps working, nothing survives
    /// the process.
    pub async fn build(self) -> ResultEngine<LocalStore> {
        let timezone = self.timezone.unwrap_or(Tz::UTC);
        let (database, durable) = match (self.database, self.path) {
            (Some(database), _) => (database, true),
            (None, Some(path)) => match open_file(&path).await {
                Ok(database) => (database, true),
                Err(err) => {
                    tracing::warn!(
                        "local storage unavailable at {}: {err}; falling back to memory",
                        path.display()
                    );
                    (Database::connect(MEMORY_URL).await?, false)
                }
            },
            (None, None) => (Database::connect(MEMORY_URL).await?, false),
        };

        Migrator::up(&database, None).await?;
        Ok(LocalStore {
            database,
            timezone,
            durable,
        })
    }
}

async fn open_file(path: &Path) -> Result<DatabaseConnection, DbErr> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| DbErr::Custom(err.to_string()))?;
    }
    let url = format!("sqlite:{}?mode=rwc", path.display());
    let database = Database::connect(url).await?;
    database
        .execute_unprepared("SELECT 1")
        .await
        .map(|_| database)
}

/// One namespace of the local replica.
#[derive(Clone, Debug)]
pub struct Replica {
    database: DatabaseConnection,
    namespace: String,
    timezone: Tz,
}

impl Replica {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}
