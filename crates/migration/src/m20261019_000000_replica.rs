//! Local replica schema.
//!
//! Every replicated table is keyed by `(namespace, id)`: one namespace per
//! identity (`guest`, `auth:<id>`), ids are client-assigned UUID strings.
//!
//! - `replica_namespaces`: initialization marker per namespace
//! - `wallets`, `categories`, `budgets`, `transactions`: the four collections
//! - `balance_corrections`: audit log of manual wallet balance changes

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum ReplicaNamespaces {
    Table,
    Namespace,
    InitializedAt,
}

#[derive(Iden)]
enum Wallets {
    Table,
    Namespace,
    Id,
    Name,
    WalletType,
    Balance,
    DisplayOrder,
    CreatedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Namespace,
    Id,
    Name,
    Kind,
    Icon,
}

#[derive(Iden)]
enum Budgets {
    Table,
    Namespace,
    Id,
    CategoryId,
    AmountMinor,
    Period,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Namespace,
    Id,
    AmountMinor,
    Kind,
    CategoryId,
    WalletId,
    Date,
    Note,
    CreatedAt,
}

#[derive(Iden)]
enum BalanceCorrections {
    Table,
    Namespace,
    Id,
    WalletId,
    PreviousMinor,
    NewMinor,
    DeltaMinor,
    Note,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReplicaNamespaces::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReplicaNamespaces::Namespace)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReplicaNamespaces::InitializedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Wallets::Namespace).string().not_null())
                    .col(ColumnDef::new(Wallets::Id).string().not_null())
                    .col(ColumnDef::new(Wallets::Name).string().not_null())
                    .col(
                        ColumnDef::new(Wallets::WalletType)
                            .string()
                            .not_null()
                            .default("CASH"),
                    )
                    .col(
                        ColumnDef::new(Wallets::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Wallets::Namespace)
                            .col(Wallets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Categories::Namespace).string().not_null())
                    .col(ColumnDef::new(Categories::Id).string().not_null())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::Kind).string().not_null())
                    .col(ColumnDef::new(Categories::Icon).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(Categories::Namespace)
                            .col(Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Budgets::Namespace).string().not_null())
                    .col(ColumnDef::new(Budgets::Id).string().not_null())
                    .col(ColumnDef::new(Budgets::CategoryId).string().not_null())
                    .col(ColumnDef::new(Budgets::AmountMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Budgets::Period)
                            .string()
                            .not_null()
                            .default("MONTHLY"),
                    )
                    .col(
                        ColumnDef::new(Budgets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(Index::create().col(Budgets::Namespace).col(Budgets::Id))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-namespace-category_id")
                    .table(Budgets::Table)
                    .col(Budgets::Namespace)
                    .col(Budgets::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transactions::Namespace).string().not_null())
                    .col(ColumnDef::new(Transactions::Id).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::CategoryId).string().not_null())
                    .col(ColumnDef::new(Transactions::WalletId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::Date)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Note).string())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Transactions::Namespace)
                            .col(Transactions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-namespace-wallet_id")
                    .table(Transactions::Table)
                    .col(Transactions::Namespace)
                    .col(Transactions::WalletId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-namespace-category_id")
                    .table(Transactions::Table)
                    .col(Transactions::Namespace)
                    .col(Transactions::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BalanceCorrections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BalanceCorrections::Namespace)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BalanceCorrections::Id).string().not_null())
                    .col(
                        ColumnDef::new(BalanceCorrections::WalletId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalanceCorrections::PreviousMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalanceCorrections::NewMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalanceCorrections::DeltaMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BalanceCorrections::Note).string())
                    .col(
                        ColumnDef::new(BalanceCorrections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(BalanceCorrections::Namespace)
                            .col(BalanceCorrections::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-balance_corrections-namespace-wallet_id")
                    .table(BalanceCorrections::Table)
                    .col(BalanceCorrections::Namespace)
                    .col(BalanceCorrections::WalletId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BalanceCorrections::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReplicaNamespaces::Table).to_owned())
            .await
    }
}
