//! Global mutation queue. Drain order is ascending `seq`; `owner` is the
//! remote user id the write was authored under.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Mutations {
    Table,
    Seq,
    Id,
    Kind,
    Payload,
    Owner,
    EnqueuedAt,
    RetryCount,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Mutations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Mutations::Seq)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Mutations::Id)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Mutations::Kind).string().not_null())
                    .col(ColumnDef::new(Mutations::Payload).json().not_null())
                    .col(ColumnDef::new(Mutations::Owner).string().not_null())
                    .col(
                        ColumnDef::new(Mutations::EnqueuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Mutations::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-mutations-owner-seq")
                    .table(Mutations::Table)
                    .col(Mutations::Owner)
                    .col(Mutations::Seq)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Mutations::Table).to_owned())
            .await
    }
}
