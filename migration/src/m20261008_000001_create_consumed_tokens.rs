//! Migration to create the consumed_tokens table
//!
//! Each precondition token may back exactly one order. The primary key on
//! `token` makes a replayed token fail inside the order transaction.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConsumedTokens::Table)
                    .if_not_exists()
                    .col(string_len(ConsumedTokens::Token, 64).primary_key())
                    .col(string_len(ConsumedTokens::Kind, 16).not_null())
                    .col(string_len(ConsumedTokens::OrderId, 36).not_null())
                    .col(timestamp_with_time_zone(ConsumedTokens::ConsumedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consumed_tokens_order_id")
                    .table(ConsumedTokens::Table)
                    .col(ConsumedTokens::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConsumedTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ConsumedTokens {
    Table,
    Token,
    Kind,
    OrderId,
    ConsumedAt,
}
