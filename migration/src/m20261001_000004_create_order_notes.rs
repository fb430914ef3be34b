//! Migration to create the order_notes table
//!
//! Append-only log of attributed, timestamped annotations per order.

use sea_orm_migration::{prelude::*, schema::*};

use super::m20261001_000002_create_orders::Orders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderNotes::Table)
                    .if_not_exists()
                    .col(pk_auto(OrderNotes::Id))
                    .col(string_len(OrderNotes::OrderId, 36).not_null())
                    .col(string(OrderNotes::Author).not_null())
                    .col(text(OrderNotes::Body).not_null())
                    .col(timestamp_with_time_zone(OrderNotes::CreatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_notes_order")
                            .from(OrderNotes::Table, OrderNotes::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_notes_order_id")
                    .table(OrderNotes::Table)
                    .col(OrderNotes::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderNotes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OrderNotes {
    Table,
    Id,
    OrderId,
    Author,
    Body,
    CreatedAt,
}
