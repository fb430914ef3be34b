//! Migration to create the payment_transactions table

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentTransactions::Table)
                    .if_not_exists()
                    .col(string_len(PaymentTransactions::TransactionId, 64).primary_key())
                    .col(string_len_null(PaymentTransactions::OrderId, 36))
                    .col(string_null(PaymentTransactions::ExternalPaymentId))
                    .col(decimal_len(PaymentTransactions::AmountUsd, 12, 2).not_null())
                    .col(big_integer(PaymentTransactions::AmountPoints).not_null())
                    .col(string_len(PaymentTransactions::Status, 16).not_null().default("pending"))
                    .col(string_len(PaymentTransactions::IntegrityHash, 64).not_null())
                    .col(json_null(PaymentTransactions::Metadata))
                    .col(timestamp_with_time_zone(PaymentTransactions::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(PaymentTransactions::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Index for resolving the payment behind an order
        manager
            .create_index(
                Index::create()
                    .name("idx_payment_transactions_order_id")
                    .table(PaymentTransactions::Table)
                    .col(PaymentTransactions::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentTransactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PaymentTransactions {
    Table,
    TransactionId,
    OrderId,
    ExternalPaymentId,
    AmountUsd,
    AmountPoints,
    Status,
    IntegrityHash,
    Metadata,
    CreatedAt,
    UpdatedAt,
}
