pub use super::consumed_tokens::Entity as ConsumedTokens;
pub use super::order_items::Entity as OrderItems;
pub use super::order_notes::Entity as OrderNotes;
pub use super::orders::Entity as Orders;
pub use super::payment_transactions::Entity as PaymentTransactions;
pub use super::products::Entity as Products;
