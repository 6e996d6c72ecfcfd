use chrono::Utc;
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    api::objects::PaymentQueryFilter,
    db_types::{NewPayment, Payment, PaymentUpdate},
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, sqlx::Error> {
    let now = Utc::now();
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (
                user_id,
                deal_id,
                amount,
                received,
                status,
                due_date,
                paid_at,
                notes,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(payment.user_id)
    .bind(payment.deal_id)
    .bind(payment.amount)
    .bind(payment.received)
    .bind(payment.status)
    .bind(payment.due_date)
    .bind(payment.paid_at)
    .bind(payment.notes)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payment(
    payment_id: i64,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1 AND user_id = $2")
        .bind(payment_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// All payments recorded against a deal, in insertion order. This is the set reconciliation
/// sums over.
pub async fn fetch_payments_for_deal(
    deal_id: i64,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE deal_id = $1 AND user_id = $2 ORDER BY id ASC")
        .bind(deal_id)
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

/// Fetches payments according to criteria specified in the `PaymentQueryFilter`.
///
/// Resulting payments are ordered by `created_at` in descending order.
pub async fn search_payments(
    user_id: i64,
    query: PaymentQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM payments WHERE user_id = ");
    builder.push_bind(user_id);
    if let Some(deal_id) = query.deal_id {
        builder.push(" AND deal_id = ");
        builder.push_bind(deal_id);
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    builder.push(" ORDER BY created_at DESC");
    trace!("📝️ Executing query: {}", builder.sql());
    let payments = builder.build_query_as::<Payment>().fetch_all(conn).await?;
    Ok(payments)
}

/// Applies the permitted field changes to a payment. Returns `None` when the payment does not
/// exist or belongs to another user.
pub async fn update_payment(
    payment_id: i64,
    user_id: i64,
    update: PaymentUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE payments SET updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(amount) = update.amount {
        builder.push(", amount = ");
        builder.push_bind(amount);
    }
    if let Some(received) = update.received {
        builder.push(", received = ");
        builder.push_bind(received);
    }
    if let Some(status) = update.status {
        builder.push(", status = ");
        builder.push_bind(status);
    }
    if let Some(due_date) = update.due_date {
        builder.push(", due_date = ");
        builder.push_bind(due_date);
    }
    if let Some(paid_at) = update.paid_at {
        builder.push(", paid_at = ");
        builder.push_bind(paid_at);
    }
    if let Some(notes) = update.notes {
        builder.push(", notes = ");
        builder.push_bind(notes);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(payment_id);
    builder.push(" AND user_id = ");
    builder.push_bind(user_id);
    builder.push(" RETURNING *");
    let payment = builder.build_query_as::<Payment>().fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn delete_payment(
    payment_id: i64,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("DELETE FROM payments WHERE id = $1 AND user_id = $2 RETURNING *")
        .bind(payment_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// Removes every payment belonging to a deal. Used when a deal is deleted.
pub async fn delete_payments_for_deal(
    deal_id: i64,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM payments WHERE deal_id = $1 AND user_id = $2")
        .bind(deal_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
