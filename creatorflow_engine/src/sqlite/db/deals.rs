use cf_common::Money;
use chrono::Utc;
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    api::objects::DealQueryFilter,
    db_types::{Deal, DealUpdate, Deliverable, DeliverableStatus, NewDeal, PaymentStatus},
};

/// Inserts a new deal and its deliverables. This is not atomic. You can embed this call inside a
/// transaction if you need atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_deal(deal: NewDeal, conn: &mut SqliteConnection) -> Result<Deal, sqlx::Error> {
    let now = Utc::now();
    let mut result: Deal = sqlx::query_as(
        r#"
            INSERT INTO deals (
                user_id,
                brand_name,
                brand_handle,
                deal_name,
                platform,
                amount,
                due_date,
                notes,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(deal.user_id)
    .bind(deal.brand_name)
    .bind(deal.brand_handle)
    .bind(deal.deal_name)
    .bind(deal.platform)
    .bind(deal.amount)
    .bind(deal.due_date)
    .bind(deal.notes)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    for deliverable in deal.deliverables {
        let row: Deliverable = sqlx::query_as(
            r#"
                INSERT INTO deliverables (deal_id, kind, platform, due_date)
                VALUES ($1, $2, $3, $4)
                RETURNING *;
            "#,
        )
        .bind(result.id)
        .bind(deliverable.kind)
        .bind(deliverable.platform)
        .bind(deliverable.due_date)
        .fetch_one(&mut *conn)
        .await?;
        result.deliverables.push(row);
    }
    Ok(result)
}

/// Fetches a deal scoped by owner. Deliverables are not loaded; see [`load_deliverables`].
pub async fn fetch_deal(deal_id: i64, user_id: i64, conn: &mut SqliteConnection) -> Result<Option<Deal>, sqlx::Error> {
    let deal = sqlx::query_as("SELECT * FROM deals WHERE id = $1 AND user_id = $2")
        .bind(deal_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(deal)
}

/// Populates the `deliverables` list on each of the given deals, in insertion order.
pub async fn load_deliverables(deals: &mut [Deal], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for deal in deals.iter_mut() {
        let rows: Vec<Deliverable> =
            sqlx::query_as("SELECT * FROM deliverables WHERE deal_id = $1 ORDER BY id ASC")
                .bind(deal.id)
                .fetch_all(&mut *conn)
                .await?;
        deal.deliverables = rows;
    }
    Ok(())
}

/// Fetches deals according to criteria specified in the `DealQueryFilter`.
///
/// Resulting deals are ordered by `created_at` in descending order.
pub async fn search_deals(
    user_id: i64,
    query: DealQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Deal>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM deals WHERE user_id = ");
    builder.push_bind(user_id);
    if let Some(search) = query.search {
        let pattern = format!("%{search}%");
        builder.push(" AND (brand_name LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR brand_handle LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR deal_name LIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(platform) = query.platform {
        builder.push(" AND platform = ");
        builder.push_bind(platform);
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(payment_status) = query.payment_status {
        builder.push(" AND payment_status = ");
        builder.push_bind(payment_status);
    }
    builder.push(" ORDER BY created_at DESC");
    trace!("📝️ Executing query: {}", builder.sql());
    let deals = builder.build_query_as::<Deal>().fetch_all(conn).await?;
    Ok(deals)
}

/// The user's deals that still have at least one pending deliverable.
pub async fn fetch_deals_with_pending_deliverables(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Deal>, sqlx::Error> {
    let deals = sqlx::query_as(
        r#"
            SELECT DISTINCT d.* FROM deals d
            JOIN deliverables dv ON dv.deal_id = d.id
            WHERE d.user_id = $1 AND dv.status = $2
            ORDER BY d.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(DeliverableStatus::Pending)
    .fetch_all(conn)
    .await?;
    Ok(deals)
}

/// Applies the permitted field changes to a deal. Returns `None` when the deal does not exist or
/// belongs to another user.
pub async fn update_deal(
    deal_id: i64,
    user_id: i64,
    update: DealUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Deal>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE deals SET updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(brand_name) = update.brand_name {
        builder.push(", brand_name = ");
        builder.push_bind(brand_name);
    }
    if let Some(brand_handle) = update.brand_handle {
        builder.push(", brand_handle = ");
        builder.push_bind(brand_handle);
    }
    if let Some(deal_name) = update.deal_name {
        builder.push(", deal_name = ");
        builder.push_bind(deal_name);
    }
    if let Some(platform) = update.platform {
        builder.push(", platform = ");
        builder.push_bind(platform);
    }
    if let Some(status) = update.status {
        builder.push(", status = ");
        builder.push_bind(status);
    }
    if let Some(amount) = update.amount {
        builder.push(", amount = ");
        builder.push_bind(amount);
    }
    if let Some(due_date) = update.due_date {
        builder.push(", due_date = ");
        builder.push_bind(due_date);
    }
    if let Some(notes) = update.notes {
        builder.push(", notes = ");
        builder.push_bind(notes);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(deal_id);
    builder.push(" AND user_id = ");
    builder.push_bind(user_id);
    builder.push(" RETURNING *");
    let deal = builder.build_query_as::<Deal>().fetch_optional(conn).await?;
    Ok(deal)
}

/// Writes the reconciled totals onto a deal. This is the only code path that touches the derived
/// columns.
pub async fn update_payment_totals(
    deal_id: i64,
    total_received: Money,
    payment_status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE deals SET amount_received = $1, payment_status = $2, updated_at = $3 WHERE id = $4")
        .bind(total_received)
        .bind(payment_status)
        .bind(Utc::now())
        .bind(deal_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Deletes a deal, returning the deleted record. Payments are removed by the caller (or the
/// foreign-key cascade) as part of the same transaction.
pub async fn delete_deal(
    deal_id: i64,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Deal>, sqlx::Error> {
    let deal = sqlx::query_as("DELETE FROM deals WHERE id = $1 AND user_id = $2 RETURNING *")
        .bind(deal_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(deal)
}

/// Marks a deliverable completed, stamping the completion time. Ownership is checked through the
/// parent deal.
pub async fn complete_deliverable(
    deliverable_id: i64,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Deliverable>, sqlx::Error> {
    let deliverable = sqlx::query_as(
        r#"
            UPDATE deliverables SET status = $1, completed_at = $2
            WHERE id = $3 AND deal_id IN (SELECT id FROM deals WHERE user_id = $4)
            RETURNING *;
        "#,
    )
    .bind(DeliverableStatus::Completed)
    .bind(Utc::now())
    .bind(deliverable_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(deliverable)
}
