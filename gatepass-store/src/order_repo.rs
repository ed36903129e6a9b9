use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_core::StoreResult;
use gatepass_order::{
    Issuance, Order, OrderRepository, OrderStatus, PaymentInfo, TicketInstance, TicketTransition,
};
use gatepass_shared::Masked;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::{parse_column, store_error};

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attaches instances to already-loaded order rows, keeping row order.
    async fn hydrate(&self, rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let ticket_rows = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, order_id, ticket_definition_id, session_id, price, qr_code, status,
                   check_in_time
            FROM ticket_instances
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut by_order: HashMap<Uuid, Vec<TicketInstance>> = HashMap::new();
        for row in ticket_rows {
            let order_id = row.order_id;
            by_order.entry(order_id).or_default().push(row.into_instance()?);
        }

        rows.into_iter()
            .map(|row| {
                let tickets = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(tickets)
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    email: String,
    total_amount: i64,
    status: String,
    payment_method: String,
    transaction_no: Option<String>,
    bank_code: Option<String>,
    pay_date: Option<String>,
    refund_status: String,
    refund_txn_no: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, tickets: Vec<TicketInstance>) -> StoreResult<Order> {
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            email: Masked::new(self.email),
            total_amount: self.total_amount,
            status: parse_column("orders.status", &self.status)?,
            payment_method: parse_column("orders.payment_method", &self.payment_method)?,
            payment: PaymentInfo {
                transaction_no: self.transaction_no,
                bank_code: self.bank_code,
                pay_date: self.pay_date,
                refund_status: parse_column("orders.refund_status", &self.refund_status)?,
                refund_txn_no: self.refund_txn_no,
            },
            tickets,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    order_id: Uuid,
    ticket_definition_id: Uuid,
    session_id: Uuid,
    price: i64,
    qr_code: String,
    status: String,
    check_in_time: Option<DateTime<Utc>>,
}

impl TicketRow {
    fn into_instance(self) -> StoreResult<TicketInstance> {
        Ok(TicketInstance {
            id: self.id,
            ticket_definition_id: self.ticket_definition_id,
            session_id: self.session_id,
            price: self.price,
            qr_code: self.qr_code,
            status: parse_column("ticket_instances.status", &self.status)?,
            check_in_time: self.check_in_time,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, email, total_amount, status, payment_method, \
    transaction_no, bank_code, pay_date, refund_status, refund_txn_no, created_at, updated_at";

/// Check-in time a ticket transition writes besides `status`.
fn transition_check_in(transition: &TicketTransition) -> Option<DateTime<Utc>> {
    match transition {
        TicketTransition::CheckIn { at } => Some(*at),
        TicketTransition::Refund => None,
    }
}

/// Splits issuances into the parallel arrays `UNNEST` takes.
fn issuance_arrays(issue: &[Issuance]) -> (Vec<Uuid>, Vec<String>) {
    issue
        .iter()
        .map(|i| (i.instance_id, i.qr_code.clone()))
        .unzip()
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, order: &Order) -> StoreResult<Uuid> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, email, total_amount, status, payment_method,
                                transaction_no, bank_code, pay_date, refund_status, refund_txn_no,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.email.expose())
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.payment.transaction_no.as_deref())
        .bind(order.payment.bank_code.as_deref())
        .bind(order.payment.pay_date.as_deref())
        .bind(order.payment.refund_status.as_str())
        .bind(order.payment.refund_txn_no.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        for (position, ticket) in order.tickets.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO ticket_instances (id, order_id, position, ticket_definition_id,
                                              session_id, price, qr_code, status, check_in_time)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(ticket.id)
            .bind(order.id)
            .bind(position as i32)
            .bind(ticket.ticket_definition_id)
            .bind(ticket.session_id)
            .bind(ticket.price)
            .bind(&ticket.qr_code)
            .bind(ticket.status.as_str())
            .bind(ticket.check_in_time)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_user_orders(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        self.hydrate(rows).await
    }

    async fn list_session_orders(&self, session_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders \
             WHERE id IN (SELECT order_id FROM ticket_instances WHERE session_id = $1) \
             ORDER BY created_at",
            ORDER_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        self.hydrate(rows).await
    }

    async fn transition_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        payment: Option<&PaymentInfo>,
    ) -> StoreResult<bool> {
        let result = match payment {
            Some(payment) => {
                sqlx::query(
                    r#"
                    UPDATE orders
                    SET status = $3, transaction_no = $4, bank_code = $5, pay_date = $6,
                        refund_status = $7, refund_txn_no = $8, updated_at = NOW()
                    WHERE id = $1 AND status = $2
                    "#,
                )
                .bind(id)
                .bind(from.as_str())
                .bind(to.as_str())
                .bind(payment.transaction_no.as_deref())
                .bind(payment.bank_code.as_deref())
                .bind(payment.pay_date.as_deref())
                .bind(payment.refund_status.as_str())
                .bind(payment.refund_txn_no.as_deref())
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE orders SET status = $3, updated_at = NOW() \
                     WHERE id = $1 AND status = $2",
                )
                .bind(id)
                .bind(from.as_str())
                .bind(to.as_str())
                .execute(&self.pool)
                .await
            }
        }
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn settle_order(
        &self,
        id: Uuid,
        payment: Option<&PaymentInfo>,
        issue: &[Issuance],
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let settled = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'paid',
                transaction_no = CASE WHEN $2 THEN $3 ELSE transaction_no END,
                bank_code = CASE WHEN $2 THEN $4 ELSE bank_code END,
                pay_date = CASE WHEN $2 THEN $5 ELSE pay_date END,
                refund_status = CASE WHEN $2 THEN $6 ELSE refund_status END,
                refund_txn_no = CASE WHEN $2 THEN $7 ELSE refund_txn_no END,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(payment.is_some())
        .bind(payment.and_then(|p| p.transaction_no.as_deref()))
        .bind(payment.and_then(|p| p.bank_code.as_deref()))
        .bind(payment.and_then(|p| p.pay_date.as_deref()))
        .bind(payment.map(|p| p.refund_status.as_str()))
        .bind(payment.and_then(|p| p.refund_txn_no.as_deref()))
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        if settled.rows_affected() != 1 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        let (ids, qr_codes) = issuance_arrays(issue);
        sqlx::query(
            r#"
            WITH issued AS (
                UPDATE ticket_instances t
                SET status = 'valid', qr_code = i.qr_code
                FROM UNNEST($2::uuid[], $3::text[]) AS i(id, qr_code)
                WHERE t.id = i.id AND t.order_id = $1 AND t.status = 'pending'
                RETURNING t.ticket_definition_id
            ),
            sold AS (
                SELECT ticket_definition_id, COUNT(*)::int AS n
                FROM issued
                GROUP BY ticket_definition_id
            )
            UPDATE ticket_definitions d
            SET sold_quantity = d.sold_quantity + sold.n, updated_at = NOW()
            FROM sold
            WHERE d.id = sold.ticket_definition_id
            "#,
        )
        .bind(id)
        .bind(&ids)
        .bind(&qr_codes)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        Ok(true)
    }

    async fn transition_ticket(
        &self,
        order_id: Uuid,
        instance_id: Uuid,
        transition: &TicketTransition,
    ) -> StoreResult<bool> {
        let check_in_time = transition_check_in(transition);

        // One statement: the instance write and the order's timestamp bump
        // either both happen or neither does.
        let result = sqlx::query(
            r#"
            WITH moved AS (
                UPDATE ticket_instances
                SET status = $4,
                    check_in_time = COALESCE(check_in_time, $5)
                WHERE id = $1 AND order_id = $2 AND status = $3
                RETURNING order_id
            )
            UPDATE orders SET updated_at = NOW()
            WHERE id IN (SELECT order_id FROM moved)
            "#,
        )
        .bind(instance_id)
        .bind(order_id)
        .bind(transition.from_status().as_str())
        .bind(transition.to_status().as_str())
        .bind(check_in_time)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }
}
