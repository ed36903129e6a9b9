use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_catalog::{
    CatalogRepository, Event, Session, TicketDefinition, TicketDefinitionStatus,
};
use gatepass_core::StoreResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{parse_column, store_error};

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    organizer_id: Uuid,
    title: String,
    status: String,
}

impl EventRow {
    fn into_event(self) -> StoreResult<Event> {
        Ok(Event {
            id: self.id,
            organizer_id: self.organizer_id,
            title: self.title,
            status: parse_column("events.status", &self.status)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    event_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
}

impl SessionRow {
    fn into_session(self) -> StoreResult<Session> {
        Ok(Session {
            id: self.id,
            event_id: self.event_id,
            start_time: self.start_time,
            end_time: self.end_time,
            status: parse_column("sessions.status", &self.status)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketDefinitionRow {
    id: Uuid,
    session_id: Uuid,
    name: String,
    price: i64,
    ticket_quantity: i32,
    sold_quantity: i32,
    min_per_order: i32,
    max_per_order: i32,
    status: String,
}

impl TicketDefinitionRow {
    fn into_definition(self) -> StoreResult<TicketDefinition> {
        Ok(TicketDefinition {
            id: self.id,
            session_id: self.session_id,
            name: self.name,
            price: self.price,
            ticket_quantity: self.ticket_quantity,
            sold_quantity: self.sold_quantity,
            min_per_order: self.min_per_order,
            max_per_order: self.max_per_order,
            status: parse_column("ticket_definitions.status", &self.status)?,
        })
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        sqlx::query_as::<_, EventRow>(
            "SELECT id, organizer_id, title, status FROM events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .map(EventRow::into_event)
        .transpose()
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT id, event_id, start_time, end_time, status FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .map(SessionRow::into_session)
        .transpose()
    }

    async fn list_event_sessions(&self, event_id: Uuid) -> StoreResult<Vec<Session>> {
        sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, event_id, start_time, end_time, status
            FROM sessions
            WHERE event_id = $1
            ORDER BY start_time ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(SessionRow::into_session)
        .collect()
    }

    async fn get_ticket_definition(&self, id: Uuid) -> StoreResult<Option<TicketDefinition>> {
        sqlx::query_as::<_, TicketDefinitionRow>(
            r#"
            SELECT id, session_id, name, price, ticket_quantity, sold_quantity,
                   min_per_order, max_per_order, status
            FROM ticket_definitions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .map(TicketDefinitionRow::into_definition)
        .transpose()
    }

    async fn update_ticket_quantity(&self, id: Uuid, quantity: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ticket_definitions
            SET ticket_quantity = $2, updated_at = NOW()
            WHERE id = $1 AND sold_quantity <= $2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_ticket_status(
        &self,
        id: Uuid,
        status: TicketDefinitionStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE ticket_definitions SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }
}
