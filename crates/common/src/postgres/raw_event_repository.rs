use crate::domain::{
    CreateRawEventRepoInput, DomainError, DomainResult, RawEvent, RawEventRepository,
    RawEventStatus, UpdateRawEventStatusRepoInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::debug;

fn row_to_raw_event(row: &Row) -> DomainResult<RawEvent> {
    let code: i16 = row.get(3);
    let status = RawEventStatus::from_code(code).ok_or_else(|| {
        DomainError::RepositoryError(anyhow::anyhow!("unknown raw event status code {}", code))
    })?;

    Ok(RawEvent {
        raw_event_id: row.get(0),
        received_at: row.get(1),
        raw_payload: row.get(2),
        status,
        error_message: row.get(4),
    })
}

#[derive(Clone)]
pub struct PostgresRawEventRepository {
    client: PostgresClient,
}

impl PostgresRawEventRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RawEventRepository for PostgresRawEventRepository {
    async fn create_raw_event(&self, input: CreateRawEventRepoInput) -> DomainResult<RawEvent> {
        debug!(raw_event_id = %input.raw_event_id, "Creating raw event in database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        conn.execute(
            "INSERT INTO raw_events (raw_event_id, received_at, raw_payload, status)
             VALUES ($1, $2, $3, $4)",
            &[
                &input.raw_event_id,
                &input.received_at,
                &input.raw_payload,
                &RawEventStatus::Pending.code(),
            ],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(RawEvent {
            raw_event_id: input.raw_event_id,
            received_at: input.received_at,
            raw_payload: input.raw_payload,
            status: RawEventStatus::Pending,
            error_message: None,
        })
    }

    async fn get_raw_event(&self, raw_event_id: &str) -> DomainResult<Option<RawEvent>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT raw_event_id, received_at, raw_payload, status, error_message
                 FROM raw_events
                 WHERE raw_event_id = $1",
                &[&raw_event_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(row_to_raw_event).transpose()
    }

    async fn update_raw_event_status(
        &self,
        input: UpdateRawEventStatusRepoInput,
    ) -> DomainResult<()> {
        if !input.status.is_terminal() {
            return Err(DomainError::ValidationError(
                "raw event status can only move to a terminal value".to_string(),
            ));
        }

        debug!(raw_event_id = %input.raw_event_id, status = ?input.status, "Settling raw event");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows_affected = conn
            .execute(
                "UPDATE raw_events
                 SET status = $1, error_message = $2
                 WHERE raw_event_id = $3 AND status = $4",
                &[
                    &input.status.code(),
                    &input.error_message,
                    &input.raw_event_id,
                    &RawEventStatus::Pending.code(),
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            // Distinguish a missing row from one that already settled
            let exists = conn
                .query_opt(
                    "SELECT 1 FROM raw_events WHERE raw_event_id = $1",
                    &[&input.raw_event_id],
                )
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?
                .is_some();

            return Err(if exists {
                DomainError::StatusAlreadySettled(input.raw_event_id)
            } else {
                DomainError::RawEventNotFound(input.raw_event_id)
            });
        }

        Ok(())
    }
}
