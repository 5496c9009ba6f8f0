use crate::domain::{
    CreateMappedEventRepoInput, DomainError, DomainResult, MappedEvent, MappedEventRepository,
    PublishStatus, UpdatePublishStatusRepoInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::debug;

const SELECT_COLUMNS: &str = "mapped_event_id, raw_event_id, actor_id, amount, currency, \
     event_type, occurred_at, payload, publish_status, failure_reason, created_at";

fn row_to_mapped_event(row: &Row) -> DomainResult<MappedEvent> {
    let code: i16 = row.get(8);
    let publish_status = PublishStatus::from_code(code).ok_or_else(|| {
        DomainError::RepositoryError(anyhow::anyhow!("unknown publish status code {}", code))
    })?;

    Ok(MappedEvent {
        mapped_event_id: row.get(0),
        raw_event_id: row.get(1),
        actor_id: row.get(2),
        amount: row.get(3),
        currency: row.get(4),
        event_type: row.get(5),
        occurred_at: row.get(6),
        payload: row.get(7),
        publish_status,
        failure_reason: row.get(9),
        created_at: row.get(10),
    })
}

#[derive(Clone)]
pub struct PostgresMappedEventRepository {
    client: PostgresClient,
}

impl PostgresMappedEventRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn find_one(&self, column: &str, value: &str) -> DomainResult<Option<MappedEvent>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {} FROM mapped_events WHERE {} = $1",
            SELECT_COLUMNS, column
        );
        let row = conn
            .query_opt(query.as_str(), &[&value])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(row_to_mapped_event).transpose()
    }
}

#[async_trait]
impl MappedEventRepository for PostgresMappedEventRepository {
    async fn create_mapped_event(
        &self,
        input: CreateMappedEventRepoInput,
    ) -> DomainResult<MappedEvent> {
        debug!(
            mapped_event_id = %input.mapped_event_id,
            raw_event_id = %input.raw_event_id,
            "Creating mapped event in database"
        );

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let result = conn
            .execute(
                "INSERT INTO mapped_events (mapped_event_id, raw_event_id, actor_id, amount, currency,
                     event_type, occurred_at, payload, publish_status, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                &[
                    &input.mapped_event_id,
                    &input.raw_event_id,
                    &input.actor_id,
                    &input.amount,
                    &input.currency,
                    &input.event_type,
                    &input.occurred_at,
                    &input.payload,
                    &PublishStatus::Pending.code(),
                    &input.created_at,
                ],
            )
            .await;

        if let Err(e) = result {
            // 23503 = foreign_key_violation
            if let Some(db_err) = e.as_db_error() {
                if db_err.code().code() == "23503" {
                    return Err(DomainError::RawEventNotFound(input.raw_event_id));
                }
            }
            return Err(DomainError::RepositoryError(e.into()));
        }

        Ok(MappedEvent {
            mapped_event_id: input.mapped_event_id,
            raw_event_id: input.raw_event_id,
            actor_id: input.actor_id,
            amount: input.amount,
            currency: input.currency,
            event_type: input.event_type,
            occurred_at: input.occurred_at,
            payload: input.payload,
            publish_status: PublishStatus::Pending,
            failure_reason: None,
            created_at: input.created_at,
        })
    }

    async fn get_mapped_event(&self, mapped_event_id: &str) -> DomainResult<Option<MappedEvent>> {
        self.find_one("mapped_event_id", mapped_event_id).await
    }

    async fn get_mapped_event_by_raw_event_id(
        &self,
        raw_event_id: &str,
    ) -> DomainResult<Option<MappedEvent>> {
        self.find_one("raw_event_id", raw_event_id).await
    }

    async fn update_publish_status(&self, input: UpdatePublishStatusRepoInput) -> DomainResult<()> {
        if input.publish_status == PublishStatus::Pending {
            return Err(DomainError::ValidationError(
                "publish status can only move to Sent or Failed".to_string(),
            ));
        }

        debug!(
            mapped_event_id = %input.mapped_event_id,
            publish_status = ?input.publish_status,
            "Recording publish outcome"
        );

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows_affected = conn
            .execute(
                "UPDATE mapped_events
                 SET publish_status = $1, failure_reason = $2
                 WHERE mapped_event_id = $3 AND publish_status = $4",
                &[
                    &input.publish_status.code(),
                    &input.failure_reason,
                    &input.mapped_event_id,
                    &PublishStatus::Pending.code(),
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            let exists = conn
                .query_opt(
                    "SELECT 1 FROM mapped_events WHERE mapped_event_id = $1",
                    &[&input.mapped_event_id],
                )
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?
                .is_some();

            return Err(if exists {
                DomainError::StatusAlreadySettled(input.mapped_event_id)
            } else {
                DomainError::MappedEventNotFound(input.mapped_event_id)
            });
        }

        Ok(())
    }
}
