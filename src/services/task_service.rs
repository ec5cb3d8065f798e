// src/services/task_service.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{JsonStore, PhotoRepository},
    models::project::{
        year_in_range, DailyConsumption, PartnerRef, StoreDocument, Task, TaskStatus,
        TaskValidation, MAX_AMOUNT, MAX_TASK_SPAN_DAYS, MIN_TASK_YEAR, MAX_TASK_YEAR,
    },
    services::project_service::refresh_project_aggregates,
};

/// Status é função pura do consumo acumulado vs. quantidade planejada.
pub fn derive_task_status(task: &Task) -> TaskStatus {
    let consumed = task.total_consumed();

    if consumed <= Decimal::ZERO {
        TaskStatus::Pendiente
    } else if consumed >= task.quantity {
        TaskStatus::Completado
    } else {
        TaskStatus::EnProgreso
    }
}

/// Aplica o consumo de um dia: zero remove o registro, positivo insere ou sobrescreve.
/// O status é recalculado na mesma operação.
pub fn apply_consumption(
    task: &mut Task,
    date: NaiveDate,
    quantity: Decimal,
) -> Result<(), AppError> {
    if quantity < Decimal::ZERO || quantity > MAX_AMOUNT {
        return Err(AppError::InvalidQuantity);
    }

    let existing = task.daily_consumption.iter().position(|c| c.date == date);

    match (existing, quantity.is_zero()) {
        (Some(index), true) => {
            task.daily_consumption.remove(index);
        }
        (None, true) => {}
        (Some(index), false) => {
            task.daily_consumption[index].consumed_quantity = quantity;
        }
        (None, false) => {
            task.daily_consumption.push(DailyConsumption {
                date,
                consumed_quantity: quantity,
            });
            task.daily_consumption.sort_by_key(|c| c.date);
        }
    }

    task.status = derive_task_status(task);
    Ok(())
}

/// Normaliza a data do consumo para o dia-calendário em UTC.
/// Aceita `YYYY-MM-DD` ou um timestamp RFC 3339.
pub fn normalize_consumption_date(raw: &str) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .map_err(|_| AppError::InvalidDate(raw.to_string()))
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if start > end {
        return Err(AppError::InvalidDateRange);
    }
    if !year_in_range(start) || !year_in_range(end) {
        return Err(AppError::BadRequest(format!(
            "As datas da tarefa devem estar entre {} e {}.",
            MIN_TASK_YEAR, MAX_TASK_YEAR
        )));
    }
    if (end - start).num_days() >= MAX_TASK_SPAN_DAYS {
        return Err(AppError::BadRequest(format!(
            "Uma tarefa não pode durar mais de {} dias.",
            MAX_TASK_SPAN_DAYS
        )));
    }
    Ok(())
}

fn check_amount(amount: Decimal) -> Result<(), AppError> {
    if amount < Decimal::ZERO || amount > MAX_AMOUNT {
        return Err(AppError::BadRequest(format!(
            "Quantidades e valores devem estar entre 0 e {}.",
            MAX_AMOUNT
        )));
    }
    Ok(())
}

fn task_mut(document: &mut StoreDocument, task_id: Uuid) -> Result<&mut Task, AppError> {
    document
        .tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or(AppError::TaskNotFound)
}

pub struct NewTask {
    pub name: String,
    pub quantity: Decimal,
    pub value: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub partner: Option<PartnerRef>,
}

#[derive(Default)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub quantity: Option<Decimal>,
    pub value: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct TaskService {
    store: JsonStore,
    photos: PhotoRepository,
}

impl TaskService {
    pub fn new(store: JsonStore, photos: PhotoRepository) -> Self {
        Self { store, photos }
    }

    pub async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Task>, AppError> {
        let document = self.store.load().await?;
        Ok(document
            .tasks
            .into_iter()
            .filter(|t| t.project_id == project_id)
            .collect())
    }

    pub async fn get(&self, task_id: Uuid) -> Result<Task, AppError> {
        self.store
            .load()
            .await?
            .tasks
            .into_iter()
            .find(|t| t.id == task_id)
            .ok_or(AppError::TaskNotFound)
    }

    pub async fn create(&self, project_id: Uuid, new_task: NewTask) -> Result<Task, AppError> {
        check_range(new_task.start_date, new_task.end_date)?;
        check_amount(new_task.quantity)?;
        check_amount(new_task.value)?;

        let task = self
            .store
            .update(|document| {
                if !document.projects.iter().any(|p| p.id == project_id) {
                    return Err(AppError::ProjectNotFound);
                }

                let mut task = Task {
                    id: Uuid::new_v4(),
                    project_id,
                    name: new_task.name,
                    quantity: new_task.quantity,
                    value: new_task.value,
                    start_date: new_task.start_date,
                    end_date: new_task.end_date,
                    status: TaskStatus::Pendiente,
                    daily_consumption: Vec::new(),
                    validations: Vec::new(),
                    partner: new_task.partner,
                };
                task.status = derive_task_status(&task);

                document.tasks.push(task.clone());
                refresh_project_aggregates(document, project_id);
                Ok(task)
            })
            .await?;

        tracing::info!("📋 Tarefa '{}' criada no projeto {}", task.name, project_id);
        Ok(task)
    }

    pub async fn update(&self, task_id: Uuid, changes: TaskChanges) -> Result<Task, AppError> {
        self.store
            .update(|document| {
                let task = task_mut(document, task_id)?;

                let start = changes.start_date.unwrap_or(task.start_date);
                let end = changes.end_date.unwrap_or(task.end_date);
                check_range(start, end)?;
                check_amount(changes.quantity.unwrap_or(task.quantity))?;
                check_amount(changes.value.unwrap_or(task.value))?;

                task.start_date = start;
                task.end_date = end;
                if let Some(name) = changes.name {
                    task.name = name;
                }
                if let Some(quantity) = changes.quantity {
                    task.quantity = quantity;
                }
                if let Some(value) = changes.value {
                    task.value = value;
                }
                // A quantidade planejada pode ter mudado de faixa
                task.status = derive_task_status(task);

                let task = task.clone();
                refresh_project_aggregates(document, task.project_id);
                Ok(task)
            })
            .await
    }

    pub async fn delete(&self, task_id: Uuid) -> Result<(), AppError> {
        let removed = self
            .store
            .update(|document| {
                let index = document
                    .tasks
                    .iter()
                    .position(|t| t.id == task_id)
                    .ok_or(AppError::TaskNotFound)?;
                let task = document.tasks.remove(index);
                refresh_project_aggregates(document, task.project_id);
                Ok(task)
            })
            .await?;

        self.delete_photos(&removed.validations).await;
        Ok(())
    }

    /// Upsert do consumo diário; consumo e status são gravados juntos.
    pub async fn upsert_consumption(
        &self,
        task_id: Uuid,
        date: NaiveDate,
        quantity: Decimal,
    ) -> Result<Task, AppError> {
        let task = self
            .store
            .update(|document| {
                let task = task_mut(document, task_id)?;
                apply_consumption(task, date, quantity)?;

                let task = task.clone();
                refresh_project_aggregates(document, task.project_id);
                Ok(task)
            })
            .await?;

        tracing::info!(
            "📈 Consumo de {} em {} registrado para a tarefa {} ({:?})",
            quantity,
            date,
            task_id,
            task.status
        );
        Ok(task)
    }

    pub async fn assign_partner(
        &self,
        task_id: Uuid,
        partner: Option<PartnerRef>,
    ) -> Result<Task, AppError> {
        self.store
            .update(|document| {
                let task = task_mut(document, task_id)?;
                task.partner = partner;

                let task = task.clone();
                refresh_project_aggregates(document, task.project_id);
                Ok(task)
            })
            .await
    }

    pub async fn add_validation(
        &self,
        task_id: Uuid,
        image: Vec<u8>,
        location: String,
    ) -> Result<TaskValidation, AppError> {
        // Falha cedo antes de gravar a foto
        self.get(task_id).await?;

        let validation_id = Uuid::new_v4();
        let image_url = self.photos.save(validation_id, image).await?;

        let validation = TaskValidation {
            id: validation_id,
            timestamp: Utc::now(),
            image_url,
            location,
        };

        let appended = self
            .store
            .update(|document| {
                let task = task_mut(document, task_id)?;
                task.validations.push(validation.clone());
                Ok(())
            })
            .await;

        if let Err(e) = appended {
            // A tarefa sumiu entre a checagem e a gravação: não deixa foto órfã
            self.delete_photos(std::slice::from_ref(&validation)).await;
            return Err(e);
        }

        tracing::info!("📷 Validação {} adicionada à tarefa {}", validation.id, task_id);
        Ok(validation)
    }

    pub async fn delete_validation(
        &self,
        task_id: Uuid,
        validation_id: Uuid,
    ) -> Result<(), AppError> {
        let removed = self
            .store
            .update(|document| {
                let task = task_mut(document, task_id)?;
                let index = task
                    .validations
                    .iter()
                    .position(|v| v.id == validation_id)
                    .ok_or(AppError::ValidationNotFound)?;
                Ok(task.validations.remove(index))
            })
            .await?;

        self.delete_photos(std::slice::from_ref(&removed)).await;
        Ok(())
    }

    pub(crate) async fn delete_photos(&self, validations: &[TaskValidation]) {
        for validation in validations {
            if let Err(e) = self.photos.delete(&validation.image_url).await {
                tracing::warn!("Falha ao remover a foto {}: {}", validation.image_url, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::Project;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn bare_task(quantity: i64) -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            name: "Encofrado".into(),
            quantity: Decimal::from(quantity),
            value: Decimal::from(1000),
            start_date: date("2024-08-01"),
            end_date: date("2024-08-10"),
            status: TaskStatus::Pendiente,
            daily_consumption: Vec::new(),
            validations: Vec::new(),
            partner: None,
        }
    }

    #[test]
    fn status_follows_cumulative_consumption() {
        let mut task = bare_task(100);
        assert_eq!(derive_task_status(&task), TaskStatus::Pendiente);

        apply_consumption(&mut task, date("2024-08-01"), Decimal::from(40)).unwrap();
        assert_eq!(task.status, TaskStatus::EnProgreso);

        apply_consumption(&mut task, date("2024-08-02"), Decimal::from(60)).unwrap();
        assert_eq!(task.status, TaskStatus::Completado);

        apply_consumption(&mut task, date("2024-08-02"), Decimal::ZERO).unwrap();
        assert_eq!(task.status, TaskStatus::EnProgreso);
    }

    #[test]
    fn zero_quantity_task_without_consumption_is_pending() {
        assert_eq!(derive_task_status(&bare_task(0)), TaskStatus::Pendiente);
    }

    #[test]
    fn upsert_overwrites_same_date_and_is_idempotent() {
        let mut task = bare_task(100);

        apply_consumption(&mut task, date("2024-08-01"), Decimal::from(10)).unwrap();
        apply_consumption(&mut task, date("2024-08-01"), Decimal::from(25)).unwrap();
        let once = task.daily_consumption.clone();
        apply_consumption(&mut task, date("2024-08-01"), Decimal::from(25)).unwrap();

        assert_eq!(task.daily_consumption, once);
        assert_eq!(task.daily_consumption.len(), 1);
        assert_eq!(task.total_consumed(), Decimal::from(25));
    }

    #[test]
    fn zero_removes_existing_record_and_never_stores_zero() {
        let mut task = bare_task(100);

        apply_consumption(&mut task, date("2024-08-01"), Decimal::from(50)).unwrap();
        apply_consumption(&mut task, date("2024-08-01"), Decimal::ZERO).unwrap();
        apply_consumption(&mut task, date("2024-08-03"), Decimal::ZERO).unwrap();

        assert!(task.daily_consumption.is_empty());
        assert_eq!(task.status, TaskStatus::Pendiente);
    }

    #[test]
    fn negative_consumption_is_rejected() {
        let mut task = bare_task(100);
        let err = apply_consumption(&mut task, date("2024-08-01"), Decimal::from(-1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidQuantity));
    }

    #[test]
    fn consumption_dates_are_normalized_to_utc_day() {
        assert_eq!(normalize_consumption_date("2024-08-01").unwrap(), date("2024-08-01"));
        assert_eq!(
            normalize_consumption_date("2024-08-01T22:30:00-05:00").unwrap(),
            date("2024-08-02")
        );
        assert_eq!(
            normalize_consumption_date("2024-08-01T00:00:00Z").unwrap(),
            date("2024-08-01")
        );
        assert!(matches!(
            normalize_consumption_date("01/08/2024"),
            Err(AppError::InvalidDate(_))
        ));
    }

    async fn service_with_project() -> (tempfile::TempDir, TaskService, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("db.json"));
        let project_id = Uuid::new_v4();

        store
            .update(|doc| {
                doc.projects.push(Project {
                    id: project_id,
                    erp_id: None,
                    name: "Canal de riego".into(),
                    company_id: 1,
                    company_name: "Empresa".into(),
                    client: "Cliente".into(),
                    total_value: Decimal::from(1000),
                    total_cost: Decimal::from(800),
                    task_count: 0,
                    completed_tasks: 0,
                    consumed_value: Decimal::ZERO,
                    progress: Decimal::ZERO,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                });
                Ok(())
            })
            .await
            .unwrap();

        let service = TaskService::new(store, PhotoRepository::new(dir.path().join("uploads")));
        (dir, service, project_id)
    }

    fn new_task(start: &str, end: &str) -> NewTask {
        NewTask {
            name: "Excavación".into(),
            quantity: Decimal::from(100),
            value: Decimal::from(1000),
            start_date: date(start),
            end_date: date(end),
            partner: None,
        }
    }

    #[tokio::test]
    async fn consumption_upsert_persists_status_and_project_progress() {
        let (_dir, service, project_id) = service_with_project().await;
        let task = service.create(project_id, new_task("2024-08-01", "2024-08-05")).await.unwrap();

        service
            .upsert_consumption(task.id, date("2024-08-01"), Decimal::from(40))
            .await
            .unwrap();

        let stored = service.get(task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::EnProgreso);

        let doc = service.store.load().await.unwrap();
        let project = &doc.projects[0];
        assert_eq!(project.task_count, 1);
        assert_eq!(project.consumed_value, Decimal::from(400));
        assert_eq!(project.progress, Decimal::from(40));
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let (_dir, service, _) = service_with_project().await;

        let err = service
            .upsert_consumption(Uuid::new_v4(), date("2024-08-01"), Decimal::from(1))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TaskNotFound));
    }

    #[tokio::test]
    async fn inverted_dates_are_rejected_on_create_and_update() {
        let (_dir, service, project_id) = service_with_project().await;

        let err = service
            .create(project_id, new_task("2024-08-10", "2024-08-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidDateRange));

        let task = service.create(project_id, new_task("2024-08-01", "2024-08-10")).await.unwrap();
        let err = service
            .update(
                task.id,
                TaskChanges {
                    end_date: Some(date("2024-07-01")),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidDateRange));
    }

    #[tokio::test]
    async fn lowering_planned_quantity_can_complete_task() {
        let (_dir, service, project_id) = service_with_project().await;
        let task = service.create(project_id, new_task("2024-08-01", "2024-08-10")).await.unwrap();
        service
            .upsert_consumption(task.id, date("2024-08-02"), Decimal::from(50))
            .await
            .unwrap();

        let updated = service
            .update(
                task.id,
                TaskChanges {
                    quantity: Some(Decimal::from(50)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Completado);
    }

    #[tokio::test]
    async fn missing_validation_is_not_found() {
        let (_dir, service, project_id) = service_with_project().await;
        let task = service.create(project_id, new_task("2024-08-01", "2024-08-10")).await.unwrap();

        let err = service.delete_validation(task.id, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, AppError::ValidationNotFound));
    }

    #[test]
    fn consumption_above_ceiling_is_rejected() {
        let mut task = bare_task(100);
        let err = apply_consumption(
            &mut task,
            date("2024-08-01"),
            Decimal::from(1_000_000_000_000_000i64),
        )
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidQuantity));
        assert!(task.daily_consumption.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_dates_and_long_spans_are_rejected() {
        let (_dir, service, project_id) = service_with_project().await;

        let far = service
            .create(project_id, new_task("0001-01-01", "9999-12-31"))
            .await
            .unwrap_err();
        assert!(matches!(far, AppError::BadRequest(_)));

        let long = service
            .create(project_id, new_task("1950-01-01", "2150-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(long, AppError::BadRequest(_)));

        let task = service.create(project_id, new_task("2024-08-01", "2024-08-10")).await.unwrap();
        let err = service
            .update(
                task.id,
                TaskChanges {
                    end_date: Some(date("2300-01-01")),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn amounts_above_ceiling_are_rejected() {
        let (_dir, service, project_id) = service_with_project().await;
        let mut huge = new_task("2024-08-01", "2024-08-10");
        huge.value = Decimal::from_i128_with_scale(10i128.pow(27), 0);

        let err = service.create(project_id, huge).await.unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn assigning_partner_touches_owning_project() {
        let (_dir, service, project_id) = service_with_project().await;
        let task = service.create(project_id, new_task("2024-08-01", "2024-08-10")).await.unwrap();
        let before = service.store.load().await.unwrap().projects[0].updated_at;

        let updated = service
            .assign_partner(task.id, Some(PartnerRef { id: 3, name: "Agregados Norte".into() }))
            .await
            .unwrap();

        let after = service.store.load().await.unwrap().projects[0].updated_at;
        assert_eq!(updated.partner.map(|p| p.id), Some(3));
        assert!(after > before);
    }
}
