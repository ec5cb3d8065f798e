// src/services/project_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::JsonStore,
    erp::{ErpClient, ErpCredentials},
    models::{
        curve::{CostPoint, ProgressPoint},
        project::{Project, StoreDocument, SyncReport, Task, TaskStatus, MAX_AMOUNT},
    },
    services::{
        curve_service::{self, percent_of},
        task_service::TaskService,
    },
};

/// Recalcula os agregados do projeto a partir das suas tarefas.
/// Chamado dentro da mesma gravação de qualquer mutação de tarefa.
pub fn refresh_project_aggregates(document: &mut StoreDocument, project_id: Uuid) {
    let tasks = document.tasks.iter().filter(|t| t.project_id == project_id);

    let mut task_count = 0;
    let mut completed_tasks = 0;
    let mut consumed_value = Decimal::ZERO;
    for task in tasks {
        task_count += 1;
        if task.status == TaskStatus::Completado {
            completed_tasks += 1;
        }
        consumed_value = consumed_value.saturating_add(task.value_of(task.total_consumed()));
    }

    if let Some(project) = document.projects.iter_mut().find(|p| p.id == project_id) {
        project.task_count = task_count;
        project.completed_tasks = completed_tasks;
        project.consumed_value = consumed_value;
        project.progress = percent_of(consumed_value, project.total_value);
        project.updated_at = Utc::now();
    }
}

// Garante que o projeto existe e pertence às empresas ativas da sessão
fn scoped<'a>(
    document: &'a StoreDocument,
    project_id: Uuid,
    company_ids: &[i64],
) -> Result<&'a Project, AppError> {
    let project = document
        .projects
        .iter()
        .find(|p| p.id == project_id)
        .ok_or(AppError::ProjectNotFound)?;

    if !company_ids.contains(&project.company_id) {
        return Err(AppError::Forbidden);
    }
    Ok(project)
}

fn check_amounts(total_value: Decimal, total_cost: Decimal) -> Result<(), AppError> {
    let in_range = |amount: Decimal| amount >= Decimal::ZERO && amount <= MAX_AMOUNT;
    if !in_range(total_value) || !in_range(total_cost) {
        return Err(AppError::BadRequest(format!(
            "Valores do projeto devem estar entre 0 e {}.",
            MAX_AMOUNT
        )));
    }
    Ok(())
}

pub struct NewProject {
    pub name: String,
    pub company_id: i64,
    pub company_name: String,
    pub client: String,
    pub total_value: Decimal,
    pub total_cost: Decimal,
}

#[derive(Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub client: Option<String>,
    pub total_value: Option<Decimal>,
    pub total_cost: Option<Decimal>,
}

#[derive(Clone)]
pub struct ProjectService {
    store: JsonStore,
    task_service: TaskService,
    erp: ErpClient,
}

impl ProjectService {
    pub fn new(store: JsonStore, task_service: TaskService, erp: ErpClient) -> Self {
        Self {
            store,
            task_service,
            erp,
        }
    }

    pub async fn list(&self, company_ids: &[i64]) -> Result<Vec<Project>, AppError> {
        let mut projects: Vec<Project> = self
            .store
            .load()
            .await?
            .projects
            .into_iter()
            .filter(|p| company_ids.contains(&p.company_id))
            .collect();

        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    pub async fn get(&self, project_id: Uuid, company_ids: &[i64]) -> Result<Project, AppError> {
        let document = self.store.load().await?;
        scoped(&document, project_id, company_ids).cloned()
    }

    /// Carrega a tarefa verificando o escopo do projeto dono.
    pub async fn authorize_task(&self, task_id: Uuid, company_ids: &[i64]) -> Result<Task, AppError> {
        let document = self.store.load().await?;
        let task = document
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or(AppError::TaskNotFound)?;

        scoped(&document, task.project_id, company_ids)?;
        Ok(task.clone())
    }

    pub async fn create(&self, new_project: NewProject, company_ids: &[i64]) -> Result<Project, AppError> {
        if !company_ids.contains(&new_project.company_id) {
            return Err(AppError::Forbidden);
        }
        check_amounts(new_project.total_value, new_project.total_cost)?;

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            erp_id: None,
            name: new_project.name,
            company_id: new_project.company_id,
            company_name: new_project.company_name,
            client: new_project.client,
            total_value: new_project.total_value,
            total_cost: new_project.total_cost,
            task_count: 0,
            completed_tasks: 0,
            consumed_value: Decimal::ZERO,
            progress: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };

        self.store
            .update(|document| {
                document.projects.push(project.clone());
                Ok(())
            })
            .await?;

        tracing::info!("🏗️ Projeto '{}' criado ({})", project.name, project.id);
        Ok(project)
    }

    pub async fn update(
        &self,
        project_id: Uuid,
        changes: ProjectChanges,
        company_ids: &[i64],
    ) -> Result<Project, AppError> {
        self.store
            .update(|document| {
                scoped(document, project_id, company_ids)?;

                let project = document
                    .projects
                    .iter_mut()
                    .find(|p| p.id == project_id)
                    .ok_or(AppError::ProjectNotFound)?;

                check_amounts(
                    changes.total_value.unwrap_or(project.total_value),
                    changes.total_cost.unwrap_or(project.total_cost),
                )?;

                if let Some(name) = changes.name {
                    project.name = name;
                }
                if let Some(client) = changes.client {
                    project.client = client;
                }
                if let Some(total_value) = changes.total_value {
                    project.total_value = total_value;
                }
                if let Some(total_cost) = changes.total_cost {
                    project.total_cost = total_cost;
                }

                // O progresso depende do valor total
                refresh_project_aggregates(document, project_id);
                scoped(document, project_id, company_ids).cloned()
            })
            .await
    }

    /// Remove o projeto e, em cascata, as suas tarefas (e fotos).
    pub async fn delete(&self, project_id: Uuid, company_ids: &[i64]) -> Result<(), AppError> {
        let removed_tasks = self
            .store
            .update(|document| {
                scoped(document, project_id, company_ids)?;

                document.projects.retain(|p| p.id != project_id);
                let (removed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut document.tasks)
                    .into_iter()
                    .partition(|t| t.project_id == project_id);
                document.tasks = kept;
                Ok(removed)
            })
            .await?;

        for task in &removed_tasks {
            self.task_service.delete_photos(&task.validations).await;
        }

        tracing::info!(
            "🗑️ Projeto {} removido junto com {} tarefa(s)",
            project_id,
            removed_tasks.len()
        );
        Ok(())
    }

    /// Sincroniza os projetos das empresas ativas a partir do ERP.
    pub async fn sync(
        &self,
        credentials: &ErpCredentials,
        company_ids: &[i64],
    ) -> Result<SyncReport, AppError> {
        let erp_projects = self.erp.projects(credentials, company_ids).await?;

        let report = self
            .store
            .update(|document| {
                let mut report = SyncReport {
                    created: 0,
                    updated: 0,
                };
                let now = Utc::now();

                for erp_project in erp_projects {
                    let (company_id, company_name) = match erp_project.company {
                        Some(company) => company,
                        None => continue,
                    };
                    let client = erp_project.client.map(|(_, name)| name).unwrap_or_default();

                    match document
                        .projects
                        .iter_mut()
                        .find(|p| p.erp_id == Some(erp_project.id))
                    {
                        Some(project) => {
                            project.name = erp_project.name;
                            project.company_id = company_id;
                            project.company_name = company_name;
                            project.client = client;
                            project.updated_at = now;
                            report.updated += 1;
                        }
                        None => {
                            document.projects.push(Project {
                                id: Uuid::new_v4(),
                                erp_id: Some(erp_project.id),
                                name: erp_project.name,
                                company_id,
                                company_name,
                                client,
                                total_value: Decimal::ZERO,
                                total_cost: Decimal::ZERO,
                                task_count: 0,
                                completed_tasks: 0,
                                consumed_value: Decimal::ZERO,
                                progress: Decimal::ZERO,
                                created_at: now,
                                updated_at: now,
                            });
                            report.created += 1;
                        }
                    }
                }

                Ok(report)
            })
            .await?;

        tracing::info!(
            "🔄 Sincronização com o ERP: {} criado(s), {} atualizado(s)",
            report.created,
            report.updated
        );
        Ok(report)
    }

    pub async fn progress_curve(
        &self,
        project_id: Uuid,
        company_ids: &[i64],
    ) -> Result<Vec<ProgressPoint>, AppError> {
        let document = self.store.load().await?;
        let project = scoped(&document, project_id, company_ids)?;
        let tasks = project_tasks(&document, project_id);

        Ok(curve_service::compute_progress_curve(&tasks, project.total_value)?)
    }

    pub async fn cost_curve(
        &self,
        project_id: Uuid,
        company_ids: &[i64],
    ) -> Result<Vec<CostPoint>, AppError> {
        let document = self.store.load().await?;
        let project = scoped(&document, project_id, company_ids)?;
        let tasks = project_tasks(&document, project_id);

        Ok(curve_service::compute_cost_curve(&tasks, project.total_cost)?)
    }
}

fn project_tasks(document: &StoreDocument, project_id: Uuid) -> Vec<Task> {
    document
        .tasks
        .iter()
        .filter(|t| t.project_id == project_id)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::PhotoRepository,
        models::project::DailyConsumption,
        services::task_service::NewTask,
    };
    use chrono::NaiveDate;
    use std::time::Duration;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn services(dir: &tempfile::TempDir) -> (ProjectService, TaskService) {
        let store = JsonStore::new(dir.path().join("db.json"));
        let tasks = TaskService::new(store.clone(), PhotoRepository::new(dir.path().join("uploads")));
        // Nenhum teste aqui fala com o ERP
        let erp = ErpClient::new("http://127.0.0.1:9", "teste", Duration::from_millis(50));
        (ProjectService::new(store, tasks.clone(), erp), tasks)
    }

    fn new_project(company_id: i64) -> NewProject {
        NewProject {
            name: "Carretera Sur".into(),
            company_id,
            company_name: "Empresa".into(),
            client: "Gobierno Regional".into(),
            total_value: Decimal::from(2000),
            total_cost: Decimal::from(1600),
        }
    }

    fn new_task(value: i64) -> NewTask {
        NewTask {
            name: "Asfaltado".into(),
            quantity: Decimal::from(100),
            value: Decimal::from(value),
            start_date: date("2024-08-01"),
            end_date: date("2024-08-04"),
            partner: None,
        }
    }

    #[test]
    fn aggregates_follow_tasks() {
        let project_id = Uuid::new_v4();
        let mut document = StoreDocument::default();
        document.projects.push(Project {
            id: project_id,
            erp_id: None,
            name: "P".into(),
            company_id: 1,
            company_name: "E".into(),
            client: "C".into(),
            total_value: Decimal::from(1000),
            total_cost: Decimal::from(1000),
            task_count: 0,
            completed_tasks: 0,
            consumed_value: Decimal::ZERO,
            progress: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        document.tasks.push(Task {
            id: Uuid::new_v4(),
            project_id,
            name: "T".into(),
            quantity: Decimal::from(10),
            value: Decimal::from(500),
            start_date: date("2024-08-01"),
            end_date: date("2024-08-02"),
            status: TaskStatus::Completado,
            daily_consumption: vec![DailyConsumption {
                date: date("2024-08-01"),
                consumed_quantity: Decimal::from(10),
            }],
            validations: Vec::new(),
            partner: None,
        });

        refresh_project_aggregates(&mut document, project_id);

        let project = &document.projects[0];
        assert_eq!(project.task_count, 1);
        assert_eq!(project.completed_tasks, 1);
        assert_eq!(project.consumed_value, Decimal::from(500));
        assert_eq!(project.progress, Decimal::from(50));
    }

    #[tokio::test]
    async fn listing_is_scoped_to_active_companies() {
        let dir = tempfile::tempdir().unwrap();
        let (projects, _) = services(&dir);

        projects.create(new_project(1), &[1, 2]).await.unwrap();
        projects.create(new_project(2), &[1, 2]).await.unwrap();

        assert_eq!(projects.list(&[1]).await.unwrap().len(), 1);
        assert_eq!(projects.list(&[1, 2]).await.unwrap().len(), 2);
        assert!(projects.list(&[3]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_company_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let (projects, _) = services(&dir);

        let err = projects.create(new_project(9), &[1]).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let project = projects.create(new_project(1), &[1]).await.unwrap();
        let err = projects.get(project.id, &[2]).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let err = projects.get(Uuid::new_v4(), &[1]).await.unwrap_err();
        assert!(matches!(err, AppError::ProjectNotFound));
    }

    #[tokio::test]
    async fn delete_cascades_to_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let (projects, tasks) = services(&dir);

        let keep = projects.create(new_project(1), &[1]).await.unwrap();
        let doomed = projects.create(new_project(1), &[1]).await.unwrap();
        let kept_task = tasks.create(keep.id, new_task(1000)).await.unwrap();
        let dropped_task = tasks.create(doomed.id, new_task(1000)).await.unwrap();

        projects.delete(doomed.id, &[1]).await.unwrap();

        assert!(matches!(tasks.get(dropped_task.id).await, Err(AppError::TaskNotFound)));
        assert!(tasks.get(kept_task.id).await.is_ok());
        assert!(matches!(projects.get(doomed.id, &[1]).await, Err(AppError::ProjectNotFound)));
    }

    #[tokio::test]
    async fn curves_use_value_and_cost_bases() {
        let dir = tempfile::tempdir().unwrap();
        let (projects, tasks) = services(&dir);

        let project = projects.create(new_project(1), &[1]).await.unwrap();
        let task = tasks.create(project.id, new_task(800)).await.unwrap();
        tasks
            .upsert_consumption(task.id, date("2024-08-01"), Decimal::from(50))
            .await
            .unwrap();

        let progress = projects.progress_curve(project.id, &[1]).await.unwrap();
        let cost = projects.cost_curve(project.id, &[1]).await.unwrap();

        assert_eq!(progress.len(), 4);
        // 400 executados sobre valor 2000 e custo 1600
        assert_eq!(progress[0].actual, Decimal::from(20));
        assert_eq!(cost[0].actual, Decimal::from(25));
        assert_eq!(progress[3].planned, Decimal::from(40));
        assert_eq!(cost[3].planned, Decimal::from(50));
    }

    #[tokio::test]
    async fn changing_total_value_refreshes_progress() {
        let dir = tempfile::tempdir().unwrap();
        let (projects, tasks) = services(&dir);

        let project = projects.create(new_project(1), &[1]).await.unwrap();
        let task = tasks.create(project.id, new_task(1000)).await.unwrap();
        tasks
            .upsert_consumption(task.id, date("2024-08-02"), Decimal::from(100))
            .await
            .unwrap();

        let updated = projects
            .update(
                project.id,
                ProjectChanges {
                    total_value: Some(Decimal::from(4000)),
                    ..Default::default()
                },
                &[1],
            )
            .await
            .unwrap();

        assert_eq!(updated.consumed_value, Decimal::from(1000));
        assert_eq!(updated.progress, Decimal::from(25));
    }

    #[test]
    fn aggregates_saturate_on_huge_consumption() {
        let project_id = Uuid::new_v4();
        let huge = Decimal::from(1_000_000_000_000_000i64);
        let mut document = StoreDocument::default();
        document.projects.push(Project {
            id: project_id,
            erp_id: None,
            name: "P".into(),
            company_id: 1,
            company_name: "E".into(),
            client: "C".into(),
            total_value: Decimal::new(1, 2),
            total_cost: Decimal::ZERO,
            task_count: 0,
            completed_tasks: 0,
            consumed_value: Decimal::ZERO,
            progress: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        for _ in 0..2 {
            document.tasks.push(Task {
                id: Uuid::new_v4(),
                project_id,
                name: "T".into(),
                quantity: Decimal::ONE,
                value: huge,
                start_date: date("2024-08-01"),
                end_date: date("2024-08-02"),
                status: TaskStatus::Completado,
                daily_consumption: vec![DailyConsumption {
                    date: date("2024-08-01"),
                    consumed_quantity: huge,
                }],
                validations: Vec::new(),
                partner: None,
            });
        }

        refresh_project_aggregates(&mut document, project_id);

        let project = &document.projects[0];
        assert_eq!(project.consumed_value, Decimal::MAX);
        assert_eq!(project.progress, Decimal::ONE_HUNDRED);
    }

    #[tokio::test]
    async fn project_amounts_above_ceiling_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (projects, _) = services(&dir);
        let mut huge = new_project(1);
        huge.total_value = Decimal::from_i128_with_scale(10i128.pow(27), 0);

        let err = projects.create(huge, &[1]).await.unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
