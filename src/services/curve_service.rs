// src/services/curve_service.rs
//
// Motor da Curva S: funções puras sobre um snapshot das tarefas.
// Não toca no armazenamento nem no ERP, então pode ser chamado de qualquer contexto.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    curve::{CostPoint, ProgressPoint},
    project::{year_in_range, Task, MAX_TASK_SPAN_DAYS},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurveError {
    #[error("Tarefa {task_id}: início {start} posterior ao término {end}")]
    InvalidRange {
        task_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Tarefa {task_id}: datas fora da faixa suportada ({start} a {end})")]
    OutOfBounds {
        task_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// Janela diária do projeto: do menor início ao maior término.
struct Window {
    start: NaiveDate,
    days: usize,
}

impl Window {
    fn of(tasks: &[Task]) -> Result<Option<Self>, CurveError> {
        let mut bounds: Option<(NaiveDate, NaiveDate)> = None;

        for task in tasks {
            if task.start_date > task.end_date {
                return Err(CurveError::InvalidRange {
                    task_id: task.id,
                    start: task.start_date,
                    end: task.end_date,
                });
            }
            // Limita a janela: cada dia vira um ponto em memória
            if !year_in_range(task.start_date)
                || !year_in_range(task.end_date)
                || (task.end_date - task.start_date).num_days() >= MAX_TASK_SPAN_DAYS
            {
                return Err(CurveError::OutOfBounds {
                    task_id: task.id,
                    start: task.start_date,
                    end: task.end_date,
                });
            }
            bounds = Some(match bounds {
                None => (task.start_date, task.end_date),
                Some((start, end)) => (start.min(task.start_date), end.max(task.end_date)),
            });
        }

        Ok(bounds.map(|(start, end)| Window {
            start,
            days: (end - start).num_days() as usize + 1,
        }))
    }

    // Datas fora da janela caem no primeiro/último dia
    fn index_of(&self, date: NaiveDate) -> usize {
        let offset = (date - self.start).num_days();
        offset.clamp(0, self.days as i64 - 1) as usize
    }

    fn date_at(&self, index: usize) -> NaiveDate {
        self.start + chrono::Duration::days(index as i64)
    }
}

/// Distribui o valor de cada tarefa uniformemente entre os seus dias (inclusive).
/// O resto da divisão vai para o último dia, para que a soma feche exatamente no valor.
fn planned_increments(tasks: &[Task], window: &Window) -> Vec<Decimal> {
    let mut increments = vec![Decimal::ZERO; window.days];

    for task in tasks {
        let duration = (task.end_date - task.start_date).num_days() + 1;
        let daily = task.value / Decimal::from(duration);
        let first = window.index_of(task.start_date);
        let last = window.index_of(task.end_date);

        for increment in &mut increments[first..last] {
            *increment = increment.saturating_add(daily);
        }
        let remainder = task.value - daily * Decimal::from(duration - 1);
        increments[last] = increments[last].saturating_add(remainder);
    }

    increments
}

struct ActualIncrements {
    total: Vec<Decimal>,
    by_provider: BTreeMap<String, Vec<Decimal>>,
}

/// Converte o consumo diário em valor monetário, agregado e por fornecedor.
fn actual_increments(tasks: &[Task], window: &Window) -> ActualIncrements {
    let mut total = vec![Decimal::ZERO; window.days];
    let mut by_provider: BTreeMap<String, Vec<Decimal>> = BTreeMap::new();

    for task in tasks {
        for record in &task.daily_consumption {
            let value = task.value_of(record.consumed_quantity);
            let index = window.index_of(record.date);
            total[index] = total[index].saturating_add(value);

            // Tarefas sem fornecedor entram só no total
            if let Some(partner) = &task.partner {
                if !value.is_zero() {
                    let bucket = by_provider
                        .entry(partner.name.clone())
                        .or_insert_with(|| vec![Decimal::ZERO; window.days]);
                    bucket[index] = bucket[index].saturating_add(value);
                }
            }
        }
    }

    ActualIncrements { total, by_provider }
}

/// Percentual acumulado sobre a base, limitado a [0, 100]. Base zero resulta em 0.
/// Estouro do `Decimal` só acontece acima do teto, então satura em 100.
pub(crate) fn percent_of(cumulative: Decimal, base: Decimal) -> Decimal {
    if base <= Decimal::ZERO || cumulative <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    cumulative
        .checked_div(base)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ONE_HUNDRED)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
        .round_dp(2)
}

/// Curva de avanço: planejado vs. real, normalizados pelo valor total do projeto.
pub fn compute_progress_curve(
    tasks: &[Task],
    total_value: Decimal,
) -> Result<Vec<ProgressPoint>, CurveError> {
    let Some(window) = Window::of(tasks)? else {
        return Ok(Vec::new());
    };

    let planned = planned_increments(tasks, &window);
    let actual = actual_increments(tasks, &window).total;

    let mut planned_acc = Decimal::ZERO;
    let mut actual_acc = Decimal::ZERO;

    let points = (0..window.days)
        .map(|day| {
            planned_acc = planned_acc.saturating_add(planned[day]);
            actual_acc = actual_acc.saturating_add(actual[day]);
            ProgressPoint {
                date: window.date_at(day),
                planned: percent_of(planned_acc, total_value),
                actual: percent_of(actual_acc, total_value),
            }
        })
        .collect();

    Ok(points)
}

/// Curva de custo: como a de avanço, mas normalizada pelo custo total,
/// com o real decomposto por fornecedor e o desvio (real - planejado).
pub fn compute_cost_curve(
    tasks: &[Task],
    total_cost: Decimal,
) -> Result<Vec<CostPoint>, CurveError> {
    let Some(window) = Window::of(tasks)? else {
        return Ok(Vec::new());
    };

    let planned = planned_increments(tasks, &window);
    let ActualIncrements { total, by_provider } = actual_increments(tasks, &window);

    let mut planned_acc = Decimal::ZERO;
    let mut actual_acc = Decimal::ZERO;
    let mut provider_acc: BTreeMap<&str, Decimal> = by_provider
        .keys()
        .map(|name| (name.as_str(), Decimal::ZERO))
        .collect();

    let points = (0..window.days)
        .map(|day| {
            planned_acc = planned_acc.saturating_add(planned[day]);
            actual_acc = actual_acc.saturating_add(total[day]);

            let cumulative_providers = by_provider
                .iter()
                .map(|(name, increments)| {
                    let acc = provider_acc.entry(name.as_str()).or_default();
                    *acc = acc.saturating_add(increments[day]);
                    (name.clone(), percent_of(*acc, total_cost))
                })
                .collect();

            let planned = percent_of(planned_acc, total_cost);
            let actual = percent_of(actual_acc, total_cost);

            CostPoint {
                date: window.date_at(day),
                planned,
                actual,
                cumulative_providers,
                deviation: actual - planned,
            }
        })
        .collect();

    Ok(points)
}
