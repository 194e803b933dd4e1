use std::cmp::Ordering;

use crate::models::holding::Holding;
use crate::models::sort::{SortConfig, SortDirection, SortKey};

/// A column value as the comparator sees it.
///
/// `Missing` is below every number and every string, so unknown values
/// collect at the low end and the direction then flips them like any other
/// value.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue<'a> {
    Missing,
    Number(f64),
    Text(&'a str),
}

impl<'a> SortValue<'a> {
    pub fn of(holding: &'a Holding, key: SortKey) -> Self {
        match key {
            SortKey::StockName => SortValue::Text(&holding.stock_name),
            SortKey::Quantity => number(holding.quantity),
            SortKey::AverageBuyPrice => number(holding.average_buy_price),
            SortKey::CurrentPrice => number(holding.current_price),
            SortKey::DayChangePercent => number(holding.day_change_percent),
            SortKey::TotalReturnPercent => number(holding.total_return_percent),
            SortKey::CurrentValue => number(Some(
                holding.current_price.unwrap_or(0.0) * holding.quantity.unwrap_or(0.0),
            )),
            SortKey::StopLoss => number(holding.stop_loss),
            SortKey::Target => number(holding.target),
            SortKey::State => SortValue::Text(&holding.state),
            SortKey::DateOfExit => holding
                .date_of_exit
                .as_deref()
                .map_or(SortValue::Missing, SortValue::Text),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Missing => 0,
            SortValue::Number(_) => 1,
            SortValue::Text(_) => 2,
        }
    }
}

fn number<'a>(value: Option<f64>) -> SortValue<'a> {
    match value {
        Some(v) if !v.is_nan() => SortValue::Number(v),
        _ => SortValue::Missing,
    }
}

/// Total order over column values: Missing < numbers < strings.
pub fn compare_values(a: &SortValue<'_>, b: &SortValue<'_>) -> Ordering {
    match (a, b) {
        (SortValue::Number(x), SortValue::Number(y)) => x.total_cmp(y),
        (SortValue::Text(x), SortValue::Text(y)) => x.cmp(y),
        _ => a.rank().cmp(&b.rank()),
    }
}

/// Return the holdings ordered by `config`, leaving `holdings` untouched.
///
/// Stable: rows with equal values keep their input order in either direction.
pub fn sort_holdings<'a>(holdings: &'a [Holding], config: &SortConfig) -> Vec<&'a Holding> {
    let mut rows: Vec<&Holding> = holdings.iter().collect();
    rows.sort_by(|a, b| {
        let ordering = compare_values(&SortValue::of(a, config.key), &SortValue::of(b, config.key));
        match config.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    rows
}
