//! Fixture builders shared by the analytics unit tests.

use chrono::NaiveDate;

use crate::etl::stages::enrich;
use crate::models::{to_amount, CleanedTransaction, IssueFlag, Transaction};

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cleaned(
    id: i64,
    category: &str,
    region: &str,
    channel: &str,
    segment: &str,
    date: NaiveDate,
    revenue: f64,
    profit: f64,
) -> CleanedTransaction {
    let tx = Transaction {
        id,
        date,
        category: category.to_string(),
        region: region.to_string(),
        channel: channel.to_string(),
        customer_segment: segment.to_string(),
        quantity: 2,
        unit_price: to_amount(revenue / 2.0),
        revenue: to_amount(revenue),
        cost: to_amount(revenue - profit),
        profit: to_amount(profit),
        payment_method: None,
        customer_satisfaction: None,
        issue_flag: IssueFlag::None,
    };
    enrich(vec![tx], 2).remove(0)
}
