//! Amortization of advertising contract cost into calendar months.

use super::dates::{days_inclusive, month_bucket, overlap_days, DateInterval, MonthKey};
use super::domain::{BillingPeriod, Contract};
use super::normalize::normalize_token;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

const DAYS_PER_BILLING_YEAR: f64 = 365.0;

const YEARLY_LABELS: &[&str] = &[
    "year", "yearly", "annual", "annually", "per year", "年", "年間", "年額",
];
const MONTHLY_LABELS: &[&str] = &["month", "monthly", "per month", "月", "月間", "月額"];

/// Resolves a free-text billing unit. `None` means the label was not recognized.
pub fn classify_billing_period(label: &str) -> Option<BillingPeriod> {
    let token = normalize_token(label);
    let unit = token.strip_prefix('/').map(str::trim);

    if YEARLY_LABELS.contains(&token.as_str())
        || unit.is_some_and(|unit| unit == "year" || unit.ends_with('年'))
    {
        return Some(BillingPeriod::Yearly);
    }

    if MONTHLY_LABELS.contains(&token.as_str())
        || unit.is_some_and(|unit| unit == "month" || unit.ends_with('月'))
    {
        return Some(BillingPeriod::Monthly);
    }

    const LUMP_SUM_LABELS: &[&str] = &["lump sum", "lump-sum", "one-time", "once", "一括", "一式"];
    LUMP_SUM_LABELS
        .contains(&token.as_str())
        .then_some(BillingPeriod::LumpSum)
}

/// How far an open-ended contract is billed relative to the report's as-of date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenTermBilling {
    /// Through the as-of date itself.
    #[default]
    AsOfDate,
    /// Through the last day of the as-of month.
    AsOfMonthEnd,
}

impl OpenTermBilling {
    pub fn from_label(value: &str) -> Option<Self> {
        match normalize_token(value).as_str() {
            "month_end" | "as_of_month_end" | "month-end" => Some(Self::AsOfMonthEnd),
            "as_of" | "as_of_date" | "date" => Some(Self::AsOfDate),
            _ => None,
        }
    }
}

/// Cost of one `(month, channel)` pair together with the contracts behind it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelCost {
    pub cost: f64,
    pub contract_ids: Vec<String>,
}

/// Allocates contract amounts to months as of a fixed report date.
///
/// Open-ended contracts are billed up to the as-of date unless the calculator was
/// built with [`OpenTermBilling::AsOfMonthEnd`], and never into later months.
#[derive(Debug, Clone, Copy)]
pub struct CostProrationCalculator {
    as_of: NaiveDate,
    open_term: OpenTermBilling,
}

impl CostProrationCalculator {
    pub fn new(as_of: NaiveDate) -> Self {
        Self::with_open_term(as_of, OpenTermBilling::default())
    }

    pub fn with_open_term(as_of: NaiveDate, open_term: OpenTermBilling) -> Self {
        Self { as_of, open_term }
    }

    pub const fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    fn open_term_end(&self) -> NaiveDate {
        match self.open_term {
            OpenTermBilling::AsOfMonthEnd => month_bucket(self.as_of).last_day(),
            OpenTermBilling::AsOfDate => self.as_of,
        }
    }

    pub fn effective_end(&self, contract: &Contract) -> NaiveDate {
        contract.end.unwrap_or_else(|| self.open_term_end())
    }

    /// Whether any day of `month` falls inside the contract's billed term.
    pub fn is_active_in(&self, contract: &Contract, month: MonthKey) -> bool {
        let bounds = month.interval();
        let last_billed = self.effective_end(contract).min(bounds.end);
        last_billed >= bounds.start.max(contract.start)
    }

    fn denominator(&self, contract: &Contract, month: MonthKey) -> f64 {
        match contract.billing {
            BillingPeriod::Yearly => DAYS_PER_BILLING_YEAR,
            BillingPeriod::Monthly => month.days_in_month() as f64,
            BillingPeriod::LumpSum => {
                days_inclusive(contract.start, self.effective_end(contract)).max(1) as f64
            }
        }
    }

    /// Share of the contract amount attributable to `month`.
    pub fn month_cost(&self, contract: &Contract, month: MonthKey) -> f64 {
        if !self.is_active_in(contract, month) {
            return 0.0;
        }

        let term = DateInterval::new(contract.start, self.effective_end(contract));
        let billed_days = overlap_days(term, month.interval()) as f64;
        contract.amount * billed_days / self.denominator(contract, month)
    }

    /// Sums every active contract's share per `(month, channel)`.
    pub fn monthly_costs(
        &self,
        contracts: &[Contract],
        months: &[MonthKey],
    ) -> BTreeMap<(MonthKey, String), ChannelCost> {
        let mut costs: BTreeMap<(MonthKey, String), ChannelCost> = BTreeMap::new();

        for &month in months {
            for contract in contracts {
                if !self.is_active_in(contract, month) {
                    continue;
                }

                let share = self.month_cost(contract, month);
                debug!(
                    contract_id = %contract.id,
                    %month,
                    share,
                    "allocated contract cost"
                );

                let entry = costs
                    .entry((month, contract.channel.clone()))
                    .or_default();
                entry.cost += share;
                entry.contract_ids.push(contract.id.clone());
            }
        }

        costs
    }
}
