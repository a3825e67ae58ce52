//! Conversion of raw, text-typed projection records into engine inputs.
//!
//! Every record that cannot be fully understood still yields the best value it
//! can (or is skipped) and leaves a [`DataWarning`] behind; nothing here fails.

use super::cost::classify_billing_period;
use super::domain::{
    default_report_offset, Application, BillingPeriod, Contract, FunnelStage, Placement,
    StageInstants, UNKNOWN_CHANNEL,
};
use super::normalize::{normalize_label, parse_amount, parse_date, parse_flag, parse_instant};
use chrono::FixedOffset;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Application row as exported by the applicant tracking store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: String,
    #[serde(default)]
    pub candidate_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub recommended_at: Option<String>,
    #[serde(default)]
    pub first_interview_scheduled_at: Option<String>,
    #[serde(default)]
    pub first_interview_held_at: Option<String>,
    #[serde(default)]
    pub second_interview_held_at: Option<String>,
    #[serde(default)]
    pub offer_extended_at: Option<String>,
    #[serde(default)]
    pub offer_accepted_at: Option<String>,
    #[serde(default)]
    pub onboarded_at: Option<String>,
    #[serde(default)]
    pub pre_onboarding_withdrawn_at: Option<String>,
    #[serde(default)]
    pub post_onboarding_departed_at: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub is_valid_application: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub warranty_days: Option<String>,
}

impl ApplicationRecord {
    fn stage_field(&self, stage: FunnelStage) -> (&'static str, Option<&str>) {
        let (name, value) = match stage {
            FunnelStage::Recommended => ("recommended_at", &self.recommended_at),
            FunnelStage::FirstInterviewScheduled => {
                ("first_interview_scheduled_at", &self.first_interview_scheduled_at)
            }
            FunnelStage::FirstInterviewHeld => {
                ("first_interview_held_at", &self.first_interview_held_at)
            }
            FunnelStage::SecondInterviewHeld => {
                ("second_interview_held_at", &self.second_interview_held_at)
            }
            FunnelStage::OfferExtended => ("offer_extended_at", &self.offer_extended_at),
            FunnelStage::OfferAccepted => ("offer_accepted_at", &self.offer_accepted_at),
            FunnelStage::Onboarded => ("onboarded_at", &self.onboarded_at),
            FunnelStage::PreOnboardingWithdrawn => {
                ("pre_onboarding_withdrawn_at", &self.pre_onboarding_withdrawn_at)
            }
            FunnelStage::PostOnboardingDeparted => {
                ("post_onboarding_departed_at", &self.post_onboarding_departed_at)
            }
        };
        (name, value.as_deref().filter(|raw| !raw.trim().is_empty()))
    }
}

/// Advertising contract row; amounts and billing units arrive as free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub amount: Option<String>,
    #[serde(default)]
    pub amount_period: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub application_id: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub fee_amount: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub refund_amount: Option<String>,
}

/// Raw projections read for a single report request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionSnapshot {
    #[serde(default)]
    pub applications: Vec<ApplicationRecord>,
    #[serde(default)]
    pub contracts: Vec<ContractRecord>,
    #[serde(default)]
    pub placements: Vec<PlacementRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Application,
    Contract,
    Placement,
}

/// Problem found in a single record; the record degrades instead of failing the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum DataIssue {
    #[error("missing {field}")]
    MissingField { field: &'static str },
    #[error("unparseable date in {field}: '{value}'")]
    UnparseableDate { field: &'static str, value: String },
    #[error("unparseable amount in {field}: '{value}'")]
    UnparseableAmount { field: &'static str, value: String },
    #[error("unparseable flag in {field}: '{value}'")]
    UnparseableFlag { field: &'static str, value: String },
    #[error("unrecognized billing period '{label}', treated as lump sum")]
    UnrecognizedBillingPeriod { label: String },
    #[error("contract ends ({end}) before it starts ({start})")]
    InvertedTerm { start: String, end: String },
    #[error("duplicate placement for the same application")]
    DuplicatePlacement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataWarning {
    pub record_kind: RecordKind,
    pub record_id: String,
    #[serde(flatten)]
    pub issue: DataIssue,
    pub message: String,
}

impl DataWarning {
    fn new(record_kind: RecordKind, record_id: &str, issue: DataIssue) -> Self {
        let message = issue.to_string();
        warn!(?record_kind, record_id, %message, "degraded projection record");
        Self {
            record_kind,
            record_id: record_id.to_string(),
            issue,
            message,
        }
    }
}

/// Typed engine inputs plus the warnings raised while producing them.
#[derive(Debug, Clone, Default)]
pub struct IngestedSnapshot {
    pub applications: Vec<Application>,
    pub contracts: Vec<Contract>,
    pub placements: Vec<Placement>,
    pub warnings: Vec<DataWarning>,
}

impl ProjectionSnapshot {
    pub fn ingest(&self) -> IngestedSnapshot {
        self.ingest_at(default_report_offset())
    }

    /// Ingests with zoned instants converted to `offset` before bucketing.
    pub fn ingest_at(&self, offset: FixedOffset) -> IngestedSnapshot {
        let mut warnings = Vec::new();
        let applications = ingest_applications(&self.applications, offset, &mut warnings);
        let contracts = ingest_contracts(&self.contracts, offset, &mut warnings);
        let placements = ingest_placements(&self.placements, &mut warnings);

        IngestedSnapshot {
            applications,
            contracts,
            placements,
            warnings,
        }
    }
}

fn channel_label(raw: Option<&str>) -> String {
    raw.map(normalize_label)
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| UNKNOWN_CHANNEL.to_string())
}

pub fn ingest_applications(
    records: &[ApplicationRecord],
    offset: FixedOffset,
    warnings: &mut Vec<DataWarning>,
) -> Vec<Application> {
    let mut applications = Vec::with_capacity(records.len());

    for record in records {
        let warn_on = |warnings: &mut Vec<DataWarning>, issue| {
            warnings.push(DataWarning::new(RecordKind::Application, &record.id, issue));
        };

        let created_at = match record.created_at.as_deref().map(str::trim) {
            None | Some("") => {
                warn_on(warnings, DataIssue::MissingField { field: "created_at" });
                continue;
            }
            Some(raw) => match parse_instant(raw, offset) {
                Some(instant) => instant,
                None => {
                    warn_on(
                        warnings,
                        DataIssue::UnparseableDate {
                            field: "created_at",
                            value: raw.to_string(),
                        },
                    );
                    continue;
                }
            },
        };

        let mut stages = StageInstants::default();
        for stage in FunnelStage::ordered() {
            let (field, raw) = record.stage_field(stage);
            let Some(raw) = raw else { continue };
            match parse_instant(raw, offset) {
                Some(instant) => stages.set(stage, Some(instant)),
                None => warn_on(
                    warnings,
                    DataIssue::UnparseableDate {
                        field,
                        value: raw.to_string(),
                    },
                ),
            }
        }

        let is_valid = match record.is_valid_application.as_deref() {
            None => false,
            Some(raw) => parse_flag(raw).unwrap_or_else(|| {
                warn_on(
                    warnings,
                    DataIssue::UnparseableFlag {
                        field: "is_valid_application",
                        value: raw.to_string(),
                    },
                );
                false
            }),
        };

        let warranty_days = match record
            .warranty_days
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
        {
            None => None,
            Some(raw) => match raw.parse::<u32>() {
                Ok(days) => Some(days),
                Err(_) => {
                    warn_on(
                        warnings,
                        DataIssue::UnparseableAmount {
                            field: "warranty_days",
                            value: raw.to_string(),
                        },
                    );
                    None
                }
            },
        };

        let candidate_id = record
            .candidate_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("application:{}", record.id));

        applications.push(Application {
            id: record.id.clone(),
            candidate_id,
            channel: channel_label(record.channel.as_deref()),
            created_at,
            stages,
            is_valid,
            warranty_days,
        });
    }

    applications
}

pub fn ingest_contracts(
    records: &[ContractRecord],
    offset: FixedOffset,
    warnings: &mut Vec<DataWarning>,
) -> Vec<Contract> {
    let mut contracts = Vec::with_capacity(records.len());

    for record in records {
        let warn_on = |warnings: &mut Vec<DataWarning>, issue| {
            warnings.push(DataWarning::new(RecordKind::Contract, &record.id, issue));
        };

        let start = match record.start_date.as_deref().map(str::trim) {
            None | Some("") => {
                warn_on(warnings, DataIssue::MissingField { field: "start_date" });
                continue;
            }
            Some(raw) => match parse_date(raw, offset) {
                Some(date) => date,
                None => {
                    warn_on(
                        warnings,
                        DataIssue::UnparseableDate {
                            field: "start_date",
                            value: raw.to_string(),
                        },
                    );
                    continue;
                }
            },
        };

        let end = match record.end_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match parse_date(raw, offset) {
                Some(date) => Some(date),
                None => {
                    warn_on(
                        warnings,
                        DataIssue::UnparseableDate {
                            field: "end_date",
                            value: raw.to_string(),
                        },
                    );
                    continue;
                }
            },
        };

        if let Some(end) = end {
            if end < start {
                warn_on(
                    warnings,
                    DataIssue::InvertedTerm {
                        start: start.to_string(),
                        end: end.to_string(),
                    },
                );
                continue;
            }
        }

        let amount = match record.amount.as_deref() {
            None => {
                warn_on(warnings, DataIssue::MissingField { field: "amount" });
                0.0
            }
            Some(raw) => parse_amount(raw).unwrap_or_else(|| {
                warn_on(
                    warnings,
                    DataIssue::UnparseableAmount {
                        field: "amount",
                        value: raw.to_string(),
                    },
                );
                0.0
            }),
        };

        let billing = match record
            .amount_period
            .as_deref()
            .map(normalize_label)
            .filter(|label| !label.is_empty())
        {
            None => BillingPeriod::LumpSum,
            Some(label) => classify_billing_period(&label).unwrap_or_else(|| {
                warn_on(
                    warnings,
                    DataIssue::UnrecognizedBillingPeriod {
                        label: label.clone(),
                    },
                );
                BillingPeriod::LumpSum
            }),
        };

        contracts.push(Contract {
            id: record.id.clone(),
            channel: channel_label(record.channel.as_deref()),
            start,
            end,
            amount,
            billing,
        });
    }

    contracts
}

pub fn ingest_placements(
    records: &[PlacementRecord],
    warnings: &mut Vec<DataWarning>,
) -> Vec<Placement> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut placements = Vec::with_capacity(records.len());

    for record in records {
        let id = record.application_id.as_str();
        if !seen.insert(id) {
            warnings.push(DataWarning::new(
                RecordKind::Placement,
                id,
                DataIssue::DuplicatePlacement,
            ));
            continue;
        }

        let mut money = |field: &'static str, raw: Option<&str>| match raw {
            None => 0.0,
            Some(raw) => parse_amount(raw).unwrap_or_else(|| {
                warnings.push(DataWarning::new(
                    RecordKind::Placement,
                    id,
                    DataIssue::UnparseableAmount {
                        field,
                        value: raw.to_string(),
                    },
                ));
                0.0
            }),
        };

        let fee = money("fee_amount", record.fee_amount.as_deref());
        let refund = money("refund_amount", record.refund_amount.as_deref());

        placements.push(Placement {
            application_id: record.application_id.clone(),
            fee,
            refund,
        });
    }

    placements
}

/// Accepts text, numbers, or booleans so JSON callers and CSV exports share one record shape.
fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Integer(i64),
        Decimal(f64),
        Flag(bool),
    }

    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(value
        .map(|loose| match loose {
            Loose::Text(text) => text,
            Loose::Integer(number) => number.to_string(),
            Loose::Decimal(number) => number.to_string(),
            Loose::Flag(flag) => flag.to_string(),
        })
        .filter(|text| !text.trim().is_empty()))
}
