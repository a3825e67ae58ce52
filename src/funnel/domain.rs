use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Channel label reported for applications that arrived without a source.
pub const UNKNOWN_CHANNEL: &str = "(unknown)";

/// Warranty window applied when the hiring client has none on file.
pub const DEFAULT_WARRANTY_DAYS: u32 = 90;

/// Seconds east of UTC for the reporting calendar (JST).
pub const DEFAULT_REPORT_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Offset that zoned instants are converted to before month bucketing.
pub fn default_report_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_REPORT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    Recommended,
    FirstInterviewScheduled,
    FirstInterviewHeld,
    SecondInterviewHeld,
    OfferExtended,
    OfferAccepted,
    Onboarded,
    PreOnboardingWithdrawn,
    PostOnboardingDeparted,
}

impl FunnelStage {
    pub const fn ordered() -> [Self; 9] {
        [
            Self::Recommended,
            Self::FirstInterviewScheduled,
            Self::FirstInterviewHeld,
            Self::SecondInterviewHeld,
            Self::OfferExtended,
            Self::OfferAccepted,
            Self::Onboarded,
            Self::PreOnboardingWithdrawn,
            Self::PostOnboardingDeparted,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Recommended => "Recommended",
            Self::FirstInterviewScheduled => "First Interview Scheduled",
            Self::FirstInterviewHeld => "First Interview Held",
            Self::SecondInterviewHeld => "Second Interview Held",
            Self::OfferExtended => "Offer Extended",
            Self::OfferAccepted => "Offer Accepted",
            Self::Onboarded => "Onboarded",
            Self::PreOnboardingWithdrawn => "Withdrawn Before Onboarding",
            Self::PostOnboardingDeparted => "Departed After Onboarding",
        }
    }

    /// The stage a cohort entering `self` is expected to reach next.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Recommended => Some(Self::FirstInterviewScheduled),
            Self::FirstInterviewScheduled => Some(Self::FirstInterviewHeld),
            Self::FirstInterviewHeld => Some(Self::OfferExtended),
            Self::OfferExtended => Some(Self::OfferAccepted),
            Self::OfferAccepted => Some(Self::Onboarded),
            Self::SecondInterviewHeld
            | Self::Onboarded
            | Self::PreOnboardingWithdrawn
            | Self::PostOnboardingDeparted => None,
        }
    }
}

/// Instants at which an application reached each funnel stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInstants {
    pub recommended: Option<NaiveDateTime>,
    pub first_interview_scheduled: Option<NaiveDateTime>,
    pub first_interview_held: Option<NaiveDateTime>,
    pub second_interview_held: Option<NaiveDateTime>,
    pub offer_extended: Option<NaiveDateTime>,
    pub offer_accepted: Option<NaiveDateTime>,
    pub onboarded: Option<NaiveDateTime>,
    pub pre_onboarding_withdrawn: Option<NaiveDateTime>,
    pub post_onboarding_departed: Option<NaiveDateTime>,
}

impl StageInstants {
    pub fn get(&self, stage: FunnelStage) -> Option<NaiveDateTime> {
        match stage {
            FunnelStage::Recommended => self.recommended,
            FunnelStage::FirstInterviewScheduled => self.first_interview_scheduled,
            FunnelStage::FirstInterviewHeld => self.first_interview_held,
            FunnelStage::SecondInterviewHeld => self.second_interview_held,
            FunnelStage::OfferExtended => self.offer_extended,
            FunnelStage::OfferAccepted => self.offer_accepted,
            FunnelStage::Onboarded => self.onboarded,
            FunnelStage::PreOnboardingWithdrawn => self.pre_onboarding_withdrawn,
            FunnelStage::PostOnboardingDeparted => self.post_onboarding_departed,
        }
    }

    pub fn set(&mut self, stage: FunnelStage, instant: Option<NaiveDateTime>) {
        let slot = match stage {
            FunnelStage::Recommended => &mut self.recommended,
            FunnelStage::FirstInterviewScheduled => &mut self.first_interview_scheduled,
            FunnelStage::FirstInterviewHeld => &mut self.first_interview_held,
            FunnelStage::SecondInterviewHeld => &mut self.second_interview_held,
            FunnelStage::OfferExtended => &mut self.offer_extended,
            FunnelStage::OfferAccepted => &mut self.offer_accepted,
            FunnelStage::Onboarded => &mut self.onboarded,
            FunnelStage::PreOnboardingWithdrawn => &mut self.pre_onboarding_withdrawn,
            FunnelStage::PostOnboardingDeparted => &mut self.post_onboarding_departed,
        };
        *slot = instant;
    }
}

/// Point-in-time snapshot of a candidate application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    pub id: String,
    pub candidate_id: String,
    pub channel: String,
    pub created_at: NaiveDateTime,
    pub stages: StageInstants,
    pub is_valid: bool,
    pub warranty_days: Option<u32>,
}

impl Application {
    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date()
    }
}

/// Financial outcome of a completed placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub application_id: String,
    pub fee: f64,
    pub refund: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Yearly,
    Monthly,
    LumpSum,
}

impl BillingPeriod {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Yearly => "Yearly",
            Self::Monthly => "Monthly",
            Self::LumpSum => "Lump Sum",
        }
    }
}

/// Advertising spend agreement with a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    pub id: String,
    pub channel: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub amount: f64,
    pub billing: BillingPeriod,
}
