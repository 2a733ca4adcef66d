use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Raised when a string is not a member of the status vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid application status: {0}")]
pub struct UnknownStatus(pub String);

/// Lifecycle status of a job application.
///
/// The vocabulary is closed: every persisted status is one of these 23 values. The wire and
/// storage form is the Chinese label used by the product (see [`ApplicationStatus::as_str`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApplicationStatus {
    /// Initial state when the application is submitted
    #[serde(rename = "已投递")]
    Applied,
    #[serde(rename = "简历筛选中")]
    ResumeScreening,
    #[serde(rename = "简历筛选未通过")]
    ResumeScreeningFail,
    #[serde(rename = "笔试中")]
    WrittenTest,
    #[serde(rename = "笔试通过")]
    WrittenTestPass,
    #[serde(rename = "笔试未通过")]
    WrittenTestFail,
    #[serde(rename = "一面中")]
    FirstInterview,
    #[serde(rename = "一面通过")]
    FirstPass,
    #[serde(rename = "一面未通过")]
    FirstFail,
    #[serde(rename = "二面中")]
    SecondInterview,
    #[serde(rename = "二面通过")]
    SecondPass,
    #[serde(rename = "二面未通过")]
    SecondFail,
    #[serde(rename = "三面中")]
    ThirdInterview,
    #[serde(rename = "三面通过")]
    ThirdPass,
    #[serde(rename = "三面未通过")]
    ThirdFail,
    #[serde(rename = "HR面中")]
    HrInterview,
    #[serde(rename = "HR面通过")]
    HrPass,
    #[serde(rename = "HR面未通过")]
    HrFail,
    #[serde(rename = "待发offer")]
    OfferWaiting,
    #[serde(rename = "已收到offer")]
    OfferReceived,
    #[serde(rename = "已接受offer")]
    OfferAccepted,
    /// Candidate declined or was declined outside a specific stage
    #[serde(rename = "已拒绝")]
    Rejected,
    #[serde(rename = "流程结束")]
    ProcessFinished,
}

/// Hiring stage a status belongs to.
///
/// Each stage groups its in-progress, passed and failed sub-statuses onto one ordinal, which is
/// what backward detection compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Applied,
    Screening,
    WrittenTest,
    FirstInterview,
    SecondInterview,
    ThirdInterview,
    HrInterview,
    OfferWaiting,
    OfferReceived,
    /// Offer accepted and rejected share a rank
    Decision,
    ProcessFinished,
}

impl Stage {
    /// Ordinal used for forward/backward classification
    pub fn rank(self) -> u8 {
        match self {
            Self::Applied => 0,
            Self::Screening => 10,
            Self::WrittenTest => 20,
            Self::FirstInterview => 30,
            Self::SecondInterview => 40,
            Self::ThirdInterview => 50,
            Self::HrInterview => 60,
            Self::OfferWaiting => 70,
            Self::OfferReceived => 80,
            Self::Decision => 90,
            Self::ProcessFinished => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Screening => "screening",
            Self::WrittenTest => "written_test",
            Self::FirstInterview => "first_interview",
            Self::SecondInterview => "second_interview",
            Self::ThirdInterview => "third_interview",
            Self::HrInterview => "hr_interview",
            Self::OfferWaiting => "offer_waiting",
            Self::OfferReceived => "offer_received",
            Self::Decision => "decision",
            Self::ProcessFinished => "process_finished",
        }
    }

    /// Whether this stage is one of the four interview rounds
    pub fn is_interview(self) -> bool {
        matches!(
            self,
            Self::FirstInterview | Self::SecondInterview | Self::ThirdInterview | Self::HrInterview
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ApplicationStatus {
    /// The full vocabulary in stage order
    pub const ALL: [ApplicationStatus; 23] = [
        Self::Applied,
        Self::ResumeScreening,
        Self::ResumeScreeningFail,
        Self::WrittenTest,
        Self::WrittenTestPass,
        Self::WrittenTestFail,
        Self::FirstInterview,
        Self::FirstPass,
        Self::FirstFail,
        Self::SecondInterview,
        Self::SecondPass,
        Self::SecondFail,
        Self::ThirdInterview,
        Self::ThirdPass,
        Self::ThirdFail,
        Self::HrInterview,
        Self::HrPass,
        Self::HrFail,
        Self::OfferWaiting,
        Self::OfferReceived,
        Self::OfferAccepted,
        Self::Rejected,
        Self::ProcessFinished,
    ];

    /// Storage and wire label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "已投递",
            Self::ResumeScreening => "简历筛选中",
            Self::ResumeScreeningFail => "简历筛选未通过",
            Self::WrittenTest => "笔试中",
            Self::WrittenTestPass => "笔试通过",
            Self::WrittenTestFail => "笔试未通过",
            Self::FirstInterview => "一面中",
            Self::FirstPass => "一面通过",
            Self::FirstFail => "一面未通过",
            Self::SecondInterview => "二面中",
            Self::SecondPass => "二面通过",
            Self::SecondFail => "二面未通过",
            Self::ThirdInterview => "三面中",
            Self::ThirdPass => "三面通过",
            Self::ThirdFail => "三面未通过",
            Self::HrInterview => "HR面中",
            Self::HrPass => "HR面通过",
            Self::HrFail => "HR面未通过",
            Self::OfferWaiting => "待发offer",
            Self::OfferReceived => "已收到offer",
            Self::OfferAccepted => "已接受offer",
            Self::Rejected => "已拒绝",
            Self::ProcessFinished => "流程结束",
        }
    }

    pub fn stage(self) -> Stage {
        use ApplicationStatus::*;
        match self {
            Applied => Stage::Applied,
            ResumeScreening | ResumeScreeningFail => Stage::Screening,
            WrittenTest | WrittenTestPass | WrittenTestFail => Stage::WrittenTest,
            FirstInterview | FirstPass | FirstFail => Stage::FirstInterview,
            SecondInterview | SecondPass | SecondFail => Stage::SecondInterview,
            ThirdInterview | ThirdPass | ThirdFail => Stage::ThirdInterview,
            HrInterview | HrPass | HrFail => Stage::HrInterview,
            OfferWaiting => Stage::OfferWaiting,
            OfferReceived => Stage::OfferReceived,
            OfferAccepted | Rejected => Stage::Decision,
            ProcessFinished => Stage::ProcessFinished,
        }
    }

    /// Stage ordinal; sub-statuses of one stage share a rank
    pub fn rank(self) -> u8 {
        self.stage().rank()
    }

    /// Check if moving from `self` to `target` regresses to an earlier stage
    pub fn is_backward_to(self, target: ApplicationStatus) -> bool {
        target.rank() < self.rank()
    }

    /// Check if this is a failed outcome (a stage failure or an outright rejection)
    pub fn is_failed(self) -> bool {
        use ApplicationStatus::*;
        matches!(
            self,
            ResumeScreeningFail
                | WrittenTestFail
                | FirstFail
                | SecondFail
                | ThirdFail
                | HrFail
                | Rejected
        )
    }

    /// Check if this status counts toward the success rate
    pub fn is_passed(self) -> bool {
        use ApplicationStatus::*;
        matches!(
            self,
            WrittenTestPass
                | FirstPass
                | SecondPass
                | ThirdPass
                | HrPass
                | OfferWaiting
                | OfferReceived
                | OfferAccepted
                | ProcessFinished
        )
    }

    /// Check if the application is waiting on the current stage
    pub fn is_in_progress(self) -> bool {
        use ApplicationStatus::*;
        matches!(
            self,
            Applied
                | ResumeScreening
                | WrittenTest
                | FirstInterview
                | SecondInterview
                | ThirdInterview
                | HrInterview
        )
    }

    /// Practically-terminal states. Not enforced: templates may still lead out of them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ProcessFinished | Self::Rejected | Self::OfferAccepted
        )
    }

    /// Moving backward out of these states requires a note
    pub fn requires_note_for_backward(self) -> bool {
        matches!(self, Self::ProcessFinished | Self::Rejected)
            || (self.is_failed() && self != Self::Rejected)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl TryFrom<String> for ApplicationStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Default status for newly tracked applications
impl Default for ApplicationStatus {
    fn default() -> Self {
        Self::Applied
    }
}
