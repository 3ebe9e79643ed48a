use std::fmt;

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityNode {
    Arrival,
    TriageQueue,
    TriageService,
    EdQueue,
    EdService,
    ImagingQueue,
    ImagingService,
    ResultReviewQueue,
    ResultReviewService,
    Obs,
    OrQueue,
    InOr,
    IcuWait,
    Icu,
    Ward,
    Discharge,
    TransferOut,
    ElevatorQueue,
}

impl FacilityNode {
    pub const COUNT: usize = 18;

    /// Every tracked node, in reporting order.
    pub const ALL: [FacilityNode; Self::COUNT] = [
        FacilityNode::Arrival,
        FacilityNode::TriageQueue,
        FacilityNode::TriageService,
        FacilityNode::EdQueue,
        FacilityNode::EdService,
        FacilityNode::ImagingQueue,
        FacilityNode::ImagingService,
        FacilityNode::ResultReviewQueue,
        FacilityNode::ResultReviewService,
        FacilityNode::Obs,
        FacilityNode::OrQueue,
        FacilityNode::InOr,
        FacilityNode::IcuWait,
        FacilityNode::Icu,
        FacilityNode::Ward,
        FacilityNode::Discharge,
        FacilityNode::TransferOut,
        FacilityNode::ElevatorQueue,
    ];

    /// Position in [FacilityNode::ALL].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FacilityNode::Arrival => "arrival",
            FacilityNode::TriageQueue => "triage_queue",
            FacilityNode::TriageService => "triage_service",
            FacilityNode::EdQueue => "ed_queue",
            FacilityNode::EdService => "ed_service",
            FacilityNode::ImagingQueue => "imaging_queue",
            FacilityNode::ImagingService => "imaging_service",
            FacilityNode::ResultReviewQueue => "result_review_queue",
            FacilityNode::ResultReviewService => "result_review_service",
            FacilityNode::Obs => "obs",
            FacilityNode::OrQueue => "or_queue",
            FacilityNode::InOr => "in_or",
            FacilityNode::IcuWait => "icu_wait",
            FacilityNode::Icu => "icu",
            FacilityNode::Ward => "ward",
            FacilityNode::Discharge => "discharge",
            FacilityNode::TransferOut => "transfer_out",
            FacilityNode::ElevatorQueue => "elevator_queue",
        }
    }

    /// Time spent here counts toward a patient's cumulative wait.
    pub fn is_waiting_area(self) -> bool {
        matches!(
            self,
            FacilityNode::TriageQueue
                | FacilityNode::EdQueue
                | FacilityNode::ImagingQueue
                | FacilityNode::ResultReviewQueue
                | FacilityNode::OrQueue
                | FacilityNode::IcuWait
                | FacilityNode::ElevatorQueue
        )
    }
}

impl fmt::Display for FacilityNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjuryType {
    Multitrauma,
    Head,
    Thorax,
    Abdomen,
    Extremity,
    Crush,
    Minor,
}

impl InjuryType {
    pub const ALL: [InjuryType; 7] = [
        InjuryType::Multitrauma,
        InjuryType::Head,
        InjuryType::Thorax,
        InjuryType::Abdomen,
        InjuryType::Extremity,
        InjuryType::Crush,
        InjuryType::Minor,
    ];

    /// Maps a uniform draw in [0, 1) onto the enumeration.
    pub fn from_unit(u: f64) -> Self {
        let index = ((u * Self::ALL.len() as f64).floor() as usize).min(Self::ALL.len() - 1);
        Self::ALL[index]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityClass {
    Minor,
    Moderate,
    Severe,
    Critical,
}

impl SeverityClass {
    pub fn from_score(score: f64) -> Self {
        if score < 0.25 {
            SeverityClass::Minor
        } else if score < 0.5 {
            SeverityClass::Moderate
        } else if score < 0.75 {
            SeverityClass::Severe
        } else {
            SeverityClass::Critical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatientId(pub u64);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patient_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatientOutcome {
    InFlow,
    Discharged {
        at: f64,
    },
    Dead {
        at: f64,
        location: FacilityNode,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Component, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub arrival_time: f64,
    pub injury_type: InjuryType,
    pub severity_score: f64,
    pub severity_class: SeverityClass,
    pub current_node: FacilityNode,
    /// Time the patient entered `current_node`.
    pub entered_node_at: f64,
    /// Minutes spent in waiting areas so far.
    pub total_wait_time: f64,
    pub path: Vec<FacilityNode>,
    pub outcome: PatientOutcome,
    pub los_ward: Option<f64>,
    pub los_icu: Option<f64>,
}

impl Patient {
    pub fn new(
        id: PatientId,
        arrival_time: f64,
        injury_type: InjuryType,
        severity_score: f64,
    ) -> Self {
        Self {
            id,
            arrival_time,
            injury_type,
            severity_score,
            severity_class: SeverityClass::from_score(severity_score),
            current_node: FacilityNode::Arrival,
            entered_node_at: arrival_time,
            total_wait_time: 0.0,
            path: vec![FacilityNode::Arrival],
            outcome: PatientOutcome::InFlow,
            los_ward: None,
            los_icu: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.outcome, PatientOutcome::InFlow)
    }

    pub fn is_discharged(&self) -> bool {
        matches!(self.outcome, PatientOutcome::Discharged { .. })
    }

    pub fn is_dead(&self) -> bool {
        matches!(self.outcome, PatientOutcome::Dead { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StaffRole {
    EdDoctor,
    EdNurse,
    Surgeon,
    Anesthetist,
    IcuNurse,
    WardNurse,
    RadiologyTech,
    Porter,
}

impl StaffRole {
    pub const ALL: [StaffRole; 8] = [
        StaffRole::EdDoctor,
        StaffRole::EdNurse,
        StaffRole::Surgeon,
        StaffRole::Anesthetist,
        StaffRole::IcuNurse,
        StaffRole::WardNurse,
        StaffRole::RadiologyTech,
        StaffRole::Porter,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StaffRole::EdDoctor => "ED doctor",
            StaffRole::EdNurse => "ED nurse",
            StaffRole::Surgeon => "Surgeon",
            StaffRole::Anesthetist => "Anesthetist",
            StaffRole::IcuNurse => "ICU nurse",
            StaffRole::WardNurse => "Ward nurse",
            StaffRole::RadiologyTech => "Radiology tech",
            StaffRole::Porter => "Porter",
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffState {
    Home,
    Traveling,
    OnDuty,
    Unavailable,
}

impl StaffState {
    /// Lifecycle moves forward only: Home → Traveling → OnDuty, or Home → Unavailable.
    pub fn can_become(self, next: StaffState) -> bool {
        matches!(
            (self, next),
            (StaffState::Home, StaffState::Traveling)
                | (StaffState::Home, StaffState::Unavailable)
                | (StaffState::Traveling, StaffState::OnDuty)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaffId {
    pub role: StaffRole,
    pub index: u32,
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.role, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Component, Serialize, Deserialize)]
pub struct StaffAgent {
    pub id: StaffId,
    pub state: StaffState,
    pub show_probability: f64,
    /// Minutes after the event at which the agent reports for duty.
    pub arrival_time: Option<f64>,
}
