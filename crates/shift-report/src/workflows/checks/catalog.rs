//! Data table describing every report kind.
//!
//! Adding a kind means adding a row here; the collection engine only reads
//! the table.

use chrono::{Datelike, NaiveDate, Weekday};

use super::domain::{MediaKind, ReportKind};
use super::timeliness::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFamily {
    /// Variant chosen by the submitter, dated today.
    Opening,
    /// Date chosen by the submitter (today or yesterday).
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniquenessScope {
    /// At most one report per `(location, kind, date)`.
    PerLocationDay,
    Unrestricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidenceStep {
    pub media: MediaKind,
    pub prompt: &'static str,
}

#[derive(Debug)]
pub struct KindSpec {
    pub kind: ReportKind,
    pub family: KindFamily,
    pub title: &'static str,
    /// Button label offered in the variant menu (opening family only).
    pub variant_label: Option<&'static str>,
    pub window: TimeWindow,
    pub uniqueness: UniquenessScope,
    pub aux_question: Option<&'static str>,
    pub evidence: &'static [EvidenceStep],
    /// Additional steps required when the report date falls on `extended_on`.
    pub extended_evidence: &'static [EvidenceStep],
    pub extended_on: Option<Weekday>,
}

impl KindSpec {
    pub fn required_evidence(&self, date: NaiveDate) -> usize {
        if self.is_extended(date) {
            self.evidence.len() + self.extended_evidence.len()
        } else {
            self.evidence.len()
        }
    }

    pub fn evidence_step(&self, index: usize) -> Option<&'static EvidenceStep> {
        self.evidence
            .get(index)
            .or_else(|| self.extended_evidence.get(index.checked_sub(self.evidence.len())?))
    }

    pub fn is_unique_per_day(&self) -> bool {
        self.uniqueness == UniquenessScope::PerLocationDay
    }

    fn is_extended(&self, date: NaiveDate) -> bool {
        self.extended_on == Some(date.weekday())
    }
}

const SETUP_EVIDENCE: &[EvidenceStep] = &[EvidenceStep {
    media: MediaKind::Photo,
    prompt: "Send a photo of the tuned espresso shot 📸",
}];

const OPENING_EARLY_EVIDENCE: &[EvidenceStep] = &[
    EvidenceStep {
        media: MediaKind::Photo,
        prompt: "Send a photo of the display counter laid out per the diagram 📸",
    },
    EvidenceStep {
        media: MediaKind::Photo,
        prompt: "Send a photo of the bar workstation 📸",
    },
];

const OPENING_LATE_EVIDENCE: &[EvidenceStep] = &[EvidenceStep {
    media: MediaKind::Video,
    prompt: "Record one walkthrough video of the location 🎥",
}];

const CLOSING_EVIDENCE: &[EvidenceStep] = &[
    EvidenceStep {
        media: MediaKind::Video,
        prompt: "Record a video of the cleaned coffee machine 🎥",
    },
    EvidenceStep {
        media: MediaKind::Video,
        prompt: "Record a video of the fridges and display case 🎥",
    },
    EvidenceStep {
        media: MediaKind::Video,
        prompt: "Record a video of the floor and the locked entrance 🎥",
    },
];

const CLOSING_MONDAY_EVIDENCE: &[EvidenceStep] = &[
    EvidenceStep {
        media: MediaKind::Video,
        prompt: "Record a video of the cleaned grinder burrs 🎥",
    },
    EvidenceStep {
        media: MediaKind::Video,
        prompt: "Record a video of the descaled steam wand 🎥",
    },
    EvidenceStep {
        media: MediaKind::Video,
        prompt: "Record a video of the stockroom shelves 🎥",
    },
    EvidenceStep {
        media: MediaKind::Video,
        prompt: "Record a video of the emptied and washed bins 🎥",
    },
];

static CATALOG: [KindSpec; 4] = [
    KindSpec {
        kind: ReportKind::Setup,
        family: KindFamily::Opening,
        title: "Espresso setup",
        variant_label: Some("Setup"),
        window: TimeWindow::EarlyMorning,
        uniqueness: UniquenessScope::Unrestricted,
        aux_question: Some("Is the safe balance correct? Answer OK or describe the difference 👇"),
        evidence: SETUP_EVIDENCE,
        extended_evidence: &[],
        extended_on: None,
    },
    KindSpec {
        kind: ReportKind::OpeningEarly,
        family: KindFamily::Opening,
        title: "Opening by 10",
        variant_label: Some("By 10"),
        window: TimeWindow::EarlyMorning,
        uniqueness: UniquenessScope::PerLocationDay,
        aux_question: None,
        evidence: OPENING_EARLY_EVIDENCE,
        extended_evidence: &[],
        extended_on: None,
    },
    KindSpec {
        kind: ReportKind::OpeningLate,
        family: KindFamily::Opening,
        title: "Opening by 12",
        variant_label: Some("By 12"),
        window: TimeWindow::LateMorning,
        uniqueness: UniquenessScope::PerLocationDay,
        aux_question: None,
        evidence: OPENING_LATE_EVIDENCE,
        extended_evidence: &[],
        extended_on: None,
    },
    KindSpec {
        kind: ReportKind::Closing,
        family: KindFamily::Closing,
        title: "Closing",
        variant_label: None,
        window: TimeWindow::Closing,
        uniqueness: UniquenessScope::PerLocationDay,
        aux_question: None,
        evidence: CLOSING_EVIDENCE,
        extended_evidence: CLOSING_MONDAY_EVIDENCE,
        extended_on: Some(Weekday::Mon),
    },
];

impl ReportKind {
    pub fn spec(self) -> &'static KindSpec {
        match self {
            ReportKind::Setup => &CATALOG[0],
            ReportKind::OpeningEarly => &CATALOG[1],
            ReportKind::OpeningLate => &CATALOG[2],
            ReportKind::Closing => &CATALOG[3],
        }
    }

    pub fn title(self) -> &'static str {
        self.spec().title
    }

    pub fn family(self) -> KindFamily {
        self.spec().family
    }
}

/// Variant button labels in menu order.
pub fn variant_labels() -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter_map(|spec| spec.variant_label)
        .collect()
}

/// Resolves a variant button label to its kind.
pub fn kind_for_variant(label: &str) -> Option<ReportKind> {
    let label = label.trim();
    CATALOG
        .iter()
        .find(|spec| {
            spec.variant_label
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(label))
        })
        .map(|spec| spec.kind)
}

pub fn kinds_in(family: KindFamily) -> Vec<ReportKind> {
    CATALOG
        .iter()
        .filter(|spec| spec.family == family)
        .map(|spec| spec.kind)
        .collect()
}
