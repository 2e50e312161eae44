//! Tenant provisioning and the onboarding state machine.
//!
//! A school is registered either in full (registration code and contact data
//! up front) or express (name, e-mail and password only). Either way the
//! tenant record, its director principal and the director's first access token
//! are written in one transaction.
//!
//! Onboarding then walks the tenant forward through [`OnboardingStage`]s. The
//! stage only ever moves forward; skipping records a timestamp and leaves the
//! stage where it was.

pub mod onboarding;
pub mod service;

pub use onboarding::{OnboardingService, OnboardingStatus, SchoolData};
pub use service::{RegisterExpress, RegisterSchool, Registered, RegistrationService};

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a tenant is in its onboarding. Ordered: later stages compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnboardingStage {
    ExpressRegistered,
    SchoolDataCompleted,
    StructureCompleted,
    OnboardingCompleted,
}

impl OnboardingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStage::ExpressRegistered => "express-registered",
            OnboardingStage::SchoolDataCompleted => "school-data-completed",
            OnboardingStage::StructureCompleted => "structure-completed",
            OnboardingStage::OnboardingCompleted => "onboarding-completed",
        }
    }
}

impl fmt::Display for OnboardingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Onboarding progress stored on the tenant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub stage: OnboardingStage,
    /// Whether the tenant came in through express registration.
    #[serde(default)]
    pub express: bool,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub skipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// When each stage was reached.
    #[serde(default)]
    pub steps: BTreeMap<String, DateTime<Utc>>,
}

impl OnboardingProgress {
    pub fn new(stage: OnboardingStage, express: bool, now: DateTime<Utc>) -> Self {
        Self {
            stage,
            express,
            registered_at: now,
            skipped: false,
            skipped_at: None,
            completed_at: None,
            steps: BTreeMap::from([(stage.as_str().to_string(), now)]),
        }
    }

    /// Progress of an express registration.
    pub fn express(now: DateTime<Utc>) -> Self {
        Self::new(OnboardingStage::ExpressRegistered, true, now)
    }

    /// Progress of a full registration, which already carries the school data.
    pub fn full(now: DateTime<Utc>) -> Self {
        Self::new(OnboardingStage::SchoolDataCompleted, false, now)
    }

    pub fn is_completed(&self) -> bool {
        self.stage == OnboardingStage::OnboardingCompleted
    }

    /// Move to `target`. Moving backwards is rejected; staying put is a no-op.
    pub fn advance(
        &mut self,
        target: OnboardingStage,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        if target < self.stage {
            return Err(ValidationError::single(
                "onboarding",
                format!("cannot return to {} from {}", target, self.stage),
            ));
        }
        if target == self.stage {
            return Ok(());
        }

        self.stage = target;
        self.steps.insert(target.as_str().to_string(), now);
        if target == OnboardingStage::OnboardingCompleted {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Record that the user postponed onboarding.
    pub fn skip(&mut self, now: DateTime<Utc>) {
        self.skipped = true;
        self.skipped_at = Some(now);
    }
}

/// URL slug from a school name: ASCII lowercase words joined by dashes.
///
/// Spanish accents fold to their base letter. A name with nothing usable
/// yields `"escuela"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        };
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "escuela".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stages_are_ordered_and_kebab_cased() {
        assert!(OnboardingStage::ExpressRegistered < OnboardingStage::SchoolDataCompleted);
        assert!(OnboardingStage::StructureCompleted < OnboardingStage::OnboardingCompleted);
        assert_eq!(
            serde_json::to_value(OnboardingStage::SchoolDataCompleted).unwrap(),
            "school-data-completed"
        );
    }

    #[test]
    fn progress_only_moves_forward() {
        let start = Utc::now();
        let mut progress = OnboardingProgress::express(start);
        assert!(progress.express);

        progress
            .advance(OnboardingStage::StructureCompleted, start + Duration::minutes(5))
            .unwrap();
        let err = progress
            .advance(OnboardingStage::SchoolDataCompleted, start + Duration::minutes(6))
            .unwrap_err();
        assert!(err.has_field("onboarding"));
        assert_eq!(progress.stage, OnboardingStage::StructureCompleted);

        progress
            .advance(OnboardingStage::OnboardingCompleted, start + Duration::minutes(7))
            .unwrap();
        assert!(progress.is_completed());
        assert_eq!(progress.completed_at, Some(start + Duration::minutes(7)));
        assert_eq!(progress.steps.len(), 3);
    }

    #[test]
    fn skip_keeps_the_stage() {
        let now = Utc::now();
        let mut progress = OnboardingProgress::full(now);
        progress.skip(now);
        assert!(progress.skipped);
        assert_eq!(progress.stage, OnboardingStage::SchoolDataCompleted);
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Colegio Benito Juárez"), "colegio-benito-juarez");
        assert_eq!(slugify("  Escuela   Niños Héroes!! "), "escuela-ninos-heroes");
        assert_eq!(slugify("Instituto #5 - Norte"), "instituto-5-norte");
        assert_eq!(slugify("¡¿?!"), "escuela");
    }
}
