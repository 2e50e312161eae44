//! Tenant-owned school entities.
//!
//! Every type here flattens a [`RecordMeta`](crate::scoping::RecordMeta) and
//! implements [`TenantOwned`](crate::scoping::TenantOwned), so it can only be
//! read or written through a [`ScopedRepository`](crate::scoping::ScopedRepository).
//! Foreign keys are declared through `references()` and re-resolved inside the
//! acting tenant on every write.
//!
//! The join records in [`relations`] are the exception: they carry no tenant
//! of their own and are written only by the
//! [`RelationService`](crate::guard::RelationService).

macro_rules! record_meta {
    () => {
        fn meta(&self) -> &$crate::scoping::RecordMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut $crate::scoping::RecordMeta {
            &mut self.meta
        }
    };
}

pub mod academic;
pub mod billing;
pub mod calendar;
pub mod people;
pub mod records;
pub mod relations;

pub use academic::{Grade, Group, LEVEL_NAMES, Level, Subject};
pub use billing::{ChargeConcept, Periodicity};
pub use calendar::{Cycle, Period, PeriodKind};
pub use people::{Parent, Student};
pub use records::{Attendance, AttendanceStatus, GradeRecord};
pub use relations::{AssignmentTerms, ParentLink, StudentParent, SubjectAssignment};
