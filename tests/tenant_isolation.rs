//! Reads and writes through the scoped repository never cross a school boundary.

mod common;

use common::{Harness, assert_cross_tenant, assert_not_found};
use school_server::SchoolError;
use school_server::scoping::ListFilter;
use school_server::school::{
    Attendance, AttendanceStatus, ChargeConcept, Cycle, Grade, GradeRecord, Group, Level, Parent,
    Period, PeriodKind, Periodicity, Student, Subject,
};
use school_server::tenant::Principal;
use serde_json::json;

fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn records_of_one_school_are_invisible_to_another() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;

    let student = h.student(&norte, "Ana").await;
    h.student(&sur, "Luis").await;

    assert_not_found(
        h.server
            .repository::<Student>(&sur.ctx)
            .find(student.meta.id)
            .await,
    );
    assert!(
        !h.server
            .repository::<Student>(&sur.ctx)
            .exists(student.meta.id)
            .await
            .unwrap()
    );

    let page = h
        .server
        .repository::<Student>(&sur.ctx)
        .list(&ListFilter::new())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].first_name, "Luis");
    assert!(page.items.iter().all(|s| s.meta.tenant_id == Some(sur.ctx.tenant_id())));
}

#[tokio::test]
async fn attribute_filters_stay_inside_the_school() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;

    h.parent(&norte, "madre@familia.mx").await;
    h.parent(&sur, "madre@familia.mx").await;

    let filter = ListFilter::new().where_eq("email", "madre@familia.mx");
    let found = h
        .server
        .repository::<Parent>(&norte.ctx)
        .list(&filter)
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].meta.tenant_id, Some(norte.ctx.tenant_id()));
}

#[tokio::test]
async fn principals_are_scoped_like_any_other_record() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;

    let visible = h
        .server
        .directory()
        .list(&sur.ctx, &ListFilter::new())
        .await
        .unwrap();
    assert_eq!(visible.total, 1);
    assert_eq!(visible.items[0].email, "director@sur.mx");

    assert_not_found(
        h.server
            .repository::<Principal>(&sur.ctx)
            .find(norte.ctx.principal_id().as_uuid())
            .await,
    );
}

#[tokio::test]
async fn foreign_tenant_id_in_payload_is_rejected() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;

    let mut subject = Subject::new("Historia");
    subject.meta.tenant_id = Some(norte.ctx.tenant_id());
    assert_cross_tenant(
        h.server.repository::<Subject>(&sur.ctx).create(subject).await,
        "tenant_id",
    );

    let count = h.server.repository::<Subject>(&norte.ctx).count().await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn same_tenant_id_in_payload_is_accepted() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;

    let mut subject = Subject::new("Historia");
    subject.meta.tenant_id = Some(norte.ctx.tenant_id());
    let created = h
        .server
        .repository::<Subject>(&norte.ctx)
        .create(subject)
        .await
        .unwrap();
    assert_eq!(created.meta.tenant_id, Some(norte.ctx.tenant_id()));
}

#[tokio::test]
async fn updates_cannot_move_a_record_to_another_school() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;
    let subject = h
        .server
        .repository::<Subject>(&norte.ctx)
        .create(Subject::new("Historia"))
        .await
        .unwrap();

    assert_cross_tenant(
        h.server
            .repository::<Subject>(&norte.ctx)
            .merge(
                subject.meta.id,
                json!({"tenant_id": sur.ctx.tenant_id().to_string()}),
            )
            .await,
        "tenant_id",
    );

    let unchanged = h
        .server
        .repository::<Subject>(&norte.ctx)
        .find(subject.meta.id)
        .await
        .unwrap();
    assert_eq!(unchanged.meta.tenant_id, Some(norte.ctx.tenant_id()));
}

#[tokio::test]
async fn updates_and_deletes_of_foreign_records_are_not_found() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;
    let student = h.student(&norte, "Ana").await;

    assert_not_found(
        h.server
            .repository::<Student>(&sur.ctx)
            .merge(student.meta.id, json!({"first_name": "Intrusa"}))
            .await,
    );
    assert_not_found(
        h.server
            .repository::<Student>(&sur.ctx)
            .delete(student.meta.id)
            .await,
    );

    let intact = h
        .server
        .repository::<Student>(&norte.ctx)
        .find(student.meta.id)
        .await
        .unwrap();
    assert_eq!(intact.first_name, "Ana");
}

#[tokio::test]
async fn references_into_another_school_are_rejected_on_create() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;
    let structure = h.structure(&norte).await;
    let student = h.student(&norte, "Ana").await;

    assert_cross_tenant(
        h.server
            .repository::<Grade>(&sur.ctx)
            .create(Grade::new(structure.level.meta.id, "2°", 2))
            .await,
        "level_id",
    );
    assert_cross_tenant(
        h.server
            .repository::<Group>(&sur.ctx)
            .create(Group::new(structure.grade.meta.id, "B"))
            .await,
        "grade_id",
    );

    let mut foreign_student = Student::new("Luis", "Mora");
    foreign_student.group_id = Some(structure.group.meta.id);
    assert_cross_tenant(
        h.server
            .repository::<Student>(&sur.ctx)
            .create(foreign_student)
            .await,
        "group_id",
    );

    let cycle = h
        .server
        .repository::<Cycle>(&norte.ctx)
        .create(Cycle::new("2025-2026", date(2025, 8, 25), date(2026, 7, 10)))
        .await
        .unwrap();
    assert_cross_tenant(
        h.server
            .repository::<Period>(&sur.ctx)
            .create(Period::new(
                cycle.meta.id,
                1,
                PeriodKind::Trimestre,
                date(2025, 8, 25),
                date(2025, 11, 28),
            ))
            .await,
        "cycle_id",
    );

    let mut concept = ChargeConcept::new("Colegiatura", 250_000, Periodicity::Mensual);
    concept.level_id = Some(structure.level.meta.id);
    assert_cross_tenant(
        h.server
            .repository::<ChargeConcept>(&sur.ctx)
            .create(concept)
            .await,
        "level_id",
    );

    let sur_structure = h.structure(&sur).await;
    assert_cross_tenant(
        h.server
            .repository::<Attendance>(&sur.ctx)
            .create(Attendance::new(
                student.meta.id,
                sur_structure.group.meta.id,
                date(2025, 9, 1),
                AttendanceStatus::Presente,
            ))
            .await,
        "student_id",
    );
}

#[tokio::test]
async fn grade_records_check_every_reference() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;

    let cycle = h
        .server
        .repository::<Cycle>(&sur.ctx)
        .create(Cycle::new("2025-2026", date(2025, 8, 25), date(2026, 7, 10)))
        .await
        .unwrap();
    let period = h
        .server
        .repository::<Period>(&sur.ctx)
        .create(Period::new(
            cycle.meta.id,
            1,
            PeriodKind::Trimestre,
            date(2025, 8, 25),
            date(2025, 11, 28),
        ))
        .await
        .unwrap();
    let sur_student = h.student(&sur, "Luis").await;
    let norte_subject = h
        .server
        .repository::<Subject>(&norte.ctx)
        .create(Subject::new("Inglés"))
        .await
        .unwrap();

    assert_cross_tenant(
        h.server
            .repository::<GradeRecord>(&sur.ctx)
            .create(GradeRecord::new(
                sur_student.meta.id,
                norte_subject.meta.id,
                period.meta.id,
                9.5,
            ))
            .await,
        "subject_id",
    );

    let sur_subject = h
        .server
        .repository::<Subject>(&sur.ctx)
        .create(Subject::new("Inglés"))
        .await
        .unwrap();
    let recorded = h
        .server
        .repository::<GradeRecord>(&sur.ctx)
        .create(GradeRecord::new(
            sur_student.meta.id,
            sur_subject.meta.id,
            period.meta.id,
            9.5,
        ))
        .await
        .unwrap();
    assert_eq!(recorded.meta.tenant_id, Some(sur.ctx.tenant_id()));
}

#[tokio::test]
async fn updates_cannot_point_references_at_another_school() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;
    let norte_structure = h.structure(&norte).await;
    let sur_structure = h.structure(&sur).await;

    assert_cross_tenant(
        h.server
            .repository::<Group>(&sur.ctx)
            .merge(
                sur_structure.group.meta.id,
                json!({"grade_id": norte_structure.grade.meta.id}),
            )
            .await,
        "grade_id",
    );
}

#[tokio::test]
async fn unique_names_are_per_school() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;

    h.server
        .repository::<Level>(&norte.ctx)
        .create(Level::new("Primaria", 2))
        .await
        .unwrap();
    h.server
        .repository::<Level>(&sur.ctx)
        .create(Level::new("Primaria", 2))
        .await
        .unwrap();

    match h
        .server
        .repository::<Level>(&norte.ctx)
        .create(Level::new("Primaria", 2))
        .await
    {
        Err(SchoolError::Conflict { fields, .. }) => assert_eq!(fields, vec!["name"]),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn deleted_records_disappear_from_reads() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let student = h.student(&norte, "Ana").await;
    let repo = h.server.repository::<Student>(&norte.ctx);

    repo.delete(student.meta.id).await.unwrap();

    assert_not_found(repo.find(student.meta.id).await);
    assert_eq!(repo.count().await.unwrap(), 0);
    let with_deleted = repo
        .list(&ListFilter::new().include_deleted())
        .await
        .unwrap();
    assert_eq!(with_deleted.total, 1);
    assert!(with_deleted.items[0].meta.is_deleted());
}

#[tokio::test]
async fn references_to_deleted_records_are_rejected() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let structure = h.structure(&norte).await;

    h.server
        .repository::<Level>(&norte.ctx)
        .delete(structure.level.meta.id)
        .await
        .unwrap();

    assert_cross_tenant(
        h.server
            .repository::<Grade>(&norte.ctx)
            .create(Grade::new(structure.level.meta.id, "2°", 2))
            .await,
        "level_id",
    );
}

#[tokio::test]
async fn pagination_is_applied_after_scoping() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;
    for name in ["Ana", "Beto", "Carla"] {
        h.student(&norte, name).await;
    }
    h.student(&sur, "Diego").await;

    let page = h
        .server
        .repository::<Student>(&norte.ctx)
        .list(&ListFilter::new().offset(1).limit(1))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.offset, 1);
    assert_eq!(page.limit, Some(1));
}
