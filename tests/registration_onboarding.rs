//! Tenant provisioning and the onboarding state machine.

mod common;

use common::{Harness, PASSWORD, full_registration};
use futures::future::join_all;
use school_server::SchoolError;
use school_server::registration::{OnboardingStage, RegisterExpress, SchoolData};
use school_server::school::Student;
use std::collections::HashSet;

fn express(name: &str, email: &str) -> RegisterExpress {
    RegisterExpress {
        school_name: name.to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        director_name: Some("Rosa Juárez".to_string()),
    }
}

fn school_data(code: &str) -> SchoolData {
    SchoolData {
        code: code.to_string(),
        tax_id: Some("CBJ010101AB1".to_string()),
        school_email: "Contacto@Hidalgo.edu.mx".to_string(),
        phone: Some("5555555555".to_string()),
        postal_code: Some("06000".to_string()),
    }
}

#[tokio::test]
async fn full_registration_provisions_tenant_director_and_token() {
    let h = Harness::new();
    let registered = h
        .server
        .registration()
        .register(full_registration("benito-juarez", "09DPR1234A", "rosa@benitojuarez.edu.mx"))
        .await
        .unwrap();

    assert_eq!(registered.tenant.slug, "benito-juarez");
    assert_eq!(registered.tenant.code.as_deref(), Some("09DPR1234A"));
    assert_eq!(registered.tenant.onboarding.stage, OnboardingStage::SchoolDataCompleted);
    assert!(!registered.tenant.onboarding.express);
    assert_eq!(registered.director.tenant_id, Some(registered.tenant.id));

    let ctx = h.context(&registered.token).await;
    assert_eq!(ctx.tenant_id(), registered.tenant.id);
    let status = h.server.onboarding().status(&ctx).await.unwrap();
    assert!(!status.provisional_code);
    assert!(!status.completed);
}

#[tokio::test]
async fn full_registration_validates_every_field() {
    let h = Harness::new();
    let mut input = full_registration("Benito Juarez", "09-PR-1234", "no-es-correo");
    input.password = "corta".to_string();

    match h.server.registration().register(input).await {
        Err(SchoolError::Validation(errors)) => {
            for field in ["slug", "code", "director_email", "password"] {
                assert!(errors.has_field(field), "missing error on {}", field);
            }
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn slug_and_code_are_unique_across_schools() {
    let h = Harness::new();
    let registration = h.server.registration();
    registration
        .register(full_registration("benito-juarez", "09DPR1234A", "rosa@benitojuarez.edu.mx"))
        .await
        .unwrap();

    match registration
        .register(full_registration("benito-juarez", "09DPR9999Z", "otro@benitojuarez.edu.mx"))
        .await
    {
        Err(SchoolError::Conflict { fields, .. }) => assert_eq!(fields, vec!["slug"]),
        other => panic!("expected slug conflict, got {:?}", other),
    }
    match registration
        .register(full_registration("benito-juarez-2", "09DPR1234A", "otro@benitojuarez.edu.mx"))
        .await
    {
        Err(SchoolError::Conflict { fields, .. }) => assert_eq!(fields, vec!["code"]),
        other => panic!("expected code conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_registration_leaves_nothing_behind() {
    let h = Harness::new();
    h.school("Colegio Norte", "director@norte.mx").await;
    h.outbox.drain();

    match h
        .server
        .registration()
        .register(full_registration("benito-juarez", "09DPR1234A", "Director@Norte.mx"))
        .await
    {
        Err(SchoolError::Conflict { fields, .. }) => assert_eq!(fields, vec!["email"]),
        other => panic!("expected e-mail conflict, got {:?}", other),
    }
    assert!(h.outbox.sent().is_empty());

    // Slug and code were released with the rolled-back tenant.
    let registered = h
        .server
        .registration()
        .register(full_registration("benito-juarez", "09DPR1234A", "rosa@benitojuarez.edu.mx"))
        .await
        .unwrap();
    assert_eq!(registered.tenant.slug, "benito-juarez");
}

#[tokio::test]
async fn express_registration_deduplicates_slugs() {
    let h = Harness::new();
    let mut slugs = Vec::new();
    for (i, email) in ["a@hidalgo.mx", "b@hidalgo.mx", "c@hidalgo.mx"].iter().enumerate() {
        let registered = h
            .server
            .registration()
            .register_express(express("Colegio Miguel Hidalgo", email))
            .await
            .unwrap();
        assert_eq!(registered.director.name, "Rosa Juárez", "registration {}", i);
        slugs.push(registered.tenant.slug);
    }
    assert_eq!(
        slugs,
        vec![
            "colegio-miguel-hidalgo",
            "colegio-miguel-hidalgo-1",
            "colegio-miguel-hidalgo-2"
        ]
    );
}

#[tokio::test]
async fn express_registration_gets_a_provisional_code() {
    let h = Harness::new();
    let registered = h
        .server
        .registration()
        .register_express(RegisterExpress {
            school_name: "Escuela Ñandú".to_string(),
            email: "Lucia.Mora@Nandu.mx".to_string(),
            password: PASSWORD.to_string(),
            director_name: None,
        })
        .await
        .unwrap();

    assert_eq!(registered.tenant.slug, "escuela-nandu");
    assert!(registered.tenant.code.as_deref().unwrap().starts_with("TEMP-"));
    assert_eq!(registered.tenant.onboarding.stage, OnboardingStage::ExpressRegistered);
    assert_eq!(registered.director.name, "lucia.mora");
    assert_eq!(registered.director.email, "lucia.mora@nandu.mx");

    let ctx = h.context(&registered.token).await;
    let status = h.server.onboarding().status(&ctx).await.unwrap();
    assert!(status.express);
    assert!(status.provisional_code);
}

#[tokio::test]
async fn concurrent_express_registrations_get_distinct_slugs() {
    let h = Harness::new();
    let registrations = (0..5).map(|i| {
        let server = h.server.clone();
        async move {
            server
                .registration()
                .register_express(express("Instituto Morelos", &format!("director{}@morelos.mx", i)))
                .await
        }
    });

    let slugs: HashSet<String> = join_all(registrations)
        .await
        .into_iter()
        .map(|r| r.unwrap().tenant.slug)
        .collect();
    assert_eq!(slugs.len(), 5);
    assert!(slugs.contains("instituto-morelos"));
}

#[tokio::test]
async fn concurrent_work_in_different_schools_stays_separate() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;

    let writes = (0..10).map(|i| {
        let server = h.server.clone();
        let ctx = if i % 2 == 0 { norte.ctx.clone() } else { sur.ctx.clone() };
        async move {
            server
                .repository::<Student>(&ctx)
                .create(Student::new(format!("Alumno {}", i), "Prueba"))
                .await
        }
    });
    for result in join_all(writes).await {
        result.unwrap();
    }

    for school in [&norte, &sur] {
        let students = h
            .server
            .repository::<Student>(&school.ctx)
            .list(&Default::default())
            .await
            .unwrap();
        assert_eq!(students.total, 5);
        assert!(
            students
                .items
                .iter()
                .all(|s| s.meta.tenant_id == Some(school.ctx.tenant_id()))
        );
    }
}

#[tokio::test]
async fn onboarding_moves_forward_only() {
    let h = Harness::new();
    let school = h.school("Colegio Hidalgo", "director@hidalgo.mx").await;
    let onboarding = h.server.onboarding();

    let tenant = onboarding
        .complete_school_data(&school.ctx, school_data("15EPR0001K"))
        .await
        .unwrap();
    assert_eq!(tenant.onboarding.stage, OnboardingStage::SchoolDataCompleted);
    assert_eq!(tenant.code.as_deref(), Some("15EPR0001K"));
    assert_eq!(tenant.email.as_deref(), Some("contacto@hidalgo.edu.mx"));

    onboarding.complete_structure(&school.ctx).await.unwrap();
    let tenant = onboarding.complete(&school.ctx).await.unwrap();
    assert!(tenant.onboarding.completed_at.is_some());
    assert_eq!(tenant.onboarding.steps.len(), 4);

    match onboarding
        .complete_school_data(&school.ctx, school_data("15EPR0002K"))
        .await
    {
        Err(SchoolError::Validation(errors)) => assert!(errors.has_field("onboarding")),
        other => panic!("expected regression to be rejected, got {:?}", other),
    }
    // Repeating the current stage is harmless.
    onboarding.complete(&school.ctx).await.unwrap();

    let status = onboarding.status(&school.ctx).await.unwrap();
    assert!(status.completed);
    assert!(!status.provisional_code);
}

#[tokio::test]
async fn onboarding_may_jump_ahead_and_be_skipped() {
    let h = Harness::new();
    let school = h.school("Colegio Hidalgo", "director@hidalgo.mx").await;
    let onboarding = h.server.onboarding();

    let tenant = onboarding.skip(&school.ctx).await.unwrap();
    assert!(tenant.onboarding.skipped);
    assert_eq!(tenant.onboarding.stage, OnboardingStage::ExpressRegistered);

    let tenant = onboarding.complete(&school.ctx).await.unwrap();
    assert!(tenant.onboarding.is_completed());
    assert!(onboarding.status(&school.ctx).await.unwrap().provisional_code);
}

#[tokio::test]
async fn onboarding_code_must_be_free() {
    let h = Harness::new();
    h.server
        .registration()
        .register(full_registration("benito-juarez", "09DPR1234A", "rosa@benitojuarez.edu.mx"))
        .await
        .unwrap();
    let school = h.school("Colegio Hidalgo", "director@hidalgo.mx").await;

    match h
        .server
        .onboarding()
        .complete_school_data(&school.ctx, school_data("09DPR1234A"))
        .await
    {
        Err(SchoolError::Conflict { fields, .. }) => assert_eq!(fields, vec!["code"]),
        other => panic!("expected code conflict, got {:?}", other),
    }
    let status = h.server.onboarding().status(&school.ctx).await.unwrap();
    assert_eq!(status.stage, OnboardingStage::ExpressRegistered);
}

#[tokio::test]
async fn onboarding_rejects_malformed_school_data() {
    let h = Harness::new();
    let school = h.school("Colegio Hidalgo", "director@hidalgo.mx").await;
    let mut data = school_data("nope");
    data.postal_code = Some("123".to_string());

    match h
        .server
        .onboarding()
        .complete_school_data(&school.ctx, data)
        .await
    {
        Err(SchoolError::Validation(errors)) => {
            assert!(errors.has_field("code"));
            assert!(errors.has_field("postal_code"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}
