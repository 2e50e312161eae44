//! Login, logout, password reset and e-mail verification.

mod common;

use chrono::Duration;
use common::{Harness, PASSWORD, VERIFICATION_SECRET, test_config};
use school_server::lookup::{ResetPassword, VerificationOutcome, verification_hash};
use school_server::notify::Notification;
use school_server::scoping::{ListFilter, RecordMeta};
use school_server::storage::{StorageKey, StorageProvider};
use school_server::tenant::{Principal, Role};
use school_server::SchoolError;
use serde_json::json;

#[tokio::test]
async fn login_resolves_the_tenant_from_the_principal() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    h.school("Colegio Sur", "director@sur.mx").await;

    let outcome = h
        .server
        .accounts()
        .login("  Director@Norte.MX ", PASSWORD)
        .await
        .unwrap();
    assert_eq!(outcome.tenant.id, norte.ctx.tenant_id());
    assert_eq!(outcome.context.tenant_id(), norte.ctx.tenant_id());
    assert_eq!(outcome.principal.role, Role::Director);

    let ctx = h.context(&outcome.token).await;
    assert_eq!(ctx.principal_id(), norte.ctx.principal_id());

    // The login context sees only its own school.
    let principals = h
        .server
        .directory()
        .list(&outcome.context, &ListFilter::new())
        .await
        .unwrap();
    assert_eq!(principals.total, 1);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let teacher = h.teacher(&norte, "maestra@norte.mx").await;
    h.server
        .directory()
        .deactivate(&norte.ctx, teacher.meta.id)
        .await
        .unwrap();

    for (email, password) in [
        ("nadie@norte.mx", PASSWORD),
        ("director@norte.mx", "wrong-password"),
        ("maestra@norte.mx", PASSWORD),
    ] {
        match h.server.accounts().login(email, password).await {
            Err(SchoolError::InvalidCredentials) => {}
            other => panic!("expected invalid credentials for {}, got {:?}", email, other),
        }
    }
}

#[tokio::test]
async fn principal_without_tenant_cannot_authenticate() {
    let h = Harness::new();
    let orphan = Principal {
        meta: RecordMeta::new(),
        name: "Sin Escuela".to_string(),
        email: "huerfano@ejemplo.mx".to_string(),
        password_hash: h.server.hasher().hash(PASSWORD).unwrap(),
        role: Role::Admin,
        active: true,
        email_verified_at: None,
    };
    let issued = h
        .server
        .tokens(h.server.storage())
        .issue(&orphan)
        .await
        .unwrap();

    match h
        .server
        .authenticate(Some(&format!("Bearer {}", issued.plain_text)))
        .await
    {
        Err(SchoolError::TenantMissing { principal_id }) => {
            assert_eq!(principal_id, orphan.meta.id.to_string())
        }
        other => panic!("expected missing tenant, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_or_malformed_credentials_are_unauthenticated() {
    let h = Harness::new();
    for header in [None, Some("Basic Zm9vOmJhcg=="), Some("Bearer "), Some("Bearer 1|nope")] {
        match h.server.authenticate(header).await {
            Err(SchoolError::Unauthenticated) => {}
            other => panic!("expected unauthenticated for {:?}, got {:?}", header, other),
        }
    }
}

#[tokio::test]
async fn logout_revokes_only_the_presented_token() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let second = h
        .server
        .accounts()
        .login("director@norte.mx", PASSWORD)
        .await
        .unwrap();

    h.server.accounts().logout(&norte.ctx).await.unwrap();

    match h
        .server
        .authenticate(Some(&format!("Bearer {}", norte.registered.token)))
        .await
    {
        Err(SchoolError::Unauthenticated) => {}
        other => panic!("expected revoked token, got {:?}", other),
    }
    h.context(&second.token).await;
}

#[tokio::test]
async fn me_returns_the_acting_principal_and_school() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;

    let me = h.server.accounts().me(&norte.ctx).await.unwrap();
    assert_eq!(me.principal.id, norte.ctx.principal_id());
    assert_eq!(me.tenant.id, norte.ctx.tenant_id());
    assert_eq!(me.tenant.slug, "colegio-norte");
}

#[tokio::test]
async fn access_tokens_expire_when_configured() {
    let h = Harness::with_config(
        test_config()
            .access_token_ttl_minutes(Some(30))
            .build()
            .unwrap(),
    );
    let norte = h.school("Colegio Norte", "director@norte.mx").await;

    h.clock.advance(Duration::minutes(31));
    match h
        .server
        .authenticate(Some(&format!("Bearer {}", norte.registered.token)))
        .await
    {
        Err(SchoolError::Unauthenticated) => {}
        other => panic!("expected expired token, got {:?}", other),
    }
}

#[tokio::test]
async fn reset_request_is_uniform_for_unknown_emails() {
    let h = Harness::with_config(test_config().expose_reset_token(true).build().unwrap());
    h.school("Colegio Norte", "director@norte.mx").await;
    h.outbox.drain();

    let unknown = h
        .server
        .accounts()
        .request_password_reset("nadie@norte.mx")
        .await
        .unwrap();
    let known = h
        .server
        .accounts()
        .request_password_reset("director@norte.mx")
        .await
        .unwrap();

    assert_eq!(unknown.message, known.message);
    assert!(unknown.token.is_none());
    assert!(known.token.is_some());
    assert_eq!(h.outbox.sent().len(), 1);
}

#[tokio::test]
async fn reset_token_is_not_exposed_by_default() {
    let h = Harness::new();
    h.school("Colegio Norte", "director@norte.mx").await;

    let requested = h
        .server
        .accounts()
        .request_password_reset("director@norte.mx")
        .await
        .unwrap();
    assert!(requested.token.is_none());
    assert!(h.last_reset_token().is_some());
}

#[tokio::test]
async fn password_reset_is_single_use_and_revokes_sessions() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    h.server
        .accounts()
        .request_password_reset("director@norte.mx")
        .await
        .unwrap();
    let token = h.last_reset_token().unwrap();

    let reset = ResetPassword {
        email: "director@norte.mx".to_string(),
        token: token.clone(),
        password: "nueva-clave-2025".to_string(),
    };
    h.server.accounts().reset_password(reset.clone()).await.unwrap();

    match h.server.accounts().reset_password(reset).await {
        Err(SchoolError::InvalidResetToken) => {}
        other => panic!("expected consumed token to be invalid, got {:?}", other),
    }
    match h
        .server
        .authenticate(Some(&format!("Bearer {}", norte.registered.token)))
        .await
    {
        Err(SchoolError::Unauthenticated) => {}
        other => panic!("expected sessions to be revoked, got {:?}", other),
    }

    assert!(
        h.server
            .accounts()
            .login("director@norte.mx", PASSWORD)
            .await
            .is_err()
    );
    let outcome = h
        .server
        .accounts()
        .login("director@norte.mx", "nueva-clave-2025")
        .await
        .unwrap();
    assert_eq!(outcome.tenant.id, norte.ctx.tenant_id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_resets_with_one_token_consume_it_once() {
    let h = Harness::new();
    h.school("Colegio Norte", "director@norte.mx").await;

    for round in 0..10 {
        h.server
            .accounts()
            .request_password_reset("director@norte.mx")
            .await
            .unwrap();
        let token = h.last_reset_token().unwrap();

        let racers: Vec<_> = ["primera-clave", "segunda-clave"]
            .into_iter()
            .map(|password| {
                let server = h.server.clone();
                let reset = ResetPassword {
                    email: "director@norte.mx".to_string(),
                    token: token.clone(),
                    password: format!("{}-{}", password, round),
                };
                tokio::spawn(async move { server.accounts().reset_password(reset).await })
            })
            .collect();

        let mut consumed = 0;
        for racer in racers {
            match racer.await.unwrap() {
                Ok(()) => consumed += 1,
                Err(SchoolError::InvalidResetToken) => {}
                Err(e) => panic!("unexpected reset failure: {:?}", e),
            }
        }
        assert_eq!(consumed, 1, "round {}", round);

        let accounts = h.server.accounts();
        let winners = [
            accounts
                .login("director@norte.mx", &format!("primera-clave-{}", round))
                .await
                .is_ok(),
            accounts
                .login("director@norte.mx", &format!("segunda-clave-{}", round))
                .await
                .is_ok(),
        ];
        assert_eq!(winners.iter().filter(|w| **w).count(), 1, "round {}", round);
    }
}

#[tokio::test]
async fn tokens_stop_resolving_when_the_school_record_is_gone() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let header = format!("Bearer {}", norte.registered.token);

    h.server
        .storage()
        .delete(StorageKey::global("Tenant", norte.ctx.tenant_id().to_string()))
        .await
        .unwrap();

    match h.server.authenticate(Some(&header)).await {
        Err(SchoolError::TenantMissing { principal_id }) => {
            assert_eq!(principal_id, norte.ctx.principal_id().to_string())
        }
        other => panic!("expected missing tenant, got {:?}", other),
    }
}

#[tokio::test]
async fn tokens_stop_resolving_when_the_school_is_deactivated() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;

    let key = StorageKey::global("Tenant", norte.ctx.tenant_id().to_string());
    let storage = h.server.storage();
    let mut record = storage.get(key.clone()).await.unwrap().unwrap();
    record["active"] = json!(false);
    storage.put(key, record).await.unwrap();

    match h
        .server
        .authenticate(Some(&format!("Bearer {}", norte.registered.token)))
        .await
    {
        Err(SchoolError::Unauthenticated) => {}
        other => panic!("expected inactive school to be refused, got {:?}", other),
    }
    // Other schools are unaffected.
    h.context(&sur.registered.token).await;
}

#[tokio::test]
async fn reset_token_expires_after_an_hour_and_is_removed() {
    let h = Harness::new();
    h.school("Colegio Norte", "director@norte.mx").await;
    h.server
        .accounts()
        .request_password_reset("director@norte.mx")
        .await
        .unwrap();
    let token = h.last_reset_token().unwrap();

    h.clock.advance(Duration::minutes(60));
    let reset = ResetPassword {
        email: "director@norte.mx".to_string(),
        token,
        password: "nueva-clave-2025".to_string(),
    };
    match h.server.accounts().reset_password(reset.clone()).await {
        Err(SchoolError::ResetTokenExpired) => {}
        other => panic!("expected expired token, got {:?}", other),
    }
    match h.server.accounts().reset_password(reset).await {
        Err(SchoolError::InvalidResetToken) => {}
        other => panic!("expected the expired record to be gone, got {:?}", other),
    }
}

#[tokio::test]
async fn reset_token_is_usable_just_before_expiry() {
    let h = Harness::new();
    h.school("Colegio Norte", "director@norte.mx").await;
    h.server
        .accounts()
        .request_password_reset("director@norte.mx")
        .await
        .unwrap();
    let token = h.last_reset_token().unwrap();

    h.clock.advance(Duration::minutes(59));
    h.server
        .accounts()
        .reset_password(ResetPassword {
            email: "director@norte.mx".to_string(),
            token,
            password: "nueva-clave-2025".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn newer_reset_request_replaces_the_older_token() {
    let h = Harness::new();
    h.school("Colegio Norte", "director@norte.mx").await;
    let accounts = h.server.accounts();

    accounts.request_password_reset("director@norte.mx").await.unwrap();
    let first = h.last_reset_token().unwrap();
    accounts.request_password_reset("director@norte.mx").await.unwrap();
    let second = h.last_reset_token().unwrap();
    assert_ne!(first, second);

    match accounts
        .reset_password(ResetPassword {
            email: "director@norte.mx".to_string(),
            token: first,
            password: "nueva-clave-2025".to_string(),
        })
        .await
    {
        Err(SchoolError::InvalidResetToken) => {}
        other => panic!("expected superseded token to be invalid, got {:?}", other),
    }
    accounts
        .reset_password(ResetPassword {
            email: "director@norte.mx".to_string(),
            token: second,
            password: "nueva-clave-2025".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn reset_rejects_short_passwords_before_touching_the_token() {
    let h = Harness::new();
    h.school("Colegio Norte", "director@norte.mx").await;
    h.server
        .accounts()
        .request_password_reset("director@norte.mx")
        .await
        .unwrap();
    let token = h.last_reset_token().unwrap();

    match h
        .server
        .accounts()
        .reset_password(ResetPassword {
            email: "director@norte.mx".to_string(),
            token: token.clone(),
            password: "corta".to_string(),
        })
        .await
    {
        Err(SchoolError::Validation(errors)) => assert!(errors.has_field("password")),
        other => panic!("expected validation error, got {:?}", other),
    }
    h.server
        .accounts()
        .reset_password(ResetPassword {
            email: "director@norte.mx".to_string(),
            token,
            password: "nueva-clave-2025".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn registration_sends_a_verification_link() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;

    let sent = h.outbox.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Notification::VerifyEmail {
            tenant_id,
            email,
            link,
            ..
        } => {
            assert_eq!(*tenant_id, norte.ctx.tenant_id());
            assert_eq!(email, "director@norte.mx");
            let hash = verification_hash(VERIFICATION_SECRET, "director@norte.mx");
            assert!(link.starts_with("https://app.escuela.test/verify-email"));
            assert!(link.contains(&hash));
        }
        other => panic!("expected verification notice, got {:?}", other),
    }
}

#[tokio::test]
async fn email_verification_marks_the_principal_once() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let hash = verification_hash(VERIFICATION_SECRET, "director@norte.mx");
    let accounts = h.server.accounts();

    match accounts.verify_email("director@norte.mx", "deadbeef").await {
        Err(SchoolError::InvalidVerificationLink) => {}
        other => panic!("expected invalid link, got {:?}", other),
    }
    assert_eq!(
        accounts.verify_email("director@norte.mx", &hash).await.unwrap(),
        VerificationOutcome::Verified
    );
    assert_eq!(
        accounts.verify_email("director@norte.mx", &hash).await.unwrap(),
        VerificationOutcome::AlreadyVerified
    );

    let me = accounts.me(&norte.ctx).await.unwrap();
    assert!(me.principal.email_verified_at.is_some());
    assert_eq!(
        accounts.resend_verification(&norte.ctx).await.unwrap(),
        VerificationOutcome::AlreadyVerified
    );
}

#[tokio::test]
async fn resend_verification_dispatches_again() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    h.outbox.drain();

    assert_eq!(
        h.server
            .accounts()
            .resend_verification(&norte.ctx)
            .await
            .unwrap(),
        VerificationOutcome::Sent
    );
    assert_eq!(h.outbox.sent().len(), 1);
}

#[tokio::test]
async fn deactivating_a_principal_revokes_its_sessions() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    h.teacher(&norte, "maestra@norte.mx").await;
    let login = h
        .server
        .accounts()
        .login("maestra@norte.mx", PASSWORD)
        .await
        .unwrap();

    h.server
        .directory()
        .update(
            &norte.ctx,
            login.principal.id.as_uuid(),
            json!({"active": false}),
        )
        .await
        .unwrap();

    match h
        .server
        .authenticate(Some(&format!("Bearer {}", login.token)))
        .await
    {
        Err(SchoolError::Unauthenticated) => {}
        other => panic!("expected revoked session, got {:?}", other),
    }
}

#[tokio::test]
async fn directory_refuses_credential_fields_in_patches() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;

    match h
        .server
        .directory()
        .update(
            &norte.ctx,
            norte.ctx.principal_id().as_uuid(),
            json!({"email": "otro@norte.mx", "password_hash": "x"}),
        )
        .await
    {
        Err(SchoolError::Validation(errors)) => {
            assert!(errors.has_field("email"));
            assert!(errors.has_field("password_hash"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn emails_are_unique_across_schools() {
    let h = Harness::new();
    let norte = h.school("Colegio Norte", "director@norte.mx").await;
    let sur = h.school("Colegio Sur", "director@sur.mx").await;
    h.teacher(&norte, "maestra@ejemplo.mx").await;

    let result = h
        .server
        .directory()
        .create(
            &sur.ctx,
            school_server::tenant::NewPrincipal {
                name: "Otra Maestra".to_string(),
                email: "Maestra@Ejemplo.mx".to_string(),
                password: PASSWORD.to_string(),
                role: Role::Teacher,
            },
        )
        .await;
    match result {
        Err(SchoolError::Conflict { fields, .. }) => assert_eq!(fields, vec!["email"]),
        other => panic!("expected e-mail conflict, got {:?}", other),
    }

    // The failed insert left nothing behind in either school.
    assert_eq!(
        h.server
            .directory()
            .list(&sur.ctx, &ListFilter::new())
            .await
            .unwrap()
            .total,
        1
    );
}
