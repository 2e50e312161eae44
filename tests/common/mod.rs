//! Shared fixtures for the integration suites.
//!
//! Every harness gets its own in-memory store, a manual clock, an outbox
//! notifier and cheap Argon2 parameters, so tests stay fast and can inspect
//! what would have been mailed.

#![allow(dead_code)]

use school_server::auth::ManualClock;
use school_server::config::{HashingConfig, SchoolConfig};
use school_server::handler::{OperationRequest, OperationResponse, SchoolOperationHandler};
use school_server::notify::{Notification, OutboxNotifier};
use school_server::registration::{RegisterExpress, RegisterSchool, Registered};
use chrono::NaiveDate;
use school_server::school::{
    Cycle, Grade, Group, Level, Parent, Period, PeriodKind, Student, Subject,
};
use school_server::storage::InMemoryStorage;
use school_server::tenant::{NewPrincipal, Principal, Role, TenantContext};
use school_server::{SchoolError, SchoolServer};

pub const PASSWORD: &str = "s3cret-pass";
pub const VERIFICATION_SECRET: &str = "integration-secret";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Harness {
    pub server: SchoolServer<InMemoryStorage>,
    pub clock: ManualClock,
    pub outbox: OutboxNotifier,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config().build().unwrap())
    }

    pub fn with_config(config: SchoolConfig) -> Self {
        init_logging();
        let clock = ManualClock::default();
        let outbox = OutboxNotifier::new();
        let server = SchoolServer::builder(InMemoryStorage::new())
            .with_config(config)
            .with_clock(clock.clone())
            .with_notifier(outbox.clone())
            .build()
            .unwrap();
        Self {
            server,
            clock,
            outbox,
        }
    }

    pub fn handler(&self) -> SchoolOperationHandler<InMemoryStorage> {
        SchoolOperationHandler::new(self.server.clone())
    }

    pub async fn handle(&self, request: OperationRequest) -> OperationResponse {
        self.handler().handle_operation(request).await
    }

    /// Express-register a school and return its director's context.
    pub async fn school(&self, name: &str, email: &str) -> School {
        let registered = self
            .server
            .registration()
            .register_express(RegisterExpress {
                school_name: name.to_string(),
                email: email.to_string(),
                password: PASSWORD.to_string(),
                director_name: None,
            })
            .await
            .unwrap();
        let ctx = self.context(&registered.token).await;
        School { registered, ctx }
    }

    pub async fn context(&self, token: &str) -> TenantContext {
        self.server
            .authenticate(Some(&format!("Bearer {}", token)))
            .await
            .unwrap()
    }

    pub async fn teacher(&self, school: &School, email: &str) -> Principal {
        self.principal(school, email, Role::Teacher).await
    }

    pub async fn principal(&self, school: &School, email: &str, role: Role) -> Principal {
        self.server
            .directory()
            .create(
                &school.ctx,
                NewPrincipal {
                    name: "Maestra Rivera".to_string(),
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    role,
                },
            )
            .await
            .unwrap()
    }

    /// The first bimester of a 2025-2026 cycle inside `school`.
    pub async fn period(&self, school: &School) -> Period {
        let cycle = self
            .server
            .repository::<Cycle>(&school.ctx)
            .create(Cycle::new("2025-2026", date(2025, 8, 25), date(2026, 7, 15)))
            .await
            .unwrap();
        self.server
            .repository::<Period>(&school.ctx)
            .create(Period::new(
                cycle.meta.id,
                1,
                PeriodKind::Bimestre,
                date(2025, 8, 25),
                date(2025, 10, 31),
            ))
            .await
            .unwrap()
    }

    /// A level, grade, group and subject inside `school`.
    pub async fn structure(&self, school: &School) -> Structure {
        let ctx = &school.ctx;
        let level = self
            .server
            .repository::<Level>(ctx)
            .create(Level::new("Primaria", 2))
            .await
            .unwrap();
        let grade = self
            .server
            .repository::<Grade>(ctx)
            .create(Grade::new(level.meta.id, "1°", 1))
            .await
            .unwrap();
        let group = self
            .server
            .repository::<Group>(ctx)
            .create(Group::new(grade.meta.id, "A"))
            .await
            .unwrap();
        let subject = self
            .server
            .repository::<Subject>(ctx)
            .create(Subject::new("Matemáticas"))
            .await
            .unwrap();
        Structure {
            level,
            grade,
            group,
            subject,
        }
    }

    pub async fn student(&self, school: &School, first_name: &str) -> Student {
        self.server
            .repository::<Student>(&school.ctx)
            .create(Student::new(first_name, "García"))
            .await
            .unwrap()
    }

    pub async fn parent(&self, school: &School, email: &str) -> Parent {
        self.server
            .repository::<Parent>(&school.ctx)
            .create(Parent::new("Laura Pérez", email))
            .await
            .unwrap()
    }

    /// The reset token from the most recent password-reset notification.
    pub fn last_reset_token(&self) -> Option<String> {
        self.outbox
            .sent()
            .into_iter()
            .rev()
            .find_map(|notification| match notification {
                Notification::PasswordReset { token, .. } => Some(token),
                _ => None,
            })
    }
}

pub struct School {
    pub registered: Registered,
    pub ctx: TenantContext,
}

pub struct Structure {
    pub level: Level,
    pub grade: Grade,
    pub group: Group,
    pub subject: Subject,
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn test_config() -> school_server::config::SchoolConfigBuilder {
    SchoolConfig::builder()
        .hashing(HashingConfig::fast())
        .verification_secret(VERIFICATION_SECRET)
        .frontend_url("https://app.escuela.test")
}

pub fn full_registration(slug: &str, code: &str, director_email: &str) -> RegisterSchool {
    RegisterSchool {
        school_name: "Colegio Benito Juárez".to_string(),
        slug: slug.to_string(),
        code: code.to_string(),
        tax_id: None,
        school_email: "contacto@benitojuarez.edu.mx".to_string(),
        phone: None,
        postal_code: Some("06000".to_string()),
        address: None,
        director_name: "Rosa Juárez".to_string(),
        director_email: director_email.to_string(),
        password: PASSWORD.to_string(),
    }
}

/// Assert a cross-tenant rejection on `field`.
pub fn assert_cross_tenant<T: std::fmt::Debug>(result: Result<T, SchoolError>, field: &str) {
    match result {
        Err(SchoolError::CrossTenantViolation { field: actual }) => assert_eq!(actual, field),
        other => panic!("expected cross-tenant violation on {}, got {:?}", field, other),
    }
}

pub fn assert_not_found<T: std::fmt::Debug>(result: Result<T, SchoolError>) {
    match result {
        Err(SchoolError::NotFound { .. }) => {}
        other => panic!("expected not found, got {:?}", other),
    }
}
