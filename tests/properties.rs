//! Property tests for slug derivation and tenant scoping.

mod common;

use common::Harness;
use proptest::prelude::*;
use school_server::registration::slugify;
use school_server::school::Student;
use school_server::scoping::ListFilter;
use school_server::validation::is_slug;

proptest! {
    #[test]
    fn slugify_always_yields_a_valid_slug(name in "\\PC{0,60}") {
        let slug = slugify(&name);
        prop_assert!(is_slug(&slug), "{:?} -> {:?}", name, slug);
    }

    #[test]
    fn slugify_is_idempotent(name in "[a-zA-Z0-9 áéíóúñÁÉÍÓÚÑ.,'-]{0,40}") {
        let once = slugify(&name);
        prop_assert_eq!(slugify(&once), once);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn each_school_lists_exactly_its_own_students(
        placements in prop::collection::vec(("[A-Za-z]{1,20}", any::<bool>()), 0..12)
    ) {
        tokio_test::block_on(async {
            let h = Harness::new();
            let norte = h.school("Colegio Norte", "director@norte.mx").await;
            let sur = h.school("Colegio Sur", "director@sur.mx").await;

            let mut expected_norte = 0;
            for (name, in_norte) in &placements {
                let school = if *in_norte { &norte } else { &sur };
                h.server
                    .repository::<Student>(&school.ctx)
                    .create(Student::new(name.as_str(), "Prueba"))
                    .await
                    .unwrap();
                if *in_norte {
                    expected_norte += 1;
                }
            }

            let listed = h
                .server
                .repository::<Student>(&norte.ctx)
                .list(&ListFilter::new())
                .await
                .unwrap();
            assert_eq!(listed.total, expected_norte);
            assert!(listed
                .items
                .iter()
                .all(|s| s.meta.tenant_id == Some(norte.ctx.tenant_id())));

            let others = h
                .server
                .repository::<Student>(&sur.ctx)
                .count()
                .await
                .unwrap();
            assert_eq!(others, placements.len() - expected_norte);
        });
    }
}
