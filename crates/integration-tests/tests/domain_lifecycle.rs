//! Service-level integration tests for the domain lifecycle.
//!
//! These run `DomainService` against the in-memory store and a scripted
//! hosting gateway, covering the invariants that hold across components:
//! one primary per owner, unique hostnames, terminal verification,
//! verified-only publication, and cascade on delete.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures::future::join_all;

use storeforge_core::{DomainStatus, OwnerId, ThemeId};
use storeforge_integration_tests::{TestContext, primaries};
use storeforge_server::error::DomainError;
use storeforge_server::gateway::{GatewayError, ScriptedCheck};
use storeforge_server::services::{CheckOptions, UNREACHABLE_MESSAGE};

const OWNER: OwnerId = OwnerId::new(1);
const OTHER_OWNER: OwnerId = OwnerId::new(2);

// =============================================================================
// Adding Domains
// =============================================================================

#[tokio::test]
async fn test_add_normalizes_before_storing_and_registering() {
    let ctx = TestContext::new();

    let domain = ctx
        .service
        .add_domain(OWNER, "  HTTPS://WWW.Shop.Example.com/products?x=1 ")
        .await
        .unwrap();

    assert_eq!(domain.hostname.as_str(), "shop.example.com");
    assert_eq!(domain.status, DomainStatus::Pending);
    assert!(!domain.is_primary);
    assert!(!domain.dns_requirements.is_empty());
    assert!(ctx.gateway.is_registered("shop.example.com"));
}

#[tokio::test]
async fn test_hostname_is_unique_across_owners() {
    let ctx = TestContext::new();
    ctx.service.add_domain(OWNER, "shop.example.com").await.unwrap();

    // Same hostname in a different spelling, from another owner
    let err = ctx
        .service
        .add_domain(OTHER_OWNER, "https://Shop.Example.com.")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::DuplicateHostname(_)));
    assert_eq!(ctx.gateway.register_calls(), 1);
    assert_eq!(ctx.store.domain_count().await, 1);
}

#[tokio::test]
async fn test_provider_rejection_stores_nothing() {
    let ctx = TestContext::new();
    ctx.gateway
        .fail_register("taken.example.com", GatewayError::AlreadyRegistered);

    let err = ctx
        .service
        .add_domain(OWNER, "taken.example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::AlreadyRegistered));
    assert_eq!(ctx.store.domain_count().await, 0);
}

#[tokio::test]
async fn test_unreachable_provider_on_add_is_retried_then_surfaced() {
    let ctx = TestContext::new();
    ctx.gateway.fail_register(
        "shop.example.com",
        GatewayError::ProviderUnavailable("503".to_string()),
    );

    let err = ctx
        .service
        .add_domain(OWNER, "shop.example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::ProviderUnavailable(_)));
    // One attempt plus one retry
    assert_eq!(ctx.gateway.register_calls(), 2);
    assert_eq!(ctx.store.domain_count().await, 0);
}

// =============================================================================
// Primary Domain
// =============================================================================

#[tokio::test]
async fn test_concurrent_set_primary_leaves_exactly_one_primary() {
    let ctx = TestContext::new();
    let mut ids = Vec::new();
    for host in ["a.example.com", "b.example.com", "c.example.com", "d.example.com"] {
        ids.push(ctx.verified_domain(1, host).await.id);
    }

    let results = join_all(ids.iter().map(|id| ctx.service.set_primary(OWNER, *id))).await;
    assert!(results.iter().all(Result::is_ok));

    let domains = ctx.service.list_domains(OWNER).await.unwrap();
    let primary = primaries(&domains);
    assert_eq!(primary.len(), 1);
    assert!(ids.contains(&primary[0]));
}

#[tokio::test]
async fn test_set_primary_moves_flag_between_domains() {
    let ctx = TestContext::new();
    let a = ctx.verified_domain(1, "a.example.com").await;
    let b = ctx.verified_domain(1, "b.example.com").await;

    ctx.service.set_primary(OWNER, a.id).await.unwrap();
    ctx.service.set_primary(OWNER, b.id).await.unwrap();

    let domains = ctx.service.list_domains(OWNER).await.unwrap();
    assert_eq!(primaries(&domains), vec![b.id]);
    let primary = ctx.service.primary_domain(OWNER).await.unwrap().unwrap();
    assert_eq!(primary.id, b.id);
}

#[tokio::test]
async fn test_unverified_domain_cannot_be_primary() {
    let ctx = TestContext::new();
    let domain = ctx.service.add_domain(OWNER, "shop.example.com").await.unwrap();

    let err = ctx.service.set_primary(OWNER, domain.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotVerified));
    assert!(ctx.service.primary_domain(OWNER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_primary_is_per_owner() {
    let ctx = TestContext::new();
    let mine = ctx.verified_domain(1, "mine.example.com").await;
    let theirs = ctx.verified_domain(2, "theirs.example.com").await;

    ctx.service.set_primary(OWNER, mine.id).await.unwrap();
    ctx.service.set_primary(OTHER_OWNER, theirs.id).await.unwrap();

    // Another owner's domain is invisible, not merely forbidden
    let err = ctx.service.set_primary(OWNER, theirs.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound));

    let primary = ctx.service.primary_domain(OWNER).await.unwrap().unwrap();
    assert_eq!(primary.id, mine.id);
    let primary = ctx.service.primary_domain(OTHER_OWNER).await.unwrap().unwrap();
    assert_eq!(primary.id, theirs.id);
}

// =============================================================================
// Verification
// =============================================================================

#[tokio::test]
async fn test_verified_is_terminal_and_rechecks_are_idempotent() {
    let ctx = TestContext::new();
    let verified = ctx.verified_domain(1, "shop.example.com").await;
    assert_eq!(verified.status, DomainStatus::Verified);

    // Provider now claims misconfiguration; the stored state must not regress
    ctx.gateway.set_check(
        "shop.example.com",
        ScriptedCheck::Fail(GatewayError::ProviderUnavailable("down".to_string())),
    );
    for _ in 0..3 {
        let again = ctx.service.refresh_domain(OWNER, verified.id).await.unwrap();
        assert_eq!(again.status, DomainStatus::Verified);
        assert_eq!(again.verified_at, verified.verified_at);
        assert!(again.error_message.is_none());
    }

    // Batch refreshes do not pick up verified domains at all
    let outcomes = ctx
        .service
        .refresh_owner(
            OWNER,
            CheckOptions {
                include_errors: true,
            },
        )
        .await
        .unwrap();
    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn test_error_domain_recovers_on_include_errors() {
    let ctx = TestContext::new();
    let domain = ctx.service.add_domain(OWNER, "shop.example.com").await.unwrap();

    let failed = ctx.service.refresh_domain(OWNER, domain.id).await.unwrap();
    assert_eq!(failed.status, DomainStatus::Error);
    assert!(failed.error_message.is_some());

    ctx.gateway.set_check("shop.example.com", ScriptedCheck::Verified);

    // Errored domains are skipped by default
    let outcomes = ctx
        .service
        .refresh_owner(OWNER, CheckOptions::default())
        .await
        .unwrap();
    assert!(outcomes.is_empty());

    let outcomes = ctx
        .service
        .refresh_owner(
            OWNER,
            CheckOptions {
                include_errors: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_verified());

    let stored = ctx.service.get_domain(OWNER, domain.id).await.unwrap();
    assert!(stored.error_message.is_none());
    assert!(stored.verified_at.is_some());
}

#[tokio::test]
async fn test_batch_refresh_isolates_slow_and_failing_domains() {
    let ctx = TestContext::new();
    for host in ["a.example.com", "b.example.com", "c.example.com", "d.example.com"] {
        ctx.service.add_domain(OWNER, host).await.unwrap();
    }
    ctx.gateway.set_default_check(ScriptedCheck::Verified);
    ctx.gateway.set_check("b.example.com", ScriptedCheck::Hang);
    ctx.gateway.set_check(
        "c.example.com",
        ScriptedCheck::Fail(GatewayError::Rejected {
            status: 400,
            message: "bad request".to_string(),
        }),
    );
    ctx.gateway.set_check(
        "d.example.com",
        ScriptedCheck::Delayed(Duration::from_millis(10), Box::new(ScriptedCheck::Verified)),
    );

    let outcomes = ctx
        .service
        .refresh_owner(OWNER, CheckOptions::default())
        .await
        .unwrap();

    let summary: Vec<_> = outcomes
        .iter()
        .map(|o| (o.hostname.as_str(), o.result.as_ref().unwrap().status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("a.example.com", DomainStatus::Verified),
            ("b.example.com", DomainStatus::Error),
            ("c.example.com", DomainStatus::Error),
            ("d.example.com", DomainStatus::Verified),
        ]
    );

    let hung = outcomes[1].result.as_ref().unwrap();
    assert_eq!(hung.error_message.as_deref(), Some(UNREACHABLE_MESSAGE));
    // Permanent errors are not retried
    assert_eq!(ctx.gateway.check_calls("c.example.com"), 1);
}

#[tokio::test]
async fn test_verify_domain_fails_with_diagnostic_until_dns_is_ready() {
    let ctx = TestContext::new();
    let domain = ctx.service.add_domain(OWNER, "shop.example.com").await.unwrap();

    let err = ctx.service.verify_domain(OWNER, domain.id).await.unwrap_err();
    match err {
        DomainError::VerificationFailed { message } => assert!(!message.is_empty()),
        other => panic!("expected VerificationFailed, got {other:?}"),
    }

    ctx.gateway.set_check("shop.example.com", ScriptedCheck::Verified);
    let verified = ctx.service.verify_domain(OWNER, domain.id).await.unwrap();
    assert!(verified.is_verified());
}

// =============================================================================
// Theme Publication
// =============================================================================

#[tokio::test]
async fn test_publish_requires_verified_domain() {
    let ctx = TestContext::new();
    let domain = ctx.service.add_domain(OWNER, "shop.example.com").await.unwrap();

    let err = ctx
        .service
        .publish_theme(OWNER, domain.id, ThemeId::new("aurora"), "Aurora".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::DomainNotVerified));
    assert_eq!(ctx.store.publication_count().await, 0);
}

#[tokio::test]
async fn test_republish_replaces_theme() {
    let ctx = TestContext::new();
    let domain = ctx.verified_domain(1, "shop.example.com").await;

    ctx.service
        .publish_theme(OWNER, domain.id, ThemeId::new("aurora"), "Aurora".to_string())
        .await
        .unwrap();
    let second = ctx
        .service
        .publish_theme(OWNER, domain.id, ThemeId::new("meridian"), "Meridian".to_string())
        .await
        .unwrap();

    assert_eq!(ctx.store.publication_count().await, 1);
    let status = ctx.service.publication_status(OWNER, domain.id).await.unwrap();
    assert!(status.published);
    assert_eq!(status.theme_id, Some(ThemeId::new("meridian")));
    assert_eq!(status.published_at, Some(second.published_at));
}

#[tokio::test]
async fn test_publication_is_owner_scoped() {
    let ctx = TestContext::new();
    let domain = ctx.verified_domain(1, "shop.example.com").await;

    let err = ctx
        .service
        .publish_theme(OTHER_OWNER, domain.id, ThemeId::new("aurora"), "Aurora".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound));
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_cascades_and_releases_hostname() {
    let ctx = TestContext::new();
    let domain = ctx.verified_domain(1, "shop.example.com").await;
    let other = ctx.verified_domain(1, "other.example.com").await;
    ctx.service.set_primary(OWNER, domain.id).await.unwrap();
    ctx.service
        .publish_theme(OWNER, domain.id, ThemeId::new("aurora"), "Aurora".to_string())
        .await
        .unwrap();
    ctx.service
        .publish_theme(OWNER, other.id, ThemeId::new("aurora"), "Aurora".to_string())
        .await
        .unwrap();

    ctx.service.delete_domain(OWNER, domain.id).await.unwrap();

    // Publication gone with it, sibling untouched, no primary promoted
    assert_eq!(ctx.store.publication_count().await, 1);
    assert!(!ctx.gateway.is_registered("shop.example.com"));
    let remaining = ctx.service.list_domains(OWNER).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(primaries(&remaining).is_empty());
    assert!(matches!(
        ctx.service.get_domain(OWNER, domain.id).await,
        Err(DomainError::NotFound)
    ));

    // The hostname can be connected again, by anyone
    let readded = ctx
        .service
        .add_domain(OTHER_OWNER, "shop.example.com")
        .await
        .unwrap();
    assert_eq!(readded.status, DomainStatus::Pending);
}

#[tokio::test]
async fn test_delete_by_other_owner_is_not_found() {
    let ctx = TestContext::new();
    let domain = ctx.service.add_domain(OWNER, "shop.example.com").await.unwrap();

    let err = ctx
        .service
        .delete_domain(OTHER_OWNER, domain.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound));
    assert_eq!(ctx.store.domain_count().await, 1);
    assert_eq!(ctx.gateway.deregister_calls(), 0);
}

// =============================================================================
// End to End
// =============================================================================

#[tokio::test]
async fn test_connect_verify_publish_scenario() {
    let ctx = TestContext::new();

    // Merchant pastes the URL from their browser
    let domain = ctx
        .service
        .add_domain(OWNER, "https://www.mystore.example.com/")
        .await
        .unwrap();
    assert_eq!(domain.hostname.as_str(), "mystore.example.com");

    // DNS not there yet
    let first = ctx.service.refresh_domain(OWNER, domain.id).await.unwrap();
    assert_eq!(first.status, DomainStatus::Error);

    // Records fetched again and created; provider confirms
    let with_records = ctx.service.refresh_requirements(OWNER, domain.id).await.unwrap();
    assert!(!with_records.dns_requirements.is_empty());
    ctx.gateway.set_check("mystore.example.com", ScriptedCheck::Verified);
    let outcomes = ctx
        .service
        .refresh_owner(
            OWNER,
            CheckOptions {
                include_errors: true,
            },
        )
        .await
        .unwrap();
    assert!(outcomes[0].is_verified());

    ctx.service.set_primary(OWNER, domain.id).await.unwrap();
    ctx.service
        .publish_theme(OWNER, domain.id, ThemeId::new("aurora"), "Aurora".to_string())
        .await
        .unwrap();

    let primary = ctx.service.primary_domain(OWNER).await.unwrap().unwrap();
    assert_eq!(primary.id, domain.id);
    assert!(ctx.service.publication_status(OWNER, domain.id).await.unwrap().published);

    assert!(ctx.service.unpublish_theme(OWNER, domain.id).await.unwrap());
    assert!(!ctx.service.unpublish_theme(OWNER, domain.id).await.unwrap());
}
