//! Integration tests for the collaboration store.
//!
//! Exercises the repository layer against a real database:
//! - Invite round-trip (create → accept) and the stats invariant
//! - Duplicate-pending uniqueness for invites, change requests, join requests
//! - Lock acquire/release, expiry reclaim, holder extension
//! - Review race: only one of two competing reviews lands
//! - Apply round-trip with pre-change version snapshot

use serde_json::json;
use sqlx::PgPool;

use cospace_core::change_request::ChangeRequestStatus;
use cospace_core::invite::generate_invite_token;
use cospace_core::permissions::{Permission, Privacy};
use cospace_db::models::content::CreateContentRequest;
use cospace_db::models::space::CreateSpaceRequest;
use cospace_db::repositories::{
    ChangeRequestRepo, CollaboratorRepo, ContentRepo, InviteRepo, JoinRequestRepo, SpaceRepo,
};

const OWNER: i64 = 1;
const ALICE: i64 = 2;
const BOB: i64 = 3;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_space(title: &str) -> CreateSpaceRequest {
    CreateSpaceRequest {
        title: title.to_string(),
        description: String::new(),
        privacy: Privacy::Private,
        allow_guest_view: false,
        require_approval_for_join: true,
        auto_approve_join_requests: false,
    }
}

async fn make_space(pool: &PgPool, title: &str) -> cospace_db::models::space::Space {
    SpaceRepo::create(pool, OWNER, "owner@example.com", &new_space(title))
        .await
        .unwrap()
}

async fn make_content(pool: &PgPool, space_id: i64) -> cospace_db::models::content::SharedContent {
    ContentRepo::create(
        pool,
        space_id,
        OWNER,
        &CreateContentRequest {
            title: "Doc".to_string(),
            body: json!({"text": "v1"}),
        },
    )
    .await
    .unwrap()
}

/// Backdate a content lock so it reads as expired.
async fn expire_lock(pool: &PgPool, content_id: i64) {
    sqlx::query(
        "UPDATE shared_content SET lock_expiry = NOW() - INTERVAL '1 second' WHERE id = $1",
    )
    .bind(content_id)
    .execute(pool)
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Invites + stats
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn invite_round_trip_updates_stats(pool: PgPool) {
    let space = make_space(&pool, "Invite Space").await;
    // Owner is seeded as the only active collaborator.
    assert_eq!(space.total_collaborators, 1);

    let invite = InviteRepo::create(
        &pool,
        space.id,
        "alice@example.com",
        Permission::Edit,
        OWNER,
        "join us",
        &generate_invite_token(),
        7,
    )
    .await
    .unwrap()
    .expect("first invite should insert");
    assert_eq!(invite.status, "pending");

    let (accepted, collaborator) =
        InviteRepo::accept(&pool, &invite.token, ALICE, "alice@example.com")
            .await
            .unwrap()
            .expect("pending unexpired invite should accept");
    assert_eq!(accepted.status, "accepted");
    assert_eq!(accepted.invited_user_id, Some(ALICE));
    let collaborator = collaborator.expect("alice was not yet a member");
    assert_eq!(collaborator.permission, "edit");
    assert_eq!(collaborator.status, "active");

    // Stats invariant: total_collaborators == count of active rows.
    let space = SpaceRepo::get(&pool, space.id).await.unwrap().unwrap();
    assert_eq!(space.total_collaborators, 2);

    // Accepting again is a no-op: the invite is no longer pending.
    let again = InviteRepo::accept(&pool, &invite.token, ALICE, "alice@example.com")
        .await
        .unwrap();
    assert!(again.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_pending_invite_is_rejected(pool: PgPool) {
    let space = make_space(&pool, "Dup Invite Space").await;

    let first = InviteRepo::create(
        &pool,
        space.id,
        "alice@example.com",
        Permission::View,
        OWNER,
        "",
        &generate_invite_token(),
        7,
    )
    .await
    .unwrap();
    assert!(first.is_some());

    let second = InviteRepo::create(
        &pool,
        space.id,
        "alice@example.com",
        Permission::Edit,
        OWNER,
        "",
        &generate_invite_token(),
        7,
    )
    .await
    .unwrap();
    assert!(second.is_none(), "live pending invite must block a duplicate");
}

#[sqlx::test(migrations = "./migrations")]
async fn expired_pending_invite_is_replaced(pool: PgPool) {
    let space = make_space(&pool, "Expired Invite Space").await;

    let stale = InviteRepo::create(
        &pool,
        space.id,
        "alice@example.com",
        Permission::View,
        OWNER,
        "",
        &generate_invite_token(),
        7,
    )
    .await
    .unwrap()
    .unwrap();

    sqlx::query(
        "UPDATE collaboration_invites SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(stale.id)
    .execute(&pool)
    .await
    .unwrap();

    // The expired pending row is purged and replaced.
    let fresh = InviteRepo::create(
        &pool,
        space.id,
        "alice@example.com",
        Permission::Edit,
        OWNER,
        "",
        &generate_invite_token(),
        7,
    )
    .await
    .unwrap();
    assert!(fresh.is_some());
    assert!(InviteRepo::get(&pool, stale.id).await.unwrap().is_none());

    // Accepting the stale token now fails.
    let gone = InviteRepo::accept(&pool, &stale.token, ALICE, "alice@example.com")
        .await
        .unwrap();
    assert!(gone.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn purge_expired_flips_only_past_deadline_invites(pool: PgPool) {
    let space = make_space(&pool, "Sweep Space").await;

    let stale = InviteRepo::create(
        &pool,
        space.id,
        "old@example.com",
        Permission::View,
        OWNER,
        "",
        &generate_invite_token(),
        7,
    )
    .await
    .unwrap()
    .unwrap();
    InviteRepo::create(
        &pool,
        space.id,
        "fresh@example.com",
        Permission::View,
        OWNER,
        "",
        &generate_invite_token(),
        7,
    )
    .await
    .unwrap()
    .unwrap();

    sqlx::query(
        "UPDATE collaboration_invites SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(stale.id)
    .execute(&pool)
    .await
    .unwrap();

    assert_eq!(InviteRepo::purge_expired(&pool).await.unwrap(), 1);
    let swept = InviteRepo::get(&pool, stale.id).await.unwrap().unwrap();
    assert_eq!(swept.status, "expired");
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn removal_is_soft_and_recomputes_stats(pool: PgPool) {
    let space = make_space(&pool, "Removal Space").await;
    let invite = InviteRepo::create(
        &pool,
        space.id,
        "alice@example.com",
        Permission::View,
        OWNER,
        "",
        &generate_invite_token(),
        7,
    )
    .await
    .unwrap()
    .unwrap();
    InviteRepo::accept(&pool, &invite.token, ALICE, "alice@example.com")
        .await
        .unwrap()
        .unwrap();

    assert!(CollaboratorRepo::remove(&pool, space.id, ALICE).await.unwrap());
    // Second removal finds no active row.
    assert!(!CollaboratorRepo::remove(&pool, space.id, ALICE).await.unwrap());

    let space = SpaceRepo::get(&pool, space.id).await.unwrap().unwrap();
    assert_eq!(space.total_collaborators, 1);

    // History survives as an inactive row.
    let rows = CollaboratorRepo::list(&pool, space.id).await.unwrap();
    assert!(rows.iter().any(|c| c.user_id == ALICE && c.status == "inactive"));
    assert!(CollaboratorRepo::get_active(&pool, space.id, ALICE)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Locks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn live_lock_blocks_other_users(pool: PgPool) {
    let space = make_space(&pool, "Lock Space").await;
    let content = make_content(&pool, space.id).await;

    let lock = ContentRepo::acquire_lock(&pool, content.id, ALICE, 300)
        .await
        .unwrap()
        .expect("unlocked content should lock");
    assert_eq!(lock.locked_by, ALICE);
    assert!(lock.previous_holder.is_none());

    let blocked = ContentRepo::acquire_lock(&pool, content.id, BOB, 300)
        .await
        .unwrap();
    assert!(blocked.is_none(), "live lock must not be stolen");

    // Only the holder can release.
    assert!(!ContentRepo::release_lock(&pool, content.id, BOB).await.unwrap());
    assert!(ContentRepo::release_lock(&pool, content.id, ALICE).await.unwrap());

    let after = ContentRepo::acquire_lock(&pool, content.id, BOB, 300)
        .await
        .unwrap();
    assert!(after.is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn expired_lock_is_reclaimed_with_previous_holder(pool: PgPool) {
    let space = make_space(&pool, "Expiry Space").await;
    let content = make_content(&pool, space.id).await;

    ContentRepo::acquire_lock(&pool, content.id, ALICE, 300)
        .await
        .unwrap()
        .unwrap();
    expire_lock(&pool, content.id).await;

    let reclaimed = ContentRepo::acquire_lock(&pool, content.id, BOB, 300)
        .await
        .unwrap()
        .expect("expired lock is reclaimable");
    assert_eq!(reclaimed.locked_by, BOB);
    assert_eq!(reclaimed.previous_holder, Some(ALICE));
}

#[sqlx::test(migrations = "./migrations")]
async fn holder_reacquire_extends_without_previous_holder(pool: PgPool) {
    let space = make_space(&pool, "Extend Space").await;
    let content = make_content(&pool, space.id).await;

    let first = ContentRepo::acquire_lock(&pool, content.id, ALICE, 60)
        .await
        .unwrap()
        .unwrap();
    let second = ContentRepo::acquire_lock(&pool, content.id, ALICE, 600)
        .await
        .unwrap()
        .expect("holder re-acquire is idempotent");
    assert!(second.previous_holder.is_none());
    assert!(second.lock_expiry > first.lock_expiry);
}

#[sqlx::test(migrations = "./migrations")]
async fn sweep_clears_expired_locks_only(pool: PgPool) {
    let space = make_space(&pool, "Sweep Lock Space").await;
    let expired = make_content(&pool, space.id).await;
    let live = make_content(&pool, space.id).await;

    ContentRepo::acquire_lock(&pool, expired.id, ALICE, 300)
        .await
        .unwrap()
        .unwrap();
    ContentRepo::acquire_lock(&pool, live.id, BOB, 300)
        .await
        .unwrap()
        .unwrap();
    expire_lock(&pool, expired.id).await;

    let swept = ContentRepo::sweep_expired_locks(&pool).await.unwrap();
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].content_id, expired.id);
    assert_eq!(swept[0].holder, ALICE);

    let still_live = ContentRepo::get(&pool, live.id).await.unwrap().unwrap();
    assert_eq!(still_live.locked_by, Some(BOB));
}

#[sqlx::test(migrations = "./migrations")]
async fn locked_content_rejects_other_users_edits(pool: PgPool) {
    let space = make_space(&pool, "Edit Lock Space").await;
    let content = make_content(&pool, space.id).await;

    ContentRepo::acquire_lock(&pool, content.id, ALICE, 300)
        .await
        .unwrap()
        .unwrap();

    let body = json!({"text": "bob"});
    let denied = ContentRepo::update(&pool, content.id, BOB, None, Some(&body))
        .await
        .unwrap();
    assert!(denied.is_none());

    let body = json!({"text": "alice"});
    let updated = ContentRepo::update(&pool, content.id, ALICE, None, Some(&body))
        .await
        .unwrap()
        .expect("holder edits through their own lock");
    assert_eq!(updated.version, content.version + 1);

    // The pre-change body landed in the version history.
    let versions = ContentRepo::list_versions(&pool, content.id).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, content.version);
    assert_eq!(versions[0].body, json!({"text": "v1"}));
}

// ---------------------------------------------------------------------------
// Change requests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_reviews_cannot_both_land(pool: PgPool) {
    let space = make_space(&pool, "Race Space").await;
    let content = make_content(&pool, space.id).await;

    let request = ChangeRequestRepo::create(
        &pool,
        content.id,
        space.id,
        ALICE,
        &json!({"text": "proposal"}),
    )
    .await
    .unwrap()
    .expect("first request inserts");
    assert_eq!(request.original_content, json!({"text": "v1"}));

    // Duplicate pending request by the same requester is rejected.
    let dup = ChangeRequestRepo::create(
        &pool,
        content.id,
        space.id,
        ALICE,
        &json!({"text": "again"}),
    )
    .await
    .unwrap();
    assert!(dup.is_none());

    // Two competing reviews: exactly one transitions the row.
    let (approve, reject) = tokio::join!(
        ChangeRequestRepo::review(
            &pool,
            request.id,
            OWNER,
            ChangeRequestStatus::Approved,
            None
        ),
        ChangeRequestRepo::review(
            &pool,
            request.id,
            BOB,
            ChangeRequestStatus::Rejected,
            Some("no")
        ),
    );
    let outcomes = [approve.unwrap(), reject.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| o.is_some()).count(), 1);

    let settled = ChangeRequestRepo::get(&pool, request.id).await.unwrap().unwrap();
    assert!(settled.status == "approved" || settled.status == "rejected");
}

#[sqlx::test(migrations = "./migrations")]
async fn apply_round_trip_snapshots_history(pool: PgPool) {
    let space = make_space(&pool, "Apply Space").await;
    let content = make_content(&pool, space.id).await;

    let request = ChangeRequestRepo::create(
        &pool,
        content.id,
        space.id,
        ALICE,
        &json!({"text": "v2"}),
    )
    .await
    .unwrap()
    .unwrap();

    // Pending stats reflect the open request.
    let with_pending = SpaceRepo::get(&pool, space.id).await.unwrap().unwrap();
    assert_eq!(with_pending.pending_change_requests, 1);

    // Applying before approval is an invalid state.
    assert!(ChangeRequestRepo::apply(&pool, request.id, OWNER)
        .await
        .unwrap()
        .is_none());

    ChangeRequestRepo::review(&pool, request.id, OWNER, ChangeRequestStatus::Approved, None)
        .await
        .unwrap()
        .unwrap();

    let (applied, updated) = ChangeRequestRepo::apply(&pool, request.id, OWNER)
        .await
        .unwrap()
        .expect("approved request applies");
    assert_eq!(applied.status, "applied");
    assert_eq!(updated.body, json!({"text": "v2"}));
    assert_eq!(updated.version, content.version + 1);

    // Applying twice is an invalid state.
    assert!(ChangeRequestRepo::apply(&pool, request.id, OWNER)
        .await
        .unwrap()
        .is_none());

    let versions = ContentRepo::list_versions(&pool, content.id).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].body, json!({"text": "v1"}));

    let settled = SpaceRepo::get(&pool, space.id).await.unwrap().unwrap();
    assert_eq!(settled.pending_change_requests, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn cancel_is_limited_to_pending_or_rejected(pool: PgPool) {
    let space = make_space(&pool, "Cancel Space").await;
    let content = make_content(&pool, space.id).await;

    let request = ChangeRequestRepo::create(&pool, content.id, space.id, ALICE, &json!({}))
        .await
        .unwrap()
        .unwrap();
    ChangeRequestRepo::review(&pool, request.id, OWNER, ChangeRequestStatus::Approved, None)
        .await
        .unwrap()
        .unwrap();

    // Approved requests are immutable history for cancel.
    assert!(ChangeRequestRepo::cancel(&pool, request.id).await.unwrap().is_none());

    let second = ChangeRequestRepo::create(&pool, content.id, space.id, BOB, &json!({}))
        .await
        .unwrap()
        .unwrap();
    let cancelled = ChangeRequestRepo::cancel(&pool, second.id).await.unwrap();
    assert_eq!(cancelled.unwrap().status, "cancelled");
}

// ---------------------------------------------------------------------------
// Join requests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn join_request_approval_adds_collaborator(pool: PgPool) {
    let space = make_space(&pool, "Join Space").await;

    let request = JoinRequestRepo::create(
        &pool,
        space.id,
        ALICE,
        "alice@example.com",
        Permission::Edit,
        "let me in",
        false,
    )
    .await
    .unwrap()
    .expect("first request inserts");
    assert_eq!(request.status, "pending");

    // Pending uniqueness.
    let dup = JoinRequestRepo::create(
        &pool,
        space.id,
        ALICE,
        "alice@example.com",
        Permission::View,
        "",
        false,
    )
    .await
    .unwrap();
    assert!(dup.is_none());

    let (approved, collaborator) =
        JoinRequestRepo::approve(&pool, request.id, OWNER, None)
            .await
            .unwrap()
            .expect("pending request approves");
    assert_eq!(approved.status, "approved");
    assert_eq!(collaborator.unwrap().permission, "edit");

    // Approving again is a no-op.
    assert!(
        JoinRequestRepo::approve(&pool, request.id, OWNER, None)
            .await
            .unwrap()
            .is_none()
    );

    let space = SpaceRepo::get(&pool, space.id).await.unwrap().unwrap();
    assert_eq!(space.total_collaborators, 2);
    assert_eq!(space.pending_join_requests, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn rejected_requester_may_request_again(pool: PgPool) {
    let space = make_space(&pool, "Rejoin Space").await;

    let first = JoinRequestRepo::create(
        &pool,
        space.id,
        ALICE,
        "alice@example.com",
        Permission::View,
        "",
        false,
    )
    .await
    .unwrap()
    .unwrap();
    JoinRequestRepo::reject(&pool, first.id, OWNER, Some("not yet"))
        .await
        .unwrap()
        .unwrap();

    // The terminal row is purged and a fresh pending row inserted.
    let second = JoinRequestRepo::create(
        &pool,
        space.id,
        ALICE,
        "alice@example.com",
        Permission::View,
        "",
        false,
    )
    .await
    .unwrap();
    assert!(second.is_some());
    assert!(JoinRequestRepo::get(&pool, first.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn auto_approval_inserts_collaborator_immediately(pool: PgPool) {
    let space = make_space(&pool, "Auto Space").await;

    let request = JoinRequestRepo::create(
        &pool,
        space.id,
        ALICE,
        "alice@example.com",
        Permission::View,
        "",
        true,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(request.status, "approved");
    assert!(request.auto_approved);

    let member = CollaboratorRepo::get_active(&pool, space.id, ALICE)
        .await
        .unwrap();
    assert!(member.is_some());

    let space = SpaceRepo::get(&pool, space.id).await.unwrap().unwrap();
    assert_eq!(space.total_collaborators, 2);
}
