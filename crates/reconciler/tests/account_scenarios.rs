//! Account lifecycle scenarios against an in-memory remote.

mod common;

use common::{FakeRemote, Op, init_tracing, provider};
use serde_json::json;
use xsoar_core::ObjectKind;
use xsoar_reconciler::{
    Account, AccountReconciler, AccountSpec, Error, Operation, Outcome, Provider, Reconcile,
    StringSet, drive,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn set(items: &[&str]) -> StringSet {
    items.iter().map(ToString::to_string).collect()
}

async fn script_groups(remote: &FakeRemote) {
    remote
        .respond(
            Op::List,
            ObjectKind::HaGroup,
            json!([
                {"id": "g-1", "name": "grp1", "elasticsearchAddress": "", "elasticIndexPrefix": ""},
                {"id": "g-2", "name": "grp2", "elasticsearchAddress": "", "elasticIndexPrefix": ""}
            ]),
        )
        .await;
}

fn last_known() -> Account {
    Account {
        id: "7".to_string(),
        name: "acme".to_string(),
        host_group_id: "g-1".to_string(),
        host_group_name: Some("grp1".to_string()),
        account_roles: set(&["Administrator", "Analyst"]),
        propagation_labels: set(&["all"]),
    }
}

#[tokio::test(start_paused = true)]
async fn test_create_defaults_roles_and_resolves_group() -> TestResult {
    init_tracing();
    let remote = FakeRemote::new();
    script_groups(&remote).await;
    remote
        .respond(
            Op::Create,
            ObjectKind::Account,
            json!([{"id": "7", "name": "acc_acme", "displayName": "acme", "hostGroupId": "g-1"}]),
        )
        .await;
    remote
        .respond(
            Op::Details,
            ObjectKind::Account,
            json!([{"name": "acc_acme", "roles": [{"name": "Administrator"}]}]),
        )
        .await;

    let accounts = AccountReconciler::new(provider(&remote));
    let account = accounts.create(&AccountSpec::new("acme", "grp1")).await?;

    assert_eq!(account.name, "acme");
    assert_eq!(account.account_roles, set(&["Administrator"]));
    assert!(account.propagation_labels.is_empty());
    assert_eq!(account.host_group_id, "g-1");
    assert_eq!(account.host_group_name.as_deref(), Some("grp1"));

    let creates = remote.calls_of(Op::Create).await;
    assert_eq!(creates.len(), 1);
    assert_eq!(
        creates.first().and_then(|call| call.body.clone()),
        Some(json!({
            "name": "acme",
            "hostGroupId": "g-1",
            "accountRoles": ["Administrator"],
            "syncOnCreation": true
        }))
    );

    // The group listing precedes the create call.
    let ops: Vec<Op> = remote.calls().await.into_iter().map(|call| call.op).collect();
    assert_eq!(ops.first(), Some(&Op::List));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_create_retries_until_visible() -> TestResult {
    let remote = FakeRemote::new();
    script_groups(&remote).await;
    remote.fail(Op::Create, ObjectKind::Account, 500, "host group not ready").await;
    remote.fail(Op::Create, ObjectKind::Account, 500, "host group not ready").await;
    remote
        .respond(
            Op::Create,
            ObjectKind::Account,
            json!([{"id": "7", "name": "acc_acme", "displayName": "acme", "hostGroupId": "g-1"}]),
        )
        .await;
    remote.respond(Op::Details, ObjectKind::Account, json!([])).await;

    let accounts = AccountReconciler::new(provider(&remote));
    let account = accounts.create(&AccountSpec::new("acme", "grp1")).await?;

    assert_eq!(account.id, "7");
    assert_eq!(remote.calls_of(Op::Create).await.len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_create_with_unknown_group_fails_without_creating() {
    let remote = FakeRemote::new();
    script_groups(&remote).await;

    let accounts = AccountReconciler::new(provider(&remote));
    let result = accounts.create(&AccountSpec::new("acme", "missing")).await;

    assert!(matches!(result, Err(Error::UnresolvedReference { .. })));
    assert!(remote.calls_of(Op::Create).await.is_empty());
}

#[tokio::test]
async fn test_create_requires_configured_provider() {
    let accounts = AccountReconciler::new(Provider::unconfigured());
    let result = accounts.create(&AccountSpec::new("acme", "grp1")).await;
    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[tokio::test]
async fn test_labels_only_update_echoes_roles() -> TestResult {
    let remote = FakeRemote::new();
    script_groups(&remote).await;
    remote.respond(Op::Update, ObjectKind::Account, json!(null)).await;
    remote
        .respond(
            Op::Get,
            ObjectKind::Account,
            json!({
                "id": "7",
                "name": "acc_acme",
                "displayName": "acme",
                "hostGroupId": "g-1",
                "propagationLabels": ["red"]
            }),
        )
        .await;
    remote
        .respond(
            Op::Details,
            ObjectKind::Account,
            json!([{"name": "acc_acme", "roles": [{"name": "Administrator"}, {"name": "Analyst"}]}]),
        )
        .await;

    let accounts = AccountReconciler::new(provider(&remote));
    let desired = AccountSpec::new("acme", "grp1").with_labels(["red"]);
    let account = accounts.update(&desired, &last_known()).await?;

    let updates = remote.calls_of(Op::Update).await;
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates.first().and_then(|call| call.body.clone()),
        Some(json!({
            "selectedRoles": ["Administrator", "Analyst"],
            "selectedPropagationLabels": ["red"]
        }))
    );
    assert!(remote.calls_of(Op::Migrate).await.is_empty());
    assert_eq!(account.propagation_labels, set(&["red"]));
    assert_eq!(account.account_roles, set(&["Administrator", "Analyst"]));
    Ok(())
}

#[tokio::test]
async fn test_host_migration_resolves_group_id() -> TestResult {
    let remote = FakeRemote::new();
    script_groups(&remote).await;
    remote.respond(Op::Migrate, ObjectKind::Account, json!(null)).await;
    remote
        .respond(
            Op::Get,
            ObjectKind::Account,
            json!({"id": "7", "name": "acc_acme", "displayName": "acme", "hostGroupId": "g-2"}),
        )
        .await;
    remote.respond(Op::Details, ObjectKind::Account, json!([])).await;

    let accounts = AccountReconciler::new(provider(&remote));
    let account = accounts
        .update(&AccountSpec::new("acme", "grp2"), &last_known())
        .await?;

    let migrations = remote.calls_of(Op::Migrate).await;
    assert_eq!(
        migrations.first().and_then(|call| call.key.clone()).as_deref(),
        Some("acc_acme/g-2")
    );
    assert!(remote.calls_of(Op::Update).await.is_empty());
    assert_eq!(account.host_group_name.as_deref(), Some("grp2"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_group_alias_does_not_migrate_to_same_group() -> TestResult {
    let remote = FakeRemote::new();
    script_groups(&remote).await;
    remote
        .respond(
            Op::Get,
            ObjectKind::Account,
            json!({"id": "7", "name": "acc_acme", "displayName": "acme", "hostGroupId": "g-1"}),
        )
        .await;
    remote.respond(Op::Details, ObjectKind::Account, json!([])).await;

    let mut last = last_known();
    last.host_group_name = None;
    let accounts = AccountReconciler::new(provider(&remote));
    let account = accounts.update(&AccountSpec::new("acme", "grp1"), &last).await?;

    assert!(remote.calls_of(Op::Migrate).await.is_empty());
    assert!(remote.calls_of(Op::Update).await.is_empty());
    assert_eq!(account.host_group_name.as_deref(), Some("grp1"));
    Ok(())
}

#[tokio::test]
async fn test_rename_requires_replacement() {
    let remote = FakeRemote::new();
    let accounts = AccountReconciler::new(provider(&remote));
    let result = accounts
        .update(&AccountSpec::new("acme-renamed", "grp1"), &last_known())
        .await;

    assert!(matches!(
        result,
        Err(Error::ReplacementRequired { ref fields, .. }) if fields == &vec!["name"]
    ));
    assert!(remote.calls().await.is_empty());
}

#[tokio::test]
async fn test_read_of_missing_account_removes_it() {
    let remote = FakeRemote::new();
    remote.fail(Op::Get, ObjectKind::Account, 404, "").await;

    let accounts = AccountReconciler::new(provider(&remote));
    let outcome = drive(&accounts, Operation::Read(last_known())).await;
    assert_eq!(outcome, Outcome::Removed);
}

#[tokio::test]
async fn test_read_transport_error_is_a_failure() {
    let remote = FakeRemote::new();
    remote.fail(Op::Get, ObjectKind::Account, 502, "bad gateway").await;

    let accounts = AccountReconciler::new(provider(&remote));
    let outcome = drive(&accounts, Operation::Read(last_known())).await;
    assert!(outcome.is_failed());
}

#[tokio::test]
async fn test_delete_of_absent_account_is_noop() -> TestResult {
    let remote = FakeRemote::new();
    remote.respond(Op::Get, ObjectKind::Account, json!(null)).await;

    let accounts = AccountReconciler::new(provider(&remote));
    accounts.delete(&last_known()).await?;
    assert!(remote.calls_of(Op::Delete).await.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_retries_then_removes() -> TestResult {
    let remote = FakeRemote::new();
    remote
        .respond(Op::Get, ObjectKind::Account, json!({"id": "7", "name": "acc_acme"}))
        .await;
    remote.fail(Op::Delete, ObjectKind::Account, 500, "busy").await;
    remote.respond(Op::Delete, ObjectKind::Account, json!(null)).await;

    let accounts = AccountReconciler::new(provider(&remote));
    let outcome = drive(&accounts, Operation::Delete(last_known())).await;

    assert_eq!(outcome, Outcome::Removed);
    let deletes = remote.calls_of(Op::Delete).await;
    assert_eq!(deletes.len(), 2);
    assert_eq!(
        deletes.first().and_then(|call| call.key.clone()).as_deref(),
        Some("acc_acme")
    );
    Ok(())
}

#[tokio::test]
async fn test_import_by_name() -> TestResult {
    let remote = FakeRemote::new();
    script_groups(&remote).await;
    remote
        .respond(
            Op::Get,
            ObjectKind::Account,
            json!({"id": "7", "name": "acc_acme", "displayName": "acme", "hostGroupId": "g-1", "propagationLabels": null}),
        )
        .await;
    remote
        .respond(
            Op::Details,
            ObjectKind::Account,
            json!([{"name": "acc_acme", "roles": [{"name": "Administrator"}]}]),
        )
        .await;

    let accounts = AccountReconciler::new(provider(&remote));
    let account = accounts.import("acme").await?;

    assert_eq!(account, Account {
        id: "7".to_string(),
        name: "acme".to_string(),
        host_group_id: "g-1".to_string(),
        host_group_name: Some("grp1".to_string()),
        account_roles: set(&["Administrator"]),
        propagation_labels: StringSet::new(),
    });
    assert_eq!(
        remote.calls_of(Op::Get).await.first().and_then(|call| call.key.clone()).as_deref(),
        Some("acc_acme")
    );
    Ok(())
}
