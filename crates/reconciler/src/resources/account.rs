//! Account reconciler.
//!
//! Accounts are addressed remotely by `acc_<name>`. Roles live in the
//! account-details listing and the host group is stored as an id, so every
//! read joins three responses.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info};
use xsoar_client::{Route, account_key};
use xsoar_core::ObjectKind;

use super::{get, guarded_delete, list, present, refuse_replacement};
use crate::error::{Error, Result, ShapeError};
use crate::normalize::{Canonical, Empty, RawObject, account_roles, find, group_id_for_name, group_name_for_id};
use crate::plan::{AccountStep, Plan};
use crate::provider::{Provider, ProviderContext};
use crate::reconciler::Reconcile;
use crate::types::{Account, AccountRecord, AccountSpec, DEFAULT_ACCOUNT_ROLE, StringSet, explicit};

const KIND: ObjectKind = ObjectKind::Account;

/// Reconciles tenant accounts.
#[derive(Debug, Clone)]
pub struct AccountReconciler {
    provider: Provider,
}

impl AccountReconciler {
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

/// Body of the create call.
fn create_request(desired: &AccountSpec, host_group_id: &str) -> Value {
    let roles = explicit(desired.account_roles.as_ref()).cloned().unwrap_or_else(|| {
        std::iter::once(DEFAULT_ACCOUNT_ROLE.to_string()).collect::<StringSet>()
    });
    let mut request = Map::new();
    request.insert("name".to_string(), json!(desired.name));
    request.insert("hostGroupId".to_string(), json!(host_group_id));
    request.insert("accountRoles".to_string(), json!(roles));
    if let Some(labels) = explicit(desired.propagation_labels.as_ref()) {
        request.insert("propagationLabels".to_string(), json!(labels));
    }
    request.insert("syncOnCreation".to_string(), Value::Bool(true));
    Value::Object(request)
}

/// Resolve an HA group name to its id; a missing group is an error.
async fn resolve_group(ctx: &ProviderContext, name: &str) -> Result<String> {
    let groups = list(ctx, &Route::new(ObjectKind::HaGroup), "list HA groups").await?;
    group_id_for_name(&groups, name)?
        .ok_or_else(|| Error::unresolved_reference(ObjectKind::HaGroup, name))
}

/// Join an account record with its roles and host group name.
fn assemble(record: AccountRecord, details: &Value, groups: &Value) -> Result<Account> {
    let account_roles = account_roles(details, &record.name)?;
    let host_group_name = group_name_for_id(groups, &record.host_group_id)?;
    if host_group_name.is_none() {
        debug!(host_group_id = %record.host_group_id, "Account host group not found in listing");
    }
    Ok(Account {
        id: record.id,
        name: record.display_name,
        host_group_id: record.host_group_id,
        host_group_name,
        account_roles,
        propagation_labels: record.propagation_labels,
    })
}

async fn list_details(ctx: &ProviderContext) -> Result<Value> {
    ctx.remote
        .list_account_details()
        .await
        .map(xsoar_client::RawResponse::into_body)
        .map_err(|err| Error::remote("list account details", err))
}

/// Read an account by its user-facing name.
async fn fetch(ctx: &ProviderContext, name: &str) -> Result<Account> {
    let route = Route::new(KIND);
    let key = account_key(name);
    let body = get(ctx, &route, &key, "read account").await?;
    let record = AccountRecord::from_raw(&body)?;
    let group_route = Route::new(ObjectKind::HaGroup);
    let (details, groups) = futures::try_join!(
        list_details(ctx),
        list(ctx, &group_route, "list HA groups"),
    )?;
    assemble(record, &details, &groups)
}

/// The created account within a create response, when it is there.
fn created_record(body: &Value, name: &str) -> Result<Option<AccountRecord>> {
    let matches = |raw: &RawObject<'_>| -> std::result::Result<bool, ShapeError> {
        Ok(raw.optional_str("displayName", Empty::Keep)? == Some(name))
    };
    let found = if body.is_object() && !body.get("accounts").is_some_and(Value::is_array) {
        let raw = RawObject::new(KIND, body)?;
        matches(&raw)?.then_some(body)
    } else {
        find(KIND, body, "accounts", matches)?
    };
    Ok(found.map(AccountRecord::from_raw).transpose()?)
}

#[async_trait]
impl Reconcile for AccountReconciler {
    type Spec = AccountSpec;
    type State = Account;

    fn kind(&self) -> ObjectKind {
        KIND
    }

    async fn create(&self, desired: &AccountSpec) -> Result<Account> {
        let ctx = self.provider.context()?;
        let route = Route::new(KIND);
        let groups = list(ctx, &Route::new(ObjectKind::HaGroup), "list HA groups").await?;
        let host_group_id = group_id_for_name(&groups, &desired.host_group_name)?.ok_or_else(
            || Error::unresolved_reference(ObjectKind::HaGroup, &desired.host_group_name),
        )?;

        let request = create_request(desired, &host_group_id);
        let (remote, route_ref, request_ref) = (ctx.remote.as_ref(), &route, &request);
        let response = ctx
            .retry
            .run("create account", move || async move {
                remote.create(route_ref, request_ref).await
            })
            .await?;
        info!(name = %desired.name, host_group_id, "Account created");

        let record = match created_record(&response.body, &desired.name)? {
            Some(record) => record,
            None => {
                let key = account_key(&desired.name);
                AccountRecord::from_raw(&get(ctx, &route, &key, "read created account").await?)?
            }
        };
        let details = list_details(ctx).await?;
        assemble(record, &details, &groups)
    }

    async fn read(&self, last: &Account) -> Result<Account> {
        let ctx = self.provider.context()?;
        fetch(ctx, &last.name).await
    }

    async fn update(&self, desired: &AccountSpec, last: &Account) -> Result<Account> {
        let ctx = self.provider.context()?;
        let route = Route::new(KIND);
        let plan = Account::plan(desired, last);
        refuse_replacement(KIND, &last.name, plan.replace)?;

        for step in plan.steps {
            match step {
                AccountStep::RolesAndLabels { roles, labels } => {
                    let request = json!({
                        "selectedRoles": roles,
                        "selectedPropagationLabels": labels,
                    });
                    debug!(name = %last.name, "Updating roles and propagation labels");
                    ctx.remote
                        .update(&route, &last.name, &request)
                        .await
                        .map_err(|err| Error::remote("update account roles", err))?;
                }
                AccountStep::MigrateHost { host_group_name } => {
                    let host_group_id = resolve_group(ctx, &host_group_name).await?;
                    if host_group_id == last.host_group_id {
                        debug!(name = %last.name, host_group_id, "Account already in host group");
                        continue;
                    }
                    debug!(name = %last.name, host_group_id, "Migrating account host");
                    ctx.remote
                        .migrate_account_host(&account_key(&last.name), &host_group_id)
                        .await
                        .map_err(|err| Error::remote("migrate account host", err))?;
                }
            }
        }
        fetch(ctx, &last.name).await
    }

    async fn delete(&self, last: &Account) -> Result<()> {
        let ctx = self.provider.context()?;
        let key = account_key(&last.name);
        guarded_delete(ctx, &Route::new(KIND), &key, &key, &present, "delete account").await
    }

    async fn import(&self, id: &str) -> Result<Account> {
        let ctx = self.provider.context()?;
        fetch(ctx, id).await
    }
}
