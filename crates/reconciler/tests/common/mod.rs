//! In-memory remote for scenario tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use xsoar_client::{ApiError, ApiResult, RawResponse, RemoteApi, Route};
use xsoar_core::ObjectKind;
use xsoar_reconciler::{Provider, RetryController, RetryPolicy};

/// Which facade method was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Get,
    Create,
    Update,
    Delete,
    Details,
    Migrate,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: Op,
    pub kind: ObjectKind,
    pub account: Option<String>,
    pub key: Option<String>,
    pub body: Option<Value>,
}

type Script = HashMap<(Op, ObjectKind), VecDeque<ApiResult<Value>>>;

/// Scripted remote. Responses queue per (op, kind); the last queued
/// response repeats. Unscripted calls answer 404.
#[derive(Default)]
pub struct FakeRemote {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn respond(&self, op: Op, kind: ObjectKind, body: Value) {
        self.script_result(op, kind, Ok(body)).await;
    }

    pub async fn fail(&self, op: Op, kind: ObjectKind, status: u16, body: &str) {
        self.script_result(op, kind, Err(ApiError::status(status, body)))
            .await;
    }

    pub async fn script_result(&self, op: Op, kind: ObjectKind, result: ApiResult<Value>) {
        self.script
            .lock()
            .await
            .entry((op, kind))
            .or_default()
            .push_back(result);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_of(&self, op: Op) -> Vec<Call> {
        self.calls()
            .await
            .into_iter()
            .filter(|call| call.op == op)
            .collect()
    }

    async fn answer(
        &self,
        op: Op,
        route: &Route,
        key: Option<&str>,
        body: Option<&Value>,
    ) -> ApiResult<RawResponse> {
        self.calls.lock().await.push(Call {
            op,
            kind: route.kind(),
            account: route.account().map(str::to_string),
            key: key.map(str::to_string),
            body: body.cloned(),
        });

        let mut script = self.script.lock().await;
        let queue = script.entry((op, route.kind())).or_default();
        let result = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        result
            .unwrap_or_else(|| Err(ApiError::status(404, "not scripted")))
            .map(RawResponse::ok)
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn list(&self, route: &Route) -> ApiResult<RawResponse> {
        self.answer(Op::List, route, None, None).await
    }

    async fn get(&self, route: &Route, key: &str) -> ApiResult<RawResponse> {
        self.answer(Op::Get, route, Some(key), None).await
    }

    async fn create(&self, route: &Route, request: &Value) -> ApiResult<RawResponse> {
        self.answer(Op::Create, route, None, Some(request)).await
    }

    async fn update(&self, route: &Route, key: &str, request: &Value) -> ApiResult<RawResponse> {
        self.answer(Op::Update, route, Some(key), Some(request)).await
    }

    async fn delete(&self, route: &Route, key: &str) -> ApiResult<RawResponse> {
        self.answer(Op::Delete, route, Some(key), None).await
    }

    async fn list_account_details(&self) -> ApiResult<RawResponse> {
        self.answer(Op::Details, &Route::new(ObjectKind::Account), None, None)
            .await
    }

    async fn migrate_account_host(
        &self,
        account_key: &str,
        host_group_id: &str,
    ) -> ApiResult<RawResponse> {
        let key = format!("{account_key}/{host_group_id}");
        self.answer(Op::Migrate, &Route::new(ObjectKind::Account), Some(&key), None)
            .await
    }
}

/// A configured provider over the fake, with the default retry policy.
pub fn provider(remote: &Arc<FakeRemote>) -> Provider {
    let remote: Arc<dyn RemoteApi> = remote.clone();
    Provider::with_remote(
        remote,
        RetryController::new(RetryPolicy::new(
            Duration::from_secs(300),
            Duration::from_secs(30),
        )),
    )
}

/// Install a test subscriber once; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
