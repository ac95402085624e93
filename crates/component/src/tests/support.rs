//! Test doubles shared by the unit tests.

use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::listener::{Action, ActionContext};

pub(crate) type Log = Arc<Mutex<Vec<String>>>;

pub(crate) fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// Appends `<name>:<event>` and passes its arguments through.
pub(crate) struct Record {
    pub(crate) name: &'static str,
    pub(crate) log: Log,
}

pub(crate) fn record(name: &'static str, log: &Log) -> Arc<dyn Action> {
    Arc::new(Record {
        name,
        log: Arc::clone(log),
    })
}

#[async_trait]
impl Action for Record {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, ctx: ActionContext) -> anyhow::Result<Value> {
        self.log.lock().push(format!("{}:{}", self.name, ctx.event));
        Ok(ctx.arguments)
    }
}

pub(crate) struct AddOne;

#[async_trait]
impl Action for AddOne {
    fn name(&self) -> &str {
        "add_one"
    }

    async fn run(&self, ctx: ActionContext) -> anyhow::Result<Value> {
        Ok(json!(ctx.arguments.as_i64().unwrap_or(0) + 1))
    }
}

/// Keeps `(event, if_data, arguments)` of every call.
#[derive(Default)]
pub(crate) struct Capture {
    pub(crate) seen: Mutex<Vec<(String, Value, Value)>>,
}

#[async_trait]
impl Action for Capture {
    fn name(&self) -> &str {
        "capture"
    }

    async fn run(&self, ctx: ActionContext) -> anyhow::Result<Value> {
        self.seen
            .lock()
            .push((ctx.event.clone(), ctx.if_data.clone(), ctx.arguments.clone()));
        Ok(ctx.arguments)
    }
}

pub(crate) struct Fail;

#[async_trait]
impl Action for Fail {
    fn name(&self) -> &str {
        "fail"
    }

    async fn run(&self, _ctx: ActionContext) -> anyhow::Result<Value> {
        Err(anyhow!("validation failed"))
    }
}

/// Logs `<name>:start`, sleeps, then logs `<name>:end`.
pub(crate) struct Slow {
    pub(crate) name: &'static str,
    pub(crate) delay: Duration,
    pub(crate) log: Log,
}

pub(crate) fn slow(name: &'static str, millis: u64, log: &Log) -> Arc<dyn Action> {
    Arc::new(Slow {
        name,
        delay: Duration::from_millis(millis),
        log: Arc::clone(log),
    })
}

#[async_trait]
impl Action for Slow {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, ctx: ActionContext) -> anyhow::Result<Value> {
        self.log.lock().push(format!("{}:start", self.name));
        tokio::time::sleep(self.delay).await;
        self.log.lock().push(format!("{}:end", self.name));
        Ok(ctx.arguments)
    }
}
