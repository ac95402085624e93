use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use component::{
    load_settings, load_settings_from, Action, ActionContext, Compiler, Component, ComponentType,
    Event, Form, KeyGenerator, Listener, Props, Settings,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use shared::protocol::ControlMessage;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "component-tools", about = "Build and inspect components from JSON descriptions")]
struct Cli {
    /// Settings file; defaults to ./component.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the component, fire `load` and print every emission as JSON lines.
    Inspect {
        description: PathBuf,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        load: bool,
    },
    /// Materialize the accumulated schema into a form and list its fields.
    Form { description: PathBuf },
}

#[derive(Debug, Deserialize)]
struct Description {
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default)]
    properties: Vec<String>,
    #[serde(default)]
    fragments: Vec<Value>,
    #[serde(default)]
    props: serde_json::Map<String, Value>,
    #[serde(default)]
    listeners: Vec<ListenerDescription>,
}

#[derive(Debug, Deserialize)]
struct ListenerDescription {
    event: String,
    actions: Vec<String>,
}

fn default_kind() -> String {
    ComponentType::BASE.to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Inspect { description, load } => inspect(&description, settings, load).await,
        Command::Form { description } => form(&description, settings).await,
    }
}

async fn inspect(path: &Path, settings: Settings, load: bool) -> Result<()> {
    let keys = KeyGenerator::new();
    let component = build(&keys, path, settings).await?;
    print(&ControlMessage::Snapshot(component.snapshot()))?;

    if load {
        let mut events = component.subscribe_events();
        let outcome = component.emit_load().await;
        for event in drain(&mut events) {
            print(&ControlMessage::Event(event.envelope(component.key())))?;
        }
        if let Err(err) = outcome {
            print(&ControlMessage::Error(err.into()))?;
        }
    }

    print(&ControlMessage::Snapshot(component.snapshot()))
}

async fn form(path: &Path, settings: Settings) -> Result<()> {
    let keys = KeyGenerator::new();
    let component = build(&keys, path, settings.clone()).await?;
    let compiler = FragmentCompiler { keys, settings };
    let sink = FieldSink::default();

    let consumed = component.build_schema_form(&sink, &compiler).await?;
    info!(fragments = consumed, "schema form built");
    println!("{}", serde_json::to_string_pretty(&sink.fields())?);
    Ok(())
}

async fn build(keys: &KeyGenerator, path: &Path, settings: Settings) -> Result<Component> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read component description '{}'", path.display()))?;
    let description: Description = serde_json::from_str(&raw)
        .with_context(|| format!("invalid component description '{}'", path.display()))?;

    let mut kind = ComponentType::base().derive(description.kind);
    for property in description.properties {
        kind = kind.with_property(property);
    }
    for fragment in description.fragments {
        kind = kind.with_fragment(fragment);
    }

    let registry = builtin_actions();
    let listeners = description
        .listeners
        .into_iter()
        .map(|declared| -> Result<Listener> {
            let actions = declared
                .actions
                .iter()
                .map(|name| {
                    registry
                        .get(name.as_str())
                        .cloned()
                        .ok_or_else(|| anyhow!("unknown action '{name}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Listener::new(declared.event, actions))
        })
        .collect::<Result<Vec<_>>>()?;

    let props = Props::try_from(description.props)?.listeners(listeners);
    Ok(Component::builder(keys)
        .kind(kind)
        .settings(settings)
        .props(props)
        .build()
        .await?)
}

/// Everything still buffered on the tap. A lagged tap reports how many
/// emissions were overwritten and keeps reading from the oldest one left.
fn drain(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut drained = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => drained.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "event tap lagged; raise event_buffer to keep every emission");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return drained,
        }
    }
}

fn print(message: &ControlMessage) -> Result<()> {
    println!("{}", serde_json::to_string(message)?);
    Ok(())
}

fn builtin_actions() -> HashMap<String, Arc<dyn Action>> {
    let actions: [Arc<dyn Action>; 3] = [Arc::new(Log), Arc::new(Count), Arc::new(Stamp)];
    actions
        .into_iter()
        .map(|action| (action.name().to_string(), action))
        .collect()
}

/// Logs the firing and passes its arguments through.
struct Log;

#[async_trait]
impl Action for Log {
    fn name(&self) -> &str {
        "log"
    }

    async fn run(&self, ctx: ActionContext) -> Result<Value> {
        info!(
            key = ?ctx.component.key(),
            event = %ctx.event,
            arguments = %ctx.arguments,
            if_data = %ctx.if_data,
            "action fired"
        );
        Ok(ctx.arguments)
    }
}

/// Replaces array arguments with their length.
struct Count;

#[async_trait]
impl Action for Count {
    fn name(&self) -> &str {
        "count"
    }

    async fn run(&self, ctx: ActionContext) -> Result<Value> {
        let count = match &ctx.arguments {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            Value::Null => 0,
            _ => 1,
        };
        Ok(Value::from(count))
    }
}

/// Copies the arguments into the component's `passed` property.
struct Stamp;

#[async_trait]
impl Action for Stamp {
    fn name(&self) -> &str {
        "stamp"
    }

    async fn run(&self, ctx: ActionContext) -> Result<Value> {
        ctx.component.set_passed(ctx.arguments.clone()).await?;
        Ok(ctx.arguments)
    }
}

struct FragmentCompiler {
    keys: KeyGenerator,
    settings: Settings,
}

#[async_trait]
impl Compiler for FragmentCompiler {
    async fn new_component(&self, fragment: &Value) -> Result<Component> {
        let kind = fragment
            .get("component")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("schema fragment without a 'component' type: {fragment}"))?;
        let fields = fragment.get("fields").cloned().unwrap_or(Value::Array(Vec::new()));
        Ok(Component::builder(&self.keys)
            .kind(ComponentType::new(kind).with_property("fields"))
            .settings(self.settings.clone())
            .props(Props::new().with("fields", fields))
            .build()
            .await?)
    }
}

/// Collects the `fields` of every materialized fragment, in order.
#[derive(Default)]
struct FieldSink {
    fields: Mutex<Vec<Value>>,
}

impl FieldSink {
    fn fields(&self) -> Vec<Value> {
        self.fields.lock().clone()
    }
}

impl Form for FieldSink {
    fn copy_fields(&self, other: &Component) -> Result<()> {
        match other.value("fields") {
            Some(Value::Array(fields)) => {
                self.fields.lock().extend(fields);
                Ok(())
            }
            Some(Value::Null) | None => Ok(()),
            Some(other) => Err(anyhow!("expected a field list, got {other}")),
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
