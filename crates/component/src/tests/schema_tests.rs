use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;

use super::*;
use crate::{identity::KeyGenerator, property::Props};

/// Materializes each fragment as a component named after its `component` key.
struct NamingCompiler {
    keys: KeyGenerator,
}

#[async_trait]
impl Compiler for NamingCompiler {
    async fn new_component(&self, fragment: &Value) -> anyhow::Result<Component> {
        let name = fragment["component"].as_str().unwrap_or("unknown").to_string();
        Ok(Component::builder(&self.keys)
            .kind(ComponentType::new(name.clone()))
            .name(name)
            .build()
            .await?)
    }
}

struct RejectingCompiler;

#[async_trait]
impl Compiler for RejectingCompiler {
    async fn new_component(&self, _fragment: &Value) -> anyhow::Result<Component> {
        Err(anyhow!("unknown component type"))
    }
}

#[derive(Default)]
struct RecordingForm {
    merged: Mutex<Vec<String>>,
}

impl Form for RecordingForm {
    fn copy_fields(&self, other: &Component) -> anyhow::Result<()> {
        self.merged
            .lock()
            .push(other.name().unwrap_or_default());
        Ok(())
    }
}

#[test]
fn derived_types_extend_base_fragments() {
    let field = ComponentType::base()
        .derive("Field")
        .with_fragment(json!({"component": "Form", "fields": [{"name": "required"}]}))
        .with_property("value");
    let text = field
        .derive("TextField")
        .with_fragment(json!({"component": "Form", "fields": [{"name": "multiline"}]}))
        .with_property("value");

    assert_eq!(text.name(), "TextField");
    assert_eq!(text.fragments().len(), 3);
    assert_eq!(text.fragments()[0], base_fragment());
    assert_eq!(text.fragments()[2]["fields"][0]["name"], json!("multiline"));
    assert_eq!(text.properties(), ["value".to_string()]);
    assert_eq!(field.fragments().len(), 2);
}

#[tokio::test]
async fn bare_type_accumulates_only_what_is_set() {
    let component = Component::builder(&KeyGenerator::new())
        .kind(ComponentType::new("Bare"))
        .build()
        .await
        .expect("build");

    component.append_schema(json!({"a": 1})).await.expect("A");
    component.append_schema(json!({"b": 2})).await.expect("B");

    assert_eq!(component.get_one("schema"), Some(json!([{"a": 1}, {"b": 2}])));
}

#[tokio::test]
async fn builder_stacks_type_fragments_before_constructor_schema() {
    let kind = ComponentType::base()
        .derive("Field")
        .with_fragment(json!({"component": "Field"}));
    let component = Component::builder(&KeyGenerator::new())
        .kind(kind)
        .props(Props::new().with("schema", json!({"component": "TextField"})))
        .build()
        .await
        .expect("build");

    assert_eq!(
        component.schema(),
        vec![
            base_fragment(),
            json!({"component": "Field"}),
            json!({"component": "TextField"}),
        ]
    );
}

#[tokio::test]
async fn schema_form_merges_every_fragment_in_order() {
    let keys = KeyGenerator::new();
    let component = Component::new(
        &keys,
        Props::new().with("schema", json!({"component": "TextField"})),
    )
    .await
    .expect("build");
    let form = RecordingForm::default();

    let consumed = component
        .build_schema_form(&form, &NamingCompiler { keys: keys.clone() })
        .await
        .expect("build form");

    assert_eq!(consumed, 2);
    assert_eq!(*form.merged.lock(), vec!["Form", "TextField"]);
}

#[tokio::test]
async fn compiler_failure_surfaces_as_collaborator_error() {
    let component = Component::new(&KeyGenerator::new(), Props::new())
        .await
        .expect("build");
    let form = Arc::new(RecordingForm::default());

    let err = component
        .build_schema_form(form.as_ref(), &RejectingCompiler)
        .await
        .expect_err("compiler rejects");

    assert!(matches!(err, ComponentError::Collaborator(_)));
    assert!(form.merged.lock().is_empty());
}
