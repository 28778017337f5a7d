//! Tool registry: name → callable plus declaration.

use crate::types::{FunctionDefinition, ToolDefinition};
use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

pub type ToolFuture = BoxFuture<'static, anyhow::Result<Value>>;
type Handler = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// A registered callable with its declaration and compiled argument schema.
pub struct RegisteredTool {
    definition: ToolDefinition,
    handler: Handler,
    schema: Option<JSONSchema>,
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Validate `arguments` against the declared schema, then call the handler.
    pub fn invoke(&self, arguments: Value) -> ToolFuture {
        if let Some(schema) = &self.schema {
            if let Err(errors) = schema.validate(&arguments) {
                let details: Vec<String> = errors.map(|e| e.to_string()).collect();
                let message = format!("invalid arguments: {}", details.join("; "));
                return async move { Err(anyhow::anyhow!(message)) }.boxed();
            }
        }
        (self.handler)(arguments)
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.name())
            .field("validated", &self.schema.is_some())
            .finish()
    }
}

/// Registered tools, in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<RegisteredTool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async callable under `name` with a JSON Schema for its arguments.
    pub fn register<F, Fut>(
        &mut self,
        name: &str,
        description: &str,
        parameters: Value,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let definition = ToolDefinition::function(name, description, parameters);
        self.register_definition(definition, move |args| handler(args).boxed())
    }

    /// Register a synchronous callable.
    pub fn register_fn<F>(
        &mut self,
        name: &str,
        description: &str,
        parameters: Value,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register(name, description, parameters, move |args| {
            let handler = handler.clone();
            async move { handler(args) }
        })
    }

    /// Register a pre-built declaration. Only function tools can be registered.
    pub fn register_definition<F>(&mut self, definition: ToolDefinition, handler: F) -> Result<()>
    where
        F: Fn(Value) -> ToolFuture + Send + Sync + 'static,
    {
        let Some(FunctionDefinition { name, parameters, .. }) = definition.function.as_ref() else {
            return Err(Error::Tool {
                tool: definition.tool_type.clone(),
                message: "only function tools can be registered".into(),
            });
        };
        if name.trim().is_empty() {
            return Err(Error::Tool {
                tool: name.clone(),
                message: "tool name must not be empty".into(),
            });
        }
        if self.tools.contains_key(name) {
            return Err(Error::Tool {
                tool: name.clone(),
                message: "tool already registered".into(),
            });
        }
        let schema = match parameters {
            Some(p) => Some(
                JSONSchema::options()
                    .with_draft(Draft::Draft7)
                    .compile(p)
                    .map_err(|e| Error::Tool {
                        tool: name.clone(),
                        message: format!("invalid parameter schema: {}", e),
                    })?,
            ),
            None => None,
        };

        let name = name.clone();
        debug!(tool = name.as_str(), "registered tool");
        self.order.push(name.clone());
        self.tools.insert(
            name,
            Arc::new(RegisteredTool {
                definition,
                handler: Arc::new(handler),
                schema,
            }),
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations of every registered tool, in registration order.
    pub fn declarations(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.definition.clone())
            .collect()
    }
}
