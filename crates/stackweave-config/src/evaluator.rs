//! Recursive macro evaluation over document trees.
//!
//! A map whose only key is a `TVLK::` macro is replaced by the result of its
//! operator. Operators receive their argument unevaluated and decide what to
//! resolve and in which order, so `If` only evaluates the selected branch while
//! `And`/`Or` always evaluate every operand.

use async_recursion::async_recursion;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use stackweave_core::poll::retry;
use stackweave_core::{BuildTool, InstanceInspector, RetryPolicy, StackProvisioner};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::document::{self, document_name};
use crate::error::kind_of;
use crate::operator::{Operator, find_macro};
use crate::{EvaluationError, EvaluationResult};

/// External capabilities the side-effecting operators call.
#[derive(Clone)]
pub struct Services {
    pub provisioner: Arc<dyn StackProvisioner>,
    pub instances: Arc<dyn InstanceInspector>,
    pub build_tool: Arc<dyn BuildTool>,
}

/// Expands macros against a read-only configuration.
#[derive(Clone)]
pub struct MacroEvaluator {
    services: Services,
    config: Arc<Value>,
    retry: RetryPolicy,
}

impl MacroEvaluator {
    /// Create an evaluator with an empty configuration and a single-attempt retry policy.
    pub fn new(services: Services) -> Self {
        Self {
            services,
            config: Arc::new(Value::Object(Map::new())),
            retry: RetryPolicy::default(),
        }
    }

    /// Retry policy for resource and instance lookups.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A copy of this evaluator reading `GetConfig` lookups from `config`.
    pub fn with_config(&self, config: Arc<Value>) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Load a document and resolve it relative to its own directory.
    pub async fn resolve_file(&self, path: &Path) -> EvaluationResult<Value> {
        let resolved = async {
            let tree = document::load(path).await?;
            self.resolve(&document::base_dir(path), &tree).await
        }
        .await;
        resolved.map_err(|e| e.in_file(path))
    }

    /// Resolve every macro in `node`.
    #[async_recursion]
    pub async fn resolve(&self, cwd: &Path, node: &Value) -> EvaluationResult<Value> {
        match node {
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(self.resolve(cwd, item).await?);
                }
                Ok(Value::Array(resolved))
            }
            Value::Object(map) => {
                if let Some((operator, argument)) = find_macro(map)? {
                    return self
                        .apply(operator, cwd, argument)
                        .await
                        .map_err(|e| e.in_operator(operator.name()));
                }

                let mut resolved = Map::with_capacity(map.len());
                for (key, value) in map {
                    resolved.insert(key.clone(), self.resolve(cwd, value).await?);
                }
                Ok(Value::Object(resolved))
            }
            scalar => Ok(scalar.clone()),
        }
    }

    async fn apply(
        &self,
        operator: Operator,
        cwd: &Path,
        argument: &Value,
    ) -> EvaluationResult<Value> {
        match operator {
            Operator::FromFile => self.resolve_file(&cwd.join(expect_str(argument)?)).await,
            Operator::FromFolder => self.from_folder(cwd, expect_str(argument)?).await,
            Operator::FileAsBase64 => file_as_base64(&cwd.join(expect_str(argument)?)).await,
            Operator::MakefileAsBase64 => {
                let [dir, target] = arguments::<2>(argument)?;
                self.build_as_base64(&cwd.join(expect_str(dir)?), expect_str(target)?)
                    .await
            }
            Operator::GetConfig => {
                let keys = match self.resolve(cwd, argument).await? {
                    Value::Array(keys) => keys,
                    key => vec![key],
                };
                lookup(&self.config, &keys).cloned()
            }
            Operator::Merge => {
                let mut merged = Map::new();
                for item in self.resolve_list(cwd, argument).await? {
                    let map = match item {
                        Value::Object(map) => map,
                        other => return Err(EvaluationError::type_mismatch("map", &other)),
                    };
                    for (key, value) in map {
                        if merged.contains_key(&key) {
                            return Err(EvaluationError::DuplicateKey(key));
                        }
                        merged.insert(key, value);
                    }
                }
                Ok(Value::Object(merged))
            }
            Operator::MergeList => {
                let mut joined = Vec::new();
                for item in self.resolve_list(cwd, argument).await? {
                    match item {
                        Value::Array(items) => joined.extend(items),
                        other => return Err(EvaluationError::type_mismatch("list", &other)),
                    }
                }
                Ok(Value::Array(joined))
            }
            Operator::Concat => {
                let mut joined = String::new();
                for item in self.resolve_list(cwd, argument).await? {
                    match item {
                        Value::String(s) => joined.push_str(&s),
                        Value::Number(n) => joined.push_str(&n.to_string()),
                        Value::Bool(b) => joined.push_str(&b.to_string()),
                        other => return Err(EvaluationError::type_mismatch("scalar", &other)),
                    }
                }
                Ok(Value::String(joined))
            }
            Operator::Select => {
                let [index, collection] = arguments::<2>(argument)?;
                let index = self.resolve(cwd, index).await?;
                match collection {
                    // Only the selected element of a literal list is evaluated.
                    Value::Array(items) => {
                        let item = select(items, &index)?;
                        self.resolve(cwd, item).await
                    }
                    other => match self.resolve(cwd, other).await? {
                        Value::Array(items) => select(&items, &index).cloned(),
                        Value::Object(map) => {
                            let key = expect_str(&index)?;
                            map.get(key)
                                .cloned()
                                .ok_or_else(|| EvaluationError::MissingElement(key.to_string()))
                        }
                        other => Err(EvaluationError::type_mismatch("list or map", &other)),
                    },
                }
            }
            Operator::If => {
                let [condition, when_true, when_false] = arguments::<3>(argument)?;
                let branch = if self.resolve_bool(cwd, condition).await? {
                    when_true
                } else {
                    when_false
                };
                self.resolve(cwd, branch).await
            }
            Operator::Equals => {
                let [left, right] = arguments::<2>(argument)?;
                let left = self.resolve(cwd, left).await?;
                let right = self.resolve(cwd, right).await?;
                Ok(Value::Bool(left == right))
            }
            Operator::Not => Ok(Value::Bool(!self.resolve_bool(cwd, argument).await?)),
            Operator::And | Operator::Or => {
                let operands = argument
                    .as_array()
                    .filter(|operands| !operands.is_empty())
                    .ok_or_else(|| EvaluationError::type_mismatch("non-empty list", argument))?;

                // Every operand is evaluated, even once the result is known.
                let mut values = Vec::with_capacity(operands.len());
                for operand in operands {
                    values.push(self.resolve_bool(cwd, operand).await?);
                }

                let result = if operator == Operator::And {
                    values.iter().all(|v| *v)
                } else {
                    values.iter().any(|v| *v)
                };
                Ok(Value::Bool(result))
            }
            Operator::StackResource => {
                let [stack, logical_id] = arguments::<2>(argument)?;
                let stack = self.resolve_string(cwd, stack).await?;
                let logical_id = self.resolve_string(cwd, logical_id).await?;
                self.stack_resource(&stack, &logical_id).await
            }
            Operator::PublicIp | Operator::PrivateIp => {
                let instance_id = self.resolve_string(cwd, argument).await?;
                self.instance_address(&instance_id, operator == Operator::PublicIp)
                    .await
            }
        }
    }

    async fn resolve_list(&self, cwd: &Path, argument: &Value) -> EvaluationResult<Vec<Value>> {
        match self.resolve(cwd, argument).await? {
            Value::Array(items) => Ok(items),
            other => Err(EvaluationError::type_mismatch("list", &other)),
        }
    }

    async fn resolve_bool(&self, cwd: &Path, node: &Value) -> EvaluationResult<bool> {
        match self.resolve(cwd, node).await? {
            Value::Bool(b) => Ok(b),
            other => Err(EvaluationError::type_mismatch("boolean", &other)),
        }
    }

    async fn resolve_string(&self, cwd: &Path, node: &Value) -> EvaluationResult<String> {
        match self.resolve(cwd, node).await? {
            Value::String(s) => Ok(s),
            other => Err(EvaluationError::type_mismatch("string", &other)),
        }
    }

    async fn from_folder(&self, cwd: &Path, folder: &str) -> EvaluationResult<Value> {
        let dir = cwd.join(folder);
        let listing = async {
            let mut file_names = Vec::new();
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                // Follows symlinks.
                if !tokio::fs::metadata(entry.path()).await?.is_file() {
                    continue;
                }
                if let Some(file_name) = entry.file_name().to_str() {
                    file_names.push(file_name.to_string());
                }
            }
            Ok::<_, std::io::Error>(file_names)
        }
        .await;
        let mut file_names = listing.map_err(|e| EvaluationError::from(e).in_file(&dir))?;
        file_names.sort();

        let mut documents = Map::new();
        for file_name in &file_names {
            let Some(name) = document_name(file_name) else {
                continue;
            };
            if documents.contains_key(name) {
                return Err(EvaluationError::NameCollision(name.to_string()));
            }
            let document = self.resolve_file(&dir.join(file_name)).await?;
            documents.insert(name.to_string(), document);
        }
        Ok(Value::Object(documents))
    }

    async fn build_as_base64(&self, dir: &Path, target: &str) -> EvaluationResult<Value> {
        info!(dir = %dir.display(), target, "Building target");
        let status = self.services.build_tool.build(dir, target).await?;
        if !status.success {
            return Err(EvaluationError::Build {
                dir: dir.to_path_buf(),
                target: target.to_string(),
            });
        }
        file_as_base64(&dir.join(target)).await
    }

    async fn stack_resource(&self, stack: &str, logical_id: &str) -> EvaluationResult<Value> {
        let provisioner = self.services.provisioner.as_ref();
        let subject = format!("resource '{logical_id}' in stack '{stack}'");

        retry(&self.retry, &subject, || async move {
            info!(stack, logical_id, "Getting stack resource");
            let resource = provisioner
                .describe_stack_resource(stack, logical_id)
                .await
                .map_err(|e| e.to_string())?;
            match resource.physical_id {
                Some(id) if resource.is_ready() => Ok(Value::String(id)),
                _ => Err(format!("status is {}", resource.status)),
            }
        })
        .await
        .map_err(|exhausted| EvaluationError::ResourceNotReady {
            subject,
            attempts: exhausted.attempts,
            reason: exhausted.last,
        })
    }

    async fn instance_address(&self, instance_id: &str, public: bool) -> EvaluationResult<Value> {
        let instances = self.services.instances.as_ref();
        let kind = if public { "public" } else { "private" };
        let subject = format!("{kind} ip of instance '{instance_id}'");

        retry(&self.retry, &subject, || async move {
            info!(instance_id, kind, "Getting instance ip");
            let addresses = instances
                .describe_instance(instance_id)
                .await
                .map_err(|e| e.to_string())?;
            let ip = if public {
                addresses.public_ip
            } else {
                addresses.private_ip
            };
            ip.map(Value::String)
                .ok_or_else(|| format!("instance has no {kind} ip"))
        })
        .await
        .map_err(|exhausted| EvaluationError::ResourceNotReady {
            subject,
            attempts: exhausted.attempts,
            reason: exhausted.last,
        })
    }
}

async fn file_as_base64(path: &Path) -> EvaluationResult<Value> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| EvaluationError::from(e).in_file(path))?;
    Ok(Value::String(STANDARD.encode(bytes)))
}

/// Split a fixed-size argument list.
fn arguments<const N: usize>(argument: &Value) -> EvaluationResult<&[Value; N]> {
    let expected = match N {
        2 => "list of 2 items",
        3 => "list of 3 items",
        _ => "list",
    };
    argument
        .as_array()
        .and_then(|items| <&[Value; N]>::try_from(items.as_slice()).ok())
        .ok_or_else(|| EvaluationError::type_mismatch(expected, argument))
}

fn expect_str(value: &Value) -> EvaluationResult<&str> {
    value
        .as_str()
        .ok_or_else(|| EvaluationError::type_mismatch("string", value))
}

fn select<'v>(items: &'v [Value], index: &Value) -> EvaluationResult<&'v Value> {
    let position = index
        .as_u64()
        .ok_or_else(|| EvaluationError::type_mismatch("non-negative integer", index))?;
    usize::try_from(position)
        .ok()
        .and_then(|position| items.get(position))
        .ok_or_else(|| EvaluationError::MissingElement(position.to_string()))
}

/// Walk `keys` through `config`: strings index maps, integers index lists.
fn lookup<'v>(config: &'v Value, keys: &[Value]) -> EvaluationResult<&'v Value> {
    let mut current = config;
    for (depth, key) in keys.iter().enumerate() {
        let next = match (current, key) {
            (Value::Object(map), Value::String(name)) => map.get(name),
            (Value::Object(map), Value::Number(n)) => map.get(&n.to_string()),
            (Value::Array(items), Value::Number(n)) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| EvaluationError::ConfigLookup(key_path(&keys[..=depth])))?;
    }
    Ok(current)
}

fn key_path(keys: &[Value]) -> String {
    keys.iter()
        .map(|key| match key {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => format!("<{}>", kind_of(other)),
        })
        .collect::<Vec<_>>()
        .join(".")
}
