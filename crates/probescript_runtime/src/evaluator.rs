// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script evaluation.
//!
//! A run starts at an entry node and walks flow edges. Each flow node pulls
//! its value inputs on demand: connected inputs resolve the producer's output,
//! unconnected ones fall back to the node's inline config value and then to
//! the template's port default. Pure nodes (no flow ports) are evaluated when
//! read and cached for the current flow step only, so a loop condition sees
//! variables written by the loop body. Flow nodes bind their outputs when they
//! execute and keep them for the rest of the run, as do pure target nodes such
//! as `module_base`.
//!
//! Host nodes run in process. Target nodes are marshalled into an agent call
//! and awaited under the configured timeout, raced against cancellation.

use crate::agent::{AgentClient, ReplyStatus, TargetSession};
use crate::config::RuntimeConfig;
use crate::devices::{DeviceCatalog, StaticCatalog};
use crate::error::{RunError, RunResult};
use crate::host;
use crate::state::{ExecutionResult, Notification, RunState, RunStatus, VariableStore};
use crate::target::{self, Inputs, Outputs};
use crate::ui::{InMemoryUiState, UiError, UiState};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use probescript_graph::config::LogLevel;
use probescript_graph::value::parse_address;
use probescript_graph::{
    Dispatch, Node, NodeConfig, NodeId, NodeKind, PortId, Script, Value, ValueType, Variable, VariableId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Executes scripts against the host collaborators and the attached target
pub struct Engine {
    config: RuntimeConfig,
    variables: VariableStore,
    agent: Option<Arc<dyn AgentClient>>,
    ui: Arc<dyn UiState>,
    devices: Arc<dyn DeviceCatalog>,
    session: RwLock<Option<TargetSession>>,
    cancel: Mutex<CancellationToken>,
}

impl Engine {
    /// Create an engine with in-memory UI state, an empty device catalog and
    /// no agent
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            variables: VariableStore::new(),
            agent: None,
            ui: Arc::new(InMemoryUiState::new()),
            devices: Arc::new(StaticCatalog::new()),
            session: RwLock::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Use `agent` for target nodes
    pub fn with_agent(mut self, agent: Arc<dyn AgentClient>) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Use `ui` for UI nodes
    pub fn with_ui(mut self, ui: Arc<dyn UiState>) -> Self {
        self.ui = ui;
        self
    }

    /// Use `devices` for the device and process nodes
    pub fn with_devices(mut self, devices: Arc<dyn DeviceCatalog>) -> Self {
        self.devices = devices;
        self
    }

    /// Runtime limits
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The persistent variable store
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// UI state collaborator
    pub fn ui(&self) -> &Arc<dyn UiState> {
        &self.ui
    }

    /// Attach a target session
    pub fn set_session(&self, session_id: impl Into<String>, script_id: impl Into<String>) {
        let session = TargetSession {
            session_id: session_id.into(),
            script_id: script_id.into(),
        };
        info!(session = %session.session_id, script = %session.script_id, "target session attached");
        *self.session.write() = Some(session);
    }

    /// Detach the target session, cancelling the current run
    pub fn clear_session(&self) {
        if let Some(session) = self.session.write().take() {
            info!(session = %session.session_id, "target session detached");
        }
        self.stop();
    }

    /// Currently attached session
    pub fn session(&self) -> Option<TargetSession> {
        self.session.read().clone()
    }

    /// Forget every stored variable value
    pub fn reset_state(&self) {
        self.variables.clear();
        debug!("variable store reset");
    }

    /// Cancel the most recently started run
    pub fn stop(&self) {
        self.cancel.lock().cancel();
    }

    /// Run `script` from `entry`
    pub async fn run(
        &self,
        script: &Script,
        entry: &NodeId,
        value: Value,
        component: Option<&str>,
    ) -> ExecutionResult {
        self.run_with_cancel(script, entry, value, component, CancellationToken::new())
            .await
    }

    /// Run `script` from `entry`, stopping when `cancel` fires
    pub async fn run_with_cancel(
        &self,
        script: &Script,
        entry: &NodeId,
        value: Value,
        component: Option<&str>,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        *self.cancel.lock() = cancel.clone();
        info!(script = %script.name, entry = %entry, "run started");

        let mut run = Run {
            engine: self,
            script,
            state: RunState::new(),
            cancel,
        };
        let outcome = run.start(entry, value, component).await;
        let state = run.state;

        let (status, error) = match outcome {
            Ok(_) => {
                info!(script = %script.name, steps = state.steps, "run completed");
                (RunStatus::Completed, None)
            }
            Err(e) if e.is_cancelled() => {
                info!(script = %script.name, steps = state.steps, "run cancelled");
                (RunStatus::Cancelled, Some(e.to_string()))
            }
            Err(e) => {
                error!(script = %script.name, error = %e, "run failed");
                (RunStatus::Failed, Some(e.to_string()))
            }
        };

        ExecutionResult {
            status,
            variables: self.variables.snapshot(script),
            logs: state.logs,
            outputs: state.outputs,
            notifications: state.notifications,
            error,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

/// How a flow walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Ran out of flow edges
    Done,
    /// A run-wide bound stopped the walk
    Halted,
}

/// What to do after a flow node
enum Step {
    /// Follow this flow output
    Continue(PortId),
    /// A run-wide bound was hit inside the node
    Halted,
}

impl Step {
    fn next() -> Self {
        Self::Continue(PortId::from("exec_out"))
    }

    fn after_loop(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Self::Continue(PortId::from("completed")),
            Outcome::Halted => Self::Halted,
        }
    }
}

struct Run<'a> {
    engine: &'a Engine,
    script: &'a Script,
    state: RunState,
    cancel: CancellationToken,
}

impl<'a> Run<'a> {
    async fn start(&mut self, entry: &NodeId, value: Value, component: Option<&str>) -> RunResult<Outcome> {
        let node = self.node(entry)?;
        if !node.is_entry() {
            return Err(RunError::NotEntry {
                node: entry.clone(),
                kind: node.kind(),
            });
        }

        if let NodeConfig::EventUi(config) = node.config() {
            if let (Some(expected), Some(actual)) = (config.component_id.as_deref(), component) {
                if expected != actual {
                    debug!(node = %entry, expected, actual, "event for another component, nothing to do");
                    return Ok(Outcome::Done);
                }
            }
            let component = component.map_or(Value::Null, Value::from);
            self.state.bind(&node.id, "component", component);
        }
        self.state.bind(&node.id, "value", value);

        self.follow(node.id.clone(), PortId::from("exec_out")).await
    }

    fn node(&self, id: &NodeId) -> RunResult<&'a Node> {
        let script = self.script;
        script.node(id).ok_or_else(|| RunError::NodeNotFound(id.clone()))
    }

    fn variable(&self, id: &str) -> RunResult<&'a Variable> {
        let script = self.script;
        script
            .variable(&VariableId::from(id))
            .ok_or_else(|| RunError::UnknownVariable(id.to_string()))
    }

    fn checkpoint(&self) -> RunResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        Ok(())
    }

    fn flow_targets(&self, from: &NodeId, port: &PortId) -> Vec<NodeId> {
        self.script.outgoing(from, port).map(|c| c.to_node.clone()).collect()
    }

    fn bound_exceeded(&mut self, node: Option<&NodeId>, message: String) {
        warn!(node = ?node.map(NodeId::as_str), "{message}");
        self.state.log(LogLevel::Warn, message, node);
    }

    // ------------------------------------------------------------------
    // Flow
    // ------------------------------------------------------------------

    /// Execute everything reachable from a flow output, in connection order
    fn follow(&mut self, from: NodeId, port: PortId) -> BoxFuture<'_, RunResult<Outcome>> {
        Box::pin(async move {
            for target in self.flow_targets(&from, &port) {
                if self.run_chain(target).await? == Outcome::Halted {
                    return Ok(Outcome::Halted);
                }
            }
            Ok(Outcome::Done)
        })
    }

    async fn run_chain(&mut self, start: NodeId) -> RunResult<Outcome> {
        let mut current = start;
        loop {
            self.checkpoint()?;
            let max_steps = self.engine.config.max_flow_steps;
            if self.state.steps >= max_steps {
                self.bound_exceeded(None, format!("Run stopped after {max_steps} flow steps"));
                return Ok(Outcome::Halted);
            }
            self.state.next_step();

            let node = self.node(&current)?;
            debug!(node = %node.id, kind = %node.kind(), "executing");
            self.state.mark_executed(&node.id);
            let port = match self.execute(node).await? {
                Step::Continue(port) => port,
                Step::Halted => return Ok(Outcome::Halted),
            };

            let mut targets = self.flow_targets(&current, &port);
            if targets.len() != 1 {
                return self.follow(current, port).await;
            }
            current = targets.remove(0);
        }
    }

    async fn execute(&mut self, node: &'a Node) -> RunResult<Step> {
        match node.config() {
            NodeConfig::If(_) => {
                let condition = self.input(node, "condition").await?;
                let branch = if condition.is_truthy() { "true" } else { "false" };
                Ok(Step::Continue(PortId::from(branch)))
            }
            NodeConfig::Switch(config) => {
                let value = self.input(node, "value").await?;
                Ok(Step::Continue(host::switch_branch(&value, &config.cases)))
            }
            NodeConfig::Loop(config) => {
                let max = self.max_iterations(config.max_iterations);
                self.enter_loop()?;
                let outcome = self.iterate_while(node, max).await;
                self.state.loop_depth -= 1;
                Ok(Step::after_loop(outcome?))
            }
            NodeConfig::ForEach(config) => {
                let max = self.max_iterations(config.max_iterations);
                self.enter_loop()?;
                let outcome = self.iterate_items(node, max).await;
                self.state.loop_depth -= 1;
                Ok(Step::after_loop(outcome?))
            }
            NodeConfig::ForRange(config) => {
                let max = self.max_iterations(config.max_iterations);
                self.enter_loop()?;
                let outcome = self.iterate_range(node, max).await;
                self.state.loop_depth -= 1;
                Ok(Step::after_loop(outcome?))
            }
            NodeConfig::Delay(config) => {
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(config.duration_ms)) => {}
                    () = self.cancel.cancelled() => return Err(RunError::Cancelled),
                }
                Ok(Step::next())
            }
            NodeConfig::DeclareVariable(config) => {
                let variable = self.variable(&config.variable_id)?;
                let value = match self.input_opt(node, "initial").await? {
                    Some(value) => value,
                    None => variable.default_value.clone(),
                };
                self.engine.variables.set(variable.id.clone(), variable.coerce(value));
                Ok(Step::next())
            }
            NodeConfig::SetVariable(config) => {
                let variable = self.variable(&config.variable_id)?;
                let value = variable.coerce(self.input(node, "value").await?);
                self.engine.variables.set(variable.id.clone(), value.clone());
                self.state.bind(&node.id, "value", value);
                Ok(Step::next())
            }
            NodeConfig::Log(config) => {
                let message = self.input(node, "message").await?.to_display_string();
                match config.level {
                    LogLevel::Debug => debug!(node = %node.id, "{message}"),
                    LogLevel::Info => info!(node = %node.id, "{message}"),
                    LogLevel::Warn => warn!(node = %node.id, "{message}"),
                    LogLevel::Error => error!(node = %node.id, "{message}"),
                }
                self.state.log(config.level, message, Some(&node.id));
                Ok(Step::next())
            }
            NodeConfig::Notify(config) => {
                let message = self.input(node, "message").await?.to_display_string();
                let line = if config.title.is_empty() {
                    message.clone()
                } else {
                    format!("{}: {message}", config.title)
                };
                self.state.log(LogLevel::Info, line, Some(&node.id));
                self.state.notifications.push(Notification {
                    title: config.title.clone(),
                    message,
                });
                Ok(Step::next())
            }
            NodeConfig::Output(config) => {
                let value = self.input(node, "value").await?;
                let name = if config.name.is_empty() {
                    node.id.to_string()
                } else {
                    config.name.clone()
                };
                self.state.outputs.insert(name, value);
                Ok(Step::next())
            }
            NodeConfig::UiSetValue(config) => {
                let value = self.input(node, "value").await?;
                if let Err(e) = self.engine.ui.set_value(&config.component_id, value) {
                    self.ui_failure(node, &e);
                }
                Ok(Step::next())
            }
            NodeConfig::UiSetValues(_) => {
                let values = match self.input(node, "values").await? {
                    Value::Object(values) => values,
                    other => return Err(mismatch(node, "values", ValueType::Object, &other)),
                };
                for e in self.engine.ui.set_batch(values) {
                    self.ui_failure(node, &e);
                }
                Ok(Step::next())
            }
            NodeConfig::BindToLabel(config) => {
                let value = self.input(node, "value").await?;
                let text = config.format.replace("{value}", &value.to_display_string());
                if let Err(e) = self.engine.ui.set_value(&config.component_id, Value::String(text)) {
                    self.ui_failure(node, &e);
                }
                Ok(Step::next())
            }
            _ => match node.template().dispatch {
                Dispatch::Target(call) => {
                    let inputs = self.resolve_inputs(node).await?;
                    for (port, value) in self.dispatch(node, call.method, &inputs).await? {
                        self.state.bind(&node.id, port, value);
                    }
                    Ok(Step::next())
                }
                Dispatch::Host => Err(RunError::host(
                    &node.id,
                    format!("'{}' cannot be reached by flow", node.kind()),
                )),
            },
        }
    }

    fn ui_failure(&mut self, node: &Node, e: &UiError) {
        warn!(node = %node.id, error = %e, "UI update failed");
        self.state.log(LogLevel::Warn, format!("UI update failed: {e}"), Some(&node.id));
    }

    // ------------------------------------------------------------------
    // Loops
    // ------------------------------------------------------------------

    fn max_iterations(&self, configured: Option<u32>) -> u32 {
        configured.unwrap_or(self.engine.config.default_max_iterations)
    }

    fn enter_loop(&mut self) -> RunResult<()> {
        let max = self.engine.config.max_loop_nesting;
        if self.state.loop_depth >= max {
            return Err(RunError::NestingExceeded(max));
        }
        self.state.loop_depth += 1;
        Ok(())
    }

    fn loop_capped(&mut self, node: &Node, max: u32) {
        let message = format!("{} '{}' stopped after {max} iterations", node.kind(), node.label);
        self.bound_exceeded(Some(&node.id), message);
    }

    async fn body(&mut self, node: &Node) -> RunResult<Outcome> {
        self.follow(node.id.clone(), PortId::from("body")).await
    }

    async fn iterate_while(&mut self, node: &'a Node, max: u32) -> RunResult<Outcome> {
        let mut index = 0u32;
        loop {
            self.checkpoint()?;
            self.state.invalidate();
            if !self.input(node, "condition").await?.is_truthy() {
                return Ok(Outcome::Done);
            }
            if index >= max {
                self.loop_capped(node, max);
                return Ok(Outcome::Done);
            }
            self.state.bind(&node.id, "index", Value::Int(i64::from(index)));
            if self.body(node).await? == Outcome::Halted {
                return Ok(Outcome::Halted);
            }
            index += 1;
        }
    }

    async fn iterate_items(&mut self, node: &'a Node, max: u32) -> RunResult<Outcome> {
        let items = match self.input(node, "items").await? {
            Value::Array(items) => items,
            other => return Err(mismatch(node, "items", ValueType::Array, &other)),
        };
        for (index, item) in items.into_iter().enumerate() {
            if index >= max as usize {
                self.loop_capped(node, max);
                break;
            }
            self.checkpoint()?;
            self.state.bind(&node.id, "item", item);
            self.state.bind(&node.id, "index", Value::Int(index as i64));
            if self.body(node).await? == Outcome::Halted {
                return Ok(Outcome::Halted);
            }
        }
        Ok(Outcome::Done)
    }

    async fn iterate_range(&mut self, node: &'a Node, max: u32) -> RunResult<Outcome> {
        let start = self.integer(node, "start").await?;
        let end = self.integer(node, "end").await?;
        let step = self.integer(node, "step").await?;
        if step == 0 {
            return Err(RunError::host(&node.id, "step must not be zero"));
        }

        let mut i = start;
        let mut count = 0u32;
        while (step > 0 && i < end) || (step < 0 && i > end) {
            if count >= max {
                self.loop_capped(node, max);
                break;
            }
            self.checkpoint()?;
            self.state.bind(&node.id, "index", Value::Int(i));
            if self.body(node).await? == Outcome::Halted {
                return Ok(Outcome::Halted);
            }
            count += 1;
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
        Ok(Outcome::Done)
    }

    // ------------------------------------------------------------------
    // Value resolution
    // ------------------------------------------------------------------

    async fn input_opt(&mut self, node: &'a Node, port: &str) -> RunResult<Option<Value>> {
        let port = PortId::from(port);
        let script = self.script;
        if let Some(connection) = script.incoming(&node.id, &port) {
            let value = self
                .resolve_output(connection.from_node.clone(), connection.from_port.clone())
                .await?;
            return Ok(Some(value));
        }
        if let Some(value) = node.config().inline_default(&port) {
            return Ok(Some(value));
        }
        Ok(node.input(&port).and_then(|p| p.default_value.clone()))
    }

    async fn input(&mut self, node: &'a Node, port: &str) -> RunResult<Value> {
        self.input_opt(node, port).await?.ok_or_else(|| RunError::MissingInput {
            node: node.id.clone(),
            port: PortId::from(port),
        })
    }

    async fn number(&mut self, node: &'a Node, port: &str) -> RunResult<f64> {
        let value = self.input(node, port).await?;
        let number = match &value {
            Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Pointer(_) => value.as_f64(),
            _ => None,
        };
        number.ok_or_else(|| mismatch(node, port, ValueType::Double, &value))
    }

    async fn integer(&mut self, node: &'a Node, port: &str) -> RunResult<i64> {
        let value = self.input(node, port).await?;
        let integer = match &value {
            Value::Int(_) | Value::UInt(_) | Value::Float(_) => value.as_i64(),
            _ => None,
        };
        integer.ok_or_else(|| mismatch(node, port, ValueType::Int64, &value))
    }

    async fn resolve_inputs(&mut self, node: &'a Node) -> RunResult<Inputs> {
        let mut inputs = Inputs::new();
        for port in node.inputs().iter().filter(|p| !p.is_flow()) {
            let value = self.input(node, port.id.as_str()).await?;
            inputs.insert(port.id.clone(), value);
        }
        Ok(inputs)
    }

    /// Value of an output port, evaluating pure producers on demand
    fn resolve_output(&mut self, producer: NodeId, port: PortId) -> BoxFuture<'_, RunResult<Value>> {
        Box::pin(async move {
            let node = self.node(&producer)?;
            if !node.is_pure() {
                if let Some(value) = self.state.bound(&producer, &port) {
                    return Ok(value.clone());
                }
                if self.state.has_executed(&producer) {
                    return Ok(Value::Null);
                }
                return Err(RunError::NotExecuted { node: producer, port });
            }

            let remote = matches!(node.template().dispatch, Dispatch::Target(_));
            if remote && self.state.has_executed(&producer) {
                return Ok(self.state.bound(&producer, &port).cloned().unwrap_or_default());
            }
            if let Some(outputs) = self.state.cached(&producer) {
                return Ok(outputs.get(&port).cloned().unwrap_or_default());
            }

            if !self.state.enter(&producer) {
                return Err(RunError::ResolutionCycle(producer));
            }
            let max_depth = self.engine.config.max_resolution_depth;
            if self.state.resolution_depth() > max_depth {
                self.state.leave(&producer);
                return Err(RunError::DepthExceeded(max_depth));
            }
            let result = self.evaluate_pure(node).await;
            self.state.leave(&producer);

            let outputs = result?;
            let value = outputs.get(&port).cloned().unwrap_or_default();
            if remote {
                // Pure target nodes reach the agent at most once per run
                self.state.bind_all(&producer, outputs);
            } else {
                self.state.cache(&producer, outputs);
            }
            Ok(value)
        })
    }

    async fn evaluate_pure(&mut self, node: &'a Node) -> RunResult<Outputs> {
        let (port, value) = match node.config() {
            NodeConfig::ConstNumber(config) => {
                let value = Value::Float(config.value);
                ("value", value.coerce_to(config.value_type).unwrap_or(value))
            }
            NodeConfig::ConstString(config) => ("value", Value::String(config.value.clone())),
            NodeConfig::ConstBoolean(config) => ("value", Value::Bool(config.value)),
            NodeConfig::ConstPointer(config) => {
                let address = parse_address(&config.value)
                    .ok_or_else(|| RunError::host(&node.id, format!("'{}' is not an address", config.value)))?;
                ("value", Value::Pointer(address))
            }
            NodeConfig::Math(config) => {
                let a = self.number(node, "a").await?;
                let b = self.number(node, "b").await?;
                let result = host::math(config.op(), a, b).map_err(|e| RunError::host(&node.id, e))?;
                ("result", Value::Float(result))
            }
            NodeConfig::Compare(config) => {
                let a = self.input(node, "a").await?;
                let b = self.input(node, "b").await?;
                let result = host::compare(config.op, &a, &b).map_err(|e| RunError::host(&node.id, e))?;
                ("result", Value::Bool(result))
            }
            NodeConfig::Logic(config) => {
                let a = self.input(node, "a").await?;
                let b = self.input(node, "b").await?;
                ("result", Value::Bool(host::logic(config.op, &a, &b)))
            }
            NodeConfig::StringFormat(config) => {
                let mut args = Vec::with_capacity(4);
                for i in 0..4 {
                    args.push(self.input(node, &format!("arg{i}")).await?);
                }
                ("result", Value::String(host::format(&config.template, &args)))
            }
            NodeConfig::StringConcat(config) => {
                let a = self.input(node, "a").await?;
                let b = self.input(node, "b").await?;
                ("result", Value::String(host::concat(&a, &b, &config.separator)))
            }
            NodeConfig::ToString(_) => {
                let value = self.input(node, "value").await?;
                ("result", Value::String(value.to_display_string()))
            }
            NodeConfig::ToNumber(_) => {
                let value = self.input(node, "value").await?;
                let number = host::to_number(&value).map_err(|e| RunError::host(&node.id, e))?;
                ("result", Value::Float(number))
            }
            NodeConfig::ToPointer(_) => {
                let value = self.input(node, "value").await?;
                let address = host::to_pointer(&value).map_err(|e| RunError::host(&node.id, e))?;
                ("result", Value::Pointer(address))
            }
            NodeConfig::PointerAdd(_) => {
                let base = self.input(node, "base").await?;
                let base = host::to_pointer(&base).map_err(|e| RunError::host(&node.id, e))?;
                let offset = self.integer(node, "offset").await?;
                ("result", Value::Pointer(host::pointer_add(base, offset)))
            }
            NodeConfig::GetVariable(config) => {
                let variable = self.variable(&config.variable_id)?;
                let value = self
                    .engine
                    .variables
                    .get(&variable.id)
                    .unwrap_or_else(|| variable.default_value.clone());
                ("value", value)
            }
            NodeConfig::UiGetValue(config) => ("value", self.engine.ui.get_value(&config.component_id)?),
            NodeConfig::UiGetAll(_) => ("values", Value::Object(self.engine.ui.get_all())),
            NodeConfig::ListDevices(_) => {
                let devices = self
                    .engine
                    .devices
                    .devices()
                    .await
                    .map_err(|e| RunError::host(&node.id, e.to_string()))?;
                ("devices", to_value(&devices))
            }
            NodeConfig::ListProcesses(config) => {
                let processes = self
                    .engine
                    .devices
                    .processes(config.device_id.clone())
                    .await
                    .map_err(|e| RunError::host(&node.id, e.to_string()))?;
                ("processes", to_value(&processes))
            }
            _ => {
                return match node.template().dispatch {
                    Dispatch::Target(call) => {
                        let inputs = self.resolve_inputs(node).await?;
                        self.dispatch(node, call.method, &inputs).await
                    }
                    Dispatch::Host => Err(RunError::host(
                        &node.id,
                        format!("'{}' does not produce values on demand", node.kind()),
                    )),
                }
            }
        };

        let mut outputs = Outputs::new();
        outputs.insert(PortId::from(port), value);
        Ok(outputs)
    }

    // ------------------------------------------------------------------
    // Target dispatch
    // ------------------------------------------------------------------

    async fn dispatch(&self, node: &Node, method: &'static str, inputs: &Inputs) -> RunResult<Outputs> {
        self.checkpoint()?;
        let session = self.engine.session.read().clone().ok_or(RunError::NoSession)?;
        let agent = self.engine.agent.clone().ok_or(RunError::NoSession)?;
        let request = target::request(node, method, inputs)?;
        debug!(node = %node.id, method, session = %session.session_id, "dispatching to agent");

        let timeout = self.engine.config.rpc_timeout();
        let timeout_ms = self.engine.config.rpc_timeout_ms;
        let reply = tokio::select! {
            reply = tokio::time::timeout(timeout, agent.call(&session, request)) => match reply {
                Ok(reply) => reply?,
                Err(_) => {
                    return Err(RunError::AgentTimeout {
                        method: method.to_string(),
                        timeout_ms,
                    })
                }
            },
            () = self.cancel.cancelled() => return Err(RunError::Cancelled),
        };

        match reply.status {
            ReplyStatus::Ok => target::decode(node, reply.value),
            ReplyStatus::Error => Err(RunError::Agent {
                method: method.to_string(),
                message: reply.message.unwrap_or_else(|| "unknown agent error".to_string()),
            }),
        }
    }
}

fn mismatch(node: &Node, port: &str, expected: ValueType, found: &Value) -> RunError {
    RunError::TypeMismatch {
        node: node.id.clone(),
        port: PortId::from(port),
        expected,
        found: found.value_type(),
    }
}

fn to_value<T: serde::Serialize>(items: &T) -> Value {
    serde_json::to_value(items).map_or(Value::Null, |json| Value::from_json(&json))
}

/// First entry node of `kind`, or the first entry node of any kind
pub fn find_entry(script: &Script, kind: Option<NodeKind>) -> Option<&Node> {
    let mut entries = script.entry_nodes();
    match kind {
        Some(kind) => entries.find(|n| n.kind() == kind),
        None => entries.next(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentReply, AgentRequest, TransportError};
    use crate::devices::{DeviceInfo, ProcessInfo};
    use serde_json::json;

    fn n(id: &str, kind: NodeKind, config: serde_json::Value) -> Node {
        Node::from_raw(id, kind, &config).unwrap()
    }

    fn build(nodes: Vec<Node>, edges: &[(&str, &str, &str, &str)]) -> Script {
        let mut script = Script::new("test");
        for node in nodes {
            script.add_node(node).unwrap();
        }
        for (from, from_port, to, to_port) in edges {
            script
                .connect(&(*from).into(), &(*from_port).into(), &(*to).into(), &(*to_port).into())
                .unwrap();
        }
        script
    }

    fn var(script: &mut Script, id: &str, ty: ValueType, default: Value) {
        script
            .add_variable(Variable::new(id, id, ty).with_default(default))
            .unwrap();
    }

    async fn run(engine: &Engine, script: &Script) -> ExecutionResult {
        engine.run(script, &"start".into(), Value::Null, None).await
    }

    struct ScriptedAgent {
        reply: AgentReply,
        seen: Mutex<Vec<AgentRequest>>,
    }

    impl ScriptedAgent {
        fn new(reply: AgentReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl AgentClient for ScriptedAgent {
        fn call(
            &self,
            _session: &TargetSession,
            request: AgentRequest,
        ) -> BoxFuture<'_, Result<AgentReply, TransportError>> {
            self.seen.lock().push(request);
            let reply = self.reply.clone();
            Box::pin(async move { Ok(reply) })
        }
    }

    struct SilentAgent;

    impl AgentClient for SilentAgent {
        fn call(
            &self,
            _session: &TargetSession,
            _request: AgentRequest,
        ) -> BoxFuture<'_, Result<AgentReply, TransportError>> {
            Box::pin(futures::future::pending())
        }
    }

    /// start -> set x = 1 -> memory_read 0x1000 -> set y = read.value
    fn read_script() -> Script {
        let mut script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("one", NodeKind::ConstNumber, json!({"value": 1})),
                n("set_x", NodeKind::SetVariable, json!({"variableId": "x"})),
                n("read", NodeKind::MemoryRead, json!({"address": "0x1000", "valueType": "int32"})),
                n("set_y", NodeKind::SetVariable, json!({"variableId": "y"})),
            ],
            &[
                ("start", "exec_out", "set_x", "exec_in"),
                ("one", "value", "set_x", "value"),
                ("set_x", "exec_out", "read", "exec_in"),
                ("read", "exec_out", "set_y", "exec_in"),
                ("read", "value", "set_y", "value"),
            ],
        );
        var(&mut script, "x", ValueType::Double, Value::Float(0.0));
        var(&mut script, "y", ValueType::Double, Value::Float(0.0));
        script
    }

    #[tokio::test]
    async fn test_add_numbers() {
        let mut script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("five", NodeKind::ConstNumber, json!({"value": 5})),
                n("add", NodeKind::Math, json!({"op": "add", "b": 3})),
                n("set", NodeKind::SetVariable, json!({"variableId": "sum"})),
            ],
            &[
                ("start", "exec_out", "set", "exec_in"),
                ("five", "value", "add", "a"),
                ("add", "result", "set", "value"),
            ],
        );
        var(&mut script, "sum", ValueType::Double, Value::Float(0.0));

        let result = run(&Engine::default(), &script).await;
        assert!(result.success(), "{:?}", result.error);
        assert_eq!(result.variables["sum"], Value::Float(8.0));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_two_constants_feed_math_output() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("five", NodeKind::ConstNumber, json!({"value": 5})),
                n("three", NodeKind::ConstNumber, json!({"value": 3})),
                n("add", NodeKind::Math, json!({"op": "add"})),
                n("out", NodeKind::Output, json!({"name": "sum"})),
            ],
            &[
                ("start", "exec_out", "out", "exec_in"),
                ("five", "value", "add", "a"),
                ("three", "value", "add", "b"),
                ("add", "result", "out", "value"),
            ],
        );

        let result = run(&Engine::default(), &script).await;
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.outputs["sum"], Value::Float(8.0));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_loop_stops_at_max_iterations() {
        let mut script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("yes", NodeKind::ConstBoolean, json!({"value": true})),
                n("loop", NodeKind::Loop, json!({"maxIterations": 5})),
                n("get", NodeKind::GetVariable, json!({"variableId": "count"})),
                n("inc", NodeKind::Math, json!({"op": "add", "b": 1})),
                n("set", NodeKind::SetVariable, json!({"variableId": "count"})),
            ],
            &[
                ("start", "exec_out", "loop", "exec_in"),
                ("yes", "value", "loop", "condition"),
                ("loop", "body", "set", "exec_in"),
                ("get", "value", "inc", "a"),
                ("inc", "result", "set", "value"),
            ],
        );
        var(&mut script, "count", ValueType::Int32, Value::Int(0));

        let result = run(&Engine::default(), &script).await;
        assert!(result.success());
        assert_eq!(result.variables["count"], Value::Int(5));
        let warnings: Vec<_> = result.logs.iter().filter(|l| l.level == LogLevel::Warn).collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].node, Some(NodeId::from("loop")));
    }

    #[tokio::test]
    async fn test_loop_condition_sees_body_writes() {
        // while count < 3 { count += 1 }
        let mut script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("get", NodeKind::GetVariable, json!({"variableId": "count"})),
                n("lt", NodeKind::Compare, json!({"op": "lt", "b": 3})),
                n("loop", NodeKind::Loop, json!({})),
                n("inc", NodeKind::Math, json!({"op": "add", "b": 1})),
                n("set", NodeKind::SetVariable, json!({"variableId": "count"})),
                n("done", NodeKind::Output, json!({"name": "done"})),
            ],
            &[
                ("start", "exec_out", "loop", "exec_in"),
                ("get", "value", "lt", "a"),
                ("lt", "result", "loop", "condition"),
                ("loop", "body", "set", "exec_in"),
                ("get", "value", "inc", "a"),
                ("inc", "result", "set", "value"),
                ("loop", "completed", "done", "exec_in"),
                ("get", "value", "done", "value"),
            ],
        );
        var(&mut script, "count", ValueType::Int32, Value::Int(0));

        let result = run(&Engine::default(), &script).await;
        assert!(result.success(), "{:?}", result.error);
        assert_eq!(result.variables["count"], Value::Int(3));
        assert_eq!(result.outputs["done"], Value::Int(3));
        assert!(result.logs.is_empty());
    }

    #[tokio::test]
    async fn test_switch_routes_unmatched_to_default() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("key", NodeKind::ConstString, json!({"value": "zzz"})),
                n("switch", NodeKind::Switch, json!({"cases": ["a", "b"]})),
                n("case_text", NodeKind::ConstString, json!({"value": "case"})),
                n("default_text", NodeKind::ConstString, json!({"value": "default"})),
                n("on_case", NodeKind::Output, json!({"name": "route"})),
                n("on_default", NodeKind::Output, json!({"name": "route"})),
            ],
            &[
                ("start", "exec_out", "switch", "exec_in"),
                ("key", "value", "switch", "value"),
                ("switch", "case_0", "on_case", "exec_in"),
                ("switch", "default", "on_default", "exec_in"),
                ("case_text", "value", "on_case", "value"),
                ("default_text", "value", "on_default", "value"),
            ],
        );

        let result = run(&Engine::default(), &script).await;
        assert!(result.success());
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.outputs["route"], Value::from("default"));
    }

    #[tokio::test]
    async fn test_target_node_without_session_fails_after_earlier_writes() {
        let script = read_script();
        let result = run(&Engine::default(), &script).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.error, Some(RunError::NoSession.to_string()));
        assert_eq!(result.variables["x"], Value::Float(1.0));
        assert_eq!(result.variables["y"], Value::Float(0.0));
    }

    #[tokio::test]
    async fn test_target_node_dispatches_to_agent() {
        let agent = ScriptedAgent::new(AgentReply::ok(1234));
        let engine = Engine::default().with_agent(agent.clone());
        engine.set_session("session-1", "agent-script");

        let result = run(&engine, &read_script()).await;
        assert!(result.success(), "{:?}", result.error);
        assert_eq!(result.variables["y"], Value::Float(1234.0));

        let seen = agent.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "memory.read");
        assert_eq!(seen[0].args["address"], json!("0x1000"));
        assert_eq!(seen[0].args["type"], json!("int32"));
    }

    #[tokio::test]
    async fn test_numeric_values_feed_pointer_inputs() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("addr", NodeKind::ConstNumber, json!({"value": 4096})),
                n("arg", NodeKind::ConstNumber, json!({"value": 5})),
                n("read", NodeKind::MemoryRead, json!({"valueType": "int32"})),
                n("call", NodeKind::NativeCall, json!({"address": "0x7ff0", "argCount": 1})),
            ],
            &[
                ("start", "exec_out", "read", "exec_in"),
                ("addr", "value", "read", "address"),
                ("read", "exec_out", "call", "exec_in"),
                ("arg", "value", "call", "arg0"),
            ],
        );
        let agent = ScriptedAgent::new(AgentReply::ok(0));
        let engine = Engine::default().with_agent(agent.clone());
        engine.set_session("session-1", "agent-script");

        let result = run(&engine, &script).await;
        assert!(result.success(), "{:?}", result.error);

        let seen = agent.seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].args["address"], json!("0x1000"));
        assert_eq!(seen[1].method, "native.call");
        assert_eq!(seen[1].args["args"], json!([{"type": "pointer", "value": "0x5"}]));
    }

    #[tokio::test]
    async fn test_negative_number_is_not_an_address() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("addr", NodeKind::ConstNumber, json!({"value": -1.5})),
                n("read", NodeKind::MemoryRead, json!({})),
            ],
            &[
                ("start", "exec_out", "read", "exec_in"),
                ("addr", "value", "read", "address"),
            ],
        );
        let agent = ScriptedAgent::new(AgentReply::ok(0));
        let engine = Engine::default().with_agent(agent.clone());
        engine.set_session("session-1", "agent-script");

        let result = run(&engine, &script).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.unwrap().contains("not an address"));
        assert!(agent.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_module_base_is_dispatched_once_per_run() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("module", NodeKind::ModuleBase, json!({"moduleName": "game.exe"})),
                n("first", NodeKind::MemoryRead, json!({})),
                n("range", NodeKind::ForRange, json!({"end": 3})),
                n("second", NodeKind::MemoryRead, json!({})),
            ],
            &[
                ("start", "exec_out", "first", "exec_in"),
                ("module", "address", "first", "address"),
                ("first", "exec_out", "range", "exec_in"),
                ("range", "body", "second", "exec_in"),
                ("module", "address", "second", "address"),
            ],
        );
        let agent = ScriptedAgent::new(AgentReply::ok("0x140000000"));
        let engine = Engine::default().with_agent(agent.clone());
        engine.set_session("session-1", "agent-script");

        let result = run(&engine, &script).await;
        assert!(result.success(), "{:?}", result.error);

        let seen = agent.seen.lock();
        let methods: Vec<_> = seen.iter().map(|r| r.method.as_str()).collect();
        assert_eq!(methods.iter().filter(|m| **m == "module.base").count(), 1);
        assert_eq!(methods.iter().filter(|m| **m == "memory.read").count(), 4);
        assert!(seen
            .iter()
            .filter(|r| r.method == "memory.read")
            .all(|r| r.args["address"] == json!("0x140000000")));
    }

    #[tokio::test]
    async fn test_agent_error_is_fatal() {
        let engine = Engine::default().with_agent(ScriptedAgent::new(AgentReply::error("access violation")));
        engine.set_session("session-1", "agent-script");

        let result = run(&engine, &read_script()).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.unwrap().contains("access violation"));
        assert_eq!(result.variables["x"], Value::Float(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_timeout_is_fatal() {
        let config = RuntimeConfig {
            rpc_timeout_ms: 50,
            ..Default::default()
        };
        let engine = Engine::new(config).with_agent(Arc::new(SilentAgent));
        engine.set_session("session-1", "agent-script");

        let result = run(&engine, &read_script()).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(
            result.error,
            Some(
                RunError::AgentTimeout {
                    method: "memory.read".into(),
                    timeout_ms: 50
                }
                .to_string()
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_session_cancels_pending_call() {
        let engine = Arc::new(Engine::default().with_agent(Arc::new(SilentAgent)));
        engine.set_session("session-1", "agent-script");

        let detach = {
            let engine = engine.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                engine.clear_session();
            })
        };

        let result = run(&engine, &read_script()).await;
        detach.await.unwrap();
        assert_eq!(result.status, RunStatus::Cancelled);
        assert!(!result.success());
        assert_eq!(result.variables["x"], Value::Float(1.0));
        assert!(engine.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_token_stops_delay() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("wait", NodeKind::Delay, json!({"durationMs": 60_000})),
                n("after", NodeKind::Log, json!({"message": "unreachable"})),
            ],
            &[
                ("start", "exec_out", "wait", "exec_in"),
                ("wait", "exec_out", "after", "exec_in"),
            ],
        );

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = Engine::default()
            .run_with_cancel(&script, &"start".into(), Value::Null, None, token)
            .await;
        assert_eq!(result.status, RunStatus::Cancelled);
        assert!(result.logs.is_empty());
    }

    #[tokio::test]
    async fn test_already_cancelled_run_executes_nothing() {
        let script = read_script();
        let token = CancellationToken::new();
        token.cancel();
        let result = Engine::default()
            .run_with_cancel(&script, &"start".into(), Value::Null, None, token)
            .await;
        assert_eq!(result.status, RunStatus::Cancelled);
        assert_eq!(result.variables["x"], Value::Float(0.0));
    }

    #[tokio::test]
    async fn test_host_evaluation_is_deterministic() {
        let mut script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("text", NodeKind::StringFormat, json!({"template": "{0}-{1}"})),
                n("a", NodeKind::ConstString, json!({"value": "hp"})),
                n("b", NodeKind::ConstNumber, json!({"value": 42})),
                n("log", NodeKind::Log, json!({})),
                n("set", NodeKind::SetVariable, json!({"variableId": "label"})),
            ],
            &[
                ("start", "exec_out", "log", "exec_in"),
                ("a", "value", "text", "arg0"),
                ("b", "value", "text", "arg1"),
                ("text", "result", "log", "message"),
                ("log", "exec_out", "set", "exec_in"),
                ("text", "result", "set", "value"),
            ],
        );
        var(&mut script, "label", ValueType::String, Value::from(""));

        let engine = Engine::default();
        let first = run(&engine, &script).await;
        engine.reset_state();
        let second = run(&engine, &script).await;
        assert!(first.success());
        assert_eq!(first, second);
        assert_eq!(first.log_messages().collect::<Vec<_>>(), vec!["hp-42"]);
        assert_eq!(first.variables["label"], Value::from("hp-42"));
    }

    #[tokio::test]
    async fn test_variables_persist_until_reset() {
        let mut script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("get", NodeKind::GetVariable, json!({"variableId": "runs"})),
                n("inc", NodeKind::Math, json!({"b": 1})),
                n("set", NodeKind::SetVariable, json!({"variableId": "runs"})),
            ],
            &[
                ("start", "exec_out", "set", "exec_in"),
                ("get", "value", "inc", "a"),
                ("inc", "result", "set", "value"),
            ],
        );
        var(&mut script, "runs", ValueType::Int32, Value::Int(0));

        let engine = Engine::default();
        run(&engine, &script).await;
        let result = run(&engine, &script).await;
        assert_eq!(result.variables["runs"], Value::Int(2));

        engine.reset_state();
        let result = run(&engine, &script).await;
        assert_eq!(result.variables["runs"], Value::Int(1));
    }

    #[tokio::test]
    async fn test_missing_input_is_fatal() {
        let script = build(
            vec![n("start", NodeKind::Start, json!({})), n("log", NodeKind::Log, json!({}))],
            &[("start", "exec_out", "log", "exec_in")],
        );
        let result = run(&Engine::default(), &script).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(
            result.error,
            Some(
                RunError::MissingInput {
                    node: "log".into(),
                    port: "message".into()
                }
                .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_division_by_zero_is_fatal() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("div", NodeKind::Math, json!({"op": "div", "a": 1, "b": 0})),
                n("out", NodeKind::Output, json!({})),
            ],
            &[("start", "exec_out", "out", "exec_in"), ("div", "result", "out", "value")],
        );
        let result = run(&Engine::default(), &script).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.unwrap().contains("division by zero"));
    }

    #[tokio::test]
    async fn test_pure_cycle_detected() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("m1", NodeKind::Math, json!({})),
                n("m2", NodeKind::Math, json!({"b": 1})),
                n("out", NodeKind::Output, json!({})),
            ],
            &[
                ("start", "exec_out", "out", "exec_in"),
                ("m1", "result", "m2", "a"),
                ("m2", "result", "m1", "a"),
                ("m1", "result", "out", "value"),
            ],
        );
        let result = run(&Engine::default(), &script).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.error, Some(RunError::ResolutionCycle("m1".into()).to_string()));
    }

    #[tokio::test]
    async fn test_reading_unexecuted_flow_output_fails() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("set", NodeKind::SetVariable, json!({"variableId": "v"})),
                n("log", NodeKind::Log, json!({})),
            ],
            &[("start", "exec_out", "log", "exec_in"), ("set", "value", "log", "message")],
        );
        let result = run(&Engine::default(), &script).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert!(matches!(
            result.error.as_deref(),
            Some(message) if message.contains("before the node executed")
        ));
    }

    #[tokio::test]
    async fn test_flow_step_budget_halts_run() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("range", NodeKind::ForRange, json!({"end": 1000, "maxIterations": 1000})),
                n("out", NodeKind::Output, json!({"name": "i"})),
                n("after", NodeKind::Log, json!({"message": "after"})),
            ],
            &[
                ("start", "exec_out", "range", "exec_in"),
                ("range", "body", "out", "exec_in"),
                ("range", "index", "out", "value"),
                ("range", "completed", "after", "exec_in"),
            ],
        );
        let config = RuntimeConfig {
            max_flow_steps: 10,
            ..Default::default()
        };
        let result = run(&Engine::new(config), &script).await;
        assert!(result.success());
        // The range node is step 1, the body runs for steps 2..=10
        assert_eq!(result.outputs["i"], Value::Int(8));
        assert_eq!(result.logs.len(), 1);
        assert_eq!(result.logs[0].level, LogLevel::Warn);
    }

    #[tokio::test]
    async fn test_for_each_and_range() {
        let mut script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("each", NodeKind::ForEach, json!({})),
                n("get", NodeKind::GetVariable, json!({"variableId": "sum"})),
                n("add", NodeKind::Math, json!({})),
                n("set", NodeKind::SetVariable, json!({"variableId": "sum"})),
                n("range", NodeKind::ForRange, json!({"start": 10, "end": 0, "step": -5})),
                n("last", NodeKind::Output, json!({"name": "last"})),
            ],
            &[
                ("start", "exec_out", "each", "exec_in"),
                ("start", "value", "each", "items"),
                ("each", "body", "set", "exec_in"),
                ("get", "value", "add", "a"),
                ("each", "item", "add", "b"),
                ("add", "result", "set", "value"),
                ("each", "completed", "range", "exec_in"),
                ("range", "body", "last", "exec_in"),
                ("range", "index", "last", "value"),
            ],
        );
        var(&mut script, "sum", ValueType::Double, Value::Float(0.0));

        let items = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Float(3.5)]);
        let result = Engine::default().run(&script, &"start".into(), items, None).await;
        assert!(result.success(), "{:?}", result.error);
        assert_eq!(result.variables["sum"], Value::Float(6.5));
        assert_eq!(result.outputs["last"], Value::Int(5));
    }

    #[tokio::test]
    async fn test_ui_event_for_other_component_does_nothing() {
        let mut script = build(
            vec![
                n("click", NodeKind::EventUi, json!({"componentId": "btn_apply", "event": "click"})),
                n("one", NodeKind::ConstNumber, json!({"value": 1})),
                n("set", NodeKind::SetVariable, json!({"variableId": "clicked"})),
            ],
            &[("click", "exec_out", "set", "exec_in"), ("one", "value", "set", "value")],
        );
        var(&mut script, "clicked", ValueType::Double, Value::Float(0.0));

        let engine = Engine::default();
        let result = engine.run(&script, &"click".into(), Value::Null, Some("btn_other")).await;
        assert!(result.success());
        assert_eq!(result.variables["clicked"], Value::Float(0.0));

        let result = engine.run(&script, &"click".into(), Value::Null, Some("btn_apply")).await;
        assert_eq!(result.variables["clicked"], Value::Float(1.0));
    }

    #[tokio::test]
    async fn test_ui_nodes() {
        let ui = Arc::new(InMemoryUiState::new().with_component("slider", 40i64).with_component("label", ""));
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("read", NodeKind::UiGetValue, json!({"componentId": "slider"})),
                n("bind", NodeKind::BindToLabel, json!({"componentId": "label", "format": "Speed: {value}"})),
                n("missing", NodeKind::UiSetValue, json!({"componentId": "gone", "value": 1})),
                n("done", NodeKind::Log, json!({"message": "done"})),
            ],
            &[
                ("start", "exec_out", "bind", "exec_in"),
                ("read", "value", "bind", "value"),
                ("bind", "exec_out", "missing", "exec_in"),
                ("missing", "exec_out", "done", "exec_in"),
            ],
        );

        let engine = Engine::default().with_ui(ui.clone());
        let result = run(&engine, &script).await;
        assert!(result.success(), "{:?}", result.error);
        assert_eq!(ui.get_value("label"), Ok(Value::from("Speed: 40")));
        // The failed set is logged and the flow continues
        assert_eq!(result.logs.len(), 2);
        assert_eq!(result.logs[0].level, LogLevel::Warn);
        assert_eq!(result.logs[1].message, "done");
    }

    #[tokio::test]
    async fn test_unknown_ui_component_read_is_fatal() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("read", NodeKind::UiGetValue, json!({"componentId": "nope"})),
                n("out", NodeKind::Output, json!({})),
            ],
            &[("start", "exec_out", "out", "exec_in"), ("read", "value", "out", "value")],
        );
        let result = run(&Engine::default(), &script).await;
        assert_eq!(result.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_device_listing() {
        let devices = StaticCatalog::new().with_device(
            DeviceInfo {
                id: "local".into(),
                name: "Local".into(),
                kind: "local".into(),
            },
            vec![ProcessInfo { pid: 7, name: "game".into() }],
        );
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("procs", NodeKind::ListProcesses, json!({})),
                n("out", NodeKind::Output, json!({"name": "procs"})),
            ],
            &[("start", "exec_out", "out", "exec_in"), ("procs", "processes", "out", "value")],
        );

        let engine = Engine::default().with_devices(Arc::new(devices));
        let result = run(&engine, &script).await;
        assert!(result.success());
        assert_eq!(result.outputs["procs"].to_json(), json!([{"pid": 7, "name": "game"}]));
    }

    #[tokio::test]
    async fn test_notify_and_output_name_fallback() {
        let script = build(
            vec![
                n("start", NodeKind::Start, json!({})),
                n("note", NodeKind::Notify, json!({"title": "Scan", "message": "finished"})),
                n("out", NodeKind::Output, json!({})),
            ],
            &[("start", "exec_out", "note", "exec_in"), ("note", "exec_out", "out", "exec_in"), ("start", "value", "out", "value")],
        );
        let result = Engine::default().run(&script, &"start".into(), Value::Int(9), None).await;
        assert!(result.success());
        assert_eq!(result.notifications, vec![Notification { title: "Scan".into(), message: "finished".into() }]);
        assert_eq!(result.log_messages().collect::<Vec<_>>(), vec!["Scan: finished"]);
        assert_eq!(result.outputs["out"], Value::Int(9));
    }

    #[tokio::test]
    async fn test_run_from_non_entry_fails() {
        let script = build(vec![n("log", NodeKind::Log, json!({}))], &[]);
        let result = Engine::default().run(&script, &"log".into(), Value::Null, None).await;
        assert_eq!(result.status, RunStatus::Failed);

        let result = Engine::default().run(&script, &"ghost".into(), Value::Null, None).await;
        assert_eq!(result.error, Some(RunError::NodeNotFound("ghost".into()).to_string()));
    }

    #[test]
    fn test_find_entry() {
        let script = build(
            vec![
                n("log", NodeKind::Log, json!({})),
                n("attach", NodeKind::OnAttach, json!({})),
                n("start", NodeKind::Start, json!({})),
            ],
            &[],
        );
        assert_eq!(find_entry(&script, None).map(|n| n.id.as_str()), Some("attach"));
        assert_eq!(find_entry(&script, Some(NodeKind::Start)).map(|n| n.id.as_str()), Some("start"));
        assert!(find_entry(&script, Some(NodeKind::OnDetach)).is_none());
    }
}
