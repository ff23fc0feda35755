use super::result::{CommandCompletion, CommandDispatchResult};
use super::text::split_command_text;
use super::{CommandContext, CommandDispatcher};
use crate::util::errors::{ParleyError, ParleyResult};
use dashmap::DashMap;
use futures::FutureExt;
use log::debug;
use std::any::{type_name, Any};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Finds command targets by name.
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Name-keyed target lookup.
#[derive(Default)]
pub struct NamedTargets {
    targets: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl NamedTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&self, name: impl Into<String>, target: Arc<T>) {
        self.targets.insert(name.into(), target);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.targets.remove(name).is_some()
    }
}

impl TargetResolver for NamedTargets {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.targets.get(name).map(|entry| entry.value().clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterCount {
    Exactly(usize),
    Between(usize, usize),
    AtLeast(usize),
}

impl ParameterCount {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            ParameterCount::Exactly(n) => count == n,
            ParameterCount::Between(min, max) => (min..=max).contains(&count),
            ParameterCount::AtLeast(min) => count >= min,
        }
    }

    fn describe(&self) -> String {
        match *self {
            ParameterCount::Exactly(n) => n.to_string(),
            ParameterCount::Between(min, max) => format!("{}..={}", min, max),
            ParameterCount::AtLeast(min) => format!("at least {}", min),
        }
    }
}

/// Arguments handed to a command handler. For targeted commands `args` excludes the target.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub name: String,
    pub args: Vec<String>,
    pub context: CommandContext,
}

impl CommandInvocation {
    pub fn arg(&self, idx: usize) -> ParleyResult<&str> {
        self.args.get(idx).map(String::as_str).ok_or_else(|| {
            ParleyError::command(format!("{}: missing argument {}", self.name, idx))
        })
    }

    pub fn parse_arg<T>(&self, idx: usize) -> ParleyResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.arg(idx)?;
        raw.parse::<T>().map_err(|e| {
            ParleyError::command(format!(
                "{}: can't parse argument {} ('{}'): {}",
                self.name, idx, raw, e
            ))
        })
    }
}

type PlainHandler = Arc<dyn Fn(CommandInvocation) -> CommandCompletion + Send + Sync>;
type TargetHandler = Arc<
    dyn Fn(Arc<dyn Any + Send + Sync>, CommandInvocation) -> Option<CommandCompletion>
        + Send
        + Sync,
>;

#[derive(Clone)]
enum RegisteredAction {
    Plain {
        parameters: ParameterCount,
        handler: PlainHandler,
    },
    Targeted {
        component: &'static str,
        parameters: ParameterCount,
        handler: TargetHandler,
    },
}

/// Command dispatcher backed by registered handlers.
pub struct ActionRegistry {
    actions: DashMap<String, RegisteredAction>,
    targets: Option<Arc<dyn TargetResolver>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
            targets: None,
        }
    }

    /// Registry with the built-in `wait <seconds>` command.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.add_command("wait", ParameterCount::Exactly(1), wait_command);
        registry
    }

    pub fn with_target_resolver(mut self, resolver: Arc<dyn TargetResolver>) -> Self {
        self.targets = Some(resolver);
        self
    }

    pub fn add_command<F, Fut>(
        &self,
        name: impl Into<String>,
        parameters: ParameterCount,
        handler: F,
    ) where
        F: Fn(CommandInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ParleyResult<()>> + Send + 'static,
    {
        let name = name.into();
        debug!("Registering command: name={}", name);
        self.actions.insert(
            name,
            RegisteredAction::Plain {
                parameters,
                handler: Arc::new(move |invocation| handler(invocation).boxed()),
            },
        );
    }

    /// Registers a command whose first argument names a target of type `C`.
    pub fn add_targeted_command<C, F, Fut>(
        &self,
        name: impl Into<String>,
        parameters: ParameterCount,
        handler: F,
    ) where
        C: Any + Send + Sync,
        F: Fn(Arc<C>, CommandInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ParleyResult<()>> + Send + 'static,
    {
        let name = name.into();
        debug!(
            "Registering targeted command: name={}, component={}",
            name,
            type_name::<C>()
        );
        self.actions.insert(
            name,
            RegisteredAction::Targeted {
                component: type_name::<C>(),
                parameters,
                handler: Arc::new(move |target, invocation| {
                    let component = target.downcast::<C>().ok()?;
                    Some(handler(component, invocation).boxed())
                }),
            },
        );
    }

    pub fn remove_command(&self, name: &str) -> bool {
        self.actions.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CommandDispatcher for ActionRegistry {
    fn dispatch(&self, command_text: &str, context: &CommandContext) -> CommandDispatchResult {
        let mut parts = split_command_text(command_text);
        if parts.is_empty() {
            return CommandDispatchResult::CommandUnknown;
        }
        let name = parts.remove(0);

        // Clone out so no map guard is held while handlers run.
        let Some(action) = self.actions.get(&name).map(|entry| entry.value().clone()) else {
            return CommandDispatchResult::CommandUnknown;
        };

        match action {
            RegisteredAction::Plain {
                parameters,
                handler,
            } => {
                if !parameters.accepts(parts.len()) {
                    return CommandDispatchResult::InvalidParameterCount {
                        expected: parameters.describe(),
                        actual: parts.len(),
                    };
                }
                CommandDispatchResult::Succeeded(handler(CommandInvocation {
                    name,
                    args: parts,
                    context: context.clone(),
                }))
            }
            RegisteredAction::Targeted {
                component,
                parameters,
                handler,
            } => {
                if parts.is_empty() || !parameters.accepts(parts.len() - 1) {
                    return CommandDispatchResult::InvalidParameterCount {
                        expected: format!("target + {}", parameters.describe()),
                        actual: parts.len(),
                    };
                }
                let target_name = parts.remove(0);
                let Some(target) = self
                    .targets
                    .as_ref()
                    .and_then(|resolver| resolver.resolve(&target_name))
                else {
                    return CommandDispatchResult::NoTargetFound {
                        target: target_name,
                    };
                };

                let invocation = CommandInvocation {
                    name,
                    args: parts,
                    context: context.clone(),
                };
                match handler(target, invocation) {
                    Some(completion) => CommandDispatchResult::Succeeded(completion),
                    None => CommandDispatchResult::TargetMissingComponent {
                        target: target_name,
                        component: component.to_string(),
                    },
                }
            }
        }
    }
}

async fn wait_command(invocation: CommandInvocation) -> ParleyResult<()> {
    let seconds: f64 = invocation.parse_arg(0)?;
    let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
        ParleyError::command(format!(
            "wait: duration must be a non-negative number of seconds, got {}",
            seconds
        ))
    })?;

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = invocation.context.cancellation.cancelled() => {
            debug!("Wait command interrupted by dialogue cancellation");
        }
    }
    Ok(())
}
