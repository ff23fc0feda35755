use crate::util::errors::{ParleyError, ParleyResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOption {
    pub id: String,
    pub text: String,
    #[serde(default = "default_available")]
    pub available: bool,
    /// Node to jump to when this option is chosen. Without one, the current node carries on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStep {
    Line(ScriptLine),
    Command(String),
    Options(Vec<ScriptOption>),
    Jump(String),
}

/// A compiled dialogue script: named nodes, each a list of steps.
///
/// ```yaml
/// nodes:
///   Start:
///     - line: { id: "line:greet", text: "Alice: Hello there." }
///     - command: wait 0.5
///     - options:
///         - { id: "line:yes", text: "Hi!", jump: Friendly }
///         - { id: "line:no", text: "..." }
///   Friendly:
///     - line: { id: "line:glad", text: "Alice: Glad to meet you." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptProgram {
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub nodes: IndexMap<String, Vec<ScriptStep>>,
}

impl ScriptProgram {
    pub fn from_yaml_str(content: &str) -> ParleyResult<Self> {
        let program: Self = serde_yaml::from_str(content)?;
        program.validate()?;
        Ok(program)
    }

    pub fn load(path: impl AsRef<Path>) -> ParleyResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Checks that the script has nodes, every jump lands on an existing node, every
    /// option set is non-empty and no line id is bound to two different texts. Nodes that
    /// jump straight into each other must eventually reach a node that presents something.
    pub fn validate(&self) -> ParleyResult<()> {
        if self.nodes.is_empty() {
            return Err(ParleyError::Script("script contains no nodes".to_string()));
        }

        let mut texts: HashMap<&str, &str> = HashMap::new();
        for (node, steps) in &self.nodes {
            for step in steps {
                match step {
                    ScriptStep::Line(line) => {
                        check_text(&mut texts, &line.id, &line.text, node)?;
                    }
                    ScriptStep::Options(options) => {
                        if options.is_empty() {
                            return Err(ParleyError::Script(format!(
                                "node '{}' has an empty option set",
                                node
                            )));
                        }
                        for option in options {
                            check_text(&mut texts, &option.id, &option.text, node)?;
                            if let Some(target) = &option.jump {
                                self.check_jump(node, target)?;
                            }
                        }
                    }
                    ScriptStep::Jump(target) => self.check_jump(node, target)?,
                    ScriptStep::Command(text) => {
                        if text.trim().is_empty() {
                            return Err(ParleyError::Script(format!(
                                "node '{}' has an empty command",
                                node
                            )));
                        }
                    }
                }
            }
        }
        self.check_silent_cycles()
    }

    fn check_silent_cycles(&self) -> ParleyResult<()> {
        for start in self.nodes.keys() {
            let mut chain = vec![start.as_str()];
            let mut node = start.as_str();
            while let Some(target) = self.node(node).and_then(silent_jump) {
                if chain.contains(&target) {
                    chain.push(target);
                    return Err(ParleyError::Script(format!(
                        "nodes jump in a cycle without presenting anything: {}",
                        chain.join(" -> ")
                    )));
                }
                chain.push(target);
                node = target;
            }
        }
        Ok(())
    }

    fn check_jump(&self, node: &str, target: &str) -> ParleyResult<()> {
        if self.nodes.contains_key(target) {
            Ok(())
        } else {
            Err(ParleyError::Script(format!(
                "node '{}' jumps to unknown node '{}'",
                node, target
            )))
        }
    }

    pub fn node(&self, name: &str) -> Option<&[ScriptStep]> {
        self.nodes.get(name).map(Vec::as_slice)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Every line id and its text, in script order.
    pub fn string_table(&self) -> Vec<(String, String)> {
        let mut table = Vec::new();
        for steps in self.nodes.values() {
            for step in steps {
                match step {
                    ScriptStep::Line(line) => table.push((line.id.clone(), line.text.clone())),
                    ScriptStep::Options(options) => table.extend(
                        options
                            .iter()
                            .map(|option| (option.id.clone(), option.text.clone())),
                    ),
                    ScriptStep::Command(_) | ScriptStep::Jump(_) => {}
                }
            }
        }
        table
    }

    /// Line ids a node may present, used to announce upcoming lines on node entry.
    pub fn node_line_ids(&self, name: &str) -> Vec<String> {
        let Some(steps) = self.node(name) else {
            return Vec::new();
        };
        steps
            .iter()
            .flat_map(|step| match step {
                ScriptStep::Line(line) => vec![line.id.clone()],
                ScriptStep::Options(options) => {
                    options.iter().map(|option| option.id.clone()).collect()
                }
                ScriptStep::Command(_) | ScriptStep::Jump(_) => Vec::new(),
            })
            .collect()
    }
}

/// Target of a node that jumps away before presenting anything.
fn silent_jump(steps: &[ScriptStep]) -> Option<&str> {
    match steps.first()? {
        ScriptStep::Jump(target) => Some(target),
        _ => None,
    }
}

fn check_text<'a>(
    texts: &mut HashMap<&'a str, &'a str>,
    id: &'a str,
    text: &'a str,
    node: &str,
) -> ParleyResult<()> {
    match texts.insert(id, text) {
        Some(previous) if previous != text => Err(ParleyError::Script(format!(
            "line id '{}' in node '{}' is bound to two different texts",
            id, node
        ))),
        _ => Ok(()),
    }
}
