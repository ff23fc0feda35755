use std::sync::Arc;

/// A named program the runner can start dialogue from.
///
/// `program` is `None` when the project exists but failed to compile.
#[derive(Debug)]
pub struct DialogueProject<P> {
    pub name: String,
    pub program: Option<Arc<P>>,
}

impl<P> DialogueProject<P> {
    pub fn new(name: impl Into<String>, program: P) -> Self {
        Self {
            name: name.into(),
            program: Some(Arc::new(program)),
        }
    }

    pub fn from_shared(name: impl Into<String>, program: Arc<P>) -> Self {
        Self {
            name: name.into(),
            program: Some(program),
        }
    }

    pub fn without_program(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: None,
        }
    }
}

impl<P> Clone for DialogueProject<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            program: self.program.clone(),
        }
    }
}
