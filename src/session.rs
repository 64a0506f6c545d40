use crate::block::Notebook;
use crate::generate::{GenerateError, NoteGenerator, NoteRequest};

/// The screen the user is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    Form,
    Generating(NoteRequest),
    Result(Notebook),
    Error(String),
}

/// Navigation between home, the request form, generation and the result.
#[derive(Debug, Default)]
pub struct Session {
    view: View,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.view, View::Generating(_))
    }

    /// Open the request form from the home view.
    pub fn start(&mut self) -> bool {
        if self.view != View::Home {
            return false;
        }
        self.view = View::Form;
        true
    }

    /// Submit the form. Returns the request the generator should be called with.
    pub fn submit(&mut self, request: NoteRequest) -> Option<&NoteRequest> {
        if self.view != View::Form {
            return None;
        }
        log::info!("Generating notes on {:?} for grade {}", request.topic, request.grade);
        self.view = View::Generating(request);
        match &self.view {
            View::Generating(request) => Some(request),
            _ => None,
        }
    }

    /// Finish the pending generation with the generator's outcome.
    pub fn complete(&mut self, outcome: Result<String, GenerateError>) -> bool {
        let View::Generating(request) = &self.view else {
            return false;
        };
        self.view = match outcome {
            Ok(markdown) => View::Result(Notebook::new(request.topic.clone(), &markdown)),
            Err(e) => {
                log::warn!("{}", e);
                View::Error(e.to_string())
            }
        };
        true
    }

    /// Submit `request` and block on one call to `generator`.
    pub fn run(&mut self, request: NoteRequest, generator: &dyn NoteGenerator) -> &View {
        if let Some(request) = self.submit(request) {
            let outcome = generator.generate(request);
            self.complete(outcome);
        }
        &self.view
    }

    /// Return to the home view, discarding any notebook. Ignored mid-generation.
    pub fn back(&mut self) -> bool {
        if self.is_generating() {
            return false;
        }
        self.view = View::Home;
        true
    }

    /// The notebook on display, if any.
    pub fn notebook(&self) -> Option<&Notebook> {
        match &self.view {
            View::Result(notebook) => Some(notebook),
            _ => None,
        }
    }
}
