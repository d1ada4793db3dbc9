use anyhow::Result;

/// One model configuration to try.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelCandidate {
    /// Loader-specific identifier (file path, checkpoint name, ...).
    pub id: String,
    /// Human-readable description for logs.
    pub description: String,
}

impl ModelCandidate {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// A candidate that failed to load and why.
#[derive(Debug)]
pub struct LoadFailure {
    pub candidate: ModelCandidate,
    pub error: anyhow::Error,
}

/// Result of walking a [`ModelChain`].
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Loaded {
        candidate: ModelCandidate,
        model: T,
        failures: Vec<LoadFailure>,
    },
    Unavailable {
        failures: Vec<LoadFailure>,
    },
}

impl<T> LoadOutcome<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }

    pub fn failures(&self) -> &[LoadFailure] {
        match self {
            LoadOutcome::Loaded { failures, .. } | LoadOutcome::Unavailable { failures } => {
                failures
            }
        }
    }

    /// Drop the bookkeeping and keep the model, if any.
    pub fn into_model(self) -> Option<T> {
        match self {
            LoadOutcome::Loaded { model, .. } => Some(model),
            LoadOutcome::Unavailable { .. } => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> LoadOutcome<U> {
        match self {
            LoadOutcome::Loaded {
                candidate,
                model,
                failures,
            } => LoadOutcome::Loaded {
                candidate,
                model: f(model),
                failures,
            },
            LoadOutcome::Unavailable { failures } => LoadOutcome::Unavailable { failures },
        }
    }
}

/// Ordered list of model configurations; the first that loads wins.
#[derive(Clone, Debug)]
pub struct ModelChain {
    stage: String,
    candidates: Vec<ModelCandidate>,
    enable_fallback: bool,
}

impl ModelChain {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            candidates: Vec::new(),
            enable_fallback: true,
        }
    }

    /// Append a candidate at the lowest priority.
    pub fn candidate(mut self, id: impl Into<String>, description: impl Into<String>) -> Self {
        self.candidates.push(ModelCandidate::new(id, description));
        self
    }

    /// Put a caller-chosen candidate first unless it is already listed.
    pub fn with_preferred(mut self, id: impl Into<String>, description: impl Into<String>) -> Self {
        let id = id.into();
        if !self.candidates.iter().any(|c| c.id == id) {
            self.candidates
                .insert(0, ModelCandidate::new(id, description));
        }
        self
    }

    /// With fallback disabled the chain stops at the first failure.
    pub fn with_fallback(mut self, enable_fallback: bool) -> Self {
        self.enable_fallback = enable_fallback;
        self
    }

    pub fn candidates(&self) -> &[ModelCandidate] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Try each candidate in order with `loader`.
    pub fn load_first<T, F>(&self, mut loader: F) -> LoadOutcome<T>
    where
        F: FnMut(&ModelCandidate) -> Result<T>,
    {
        let mut failures = Vec::new();
        for candidate in &self.candidates {
            log::info!("{}: trying {}", self.stage, candidate.description);
            match loader(candidate) {
                Ok(model) => {
                    log::info!("{}: loaded {}", self.stage, candidate.description);
                    return LoadOutcome::Loaded {
                        candidate: candidate.clone(),
                        model,
                        failures,
                    };
                }
                Err(error) => {
                    log::warn!(
                        "{}: failed to load {}: {:#}",
                        self.stage,
                        candidate.description,
                        error
                    );
                    failures.push(LoadFailure {
                        candidate: candidate.clone(),
                        error,
                    });
                    if !self.enable_fallback {
                        break;
                    }
                }
            }
        }
        log::warn!("{}: no candidate could be loaded", self.stage);
        LoadOutcome::Unavailable { failures }
    }
}
