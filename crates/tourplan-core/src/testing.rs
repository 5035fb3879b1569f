//! Scripted planner backend for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tourplan_api::{
    CompletionRequest, CompletionResponse, Error, MapRequest, MapResponse, PlannerBackend,
    PlannerClient,
};

#[derive(Default)]
pub struct Script {
    completions: Mutex<VecDeque<Result<CompletionResponse, Error>>>,
    maps: Mutex<VecDeque<Result<MapResponse, Error>>>,
    completion_requests: Mutex<Vec<CompletionRequest>>,
    map_requests: Mutex<Vec<MapRequest>>,
    tokens: Mutex<Vec<String>>,
}

impl Script {
    pub fn push_completion(&self, response: Result<CompletionResponse, Error>) {
        self.completions.lock().push_back(response);
    }

    pub fn push_map(&self, response: Result<MapResponse, Error>) {
        self.maps.lock().push_back(response);
    }

    pub fn completion_calls(&self) -> usize {
        self.completion_requests.lock().len()
    }

    pub fn map_calls(&self) -> usize {
        self.map_requests.lock().len()
    }

    pub fn last_completion_request(&self) -> Option<CompletionRequest> {
        self.completion_requests.lock().last().cloned()
    }

    pub fn last_map_request(&self) -> Option<MapRequest> {
        self.map_requests.lock().last().cloned()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }
}

pub struct ScriptedBackend {
    script: Arc<Script>,
}

impl ScriptedBackend {
    pub fn new() -> (PlannerClient, Arc<Script>) {
        let script = Arc::new(Script::default());
        let client = PlannerClient::new(ScriptedBackend {
            script: Arc::clone(&script),
        });
        (client, script)
    }
}

#[async_trait]
impl PlannerBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Error> {
        self.script.tokens.lock().push(token.to_string());
        self.script.completion_requests.lock().push(request.clone());
        self.script
            .completions
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Other("no scripted completion".to_string())))
    }

    async fn render_map(&self, token: &str, request: &MapRequest) -> Result<MapResponse, Error> {
        self.script.tokens.lock().push(token.to_string());
        self.script.map_requests.lock().push(request.clone());
        self.script
            .maps
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Other("no scripted map".to_string())))
    }
}
