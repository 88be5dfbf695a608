//! Scripted gateway used by unit tests.

use async_trait::async_trait;
use std::sync::Mutex;

use super::ModelGateway;
use crate::error::Result;

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub key: Option<String>,
    pub prompt: String,
    pub images: Vec<String>,
    pub system_instruction: Option<String>,
}

type Responder = Box<dyn Fn(&Call) -> Result<String> + Send + Sync>;

pub(crate) struct FakeGateway {
    responder: Responder,
    active: Mutex<Option<String>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeGateway {
    pub fn new(responder: impl Fn(&Call) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            active: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for FakeGateway {
    fn activate_key(&self, api_key: &str) {
        *self.active.lock().unwrap() = Some(api_key.to_string());
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn send(
        &self,
        prompt: &str,
        images: &[String],
        system_instruction: Option<&str>,
    ) -> Result<String> {
        let call = Call {
            key: self.active.lock().unwrap().clone(),
            prompt: prompt.to_string(),
            images: images.to_vec(),
            system_instruction: system_instruction.map(str::to_string),
        };
        self.calls.lock().unwrap().push(call.clone());
        (self.responder)(&call)
    }
}
