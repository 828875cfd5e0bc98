use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    pipeline::{PipelineParts, RequestPipeline},
    retry::RetryClassifier,
    transport::{HttpRequest, HttpResponse, Transport},
    AuthContext, AuthMethod, BackoffScheduler, Clock, LogLevel, RequestLogger, RequestSigner,
    TimeoutPolicy, TransportError, TransportErrorKind,
};

pub(crate) type Scripted = Result<HttpResponse, TransportError>;

/// Transport replaying a fixed script and recording what was sent.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    sent: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            sent: Arc::default(),
        }
    }

    pub fn hits(&self) -> usize {
        self.requests().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.sent.lock().expect("sent mutex must not be poisoned").clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent
            .lock()
            .expect("sent mutex must not be poisoned")
            .push(request);
        self.script
            .lock()
            .expect("script mutex must not be poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::new(
                    TransportErrorKind::Other,
                    "no scripted response available",
                ))
            })
    }
}

/// Clock that records requested sleeps and returns immediately.
#[derive(Clone, Default)]
pub(crate) struct RecordingClock {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingClock {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .expect("delay mutex must not be poisoned")
            .clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.delays
            .lock()
            .expect("delay mutex must not be poisoned")
            .push(duration);
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingLogger {
    records: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl RecordingLogger {
    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records
            .lock()
            .expect("log mutex must not be poisoned")
            .clone()
    }
}

impl RequestLogger for RecordingLogger {
    fn log(&self, level: LogLevel, message: &str, _fields: &[(&'static str, String)]) {
        self.records
            .lock()
            .expect("log mutex must not be poisoned")
            .push((level, message.to_owned()));
    }
}

/// Pipeline with a 10 ms base delay and a 1 s ceiling.
pub(crate) fn pipeline(
    transport: &ScriptedTransport,
    clock: &RecordingClock,
    max_attempts: u32,
    retry_on_maintenance: bool,
) -> RequestPipeline {
    RequestPipeline::new(PipelineParts {
        signer: RequestSigner::new("https://connection.example.com", "test-agent", None),
        auth: AuthContext::new(AuthMethod::Token, "test-token"),
        timeouts: TimeoutPolicy::default(),
        classifier: RetryClassifier::new(retry_on_maintenance),
        scheduler: BackoffScheduler::new(
            max_attempts,
            Duration::from_millis(10),
            Duration::from_millis(1_000),
        ),
        transport: Arc::new(transport.clone()),
        clock: Arc::new(clock.clone()),
        logger: Arc::new(crate::logging::NoopLogger),
    })
}
