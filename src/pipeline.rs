//! Sign, dispatch, classify, back off, repeat.

use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;

use crate::{
    decode::{application_error, decode_body, http_error, maintenance_error, transport_error},
    logging::{LogLevel, RequestLogger},
    retry::{Outcome, RetryClassifier, RetryDecision},
    transport::{HttpResponse, Transport},
    AuthContext, BackoffScheduler, Clock, Request, RequestSigner, ResponseBody, Result,
    StorageApiError, TimeoutPolicy,
};

/// Executes logical requests with retry, backoff and error normalisation.
///
/// Attempts of one call are strictly sequential. Concurrent calls only share
/// the [`AuthContext`], which is swapped atomically on refresh.
#[derive(Clone)]
pub struct RequestPipeline {
    signer: RequestSigner,
    auth: Arc<ArcSwap<AuthContext>>,
    timeouts: TimeoutPolicy,
    classifier: RetryClassifier,
    scheduler: BackoffScheduler,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    logger: Arc<dyn RequestLogger>,
}

impl fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("signer", &self.signer)
            .field("auth", &self.auth.load_full())
            .field("timeouts", &self.timeouts)
            .field("classifier", &self.classifier)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

/// Components a pipeline is assembled from.
pub(crate) struct PipelineParts {
    pub signer: RequestSigner,
    pub auth: AuthContext,
    pub timeouts: TimeoutPolicy,
    pub classifier: RetryClassifier,
    pub scheduler: BackoffScheduler,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    pub logger: Arc<dyn RequestLogger>,
}

impl RequestPipeline {
    pub(crate) fn new(parts: PipelineParts) -> Self {
        Self {
            signer: parts.signer,
            auth: Arc::new(ArcSwap::from_pointee(parts.auth)),
            timeouts: parts.timeouts,
            classifier: parts.classifier,
            scheduler: parts.scheduler,
            transport: parts.transport,
            clock: parts.clock,
            logger: parts.logger,
        }
    }

    pub(crate) fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    pub(crate) fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    pub(crate) fn set_logger(&mut self, logger: Arc<dyn RequestLogger>) {
        self.logger = logger;
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Snapshot of the current credential context.
    pub fn auth(&self) -> Arc<AuthContext> {
        self.auth.load_full()
    }

    /// Replaces the credential context; in-flight signers see old or new, never a mix.
    pub fn replace_auth(&self, auth: AuthContext) {
        self.auth.store(Arc::new(auth));
    }

    pub async fn execute(&self, request: &Request) -> Result<ResponseBody> {
        let mut budget = self.scheduler.budget();
        let mut attempt = 1u32;

        loop {
            let auth = self.auth.load_full();
            let mut http = self.signer.sign(request, &auth)?;
            http.timeout = Some(
                self.timeouts
                    .resolve(request.method, request.extended_timeout),
            );
            let url = http.url.clone();

            self.logger.log(
                LogLevel::Debug,
                "sending storage api request",
                &[
                    ("method", request.method.to_string()),
                    ("url", url.clone()),
                    ("attempt", attempt.to_string()),
                ],
            );

            let (error, decision) = match self.transport.send(http).await {
                Ok(response) => {
                    self.logger.log(
                        LogLevel::Debug,
                        "storage api response received",
                        &[
                            ("url", url.clone()),
                            ("status", response.status.to_string()),
                            ("attempt", attempt.to_string()),
                        ],
                    );
                    let verdict = self.classifier.classify(Outcome::Response(&response));
                    match verdict.decision {
                        RetryDecision::NoRetry if verdict.maintenance => {
                            let err = maintenance_error(&response);
                            self.log_failure(&url, attempt, &err);
                            return Err(err);
                        }
                        RetryDecision::NoRetry => {
                            return self.finish(&url, attempt, request.raw_response, response)
                        }
                        RetryDecision::Retry(_) => (http_error(&url, &response), verdict.decision),
                    }
                }
                Err(source) => {
                    self.logger.log(
                        LogLevel::Debug,
                        "storage api transport failure",
                        &[
                            ("url", url.clone()),
                            ("kind", source.kind.to_string()),
                            ("attempt", attempt.to_string()),
                        ],
                    );
                    let decision = self.classifier.classify(Outcome::Transport(&source)).decision;
                    (transport_error(&url, source), decision)
                }
            };

            let RetryDecision::Retry(hint) = decision else {
                self.log_failure(&url, attempt, &error);
                return Err(error);
            };

            self.scheduler.record_attempt(&mut budget);
            if !self.scheduler.should_retry(&budget) {
                self.log_failure(&url, attempt, &error);
                return Err(error);
            }

            let delay = self.scheduler.delay_with_hint(budget.attempts_made, hint);
            self.logger.log(
                LogLevel::Info,
                "retrying storage api request",
                &[
                    ("url", url),
                    ("attempt", attempt.to_string()),
                    ("delay_ms", delay.as_millis().to_string()),
                    ("error", error.to_string()),
                ],
            );
            self.clock.sleep(delay).await;
            attempt += 1;
        }
    }

    fn finish(
        &self,
        url: &str,
        attempt: u32,
        raw_response: bool,
        response: HttpResponse,
    ) -> Result<ResponseBody> {
        if !response.is_success() {
            let err = http_error(url, &response);
            self.log_failure(url, attempt, &err);
            return Err(err);
        }

        let raw = raw_response.then(|| response.body.clone());
        let body = decode_body(response.body);
        if let Some(err) = application_error(url, &body) {
            self.log_failure(url, attempt, &err);
            return Err(err);
        }
        Ok(match raw {
            Some(bytes) => ResponseBody::Raw(bytes),
            None => body,
        })
    }

    fn log_failure(&self, url: &str, attempt: u32, err: &StorageApiError) {
        self.logger.log(
            LogLevel::Warn,
            "storage api request failed",
            &[
                ("url", url.to_owned()),
                ("attempts", attempt.to_string()),
                ("error", err.to_string()),
            ],
        );
    }
}
