use std::{fmt, sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::{
    logging::default_logger,
    pipeline::{PipelineParts, RequestPipeline},
    retry::RetryClassifier,
    transport::{ReqwestTransport, Transport},
    wire::Ticket,
    AuthContext, BackoffScheduler, Bucket, ClientOptions, Clock, DropOptions, Event, Job,
    JobStatus, Request, RequestLogger, RequestSigner, ResponseBody, Result, Stage,
    StorageApiError, Table, TokenInfo, TokioClock,
};

#[derive(Clone)]
/// HTTP client for the Storage API.
pub struct StorageClient {
    pipeline: RequestPipeline,
    options: ClientOptions,
}

impl fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageClient")
            .field("pipeline", &self.pipeline)
            .field("options", &self.options)
            .finish()
    }
}

impl StorageClient {
    /// Creates a client for the default branch.
    ///
    /// Options are validated here; nothing is sent until the first call.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let auth = AuthContext::new(options.auth_method, options.token.trim());
        Self::build(options, auth)
    }

    /// Creates a client whose branch-aware requests are routed through
    /// `branch/{branch_id}/`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use storage_api_http::{ClientOptions, StorageClient};
    ///
    /// let client = StorageClient::branch_aware(
    ///     ClientOptions::new("https://connection.keboola.com", "my-token"),
    ///     "123",
    /// )?;
    /// # Ok::<(), storage_api_http::StorageApiError>(())
    /// ```
    pub fn branch_aware(options: ClientOptions, branch_id: impl Into<String>) -> Result<Self> {
        let auth =
            AuthContext::new(options.auth_method, options.token.trim()).with_branch(branch_id)?;
        Self::build(options, auth)
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `STORAGE_API_URL` — base endpoint
    /// - `STORAGE_API_TOKEN` — Storage API token
    /// - `STORAGE_API_BRANCH_ID` — optional development branch
    ///
    /// Returns a configuration error if a required variable is missing or empty.
    pub fn from_env() -> Result<Self> {
        let url = required_env("STORAGE_API_URL")?;
        let token = required_env("STORAGE_API_TOKEN")?;
        let options = ClientOptions::new(url, token);
        match std::env::var("STORAGE_API_BRANCH_ID") {
            Ok(branch_id) if !branch_id.trim().is_empty() => Self::branch_aware(options, branch_id),
            _ => Self::new(options),
        }
    }

    fn build(options: ClientOptions, auth: AuthContext) -> Result<Self> {
        options.validate()?;
        let pipeline = RequestPipeline::new(PipelineParts {
            signer: RequestSigner::new(
                options.url.trim(),
                options.user_agent.clone(),
                options.run_id.clone(),
            ),
            auth,
            timeouts: options.timeouts,
            classifier: RetryClassifier::new(options.retry_on_maintenance),
            scheduler: BackoffScheduler::new(
                options.backoff_max_tries,
                options.base_delay(),
                options.max_delay(),
            ),
            transport: Arc::new(ReqwestTransport::default()),
            clock: Arc::new(TokioClock),
            logger: default_logger(),
        });
        Ok(Self { pipeline, options })
    }

    /// Replaces the HTTP transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.pipeline.set_transport(transport);
        self
    }

    /// Replaces the clock used for backoff and job polling waits.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.pipeline.set_clock(clock);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.pipeline.set_logger(logger);
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The request pipeline shared by every operation of this client.
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn branch_id(&self) -> Option<String> {
        self.pipeline.auth().branch_id.clone()
    }

    /// Swaps in a new token. Concurrent calls sign with either the old or the
    /// new credential, never a partial update.
    pub fn refresh_token(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(StorageApiError::Configuration(
                "no token or OAuth credential configured".to_owned(),
            ));
        }
        let current = self.pipeline.auth();
        self.pipeline.replace_auth(AuthContext {
            method: current.method,
            token: token.trim().to_owned(),
            branch_id: current.branch_id.clone(),
        });
        Ok(())
    }

    /// Sends an arbitrary request through the retrying pipeline.
    pub async fn send(&self, request: Request) -> Result<ResponseBody> {
        self.pipeline.execute(&request).await
    }

    /// Returns details of the token the client authenticates with.
    pub async fn verify_token(&self) -> Result<TokenInfo> {
        self.fetch(Request::get("tokens/verify")).await
    }

    /// Generates a unique id. Always served by the default branch.
    pub async fn generate_id(&self) -> Result<String> {
        let ticket: Ticket = self.fetch(Request::post("tickets")).await?;
        Ok(ticket.id)
    }

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        self.fetch(Request::get("buckets")).await
    }

    pub async fn get_bucket(&self, bucket_id: &str) -> Result<Bucket> {
        self.fetch(Request::get(format!("buckets/{bucket_id}"))).await
    }

    pub async fn create_bucket(
        &self,
        name: &str,
        stage: Stage,
        description: Option<&str>,
    ) -> Result<Bucket> {
        let mut payload = json!({ "name": name, "stage": stage.as_str() });
        if let Some(description) = description {
            payload["description"] = json!(description);
        }
        self.fetch(Request::post("buckets").json(payload)).await
    }

    /// Drops a bucket. With `is_async`, waits for the storage job to finish.
    pub async fn drop_bucket(&self, bucket_id: &str, options: DropOptions) -> Result<()> {
        let mut request = Request::delete(format!("buckets/{bucket_id}"));
        if options.force {
            request = request.query("force", 1);
        }
        if options.is_async {
            request = request.query("async", 1);
        }

        let body = self.send(request).await?;
        if options.is_async {
            let job: Job = body.into_typed()?;
            self.wait_for_job(&job.id_string()).await?;
        }
        Ok(())
    }

    pub async fn list_tables(&self, bucket_id: &str) -> Result<Vec<Table>> {
        self.fetch(Request::get(format!("buckets/{bucket_id}/tables")))
            .await
    }

    pub async fn get_table(&self, table_id: &str) -> Result<Table> {
        self.fetch(Request::get(format!("tables/{table_id}"))).await
    }

    pub async fn drop_table(&self, table_id: &str) -> Result<()> {
        self.send(Request::delete(format!("tables/{table_id}")))
            .await
            .map(|_| ())
    }

    /// Lists events of a table, routed through the client's branch.
    pub async fn list_table_events(&self, table_id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
        let mut request = Request::get(format!("tables/{table_id}/events"));
        if let Some(limit) = limit {
            request = request.query("limit", limit);
        }
        self.fetch(request).await
    }

    /// Returns exported table data exactly as the platform sent it (CSV).
    pub async fn export_table_preview(&self, table_id: &str) -> Result<Vec<u8>> {
        let request = Request::get(format!("tables/{table_id}/data-preview"))
            .extended_timeout()
            .raw_response();
        Ok(self.send(request).await?.into_bytes())
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        self.fetch(Request::get(format!("jobs/{job_id}"))).await
    }

    /// Polls a storage job until it finishes.
    ///
    /// A job in the `error` state becomes [`StorageApiError::Job`]. Job bodies
    /// carrying an `error` object are raised by the pipeline as application
    /// errors, so they are mapped here before the status is inspected.
    pub async fn wait_for_job(&self, job_id: &str) -> Result<Job> {
        let interval = Duration::from_millis(self.options.job_poll_interval_ms);
        let max_wait = self.options.job_poll_max_wait_ms.map(Duration::from_millis);
        let mut waited = Duration::ZERO;

        loop {
            let job = match self.get_job(job_id).await {
                Ok(job) => job,
                Err(StorageApiError::Application { code, message, .. }) => {
                    return Err(StorageApiError::Job {
                        id: job_id.to_owned(),
                        code,
                        message,
                    })
                }
                Err(err) => return Err(err),
            };

            match job.status {
                JobStatus::Success => return Ok(job),
                JobStatus::Error => {
                    return Err(StorageApiError::Job {
                        id: job_id.to_owned(),
                        code: None,
                        message: "job failed without error detail".to_owned(),
                    })
                }
                JobStatus::Waiting | JobStatus::Processing => {}
            }

            if max_wait.is_some_and(|max_wait| waited >= max_wait) {
                return Err(StorageApiError::Job {
                    id: job_id.to_owned(),
                    code: None,
                    message: format!(
                        "job did not finish within {} ms",
                        waited.as_millis()
                    ),
                });
            }

            self.pipeline.clock().sleep(interval).await;
            waited += interval;
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        self.send(request).await?.into_typed()
    }
}

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name).map_err(|_| {
        StorageApiError::Configuration(format!("missing {name} environment variable"))
    })?;
    if value.trim().is_empty() {
        return Err(StorageApiError::Configuration(format!(
            "{name} is set but empty"
        )));
    }
    Ok(value)
}
